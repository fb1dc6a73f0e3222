use std::time::Duration;

use tokio::sync::watch;

/// Shutdown request broadcast by the [`Controller`].
///
/// A receiver has to ensure that it doesn't take longer than `timeout` to finish. Ideally, open
/// work is finished in an orderly manner but no new work is accepted anymore.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Shutdown {
    /// The timeout for this shutdown. `None` indicates an immediate forced shutdown.
    pub timeout: Option<Duration>,
}

/// Notifies a task about a [`Shutdown`] of the [`Controller`].
///
/// Obtain a handle through [`Controller::shutdown_handle`].
#[derive(Clone, Debug)]
pub struct ShutdownHandle(watch::Receiver<Option<Shutdown>>);

impl ShutdownHandle {
    /// Returns the current shutdown state, if a shutdown has been initiated.
    pub fn get(&self) -> Option<Shutdown> {
        *self.0.borrow()
    }

    /// Waits for a shutdown.
    ///
    /// Resolves immediately if a shutdown has been initiated before. If the controller is dropped
    /// without initiating a shutdown, this resolves with an immediate shutdown.
    pub async fn notified(&mut self) -> Shutdown {
        match self.0.wait_for(Option::is_some).await {
            Ok(shutdown) => (*shutdown).unwrap_or(Shutdown { timeout: None }),
            Err(_) => Shutdown { timeout: None },
        }
    }
}

/// Owner of the shutdown signal of the service.
///
/// There is one controller per running service. It is created at startup and passed explicitly to
/// the components that need to observe shutdown.
#[derive(Debug)]
pub struct Controller {
    timeout: Duration,
    sender: watch::Sender<Option<Shutdown>>,
}

impl Controller {
    /// Creates a controller with the graceful shutdown timeout used for `SIGTERM`.
    pub fn new(shutdown_timeout: Duration) -> Self {
        let (sender, _) = watch::channel(None);
        Self {
            timeout: shutdown_timeout,
            sender,
        }
    }

    /// Returns a handle to observe the shutdown signal.
    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle(self.sender.subscribe())
    }

    /// Initiates a shutdown.
    ///
    /// With `graceful` set, subscribers may take up to the configured shutdown timeout to finish.
    /// Repeated calls have no effect after the first.
    pub fn shutdown(&self, graceful: bool) {
        let timeout = graceful.then_some(self.timeout);
        self.sender.send_if_modified(|state| {
            if state.is_some() {
                return false;
            }
            *state = Some(Shutdown { timeout });
            true
        });
    }

    /// Waits for a termination signal of the process and initiates a shutdown.
    ///
    /// `SIGINT` and `SIGQUIT` shut down immediately, `SIGTERM` shuts down gracefully.
    pub async fn listen_for_signals(&self) {
        let graceful = wait_for_signal().await;
        self.shutdown(graceful);
    }
}

#[cfg(unix)]
async fn wait_for_signal() -> bool {
    use tokio::signal::unix::{SignalKind, signal};

    let (Ok(mut term), Ok(mut quit)) = (
        signal(SignalKind::terminate()),
        signal(SignalKind::quit()),
    ) else {
        pulse_log::error!("failed to register signal handlers");
        return false;
    };

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            pulse_log::info!("SIGINT received, exiting");
            false
        }
        _ = quit.recv() => {
            pulse_log::info!("SIGQUIT received, exiting");
            false
        }
        _ = term.recv() => {
            pulse_log::info!("SIGTERM received, stopping gracefully");
            true
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() -> bool {
    tokio::signal::ctrl_c().await.ok();
    pulse_log::info!("SIGINT received, exiting");
    false
}
