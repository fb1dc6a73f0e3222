//! The Pulse server application.
//!
//! This crate contains the [`run`] function which starts the service. Startup happens in a fixed
//! order:
//!
//!  1. The service registers its identity with the discovery registry, retrying with exponential
//!     backoff until the registry accepts it.
//!  2. A heartbeat task signals liveness to the registry in a fixed interval. After repeated
//!     failures the service considers itself degraded and registers again.
//!  3. The HTTP server binds its listener and accepts signed documents on `/metrics`, `/user` and
//!     `/message`, along with health checks on `/healthcheck/live` and `/healthcheck/ready`.
//!
//! Inbound requests carry a `Token` header with the HMAC-SHA256 of their canonical JSON body, see
//! [`pulse_auth`]. Requests to the registry are signed the same way with a separate secret.
//!
//! See the [`Config`] documentation for more information on configuration options.

mod constants;
mod endpoints;
mod extractors;
mod service;
pub mod services;
#[cfg(test)]
mod testutils;
pub mod utils;

use std::sync::Arc;

use pulse_config::Config;
use pulse_system::{Controller, Shutdown};

use crate::services::heartbeat::HeartbeatService;
use crate::services::registration::RegistrationClient;
use crate::services::server::HttpServer;
use crate::services::store::MemoryStore;
use crate::services::transport::{HttpTransport, RegistryTransport};

pub use crate::service::{ServiceError, ServiceState, create_runtime};

/// Runs the service until it receives a shutdown signal.
///
/// This blocks the current thread until a shutdown signal is received or a fatal error happens.
/// Registration failures are fatal: the HTTP server is never started without a successful
/// registration.
pub fn run(config: Config) -> anyhow::Result<()> {
    let config = Arc::new(config);
    pulse_log::info!("pulse server starting");

    let transport = Arc::new(HttpTransport::new(&config)?);
    let runtime = create_runtime("pulse-worker")?;
    runtime.block_on(async {
        let controller = Arc::new(Controller::new(config.shutdown_timeout()));
        let signals = tokio::spawn({
            let controller = controller.clone();
            async move { controller.listen_for_signals().await }
        });

        let result = serve(config, transport, controller).await;
        signals.abort();
        result
    })?;

    pulse_log::info!("pulse shutdown complete");
    Ok(())
}

/// Registers, then runs the heartbeat and the HTTP server until `controller` shuts down.
///
/// The listener is bound only after the registry accepted the registration. A shutdown during
/// registration returns without binding.
async fn serve<T: RegistryTransport>(
    config: Arc<Config>,
    transport: Arc<T>,
    controller: Arc<Controller>,
) -> anyhow::Result<()> {
    config.validate()?;
    let mut shutdown = controller.shutdown_handle();

    let client = RegistrationClient::new(&config, transport)?;
    pulse_log::info!("registering with {}", config.registry());

    let registered = tokio::select! {
        result = client.register() => result?,
        _ = shutdown.notified() => {
            pulse_log::info!("shutdown requested before registration completed");
            return Ok(());
        }
    };

    let heartbeat = HeartbeatService::new(&config, registered).start(controller.shutdown_handle());

    let store = Arc::new(MemoryStore::new(config.max_stored_records()));
    let state = ServiceState::new(config.clone(), store, heartbeat.state())?;
    let mut server = HttpServer::new(config.clone(), state)?.start(controller.shutdown_handle());

    let Shutdown { timeout } = shutdown.notified().await;
    match timeout {
        Some(timeout) => {
            if tokio::time::timeout(timeout, &mut server).await.is_err() {
                pulse_log::warn!(
                    "pending requests did not finish within {} seconds",
                    timeout.as_secs()
                );
                server.abort();
            }
        }
        None => server.abort(),
    }

    heartbeat.join().await;
    Ok(())
}
