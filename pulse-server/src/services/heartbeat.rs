//! Periodic liveness signal to the discovery registry.

use std::time::Duration;

use chrono::Utc;
use pulse_auth::{CanonicalError, SignedEnvelope};
use pulse_config::Config;
use pulse_log::LogError;
use pulse_system::ShutdownHandle;
use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use crate::services::registration::{Registered, RegistrationClient, RegistrationState};
use crate::services::transport::{RegistryRequest, RegistryTransport, TransportError};

/// Body of a heartbeat request.
#[derive(Debug, Serialize)]
struct Liveness {
    status_code: u16,
    sequence: u64,
    timestamp: i64,
}

#[derive(Debug, thiserror::Error)]
enum HeartbeatError {
    #[error("could not encode heartbeat")]
    Canonical(#[from] CanonicalError),
    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Sends heartbeats to the discovery registry and registers again when they keep failing.
#[derive(Debug)]
pub struct HeartbeatService<T> {
    client: RegistrationClient<T>,
    path: String,
    interval: Duration,
    failure_threshold: u32,
    sequence: u64,
    failures: u32,
}

impl<T: RegistryTransport> HeartbeatService<T> {
    /// Creates the heartbeat for a registered service.
    pub fn new(config: &Config, registered: Registered<T>) -> Self {
        Self {
            client: registered.into_client(),
            path: format!("heartbeat/{}", config.service_name()),
            interval: config.heartbeat_interval(),
            failure_threshold: config.heartbeat_failure_threshold(),
            sequence: 0,
            failures: 0,
        }
    }

    /// Spawns the heartbeat task.
    ///
    /// The first heartbeat is sent one interval after this call. The task runs until `shutdown`
    /// is notified.
    pub fn start(self, shutdown: ShutdownHandle) -> HeartbeatHandle {
        let state = self.client.state();
        let join = tokio::spawn(self.run(shutdown));
        HeartbeatHandle { state, join }
    }

    async fn run(mut self, mut shutdown: ShutdownHandle) {
        let mut ticker = tokio::time::interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        pulse_log::info!(
            "sending heartbeats every {} seconds",
            self.interval.as_secs()
        );

        loop {
            tokio::select! {
                biased;

                _ = shutdown.notified() => break,
                _ = ticker.tick() => (),
            }

            tokio::select! {
                biased;

                _ = shutdown.notified() => break,
                _ = self.tick() => (),
            }
        }

        pulse_log::info!("heartbeat stopped");
    }

    async fn tick(&mut self) {
        self.sequence += 1;

        if self.client.current_state() == RegistrationState::Degraded {
            self.reregister().await;
            return;
        }

        match self.beat().await {
            Ok(()) => {
                if self.failures > 0 {
                    pulse_log::info!("heartbeat recovered after {} failures", self.failures);
                }
                self.failures = 0;
            }
            Err(error) => {
                self.failures += 1;
                pulse_log::warn!(
                    failures = self.failures,
                    "heartbeat failed: {}",
                    LogError(&error)
                );

                if self.failures >= self.failure_threshold {
                    pulse_log::error!(
                        "{} consecutive heartbeats failed, registering again",
                        self.failures
                    );
                    self.client.set_state(RegistrationState::Degraded);
                }
            }
        }
    }

    async fn beat(&self) -> Result<(), HeartbeatError> {
        let liveness = Liveness {
            status_code: 200,
            sequence: self.sequence,
            timestamp: Utc::now().timestamp(),
        };

        let envelope = SignedEnvelope::seal(self.client.secret(), &liveness)?;
        let request = RegistryRequest::new(self.path.as_str(), envelope);
        self.client.send(request).await?;

        pulse_log::trace!(sequence = self.sequence, "heartbeat sent");
        Ok(())
    }

    async fn reregister(&mut self) {
        match self.client.attempt().await {
            Ok(()) => {
                pulse_log::info!("registered again with discovery registry");
                self.failures = 0;
                self.client.set_state(RegistrationState::Registered);
            }
            Err(error) => {
                pulse_log::warn!("registration failed: {}", LogError(&error));
            }
        }
    }
}

/// Handle to a running [`HeartbeatService`].
#[derive(Debug)]
pub struct HeartbeatHandle {
    state: watch::Receiver<RegistrationState>,
    join: JoinHandle<()>,
}

impl HeartbeatHandle {
    /// Returns a receiver for the registration state maintained by the heartbeat.
    pub fn state(&self) -> watch::Receiver<RegistrationState> {
        self.state.clone()
    }

    /// Waits for the heartbeat task to finish.
    pub async fn join(self) {
        if let Err(error) = self.join.await {
            pulse_log::error!("heartbeat task failed: {}", LogError(&error));
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use pulse_system::Controller;
    use serde_json::json;

    use super::*;
    use crate::testutils::{MockTransport, discovery_secret, test_config, wait_for_requests};

    const INTERVAL: Duration = Duration::from_secs(10);

    async fn registered(
        config: &Config,
        transport: &MockTransport,
    ) -> Registered<MockTransport> {
        RegistrationClient::new(config, Arc::new(transport.clone()))
            .unwrap()
            .register()
            .await
            .unwrap()
    }

    fn assert_interval(elapsed: Duration) {
        assert!(elapsed >= INTERVAL, "{elapsed:?}");
        assert!(elapsed < INTERVAL + Duration::from_millis(5), "{elapsed:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn test_heartbeat_ticks() {
        pulse_log::init_test!();

        let transport = MockTransport::new([]);
        let config = test_config(json!({}));
        let registered = registered(&config, &transport).await;

        let controller = Controller::new(Duration::from_secs(1));
        let started = Instant::now();
        let handle = HeartbeatService::new(&config, registered).start(controller.shutdown_handle());

        wait_for_requests(&transport, 4).await;
        controller.shutdown(true);
        handle.join().await;

        let requests = transport.requests();
        let beats = &requests[1..4];

        assert_interval(beats[0].at - started);
        assert_interval(beats[1].at - beats[0].at);
        assert_interval(beats[2].at - beats[1].at);

        for (index, beat) in beats.iter().enumerate() {
            assert_eq!(beat.path, "heartbeat/metrics-service");
            assert_eq!(beat.payload["status_code"], json!(200));
            assert_eq!(beat.payload["sequence"], json!(index + 1));

            let canonical = pulse_auth::canonicalize(&beat.payload);
            assert!(pulse_auth::verify_bytes(
                &discovery_secret(),
                &canonical,
                beat.token.as_str()
            ));
        }

        assert_ne!(beats[0].token, beats[1].token);
        assert_ne!(beats[1].token, beats[2].token);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failures_below_threshold() {
        pulse_log::init_test!();

        // registration, then two failing heartbeats
        let transport = MockTransport::new([200, 503, 503]);
        let config = test_config(json!({}));
        let registered = registered(&config, &transport).await;

        let controller = Controller::new(Duration::from_secs(1));
        let handle = HeartbeatService::new(&config, registered).start(controller.shutdown_handle());
        let state = handle.state();

        wait_for_requests(&transport, 4).await;
        controller.shutdown(true);
        handle.join().await;

        let paths = transport.paths();
        similar_asserts::assert_eq!(
            paths,
            [
                "register",
                "heartbeat/metrics-service",
                "heartbeat/metrics-service",
                "heartbeat/metrics-service",
            ]
        );
        assert_eq!(*state.borrow(), RegistrationState::Registered);
    }

    #[tokio::test(start_paused = true)]
    async fn test_degraded_reregisters() {
        pulse_log::init_test!();

        let transport = MockTransport::new([200, 503, 503, 503]);
        let config = test_config(json!({"discovery": {"failure_threshold": 3}}));
        let registered = registered(&config, &transport).await;

        let controller = Controller::new(Duration::from_secs(1));
        let handle = HeartbeatService::new(&config, registered).start(controller.shutdown_handle());
        let mut state = handle.state();

        state
            .wait_for(|s| *s == RegistrationState::Degraded)
            .await
            .unwrap();
        assert_eq!(transport.requests().len(), 4);

        state
            .wait_for(|s| *s == RegistrationState::Registered)
            .await
            .unwrap();

        wait_for_requests(&transport, 6).await;
        controller.shutdown(true);
        handle.join().await;

        let paths = transport.paths();
        similar_asserts::assert_eq!(
            &paths[3..6],
            [
                "heartbeat/metrics-service",
                "register",
                "heartbeat/metrics-service",
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_before_first_tick() {
        let transport = MockTransport::new([]);
        let config = test_config(json!({}));
        let registered = registered(&config, &transport).await;

        let controller = Controller::new(Duration::from_secs(1));
        let handle = HeartbeatService::new(&config, registered).start(controller.shutdown_handle());

        controller.shutdown(false);
        handle.join().await;

        assert_eq!(transport.paths(), ["register"]);
    }
}
