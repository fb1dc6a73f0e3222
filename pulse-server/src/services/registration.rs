//! Registration with the discovery registry.
//!
//! At startup, the service announces its [`IdentityDescriptor`] to the registry and retries with
//! exponential backoff until the registry accepts it. A successful registration yields a
//! [`Registered`] proof, which is required to start the heartbeat.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use pulse_auth::{CanonicalError, DiscoverySecret, SignedEnvelope};
use pulse_config::Config;
use pulse_log::LogError;
use serde::Serialize;
use tokio::sync::watch;
use tokio::time::Instant;

use crate::services::transport::{RegistryRequest, RegistryTransport, TransportError};
use crate::utils::RetryBackoff;

/// Registration status of this service with the discovery registry.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum RegistrationState {
    /// Registration has not started.
    NotRegistered,
    /// Registration attempts are in progress.
    Registering,
    /// The registry accepted the registration and heartbeats succeed.
    Registered,
    /// Heartbeats failed repeatedly, the service is registering again.
    Degraded,
}

impl RegistrationState {
    /// Returns `true` if the registry accepted this service and heartbeats succeed.
    pub fn is_registered(self) -> bool {
        self == Self::Registered
    }
}

/// The identity announced to the discovery registry.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct IdentityDescriptor {
    /// Name under which the service registers.
    pub name: String,
    /// Host at which the registry reaches the service.
    pub host: String,
    pub port: u16,
    /// Free-form metadata announced along with the identity.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub capabilities: BTreeMap<String, String>,
}

impl IdentityDescriptor {
    /// Builds the identity announced for the service in `config`.
    pub fn from_config(config: &Config) -> Self {
        Self {
            name: config.service_name().to_owned(),
            host: config.advertise_host(),
            port: config.advertise_port(),
            capabilities: config.capabilities().clone(),
        }
    }
}

/// Error returned by [`RegistrationClient`].
#[derive(Debug, thiserror::Error)]
pub enum RegistrationError {
    /// Retries ran into a configured ceiling.
    #[error("registration failed after {attempts} attempts in {elapsed:?}")]
    Exhausted {
        attempts: usize,
        elapsed: Duration,
        #[source]
        last: TransportError,
    },
    /// The configuration has no discovery secret to sign with.
    #[error("missing discovery secret")]
    MissingSecret,
    /// The identity could not be brought into canonical form.
    #[error("could not encode identity")]
    Canonical(#[from] CanonicalError),
}

/// Registers this service with the discovery registry.
#[derive(Debug)]
pub struct RegistrationClient<T> {
    transport: Arc<T>,
    secret: DiscoverySecret,
    identity: IdentityDescriptor,
    envelope: SignedEnvelope,
    endpoint: String,
    initial_interval: Duration,
    max_interval: Duration,
    max_attempts: Option<u32>,
    max_duration: Option<Duration>,
    state: watch::Sender<RegistrationState>,
}

impl<T: RegistryTransport> RegistrationClient<T> {
    /// Creates a client and signs the identity from `config`.
    pub fn new(config: &Config, transport: Arc<T>) -> Result<Self, RegistrationError> {
        let secret = config
            .discovery_secret()
            .ok_or(RegistrationError::MissingSecret)?
            .clone();

        let identity = IdentityDescriptor::from_config(config);
        let envelope = SignedEnvelope::seal(&secret, &identity)?;
        let (state, _) = watch::channel(RegistrationState::NotRegistered);

        Ok(Self {
            transport,
            secret,
            identity,
            envelope,
            endpoint: config.register_endpoint().to_owned(),
            initial_interval: config.register_initial_interval(),
            max_interval: config.register_max_interval(),
            max_attempts: config.register_max_attempts(),
            max_duration: config.register_max_duration(),
            state,
        })
    }

    /// Returns the identity announced to the registry.
    pub fn identity(&self) -> &IdentityDescriptor {
        &self.identity
    }

    /// Subscribes to the registration state.
    pub fn state(&self) -> watch::Receiver<RegistrationState> {
        self.state.subscribe()
    }

    /// Sends a single registration request.
    pub async fn attempt(&self) -> Result<(), TransportError> {
        let request = RegistryRequest::new(self.endpoint.as_str(), self.envelope.clone());
        self.transport.send(request).await
    }

    /// Registers with retries until the registry accepts the identity.
    ///
    /// The first attempt is sent immediately. Returns [`RegistrationError::Exhausted`] once the
    /// configured maximum number of attempts or total duration is exceeded.
    pub async fn register(self) -> Result<Registered<T>, RegistrationError> {
        let started = Instant::now();
        let mut backoff = RetryBackoff::new(self.initial_interval, self.max_interval);
        let mut last_error = None;

        self.set_state(RegistrationState::Registering);

        loop {
            let delay = backoff.next_backoff();

            if let Some(last) = last_error.take() {
                let attempts = backoff.attempt() - 1;
                let elapsed = started.elapsed();

                let attempts_exceeded = self
                    .max_attempts
                    .is_some_and(|max| attempts >= max as usize);
                let duration_exceeded = self
                    .max_duration
                    .is_some_and(|max| elapsed + delay > max);

                if attempts_exceeded || duration_exceeded {
                    self.set_state(RegistrationState::NotRegistered);
                    return Err(RegistrationError::Exhausted {
                        attempts,
                        elapsed,
                        last,
                    });
                }

                pulse_log::debug!(
                    "scheduling registration retry in {} milliseconds",
                    delay.as_millis()
                );
                tokio::time::sleep(delay).await;
            }

            pulse_log::info!(
                attempt = backoff.attempt(),
                "registering with discovery registry"
            );

            match self.attempt().await {
                Ok(()) => {
                    let attempts = backoff.attempt();
                    pulse_log::info!(
                        "registered {} as {}:{}",
                        self.identity.name,
                        self.identity.host,
                        self.identity.port
                    );
                    self.set_state(RegistrationState::Registered);
                    return Ok(Registered {
                        client: self,
                        attempts,
                    });
                }
                Err(error) => {
                    pulse_log::warn!("registration failed: {}", LogError(&error));
                    last_error = Some(error);
                }
            }
        }
    }

    pub(crate) fn secret(&self) -> &DiscoverySecret {
        &self.secret
    }

    pub(crate) async fn send(&self, request: RegistryRequest) -> Result<(), TransportError> {
        self.transport.send(request).await
    }

    pub(crate) fn current_state(&self) -> RegistrationState {
        *self.state.borrow()
    }

    pub(crate) fn set_state(&self, state: RegistrationState) {
        self.state.send_replace(state);
    }
}

/// Proof of a successful registration.
///
/// Obtained from [`RegistrationClient::register`] and consumed when starting the heartbeat.
#[derive(Debug)]
pub struct Registered<T> {
    client: RegistrationClient<T>,
    attempts: usize,
}

impl<T: RegistryTransport> Registered<T> {
    /// The number of attempts it took to register.
    pub fn attempts(&self) -> usize {
        self.attempts
    }

    /// Subscribes to the registration state.
    pub fn state(&self) -> watch::Receiver<RegistrationState> {
        self.client.state()
    }

    pub(crate) fn into_client(self) -> RegistrationClient<T> {
        self.client
    }
}
