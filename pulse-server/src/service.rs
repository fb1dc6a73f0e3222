use std::convert::Infallible;
use std::io;
use std::sync::Arc;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use pulse_auth::AuthGate;
use pulse_config::Config;
use tokio::runtime::Runtime;
use tokio::sync::watch;

use crate::services::registration::RegistrationState;
use crate::services::store::Store;

/// Indicates the type of failure of the server.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, thiserror::Error)]
pub enum ServiceError {
    /// The secret for inbound requests is not configured.
    #[error("missing inbound secret")]
    MissingSecret,
}

/// Creates the multi-threaded runtime for the service.
pub fn create_runtime(name: &'static str) -> io::Result<Runtime> {
    tokio::runtime::Builder::new_multi_thread()
        .thread_name(name)
        .enable_all()
        .build()
}

#[derive(Debug)]
struct StateInner {
    config: Arc<Config>,
    auth_gate: AuthGate,
    store: Arc<dyn Store>,
    registration: watch::Receiver<RegistrationState>,
}

/// Server state.
#[derive(Clone, Debug)]
pub struct ServiceState {
    inner: Arc<StateInner>,
}

impl ServiceState {
    /// Creates the state shared by all request handlers.
    pub fn new(
        config: Arc<Config>,
        store: Arc<dyn Store>,
        registration: watch::Receiver<RegistrationState>,
    ) -> Result<Self, ServiceError> {
        let secret = config
            .inbound_secret()
            .ok_or(ServiceError::MissingSecret)?
            .clone();

        let inner = StateInner {
            config,
            auth_gate: AuthGate::new(secret),
            store,
            registration,
        };

        Ok(Self {
            inner: Arc::new(inner),
        })
    }

    /// Returns the service configuration.
    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    pub fn auth_gate(&self) -> &AuthGate {
        &self.inner.auth_gate
    }

    pub fn store(&self) -> &dyn Store {
        self.inner.store.as_ref()
    }

    /// Returns the current registration state.
    pub fn registration_state(&self) -> RegistrationState {
        *self.inner.registration.borrow()
    }
}

impl FromRequestParts<ServiceState> for ServiceState {
    type Rejection = Infallible;

    async fn from_request_parts(_: &mut Parts, state: &Self) -> Result<Self, Self::Rejection> {
        Ok(state.clone())
    }
}
