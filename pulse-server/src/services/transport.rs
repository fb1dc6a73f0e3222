//! Outbound requests to the discovery registry.

use std::future::Future;

use axum::http::header;
use pulse_auth::SignedEnvelope;
use pulse_config::{Config, RegistryDescriptor};
use reqwest::StatusCode;

use crate::constants;

/// A signed request to a path relative to the discovery registry.
#[derive(Clone, Debug)]
pub struct RegistryRequest {
    pub path: String,
    pub envelope: SignedEnvelope,
}

impl RegistryRequest {
    pub fn new(path: impl Into<String>, envelope: SignedEnvelope) -> Self {
        Self {
            path: path.into(),
            envelope,
        }
    }
}

/// Failure of a single registry request.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("invalid registry url")]
    Url(#[from] url::ParseError),
    #[error("could not send request to registry")]
    Request(#[from] reqwest::Error),
    #[error("registry responded with {0}")]
    Status(StatusCode),
}

/// Delivers signed requests to the discovery registry.
///
/// Any 2xx response is a success.
pub trait RegistryTransport: Send + Sync + 'static {
    fn send(
        &self,
        request: RegistryRequest,
    ) -> impl Future<Output = Result<(), TransportError>> + Send;
}

/// The default transport, posting JSON over HTTP.
#[derive(Debug)]
pub struct HttpTransport {
    client: reqwest::Client,
    registry: RegistryDescriptor,
}

impl HttpTransport {
    /// Creates a transport with the configured request and connect timeouts.
    pub fn new(config: &Config) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .connect_timeout(config.http_connection_timeout())
            .timeout(config.http_timeout())
            .user_agent(constants::USER_AGENT)
            .build()?;

        Ok(Self {
            client,
            registry: config.registry().clone(),
        })
    }
}

impl RegistryTransport for HttpTransport {
    async fn send(&self, request: RegistryRequest) -> Result<(), TransportError> {
        let url = self.registry.get_url(&request.path)?;
        pulse_log::trace!("sending request to {url}");

        let response = self
            .client
            .post(url)
            .header(constants::TOKEN_HEADER, request.envelope.token().as_str())
            .header(header::CONTENT_TYPE, "application/json")
            .body(request.envelope.payload().to_vec())
            .send()
            .await?;

        match response.status() {
            status if status.is_success() => Ok(()),
            status => Err(TransportError::Status(status)),
        }
    }
}
