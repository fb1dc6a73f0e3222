use std::net::TcpListener;
use std::sync::Arc;

use axum::http::{HeaderValue, header};
use pulse_config::Config;
use pulse_log::{Level, LogError};
use pulse_system::ShutdownHandle;
use tokio::task::JoinHandle;
use tower::ServiceBuilder;
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::{DefaultOnFailure, TraceLayer};

use crate::constants;
use crate::service::ServiceState;

/// Indicates the type of failure of the server.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// Binding failed.
    #[error("bind to interface failed")]
    BindFailed(#[from] std::io::Error),
}

/// Build the axum application with all routes and middleware.
fn make_app(service: ServiceState) -> axum::Router {
    // Layers added first are called first for requests and last for responses.
    let middleware = ServiceBuilder::new()
        .layer(SetResponseHeaderLayer::overriding(
            header::SERVER,
            HeaderValue::from_static(constants::SERVER),
        ))
        .layer(TraceLayer::new_for_http().on_failure(DefaultOnFailure::new().level(Level::DEBUG)));

    crate::endpoints::routes(service.config())
        .layer(middleware)
        .with_state(service)
}

fn listen(config: &Config) -> Result<TcpListener, ServerError> {
    let listener = TcpListener::bind(config.listen_addr())?;
    listener.set_nonblocking(true)?;
    Ok(listener)
}

/// HTTP server service.
///
/// This is the main HTTP server which hosts all endpoints and dispatches incoming traffic to them.
/// The server stops accepting connections when a [`Shutdown`](pulse_system::Shutdown) is
/// triggered and finishes once all open requests are answered.
#[derive(Debug)]
pub struct HttpServer {
    config: Arc<Config>,
    service: ServiceState,
    listener: TcpListener,
}

impl HttpServer {
    /// Binds the listen address.
    pub fn new(config: Arc<Config>, service: ServiceState) -> Result<Self, ServerError> {
        let listener = listen(&config)?;

        Ok(Self {
            config,
            service,
            listener,
        })
    }

    /// Spawns the server onto the current runtime.
    pub fn start(self, mut shutdown: ShutdownHandle) -> JoinHandle<()> {
        let Self {
            config,
            service,
            listener,
        } = self;

        pulse_log::info!("spawning http server");
        pulse_log::info!("  listening on http://{}/", config.listen_addr());

        tokio::spawn(async move {
            let listener = match tokio::net::TcpListener::from_std(listener) {
                Ok(listener) => listener,
                Err(error) => {
                    pulse_log::error!("failed to start the http server: {}", LogError(&error));
                    return;
                }
            };

            let app = make_app(service);
            let signal = async move {
                shutdown.notified().await;
                pulse_log::info!("shutting down HTTP server");
            };

            if let Err(error) = axum::serve(listener, app)
                .with_graceful_shutdown(signal)
                .await
            {
                pulse_log::error!("http server failed: {}", LogError(&error));
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use serde_json::json;
    use tokio::sync::watch;
    use tower::ServiceExt;

    use super::*;
    use crate::services::registration::RegistrationState;
    use crate::services::store::MemoryStore;
    use crate::testutils::test_config;

    #[tokio::test]
    async fn test_server_header() {
        let config = Arc::new(test_config(json!({})));
        let (_sender, registration) = watch::channel(RegistrationState::Registered);
        let service =
            ServiceState::new(config, Arc::new(MemoryStore::new(1)), registration).unwrap();

        let request = Request::get("/healthcheck/live").body(Body::empty()).unwrap();
        let response = make_app(service).oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::SERVER], constants::SERVER);
    }

    #[tokio::test]
    async fn test_bind_failed() {
        let occupied = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = occupied.local_addr().unwrap().port();

        let config = Arc::new(test_config(json!({"service": {"port": port}})));
        let (_sender, registration) = watch::channel(RegistrationState::Registered);
        let service =
            ServiceState::new(config.clone(), Arc::new(MemoryStore::new(1)), registration).unwrap();

        let result = HttpServer::new(config, service);
        assert!(matches!(result, Err(ServerError::BindFailed(_))));
    }
}
