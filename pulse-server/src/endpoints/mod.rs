//! Web server endpoints.
//!
//! This module contains implementations for all supported endpoints, as well as a
//! [`routes`] function that builds the router for the server.

mod health_check;
mod ingest;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use pulse_config::Config;

use crate::service::ServiceState;

pub fn routes(config: &Config) -> Router<ServiceState> {
    let ingest = Router::new()
        .route("/metrics", post(ingest::handle_metrics))
        .route("/user", post(ingest::handle_user))
        .route("/message", post(ingest::handle_message))
        .route_layer(DefaultBodyLimit::max(config.max_api_payload_size()));

    Router::new()
        .route("/healthcheck/{kind}", get(health_check::handle))
        .merge(ingest)
}
