//! A simple health check endpoint for the service.

use axum::Json;
use axum::extract::Path;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde::{Deserialize, Serialize};

use crate::service::ServiceState;

/// The kind of health check requested.
#[derive(Clone, Copy, Debug, Deserialize)]
pub enum IsHealthy {
    /// The process is up and serving requests.
    #[serde(rename = "live")]
    Liveness,
    /// The service is registered and ready for traffic.
    #[serde(rename = "ready")]
    Readiness,
}

#[derive(Serialize)]
struct Status {
    is_healthy: bool,
}

pub async fn handle(state: ServiceState, Path(kind): Path<IsHealthy>) -> impl IntoResponse {
    let is_healthy = match kind {
        IsHealthy::Liveness => true,
        IsHealthy::Readiness => state.registration_state().is_registered(),
    };

    let status = match is_healthy {
        true => StatusCode::OK,
        false => StatusCode::SERVICE_UNAVAILABLE,
    };

    (status, Json(Status { is_healthy }))
}
