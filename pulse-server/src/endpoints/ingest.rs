//! Endpoints accepting signed documents from clients.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use serde_json::Value;

use crate::extractors::SignedJson;
use crate::service::ServiceState;
use crate::services::store::{Record, RecordKind, StoreError};
use crate::utils::{ApiErrorResponse, DateFeatures};

#[derive(Debug, Serialize)]
pub struct Saved {
    message: &'static str,
}

#[derive(Debug, thiserror::Error)]
#[error("could not store record")]
pub struct BadStoreRequest(#[from] StoreError);

impl IntoResponse for BadStoreRequest {
    fn into_response(self) -> Response {
        pulse_log::error!("{}", pulse_log::LogError(&self));
        let body = ApiErrorResponse::from_error(&self);
        (StatusCode::INTERNAL_SERVER_ERROR, body).into_response()
    }
}

fn persist(state: &ServiceState, record: Record) -> Result<Json<Saved>, BadStoreRequest> {
    state.store().persist(record)?;
    Ok(Json(Saved {
        message: "Data saved!",
    }))
}

pub async fn handle_metrics(
    state: ServiceState,
    SignedJson(payload): SignedJson,
) -> Result<Json<Saved>, BadStoreRequest> {
    persist(&state, Record::new(RecordKind::Metrics, payload))
}

pub async fn handle_user(
    state: ServiceState,
    SignedJson(payload): SignedJson,
) -> Result<Json<Saved>, BadStoreRequest> {
    persist(&state, Record::new(RecordKind::User, payload))
}

pub async fn handle_message(
    state: ServiceState,
    SignedJson(payload): SignedJson,
) -> Result<Json<Saved>, BadStoreRequest> {
    let date = payload
        .get("time")
        .and_then(Value::as_f64)
        .and_then(DateFeatures::from_unix);

    let mut record = Record::new(RecordKind::Message, payload);
    record.date = date;
    persist(&state, record)
}
