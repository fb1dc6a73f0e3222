use axum::extract::rejection::BytesRejection;
use axum::extract::{FromRequest, Request};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use pulse_auth::{AuthRejected, Verdict};
use serde_json::Value;

use crate::constants;
use crate::service::ServiceState;
use crate::utils::ApiErrorResponse;

/// A JSON document authorized with the inbound secret.
///
/// The document is only available if the `Token` header matches the body.
#[derive(Debug)]
pub struct SignedJson(pub Value);

#[derive(Debug, thiserror::Error)]
pub enum SignedJsonError {
    #[error(transparent)]
    Auth(#[from] AuthRejected),
    #[error("unable to read body: {0}")]
    Body(#[from] BytesRejection),
}

impl IntoResponse for SignedJsonError {
    fn into_response(self) -> Response {
        match self {
            Self::Auth(rejection) => {
                let status = StatusCode::from_u16(rejection.status_code())
                    .unwrap_or(StatusCode::UNAUTHORIZED);
                let body = ApiErrorResponse::with_detail(rejection.to_string())
                    .with_reason(rejection.reason());
                (status, body).into_response()
            }
            Self::Body(rejection) => rejection.into_response(),
        }
    }
}

impl FromRequest<ServiceState> for SignedJson {
    type Rejection = SignedJsonError;

    async fn from_request(request: Request, state: &ServiceState) -> Result<Self, Self::Rejection> {
        // Non-UTF-8 tokens can never match and are rejected as invalid.
        let token = request
            .headers()
            .get(constants::TOKEN_HEADER)
            .map(|value| String::from_utf8_lossy(value.as_bytes()).into_owned());

        let body = Bytes::from_request(request, state).await?;

        match state.auth_gate().authorize(&body, token.as_deref()) {
            Verdict::Authorized(value) => Ok(Self(value)),
            Verdict::Rejected(rejection) => {
                pulse_log::debug!("rejected request: {rejection}");
                Err(rejection.into())
            }
        }
    }
}
