use std::error::Error;
use std::fmt;

use axum::Json;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};

/// An error response from an api.
#[derive(Serialize, Deserialize, Default, Debug, PartialEq)]
pub struct ApiErrorResponse {
    #[serde(default)]
    detail: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    causes: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    reason: Option<String>,
}

impl ApiErrorResponse {
    /// Creates an error response with a detail message
    pub fn with_detail<S: AsRef<str>>(s: S) -> Self {
        Self {
            detail: Some(s.as_ref().to_owned()),
            causes: Vec::new(),
            reason: None,
        }
    }

    /// Creates an error response from an error and its chain of causes.
    pub fn from_error<E: Error + 'static>(error: &E) -> Self {
        let mut messages = vec![];

        let mut current: Option<&dyn Error> = Some(error);
        while let Some(error) = current {
            let msg = error.to_string();
            if !messages.contains(&msg) {
                messages.push(msg);
            }
            current = error.source();
        }

        Self {
            detail: Some(messages.remove(0)),
            causes: messages,
            reason: None,
        }
    }

    /// Attaches a machine-readable reason.
    pub fn with_reason(mut self, reason: &str) -> Self {
        self.reason = Some(reason.to_owned());
        self
    }

    /// Returns the machine-readable reason, if any.
    pub fn reason(&self) -> Option<&str> {
        self.reason.as_deref()
    }
}

impl fmt::Display for ApiErrorResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(ref detail) = self.detail {
            write!(f, "{detail}")
        } else {
            write!(f, "no error details")
        }
    }
}

impl IntoResponse for ApiErrorResponse {
    fn into_response(self) -> Response {
        Json(self).into_response()
    }
}
