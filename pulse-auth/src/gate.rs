use serde_json::Value;

use crate::{InboundSecret, canonicalize, verify_bytes};

/// Reasons for rejecting an inbound request.
///
/// The messages are safe to return to clients and never contain parser details.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, thiserror::Error)]
pub enum AuthRejected {
    /// The request did not carry a `Token` header, or it was empty.
    #[error("missing token")]
    MissingToken,
    /// The request body is not a JSON object.
    #[error("malformed body")]
    MalformedBody,
    /// The token does not match the request body.
    #[error("invalid token")]
    InvalidToken,
}

impl AuthRejected {
    /// The HTTP status code for this rejection.
    pub fn status_code(self) -> u16 {
        match self {
            Self::MissingToken | Self::InvalidToken => 401,
            Self::MalformedBody => 400,
        }
    }

    /// A machine-readable identifier for this rejection.
    pub fn reason(self) -> &'static str {
        match self {
            Self::MissingToken => "missing_token",
            Self::MalformedBody => "malformed_body",
            Self::InvalidToken => "invalid_token",
        }
    }
}

/// The outcome of [`AuthGate::authorize`].
#[derive(Debug, PartialEq)]
pub enum Verdict {
    /// The token matches. Contains the parsed request body.
    Authorized(Value),
    /// The request must not be processed further.
    Rejected(AuthRejected),
}

impl Verdict {
    /// Converts the verdict into a result.
    pub fn into_result(self) -> Result<Value, AuthRejected> {
        match self {
            Self::Authorized(value) => Ok(value),
            Self::Rejected(rejection) => Err(rejection),
        }
    }
}

/// Authorizes inbound requests signed with the [`InboundSecret`].
///
/// The gate is immutable and can be shared across threads. Each call to
/// [`authorize`](Self::authorize) performs exactly one verification.
#[derive(Clone, Debug)]
pub struct AuthGate {
    secret: InboundSecret,
}

impl AuthGate {
    /// Creates a gate for the given secret.
    pub fn new(secret: InboundSecret) -> Self {
        Self { secret }
    }

    /// Checks a request body against the token presented in its headers.
    ///
    /// The checks run in order: token presence, body structure, then the token itself.
    pub fn authorize(&self, body: &[u8], token: Option<&str>) -> Verdict {
        let Some(token) = token.map(str::trim).filter(|t| !t.is_empty()) else {
            return Verdict::Rejected(AuthRejected::MissingToken);
        };

        let value = match serde_json::from_slice::<Value>(body) {
            Ok(value @ Value::Object(_)) => value,
            _ => return Verdict::Rejected(AuthRejected::MalformedBody),
        };

        if !verify_bytes(&self.secret, &canonicalize(&value), token) {
            return Verdict::Rejected(AuthRejected::InvalidToken);
        }

        Verdict::Authorized(value)
    }
}
