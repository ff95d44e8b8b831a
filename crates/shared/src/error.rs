use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    Validation,
    Unauthorized,
    Forbidden,
    NotFound,
    AlreadyExists,
    RateLimited,
    Internal,
    Unavailable,
}

impl ErrorCode {
    /// HTTP status carried on the response line and, for coded payloads,
    /// inside the envelope.
    pub const fn status(self) -> u16 {
        match self {
            ErrorCode::Validation => 400,
            ErrorCode::Unauthorized => 401,
            ErrorCode::Forbidden => 403,
            ErrorCode::NotFound => 404,
            ErrorCode::AlreadyExists => 406,
            ErrorCode::RateLimited => 429,
            ErrorCode::Internal => 500,
            ErrorCode::Unavailable => 503,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub status: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// What sits under the envelope's `error` key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ErrorPayload {
    /// `{ "status": 404, "message": "..." }`
    Coded(ErrorBody),
    /// A bare message with no nested status.
    Text(String),
}

impl fmt::Display for ErrorPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorPayload::Coded(body) => write!(
                f,
                "{} {}",
                body.status,
                body.message.as_deref().unwrap_or("<no message>")
            ),
            ErrorPayload::Text(message) => f.write_str(message),
        }
    }
}

/// Failure envelope: `{ "error": { "status": 404, "message": "..." } }`, or
/// `{ "error": "..." }` for failures the client must not treat as coded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[error("{error}")]
pub struct ApiError {
    #[serde(skip)]
    http_status: u16,
    pub error: ErrorPayload,
}

impl ApiError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            http_status: code.status(),
            error: ErrorPayload::Coded(ErrorBody {
                status: code.status(),
                message: Some(message.into()),
            }),
        }
    }

    pub fn bare(code: ErrorCode) -> Self {
        Self {
            http_status: code.status(),
            error: ErrorPayload::Coded(ErrorBody {
                status: code.status(),
                message: None,
            }),
        }
    }

    /// Message-only envelope; the status travels on the response line alone.
    pub fn text(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            http_status: code.status(),
            error: ErrorPayload::Text(message.into()),
        }
    }

    pub fn status(&self) -> u16 {
        match &self.error {
            ErrorPayload::Coded(body) => body.status,
            ErrorPayload::Text(_) => self.http_status,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_nests_status_and_message_under_error() {
        let value = serde_json::to_value(ApiError::new(ErrorCode::NotFound, "Product not found"))
            .expect("serialize");
        assert_eq!(
            value,
            serde_json::json!({ "error": { "status": 404, "message": "Product not found" } })
        );
    }

    #[test]
    fn bare_envelope_omits_message() {
        let value = serde_json::to_value(ApiError::bare(ErrorCode::Forbidden)).expect("serialize");
        assert_eq!(value, serde_json::json!({ "error": { "status": 403 } }));
    }

    #[test]
    fn text_envelope_keeps_status_off_the_body() {
        let err = ApiError::text(ErrorCode::Unauthorized, "Invalid credentials!");
        assert_eq!(err.status(), 401);
        assert_eq!(err.to_string(), "Invalid credentials!");
        let value = serde_json::to_value(&err).expect("serialize");
        assert_eq!(value, serde_json::json!({ "error": "Invalid credentials!" }));
    }

    #[test]
    fn rate_limited_maps_to_too_many_requests() {
        assert_eq!(ErrorCode::RateLimited.status(), 429);
    }
}
