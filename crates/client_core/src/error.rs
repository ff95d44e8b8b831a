use serde_json::Value;
use thiserror::Error;

use crate::{classifier::ErrorEnvelope, dispatcher::HttpMethod};

/// Failure of one dispatched call, handed back to the caller unchanged after
/// the client has reacted to it.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("invalid endpoint '{endpoint}': {source}")]
    InvalidEndpoint {
        endpoint: String,
        source: url::ParseError,
    },
    #[error("{method} {endpoint} failed before a response arrived: {source}")]
    Transport {
        endpoint: String,
        method: HttpMethod,
        source: reqwest::Error,
    },
    #[error("{method} {endpoint} responded with HTTP {status}")]
    Status {
        endpoint: String,
        method: HttpMethod,
        status: u16,
        body: Value,
    },
    #[error("failed to decode response from {endpoint}: {source}")]
    Decode {
        endpoint: String,
        source: serde_json::Error,
    },
}

impl DispatchError {
    pub fn endpoint(&self) -> &str {
        match self {
            DispatchError::InvalidEndpoint { endpoint, .. }
            | DispatchError::Transport { endpoint, .. }
            | DispatchError::Status { endpoint, .. }
            | DispatchError::Decode { endpoint, .. } => endpoint,
        }
    }

    /// HTTP status of the failed response, if one arrived.
    pub fn status(&self) -> Option<u16> {
        match self {
            DispatchError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Envelope seen by the classifier. `Decode` happens after the call
    /// already succeeded, so it has none.
    pub fn envelope(&self) -> Option<ErrorEnvelope> {
        match self {
            DispatchError::InvalidEndpoint { .. } | DispatchError::Transport { .. } => {
                Some(ErrorEnvelope::no_response())
            }
            DispatchError::Status { body, .. } => Some(ErrorEnvelope::from_response(body)),
            DispatchError::Decode { .. } => None,
        }
    }
}
