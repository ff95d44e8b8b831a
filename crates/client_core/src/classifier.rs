//! Maps a failed call to the action the client takes on its behalf.
//!
//! [`classify`] is pure: it inspects an [`ErrorEnvelope`] and returns an
//! [`Action`]. Executing the action (notifying, tearing the session down) is
//! the job of [`crate::reporter::FailureReporter`].

use serde::Serialize;
use serde_json::Value;

use crate::events::NotificationEvent;

pub const SESSION_EXPIRED_STATUS: u16 = 401;
pub const SESSION_EXPIRED_MESSAGE: &str = "Your session has expired";
pub const NO_INTERNET_MESSAGE: &str = "No Internet Connection";
pub const UNKNOWN_ERROR_MESSAGE: &str = "Unknown Error";

/// Normalized shape of a failed call.
///
/// `has_response == false` means the transport gave up before any response
/// arrived (connection refused, DNS, TLS). `raw` is the nested `error` payload
/// as sent, or the whole body when there is none.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ErrorEnvelope {
    pub has_response: bool,
    pub status: Option<u16>,
    pub message: Option<String>,
    pub raw: Option<Value>,
}

impl ErrorEnvelope {
    pub fn no_response() -> Self {
        Self::default()
    }

    /// Reads the `error` member of a failed response body. An object carries
    /// `status` and `message`; a plain string is the message itself. The
    /// status comes only from that object, never from the HTTP status line.
    pub fn from_response(body: &Value) -> Self {
        let nested = body.get("error");
        let (status, message) = match nested {
            Some(Value::Object(error)) => (
                error
                    .get("status")
                    .and_then(Value::as_u64)
                    .and_then(|status| u16::try_from(status).ok()),
                error
                    .get("message")
                    .and_then(Value::as_str)
                    .map(str::to_owned),
            ),
            Some(Value::String(message)) => (None, Some(message.clone())),
            _ => (None, None),
        };

        Self {
            has_response: true,
            status,
            message,
            raw: Some(nested.unwrap_or(body).clone()),
        }
    }
}

/// Statuses with a dedicated default message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum KnownStatus {
    BadRequest = 400,
    Forbidden = 403,
    NotFound = 404,
    MethodNotAllowed = 405,
    NotAcceptable = 406,
    PayloadTooLarge = 413,
    UnprocessableEntity = 422,
    RawPayload = 430,
    InvalidData = 444,
    InternalServerError = 500,
    ServiceUnavailable = 503,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DefaultMessage {
    Fixed(&'static str),
    /// Echo the raw response payload back to the user.
    RawPayload,
}

pub const STATUS_MESSAGES: [(KnownStatus, DefaultMessage); 11] = [
    (
        KnownStatus::Forbidden,
        DefaultMessage::Fixed("This Role is restricted to access to this request."),
    ),
    (
        KnownStatus::InternalServerError,
        DefaultMessage::Fixed("Internal Server Error"),
    ),
    (
        KnownStatus::ServiceUnavailable,
        DefaultMessage::Fixed("Service Unavailable"),
    ),
    (
        KnownStatus::UnprocessableEntity,
        DefaultMessage::Fixed("Cannot Process Please Try Again"),
    ),
    (
        KnownStatus::MethodNotAllowed,
        DefaultMessage::Fixed("Not Found"),
    ),
    (
        KnownStatus::NotAcceptable,
        DefaultMessage::Fixed("Already Exist"),
    ),
    (KnownStatus::NotFound, DefaultMessage::Fixed("API Not Found")),
    (KnownStatus::InvalidData, DefaultMessage::Fixed("Invalid Data")),
    (KnownStatus::BadRequest, DefaultMessage::Fixed("Bad Request")),
    (KnownStatus::RawPayload, DefaultMessage::RawPayload),
    (
        KnownStatus::PayloadTooLarge,
        DefaultMessage::Fixed("Payload Too Large"),
    ),
];

impl KnownStatus {
    pub const fn code(self) -> u16 {
        self as u16
    }

    pub fn from_code(code: u16) -> Option<Self> {
        STATUS_MESSAGES
            .iter()
            .map(|(status, _)| *status)
            .find(|status| status.code() == code)
    }

    pub fn default_message(self) -> DefaultMessage {
        STATUS_MESSAGES
            .iter()
            .find(|(status, _)| *status == self)
            .map(|(_, message)| *message)
            .unwrap_or(DefaultMessage::Fixed(UNKNOWN_ERROR_MESSAGE))
    }
}

/// Error taxonomy used for logging and metrics-style grouping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    AuthExpired,
    Coded(KnownStatus),
    Unrecognized(Option<u16>),
    NetworkUnreachable,
}

pub fn error_class(envelope: &ErrorEnvelope) -> ErrorClass {
    if !envelope.has_response {
        return ErrorClass::NetworkUnreachable;
    }
    match envelope.status {
        Some(SESSION_EXPIRED_STATUS) => ErrorClass::AuthExpired,
        status => status
            .and_then(KnownStatus::from_code)
            .map(ErrorClass::Coded)
            .unwrap_or(ErrorClass::Unrecognized(status)),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    SessionExpired,
    Coded {
        status: Option<u16>,
        message: String,
    },
    NetworkUnreachable,
}

impl Action {
    /// The single notification shown for this failure. Session expiry is
    /// reported with `success` severity.
    pub fn notification(&self) -> NotificationEvent {
        match self {
            Action::SessionExpired => NotificationEvent::success(SESSION_EXPIRED_MESSAGE),
            Action::Coded { message, .. } => NotificationEvent::error(message.clone()),
            Action::NetworkUnreachable => NotificationEvent::error(NO_INTERNET_MESSAGE),
        }
    }

    pub fn invalidates_session(&self) -> bool {
        matches!(self, Action::SessionExpired)
    }
}

pub fn classify(envelope: &ErrorEnvelope) -> Action {
    if !envelope.has_response {
        return Action::NetworkUnreachable;
    }
    if envelope.status == Some(SESSION_EXPIRED_STATUS) {
        return Action::SessionExpired;
    }

    let message = match &envelope.message {
        Some(message) => message.clone(),
        None => default_message_for(envelope.status, envelope.raw.as_ref()),
    };
    Action::Coded {
        status: envelope.status,
        message,
    }
}

fn default_message_for(status: Option<u16>, raw: Option<&Value>) -> String {
    match status.and_then(KnownStatus::from_code).map(KnownStatus::default_message) {
        Some(DefaultMessage::Fixed(text)) => text.to_string(),
        Some(DefaultMessage::RawPayload) => raw
            .map(Value::to_string)
            .unwrap_or_else(|| UNKNOWN_ERROR_MESSAGE.to_string()),
        None => UNKNOWN_ERROR_MESSAGE.to_string(),
    }
}

#[cfg(test)]
#[path = "tests/classifier_tests.rs"]
mod tests;
