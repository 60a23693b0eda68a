//! Error types for the Rally connector.
//!
//! # Design
//! One tagged enum covers every way a call can fail, so callers match on the
//! variant instead of probing error types. The service reports its own
//! failures inside a 200 response (`Errors` / `Warnings`), which is why those
//! get variants separate from `Http`, which only means the status code was
//! outside `[200, 300)`.

use thiserror::Error;

/// Result type alias using `RallyError`.
pub type Result<T> = std::result::Result<T, RallyError>;

/// Errors returned by `Connector` operations.
#[derive(Error, Debug)]
pub enum RallyError {
    /// No response was received: connection, DNS, TLS or timeout failure.
    #[error("transport failure: {0}")]
    Transport(String),

    /// The server answered with a status outside `[200, 300)`.
    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    /// The service reported `Errors` in the response envelope.
    #[error("{}", .messages.join("\n"))]
    Service { messages: Vec<String> },

    /// The service reported `Warnings` and the warning policy is `Raise`.
    #[error("{}", .messages.join("\n"))]
    Warning { messages: Vec<String> },

    /// The request fields could not be serialized to JSON.
    #[error("serialization failed: {0}")]
    Serialization(String),

    /// A successful response body was not valid JSON.
    #[error("deserialization failed: {0}")]
    Deserialization(String),

    /// A successful response did not contain the expected key.
    #[error("response is missing `{0}`")]
    MissingField(&'static str),
}

impl RallyError {
    /// HTTP status for `Http` failures.
    pub fn status(&self) -> Option<u16> {
        match self {
            RallyError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Messages reported by the service, if this is a service error or warning.
    pub fn messages(&self) -> &[String] {
        match self {
            RallyError::Service { messages } | RallyError::Warning { messages } => messages,
            _ => &[],
        }
    }

    pub fn is_warning(&self) -> bool {
        matches!(self, RallyError::Warning { .. })
    }
}
