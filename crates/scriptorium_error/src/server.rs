//! Error types for backend adapters (local inference servers).

use crate::RetryableError;

/// Error kinds for backend adapter operations.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, derive_more::Display)]
pub enum ServerErrorKind {
    /// Transport-level failure (connection refused, reset, DNS)
    #[display("HTTP request failed: {}", _0)]
    Http(String),

    /// The server answered with a non-success status
    #[display("Server returned {}: {}", status_code, message)]
    Status {
        /// HTTP status code
        status_code: u16,
        /// Response body or reason phrase
        message: String,
    },

    /// The server answered but the payload was not usable
    #[display("API error: {}", _0)]
    Api(String),

    /// Response body could not be decoded
    #[display("Failed to deserialize response: {}", _0)]
    Deserialization(String),

    /// Streaming body broke off or carried garbage
    #[display("Stream error: {}", _0)]
    Stream(String),

    /// Adapter misconfiguration (missing model, bad URL)
    #[display("Configuration error: {}", _0)]
    Configuration(String),
}

impl ServerErrorKind {
    /// Whether another attempt against the same backend could succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            ServerErrorKind::Status { status_code, .. } => {
                matches!(*status_code, 408 | 429 | 500..=599)
            }
            ServerErrorKind::Configuration(_) => false,
            ServerErrorKind::Http(_)
            | ServerErrorKind::Api(_)
            | ServerErrorKind::Deserialization(_)
            | ServerErrorKind::Stream(_) => true,
        }
    }
}

/// Backend adapter error with location tracking.
///
/// # Examples
///
/// ```
/// use scriptorium_error::{RetryableError, ServerError, ServerErrorKind};
///
/// let err = ServerError::new(ServerErrorKind::Status {
///     status_code: 503,
///     message: "model is loading".into(),
/// });
/// assert!(err.is_retryable());
///
/// let err = ServerError::new(ServerErrorKind::Configuration("model not set".into()));
/// assert!(!err.is_retryable());
/// ```
#[derive(Debug, Clone, derive_more::Display, derive_more::Error)]
#[display("Server Error: {} at line {} in {}", kind, line, file)]
pub struct ServerError {
    /// The error kind
    pub kind: ServerErrorKind,
    /// Line number where error occurred
    pub line: u32,
    /// File where error occurred
    pub file: &'static str,
}

impl ServerError {
    /// Create a new ServerError with automatic location tracking.
    #[track_caller]
    pub fn new(kind: ServerErrorKind) -> Self {
        let location = std::panic::Location::caller();
        Self {
            kind,
            line: location.line(),
            file: location.file(),
        }
    }
}

impl RetryableError for ServerError {
    fn is_retryable(&self) -> bool {
        self.kind.is_retryable()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status(status_code: u16) -> ServerErrorKind {
        ServerErrorKind::Status {
            status_code,
            message: String::new(),
        }
    }

    #[test]
    fn test_retryable_statuses() {
        for code in [408, 429, 500, 501, 507, 599] {
            assert!(status(code).is_retryable(), "{code} should be retried");
        }
        for code in [400, 401, 404, 422] {
            assert!(!status(code).is_retryable(), "{code} should not be retried");
        }
    }
}
