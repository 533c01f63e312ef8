//! Generation failures and retry classification.

/// Why a generation request did not produce usable text.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, derive_more::Display)]
pub enum GenerationErrorKind {
    /// The backend call itself failed
    #[display("Backend call failed: {}", _0)]
    Backend(String),
    /// The response was shorter than the configured word floor
    #[display("Response too short: {} words (minimum {})", words, minimum)]
    TooShort {
        /// Words in the rejected response
        words: usize,
        /// Configured minimum
        minimum: usize,
    },
    /// A single attempt exceeded the per-call timeout
    #[display("Backend call timed out after {} seconds", _0)]
    Timeout(u64),
    /// The backend answered with no text at all
    #[display("Backend returned an empty response")]
    EmptyResponse,
    /// Every attempt failed
    #[display("Generation failed after {} attempts: {}", attempts, last)]
    Exhausted {
        /// Attempts made
        attempts: usize,
        /// Description of the final failure
        last: String,
    },
    /// The caller cancelled while the request was in flight
    #[display("Generation cancelled")]
    Cancelled,
}

impl GenerationErrorKind {
    /// Check if this failure should trigger another attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            GenerationErrorKind::TooShort { .. }
                | GenerationErrorKind::Timeout(_)
                | GenerationErrorKind::EmptyResponse
        )
    }
}

/// Typed generation failure with source location tracking.
///
/// Short or empty responses are expected, retried conditions; they only
/// surface to callers wrapped in [`GenerationErrorKind::Exhausted`].
///
/// # Examples
///
/// ```
/// use scriptorium_error::{GenerationError, GenerationErrorKind, RetryableError};
///
/// let err = GenerationError::new(GenerationErrorKind::TooShort { words: 12, minimum: 50 });
/// assert!(err.is_retryable());
/// assert!(format!("{}", err).contains("12 words"));
/// ```
#[derive(Debug, Clone, derive_more::Display, derive_more::Error)]
#[display("Generation Error: {} at line {} in {}", kind, line, file)]
pub struct GenerationError {
    /// The kind of failure
    pub kind: GenerationErrorKind,
    /// Line number where error was created
    pub line: u32,
    /// File where error was created
    pub file: &'static str,
}

impl GenerationError {
    /// Create a new GenerationError with automatic location tracking.
    #[track_caller]
    pub fn new(kind: GenerationErrorKind) -> Self {
        let location = std::panic::Location::caller();
        Self {
            kind,
            line: location.line(),
            file: location.file(),
        }
    }
}

/// Trait for errors that support retry logic.
///
/// Transient conditions (timeouts, overloaded servers, truncated or short
/// responses) return true. Permanent conditions (bad configuration, rejected
/// credentials) return false so the retry loop stops immediately.
pub trait RetryableError {
    /// Returns true if this error should trigger a retry.
    fn is_retryable(&self) -> bool;
}

impl RetryableError for GenerationError {
    fn is_retryable(&self) -> bool {
        self.kind.is_retryable()
    }
}
