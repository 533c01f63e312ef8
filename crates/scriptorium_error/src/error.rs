//! Top-level error wrapper types.

use crate::{
    BuilderError, ConfigError, ContinuityError, GenerationError, JsonError, NarrativeError,
    PlanningError, RetryableError, ServerError, ShapeError,
};

/// The union of every error family in the workspace.
///
/// # Examples
///
/// ```
/// use scriptorium_error::{ScriptoriumError, JsonError};
///
/// let json_err = JsonError::new("unexpected end of input");
/// let err: ScriptoriumError = json_err.into();
/// assert!(format!("{}", err).contains("JSON Error"));
/// ```
#[derive(Debug, derive_more::From, derive_more::Display, derive_more::Error)]
pub enum ScriptoriumErrorKind {
    /// JSON serialization/deserialization error
    #[from(JsonError)]
    Json(JsonError),
    /// Configuration error
    #[from(ConfigError)]
    Config(ConfigError),
    /// Builder error
    #[from(BuilderError)]
    Builder(BuilderError),
    /// Backend adapter error
    #[from(ServerError)]
    Server(ServerError),
    /// Generation failure (retries exhausted, short or empty response)
    #[from(GenerationError)]
    Generation(GenerationError),
    /// Structured response never matched its template
    #[from(ShapeError)]
    Shape(ShapeError),
    /// Book planning failure
    #[from(PlanningError)]
    Planning(PlanningError),
    /// Continuity invariant violation
    #[from(ContinuityError)]
    Continuity(ContinuityError),
    /// Orchestration error
    #[from(NarrativeError)]
    Narrative(NarrativeError),
}

/// Scriptorium error with kind discrimination.
///
/// # Examples
///
/// ```
/// use scriptorium_error::{ConfigError, ScriptoriumErrorKind, ScriptoriumResult};
///
/// fn might_fail() -> ScriptoriumResult<()> {
///     Err(ConfigError::new("Missing field"))?
/// }
///
/// let err = might_fail().unwrap_err();
/// assert!(matches!(err.kind(), ScriptoriumErrorKind::Config(_)));
/// ```
#[derive(Debug, derive_more::Display, derive_more::Error)]
#[display("Scriptorium Error: {}", _0)]
pub struct ScriptoriumError(Box<ScriptoriumErrorKind>);

impl ScriptoriumError {
    /// Create a new error from a kind.
    pub fn new(kind: ScriptoriumErrorKind) -> Self {
        Self(Box::new(kind))
    }

    /// Get the error kind.
    pub fn kind(&self) -> &ScriptoriumErrorKind {
        &self.0
    }

    /// True when this is a backend failure: a generation failure or an adapter error.
    ///
    /// These are the failures a book run may skip past instead of aborting.
    pub fn is_backend_failure(&self) -> bool {
        matches!(
            self.kind(),
            ScriptoriumErrorKind::Generation(_) | ScriptoriumErrorKind::Server(_)
        )
    }
}

impl RetryableError for ScriptoriumError {
    fn is_retryable(&self) -> bool {
        match self.kind() {
            ScriptoriumErrorKind::Server(e) => e.is_retryable(),
            ScriptoriumErrorKind::Generation(e) => e.is_retryable(),
            _ => false,
        }
    }
}

// Generic From implementation for any type that converts to ScriptoriumErrorKind
impl<T> From<T> for ScriptoriumError
where
    T: Into<ScriptoriumErrorKind>,
{
    fn from(err: T) -> Self {
        Self::new(err.into())
    }
}

/// Result type for Scriptorium operations.
///
/// # Examples
///
/// ```
/// use scriptorium_error::{ScriptoriumResult, ServerError, ServerErrorKind};
///
/// fn connect() -> ScriptoriumResult<String> {
///     Err(ServerError::new(ServerErrorKind::Http("connection refused".into())))?
/// }
/// assert!(connect().unwrap_err().is_backend_failure());
/// ```
pub type ScriptoriumResult<T> = std::result::Result<T, ScriptoriumError>;
