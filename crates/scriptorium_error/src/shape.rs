//! Structured-record shape failures.

/// Ways a backend response can fail to match a required record shape.
#[derive(Debug, Clone, PartialEq, Eq, Hash, derive_more::Display)]
pub enum ShapeErrorKind {
    /// No JSON object or array could be located in the text
    #[display("No structured data found in response ({} chars)", _0)]
    NoStructuredData(usize),
    /// JSON was found but did not decode
    #[display("Structured data did not decode: {}", _0)]
    Decode(String),
    /// A value has the wrong JSON type for its template slot
    #[display("Type mismatch at '{}': expected {}, found {}", path, expected, found)]
    TypeMismatch {
        /// Dotted path to the offending value
        path: String,
        /// JSON type the template requires
        expected: String,
        /// JSON type that was present
        found: String,
    },
}

/// Shape validation failure with location tracking.
///
/// # Examples
///
/// ```
/// use scriptorium_error::{ShapeError, ShapeErrorKind};
///
/// let err = ShapeError::new(ShapeErrorKind::TypeMismatch {
///     path: "chapters[0].title".into(),
///     expected: "string".into(),
///     found: "number".into(),
/// });
/// assert!(format!("{}", err).contains("chapters[0].title"));
/// ```
#[derive(Debug, Clone, derive_more::Display, derive_more::Error)]
#[display("Shape Error: {} at line {} in {}", kind, line, file)]
pub struct ShapeError {
    /// The specific failure
    pub kind: ShapeErrorKind,
    /// Line number where the error occurred
    pub line: u32,
    /// Source file where the error occurred
    pub file: &'static str,
}

impl ShapeError {
    /// Create a new ShapeError with automatic location tracking.
    #[track_caller]
    pub fn new(kind: ShapeErrorKind) -> Self {
        let location = std::panic::Location::caller();
        Self {
            kind,
            line: location.line(),
            file: location.file(),
        }
    }
}
