//! Planning failures.

/// Conditions under which a book cannot be planned.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, derive_more::Display)]
pub enum PlanningErrorKind {
    /// The requested chapter count is unusable
    #[display("Invalid chapter count: {}", _0)]
    InvalidChapterCount(usize),
    /// The premise is empty or whitespace
    #[display("Premise must not be empty")]
    EmptyPremise,
    /// The outline has fewer distinct chapters than requested
    #[display("Outline has {} distinct chapters, {} were requested", found, expected)]
    TooFewChapters {
        /// Chapters requested
        expected: usize,
        /// Distinct chapters found in the outline
        found: usize,
    },
}

/// Planning error with location tracking.
///
/// Planning failures are fatal to a run: missing chapters are never synthesised.
///
/// # Examples
///
/// ```
/// use scriptorium_error::{PlanningError, PlanningErrorKind};
///
/// let err = PlanningError::new(PlanningErrorKind::TooFewChapters { expected: 5, found: 4 });
/// assert!(format!("{}", err).contains("4 distinct chapters"));
/// ```
#[derive(Debug, Clone, derive_more::Display, derive_more::Error)]
#[display("Planning Error: {} at line {} in {}", kind, line, file)]
pub struct PlanningError {
    /// The specific error condition
    pub kind: PlanningErrorKind,
    /// Line number where the error occurred
    pub line: u32,
    /// Source file where the error occurred
    pub file: &'static str,
}

impl PlanningError {
    /// Create a new PlanningError with automatic location tracking.
    #[track_caller]
    pub fn new(kind: PlanningErrorKind) -> Self {
        let location = std::panic::Location::caller();
        Self {
            kind,
            line: location.line(),
            file: location.file(),
        }
    }
}
