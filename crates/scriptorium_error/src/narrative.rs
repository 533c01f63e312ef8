//! Orchestration errors for book runs.

/// Conditions that stop a book run.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, derive_more::Display)]
pub enum NarrativeErrorKind {
    /// The run was cancelled by the user
    #[display("Run cancelled during chapter {}", _0)]
    Cancelled(usize),
    /// The whole per-chapter pipeline exceeded its deadline
    #[display("Chapter {} exceeded its {} second deadline", chapter, seconds)]
    ChapterDeadline {
        /// Plan entry being generated
        chapter: usize,
        /// Configured deadline
        seconds: u64,
    },
    /// A chapter failed and the failure policy is to abort
    #[display("Chapter {} aborted the run: {}", chapter, reason)]
    ChapterAborted {
        /// Plan entry being generated
        chapter: usize,
        /// Underlying failure
        reason: String,
    },
}

/// Error type for book orchestration.
///
/// # Examples
///
/// ```
/// use scriptorium_error::{NarrativeError, NarrativeErrorKind};
///
/// let err = NarrativeError::new(NarrativeErrorKind::Cancelled(3));
/// assert!(format!("{}", err).contains("chapter 3"));
/// ```
#[derive(Debug, Clone, derive_more::Display, derive_more::Error)]
#[display("Narrative Error: {} at line {} in {}", kind, line, file)]
pub struct NarrativeError {
    /// The specific error condition
    pub kind: NarrativeErrorKind,
    /// Line number where the error occurred
    pub line: u32,
    /// Source file where the error occurred
    pub file: &'static str,
}

impl NarrativeError {
    /// Create a new NarrativeError with automatic location tracking.
    #[track_caller]
    pub fn new(kind: NarrativeErrorKind) -> Self {
        let location = std::panic::Location::caller();
        Self {
            kind,
            line: location.line(),
            file: location.file(),
        }
    }
}
