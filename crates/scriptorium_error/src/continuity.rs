//! Continuity store and chapter lifecycle errors.

/// Invariant violations raised by the continuity store and chapter lifecycle.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, derive_more::Display)]
pub enum ContinuityErrorKind {
    /// No character with this name is tracked
    #[display("Unknown character: {}", _0)]
    UnknownCharacter(String),
    /// No plot thread with this name is tracked
    #[display("Unknown plot thread: {}", _0)]
    UnknownThread(String),
    /// The thread is resolved or abandoned and accepts no more events
    #[display("Plot thread '{}' is closed", _0)]
    ThreadClosed(String),
    /// A thread dependency has not been activated yet
    #[display("Plot thread '{}' depends on '{}', which is not active", thread, dependency)]
    DependencyNotMet {
        /// Thread being advanced
        thread: String,
        /// Missing dependency
        dependency: String,
    },
    /// Resolution was requested before every condition was met
    #[display("Plot thread '{}' has unmet resolution conditions: {}", thread, missing.join(", "))]
    UnresolvedConditions {
        /// Thread being resolved
        thread: String,
        /// Conditions not yet in the completed-event set
        missing: Vec<String>,
    },
    /// Timeline entries are write-once per chapter
    #[display("Timeline entry for chapter {} already exists", _0)]
    TimelineEntryExists(usize),
    /// Chapters must be appended with contiguous numbers
    #[display("Chapter {} is out of order (expected {})", found, expected)]
    ChapterOutOfOrder {
        /// Next contiguous number
        expected: usize,
        /// Number that was offered
        found: usize,
    },
    /// Only finalized chapters may join the manuscript
    #[display("Chapter {} is not finalized", _0)]
    ChapterNotFinalized(usize),
    /// Finalized chapters are immutable
    #[display("Chapter {} is finalized and cannot change", _0)]
    ChapterFinalized(usize),
    /// The chapter lifecycle does not allow this step
    #[display("Chapter {} cannot move from {} to {}", chapter, from, to)]
    InvalidTransition {
        /// Chapter number
        chapter: usize,
        /// Current state
        from: String,
        /// Requested state
        to: String,
    },
}

/// Continuity error with location tracking.
///
/// # Examples
///
/// ```
/// use scriptorium_error::{ContinuityError, ContinuityErrorKind};
///
/// let err = ContinuityError::new(ContinuityErrorKind::UnresolvedConditions {
///     thread: "The stolen map".into(),
///     missing: vec!["map recovered".into()],
/// });
/// assert!(format!("{}", err).contains("map recovered"));
/// ```
#[derive(Debug, Clone, derive_more::Display, derive_more::Error)]
#[display("Continuity Error: {} at line {} in {}", kind, line, file)]
pub struct ContinuityError {
    /// The specific error condition
    pub kind: ContinuityErrorKind,
    /// Line number where the error occurred
    pub line: u32,
    /// Source file where the error occurred
    pub file: &'static str,
}

impl ContinuityError {
    /// Create a new ContinuityError with automatic location tracking.
    #[track_caller]
    pub fn new(kind: ContinuityErrorKind) -> Self {
        let location = std::panic::Location::caller();
        Self {
            kind,
            line: location.line(),
            file: location.file(),
        }
    }
}
