//! JSON error types.

/// JSON encoding or decoding failure with source location.
///
/// Carries a short preview of the offending text when one is available, so a
/// malformed backend response can be recognised in the logs.
#[derive(Debug, Clone, derive_more::Display, derive_more::Error)]
#[display("JSON Error: {} at line {} in {}", message, line, file)]
pub struct JsonError {
    /// The underlying error message
    pub message: String,
    /// Leading characters of the text that failed to decode
    pub preview: Option<String>,
    /// Line number where the error occurred
    pub line: u32,
    /// File where the error occurred
    pub file: &'static str,
}

impl JsonError {
    /// Create a new JsonError with the given message at the current location.
    ///
    /// # Examples
    ///
    /// ```
    /// use scriptorium_error::JsonError;
    ///
    /// let err = JsonError::new("expected value at line 1");
    /// assert!(err.message.contains("expected value"));
    /// assert!(err.preview.is_none());
    /// ```
    #[track_caller]
    pub fn new(message: impl Into<String>) -> Self {
        let location = std::panic::Location::caller();
        Self {
            message: message.into(),
            preview: None,
            line: location.line(),
            file: location.file(),
        }
    }

    /// Attach the first 100 characters of the offending text.
    ///
    /// # Examples
    ///
    /// ```
    /// use scriptorium_error::JsonError;
    ///
    /// let err = JsonError::new("trailing comma").with_preview("{\"title\": \"Ash\",}");
    /// assert_eq!(err.preview.as_deref(), Some("{\"title\": \"Ash\",}"));
    /// ```
    pub fn with_preview(mut self, text: &str) -> Self {
        self.preview = Some(text.chars().take(100).collect());
        self
    }
}
