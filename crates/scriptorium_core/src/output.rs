//! Output types from backend responses.

use serde::{Deserialize, Serialize};

/// One piece of backend output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum Output {
    /// Plain text output.
    Text(String),

    /// Structured JSON output, produced by backends running in a JSON mode.
    Json(serde_json::Value),
}

impl Output {
    /// Render this output as text.
    ///
    /// # Examples
    ///
    /// ```
    /// use scriptorium_core::Output;
    /// use serde_json::json;
    ///
    /// assert_eq!(Output::Text("Hello".into()).as_text(), "Hello");
    /// assert_eq!(Output::Json(json!({"a": 1})).as_text(), "{\"a\":1}");
    /// ```
    pub fn as_text(&self) -> String {
        match self {
            Output::Text(text) => text.clone(),
            Output::Json(value) => value.to_string(),
        }
    }
}
