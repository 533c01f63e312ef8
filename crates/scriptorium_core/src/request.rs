//! Request and response types for text generation.

use crate::{Message, Output, Role};
use derive_getters::Getters;
use serde::{Deserialize, Serialize};

/// A backend-neutral generation request.
///
/// Carries the role instructions and prompt as messages, plus the sampling
/// parameters every adapter understands. `stream` asks the adapter to read
/// the response incrementally; adapters always hand back the concatenated text.
///
/// # Examples
///
/// ```
/// use scriptorium_core::GenerateRequest;
///
/// let request = GenerateRequest::builder()
///     .messages(vec![
///         scriptorium_core::Message::system("You are a novelist."),
///         scriptorium_core::Message::user("Write the opening scene."),
///     ])
///     .temperature(Some(0.7))
///     .top_p(Some(0.9))
///     .build()
///     .unwrap();
///
/// assert_eq!(request.messages().len(), 2);
/// assert_eq!(request.system_text(), Some("You are a novelist."));
/// assert!(!request.stream());
/// ```
#[derive(
    Debug, Clone, PartialEq, Serialize, Deserialize, Default, Getters, derive_builder::Builder,
)]
#[builder(setter(into))]
pub struct GenerateRequest {
    /// The messages to send, role instructions first
    messages: Vec<Message>,
    /// Maximum number of tokens to generate
    #[builder(default)]
    max_tokens: Option<u32>,
    /// Sampling temperature
    #[builder(default)]
    temperature: Option<f32>,
    /// Nucleus sampling cutoff
    #[builder(default)]
    top_p: Option<f32>,
    /// Read the response as a stream of chunks
    #[builder(default)]
    #[getter(skip)]
    stream: bool,
    /// Model override; adapters fall back to their configured model
    #[builder(default)]
    model: Option<String>,
}

impl GenerateRequest {
    /// Create a builder for a request.
    pub fn builder() -> GenerateRequestBuilder {
        GenerateRequestBuilder::default()
    }

    /// Whether the response should be streamed.
    pub fn stream(&self) -> bool {
        self.stream
    }

    /// Text of the first system message, if any.
    pub fn system_text(&self) -> Option<&str> {
        self.messages
            .iter()
            .find(|m| *m.role() == Role::System)
            .map(|m| m.content().as_str())
    }

    /// Text of all user messages joined by blank lines.
    ///
    /// # Examples
    ///
    /// ```
    /// use scriptorium_core::{GenerateRequest, Message};
    ///
    /// let request = GenerateRequest::builder()
    ///     .messages(vec![Message::user("one"), Message::user("two")])
    ///     .build()
    ///     .unwrap();
    /// assert_eq!(request.prompt_text(), "one\n\ntwo");
    /// ```
    pub fn prompt_text(&self) -> String {
        self.messages
            .iter()
            .filter(|m| *m.role() == Role::User)
            .map(|m| m.content().as_str())
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

/// The unified response object.
///
/// # Examples
///
/// ```
/// use scriptorium_core::{GenerateResponse, Output};
///
/// let response = GenerateResponse::new(vec![
///     Output::Text("The tide ".into()),
///     Output::Text("turned.".into()),
/// ]);
/// assert_eq!(response.text(), "The tide turned.");
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Getters)]
pub struct GenerateResponse {
    /// The generated outputs from the model
    outputs: Vec<Output>,
}

impl GenerateResponse {
    /// Create a response from outputs.
    pub fn new(outputs: Vec<Output>) -> Self {
        Self { outputs }
    }

    /// Create a response holding a single text output.
    pub fn text_only(text: impl Into<String>) -> Self {
        Self::new(vec![Output::Text(text.into())])
    }

    /// Concatenate every output as text.
    pub fn text(&self) -> String {
        self.outputs.iter().map(Output::as_text).collect()
    }
}

/// Count whitespace-separated words.
///
/// # Examples
///
/// ```
/// use scriptorium_core::word_count;
///
/// assert_eq!(word_count("  The gulls   rose\nover the harbor. "), 6);
/// assert_eq!(word_count(""), 0);
/// ```
pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}
