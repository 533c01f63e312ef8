//! Streaming types shared by adapters.

use derive_getters::Getters;
use scriptorium_error::ScriptoriumResult;
use serde::{Deserialize, Serialize};
use std::pin::Pin;

/// A boxed stream of response chunks.
pub type ChunkStream =
    Pin<Box<dyn futures_util::Stream<Item = ScriptoriumResult<StreamChunk>> + Send>>;

/// One incremental piece of a streamed response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Getters, derive_builder::Builder)]
#[builder(setter(into))]
pub struct StreamChunk {
    /// Incremental text.
    content: String,
    /// Whether this is the final chunk.
    #[builder(default)]
    is_final: bool,
    /// Finish reason, usually only on the final chunk.
    #[builder(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    finish_reason: Option<FinishReason>,
}

impl StreamChunk {
    /// Create a builder for a chunk.
    pub fn builder() -> StreamChunkBuilder {
        StreamChunkBuilder::default()
    }
}

/// Why generation stopped.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    strum::EnumIter,
    strum::Display,
)]
pub enum FinishReason {
    /// Model completed naturally.
    Stop,
    /// Hit the token limit.
    Length,
    /// Output was filtered.
    ContentFilter,
    /// Other or unknown reason.
    Other,
}

impl FinishReason {
    /// Map a wire-format finish reason ("stop", "length", ...).
    ///
    /// # Examples
    ///
    /// ```
    /// use scriptorium_interface::FinishReason;
    ///
    /// assert_eq!(FinishReason::from_wire("stop"), FinishReason::Stop);
    /// assert_eq!(FinishReason::from_wire("length"), FinishReason::Length);
    /// assert_eq!(FinishReason::from_wire("load"), FinishReason::Other);
    /// ```
    pub fn from_wire(reason: &str) -> Self {
        match reason {
            "stop" => FinishReason::Stop,
            "length" => FinishReason::Length,
            "content_filter" => FinishReason::ContentFilter,
            _ => FinishReason::Other,
        }
    }
}
