//! Trait definitions for Scriptorium backends.
//!
//! The engine treats the text-generation backend as an opaque collaborator:
//! text in, text out. This crate defines that seam so any local inference
//! server or hosted API can be plugged in through an adapter.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod traits;
mod types;

pub use traits::{ScriptoriumDriver, Streaming, collect_stream};
pub use types::{ChunkStream, FinishReason, StreamChunk, StreamChunkBuilder};
