//! Core data types for Scriptorium.
//!
//! This crate provides the backend-neutral request and response types that
//! flow between the generation engine and whichever text-generation backend
//! adapter is plugged in, plus logging initialisation shared by binaries.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod logging;
mod message;
mod output;
mod request;
mod role;

pub use logging::{LogFormat, init_logging};
pub use message::{Message, MessageBuilder};
pub use output::Output;
pub use request::{GenerateRequest, GenerateRequestBuilder, GenerateResponse, word_count};
pub use role::Role;
