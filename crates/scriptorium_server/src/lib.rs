//! Backend adapters for local inference servers.
//!
//! Two wire formats are supported:
//!
//! - **OpenAI-compatible** chat completions (`/v1/chat/completions`), served by
//!   llama.cpp, vLLM, mistral.rs, LM Studio and most hosted gateways.
//! - **Ollama** native generation (`/api/generate`).
//!
//! Both adapters implement [`ScriptoriumDriver`](scriptorium_interface::ScriptoriumDriver)
//! and [`Streaming`](scriptorium_interface::Streaming). A streamed request is
//! read chunk by chunk and returned as one concatenated response.
//!
//! # Example
//!
//! ```rust,no_run
//! use scriptorium_server::{ServerConfig, ServerProtocol};
//! use scriptorium_core::{GenerateRequest, Message};
//! use scriptorium_interface::ScriptoriumDriver;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ServerConfig::new(ServerProtocol::Ollama, "http://localhost:11434", "llama3");
//!     let backend = config.connect();
//!     backend.health_check().await?;
//!
//!     let request = GenerateRequest::builder()
//!         .messages(vec![Message::user("Name a harbor town.")])
//!         .build()?;
//!     let response = backend.generate(&request).await?;
//!     println!("{}", response.text());
//!     Ok(())
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod client;
mod config;
mod convert;
mod framing;
mod ollama;
mod request;
mod response;

pub use backend::BackendClient;
pub use client::ServerClient;
pub use config::{ServerConfig, ServerConfigBuilder, ServerProtocol};
pub use convert::{
    chunk_to_stream_chunk, from_chat_response, from_ollama_response, ollama_to_stream_chunk,
    to_chat_request, to_ollama_request,
};
pub use framing::{LineDecoder, SseDecoder, SseEvent};
pub use ollama::OllamaClient;
pub use request::{ChatCompletionRequest, Message, OllamaGenerateRequest, OllamaOptions};
pub use response::{
    ChatCompletionChunk, ChatCompletionResponse, Choice, ChoiceMessage, ChunkChoice, Delta,
    OllamaGenerateResponse, Usage,
};
pub use scriptorium_error::{ServerError, ServerErrorKind};
