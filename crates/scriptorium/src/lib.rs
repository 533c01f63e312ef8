//! Scriptorium - continuity-tracked novel generation
//!
//! Scriptorium plans and writes long-form fiction one chapter at a time
//! against a local inference server, keeping a structured record of
//! characters, places, plot threads, time and mood so that later chapters
//! agree with earlier ones.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use scriptorium::{NovelExecutor, PlanRequest, ScriptoriumConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ScriptoriumConfig::load(None)?;
//!     let executor = NovelExecutor::new(config.backend().connect(), config.engine());
//!
//!     let run = executor
//!         .run(PlanRequest::new(6, "A cartographer maps a city that rearranges itself."))
//!         .await;
//!     println!("{}", run.book.render_markdown());
//!     Ok(())
//! }
//! ```
//!
//! # Architecture
//!
//! - `scriptorium_error` - Error types
//! - `scriptorium_core` - Request and response types, logging setup
//! - `scriptorium_interface` - The `ScriptoriumDriver` backend trait
//! - `scriptorium_server` - Ollama and OpenAI-compatible adapters
//! - `scriptorium_continuity` - The continuity store and book model
//! - `scriptorium_narrative` - Planning, drafting, repair and orchestration
//!
//! This crate re-exports everything and adds layered configuration loading.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod config;

pub use config::ScriptoriumConfig;

pub use scriptorium_continuity::*;
pub use scriptorium_core::*;
pub use scriptorium_error::*;
pub use scriptorium_interface::*;
pub use scriptorium_narrative::*;
pub use scriptorium_server::{
    BackendClient, OllamaClient, ServerClient, ServerConfig, ServerConfigBuilder, ServerProtocol,
};
