//! Error types for Scriptorium.
//!
//! This crate provides the foundation error types used throughout the Scriptorium workspace.
//!
//! # Error Hierarchy
//!
//! Errors follow the `ErrorKind` + wrapper struct pattern:
//! - `*ErrorKind` enum defines specific error conditions
//! - `*Error` struct wraps the kind with source location tracking
//! - All constructors use `#[track_caller]` for automatic location capture
//!
//! # Examples
//!
//! ```
//! use scriptorium_error::{PlanningError, PlanningErrorKind, ScriptoriumResult};
//!
//! fn plan() -> ScriptoriumResult<usize> {
//!     Err(PlanningError::new(PlanningErrorKind::TooFewChapters {
//!         expected: 5,
//!         found: 3,
//!     }))?
//! }
//!
//! match plan() {
//!     Ok(n) => println!("Planned {} chapters", n),
//!     Err(e) => eprintln!("Error: {}", e),
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod builder;
mod config;
mod continuity;
mod error;
mod generation;
mod json;
mod narrative;
mod planning;
mod server;
mod shape;

pub use builder::{BuilderError, BuilderErrorKind};
pub use config::ConfigError;
pub use continuity::{ContinuityError, ContinuityErrorKind};
pub use error::{ScriptoriumError, ScriptoriumErrorKind, ScriptoriumResult};
pub use generation::{GenerationError, GenerationErrorKind, RetryableError};
pub use json::JsonError;
pub use narrative::{NarrativeError, NarrativeErrorKind};
pub use planning::{PlanningError, PlanningErrorKind};
pub use server::{ServerError, ServerErrorKind};
pub use shape::{ShapeError, ShapeErrorKind};
