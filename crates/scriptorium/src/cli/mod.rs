//! Command-line interface module.
//!
//! This module provides the CLI structure and command handlers for the scriptorium binary.

mod commands;
mod run;

pub use commands::{BookArgs, Cli, Commands};
pub use run::{check_backend, plan_book, run_book, show_config};
