//! Scriptorium CLI binary.
//!
//! This binary provides command-line access to Scriptorium:
//! - Plan and write a book against the configured backend
//! - Print a book plan without writing chapters
//! - Check the backend and show the effective configuration

use clap::Parser;
use scriptorium::{LogFormat, ScriptoriumConfig, init_logging};

mod cli;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    use cli::{Cli, Commands, check_backend, plan_book, run_book, show_config};

    // Load .env file if present
    let _ = dotenvy::dotenv();

    // Parse command-line arguments
    let cli = Cli::parse();

    // Initialize tracing
    let level = if cli.verbose { "debug" } else { "info" };
    let format = if cli.json_logs {
        LogFormat::Json
    } else {
        LogFormat::Pretty
    };
    init_logging(level, format).map_err(|e| anyhow::anyhow!("Failed to initialise logging: {}", e))?;

    let config = ScriptoriumConfig::load(cli.config.as_deref())?;

    // Execute the requested command
    match cli.command {
        Commands::Run {
            book,
            output,
            markdown,
        } => {
            run_book(&config, &book, &output, markdown).await?;
        }

        Commands::Plan { book, output } => {
            plan_book(&config, &book, output).await?;
        }

        Commands::Check => {
            check_backend(&config).await?;
        }

        Commands::Config => {
            show_config(&config)?;
        }
    }

    Ok(())
}
