//! Command handlers.

use super::BookArgs;
use anyhow::Context;
use scriptorium::{Book, NovelExecutor, ScriptoriumConfig, is_cancellation};
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Plan and write a book, saving whatever was finalized.
///
/// Ctrl+C cancels the run; the chapters finished before it are still
/// written out.
pub async fn run_book(
    config: &ScriptoriumConfig,
    book: &BookArgs,
    output: &Path,
    markdown: Option<PathBuf>,
) -> anyhow::Result<()> {
    let request = book.to_request()?;
    let token = CancellationToken::new();
    let executor =
        NovelExecutor::new(config.backend().connect(), config.engine()).with_cancellation(token.clone());

    let interrupt = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, keeping the chapters finished so far");
            interrupt.cancel();
        }
    });

    info!(
        model = %config.backend().model(),
        chapters = request.num_chapters(),
        "Starting book"
    );
    let run = executor.run(request).await;

    write_book(&run.book, output, markdown.as_deref())?;
    println!(
        "{} chapters, {} words{}",
        run.book.chapters().len(),
        run.book.total_words(),
        if run.book.skipped().is_empty() {
            String::new()
        } else {
            format!(", {} skipped", run.book.skipped().len())
        }
    );

    match run.error {
        Some(e) if is_cancellation(&e) => {
            warn!("Run cancelled, partial book saved");
            Ok(())
        }
        Some(e) => Err(e).context("Book run stopped early; the partial book was saved"),
        None => Ok(()),
    }
}

/// Plan a book and print or save the plan.
pub async fn plan_book(
    config: &ScriptoriumConfig,
    book: &BookArgs,
    output: Option<PathBuf>,
) -> anyhow::Result<()> {
    let request = book.to_request()?;
    let executor = NovelExecutor::new(config.backend().connect(), config.engine());
    let plan = executor.plan(&request).await?;
    let json = serde_json::to_string_pretty(&plan)?;

    match output {
        Some(path) => {
            std::fs::write(&path, json)
                .with_context(|| format!("Failed to write plan to {}", path.display()))?;
            info!(path = %path.display(), chapters = plan.chapters().len(), "Plan saved");
        }
        None => println!("{}", json),
    }
    Ok(())
}

/// Probe the configured backend.
pub async fn check_backend(config: &ScriptoriumConfig) -> anyhow::Result<()> {
    let backend = config.backend();
    backend
        .connect()
        .health_check()
        .await
        .with_context(|| format!("Backend at {} is not reachable", backend.base_url()))?;
    println!(
        "{} backend reachable at {} (model {})",
        backend.protocol(),
        backend.base_url(),
        backend.model()
    );
    Ok(())
}

/// Print the effective configuration.
pub fn show_config(config: &ScriptoriumConfig) -> anyhow::Result<()> {
    print!("{}", config.to_toml()?);
    Ok(())
}

fn write_book(book: &Book, output: &Path, markdown: Option<&Path>) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(book)?;
    std::fs::write(output, json)
        .with_context(|| format!("Failed to write book to {}", output.display()))?;
    info!(path = %output.display(), "Book saved");

    if let Some(path) = markdown {
        std::fs::write(path, book.render_markdown())
            .with_context(|| format!("Failed to write manuscript to {}", path.display()))?;
        info!(path = %path.display(), "Manuscript saved");
    }
    Ok(())
}
