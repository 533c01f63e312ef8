//! Chapter drafting.

use crate::ChapterConfig;
use crate::client::{GenerationClient, PromptSpec, is_cancellation};
use crate::planner::ChapterPlan;
use crate::prompts::{self, roles};
use scriptorium_continuity::{Chapter, ContinuityStore};
use scriptorium_core::word_count;
use scriptorium_error::ScriptoriumResult;
use scriptorium_interface::ScriptoriumDriver;
use tracing::{info, warn};

/// Everything a chapter draft is built from.
#[derive(Debug, Clone, Copy)]
pub struct DraftContext<'a> {
    /// Manuscript number of the chapter being drafted
    pub number: usize,
    /// Chapters planned for the book
    pub total: usize,
    /// The plan entry this chapter realises
    pub plan: &'a ChapterPlan,
    /// Continuity state as of the previous chapter
    pub store: &'a ContinuityStore,
    /// The previous finalized chapter, if any
    pub previous: Option<&'a Chapter>,
    /// Suggested opening paragraph
    pub opening: Option<&'a str>,
}

/// Drafts one chapter from its plan entry and the continuity state.
#[derive(Debug, Clone)]
pub struct ChapterGenerator {
    config: ChapterConfig,
}

impl ChapterGenerator {
    /// Create a generator.
    pub fn new(config: ChapterConfig) -> Self {
        Self { config }
    }

    /// Draft a chapter.
    ///
    /// A draft under the chapter word minimum gets exactly one expansion
    /// request with the short draft embedded, and the longer of the two is
    /// kept. A failed expansion keeps the first draft.
    #[tracing::instrument(skip_all, fields(chapter = ctx.number, plan_entry = ctx.plan.number()))]
    pub async fn generate<D: ScriptoriumDriver>(
        &self,
        client: &GenerationClient<D>,
        ctx: &DraftContext<'_>,
    ) -> ScriptoriumResult<Chapter> {
        let prompt = prompts::chapter(ctx);
        let mut text = client
            .generate(&PromptSpec::new(roles::NOVELIST, prompt.as_str()))
            .await?;
        let minimum = *self.config.min_words();
        let words = word_count(&text);

        if words < minimum && *self.config.expansion_retry() {
            info!(words, minimum, "Draft short, requesting expansion");
            let spec = PromptSpec::new(roles::NOVELIST, prompts::expansion(&prompt, &text, minimum));
            match client.generate(&spec).await {
                Ok(expanded) if word_count(&expanded) > words => text = expanded,
                Ok(_) => info!("Expansion was not longer, keeping first draft"),
                Err(e) if is_cancellation(&e) => return Err(e),
                Err(e) => warn!(error = %e, "Expansion failed, keeping first draft"),
            }
        }

        let chapter = Chapter::draft(ctx.number, *ctx.plan.number(), ctx.plan.title(), text);
        info!(words = chapter.word_count(), "Chapter drafted");
        Ok(chapter)
    }
}
