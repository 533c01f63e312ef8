//! Chapter endings and next-chapter openers.

use crate::TransitionConfig;
use crate::client::{GenerationClient, PromptSpec};
use crate::planner::ChapterPlan;
use crate::prompts::{self, roles};
use scriptorium_continuity::{Chapter, ContinuityStore, EmotionalBeat, split_blocks, strip_annotations};
use scriptorium_error::ScriptoriumResult;
use scriptorium_interface::ScriptoriumDriver;
use tracing::debug;

/// Inputs shared by endings and openers.
#[derive(Debug, Clone, Copy, Default)]
pub struct TransitionContext<'a> {
    /// Trailing text of the chapter
    pub tail: &'a str,
    /// The chapter's emotional beat
    pub beat: Option<&'a EmotionalBeat>,
    /// Time at the chapter's end
    pub end_time: Option<&'a str>,
    /// Motif to echo
    pub motif: Option<&'a str>,
    /// Chapter summary, when known
    pub summary: Option<&'a str>,
}

impl<'a> TransitionContext<'a> {
    /// Context of a finalized chapter, read from the store it was applied to.
    pub fn finalized(chapter: &'a Chapter, tail: &'a str, store: &'a ContinuityStore) -> Self {
        let number = *chapter.number();
        Self {
            tail,
            beat: store.emotional_arc().get(number),
            end_time: store
                .timeline()
                .get(number)
                .map(|t| t.end_time().as_str())
                .filter(|t| !t.is_empty()),
            motif: store.motif_for(number),
            summary: chapter.summary().as_deref(),
        }
    }
}

/// Writes closing passages and opening paragraphs.
#[derive(Debug, Clone)]
pub struct TransitionComposer {
    config: TransitionConfig,
}

impl TransitionComposer {
    /// Create a composer.
    pub fn new(config: TransitionConfig) -> Self {
        Self { config }
    }

    /// Whether transitions are written at all.
    pub fn enabled(&self) -> bool {
        *self.config.enabled()
    }

    /// The trailing characters of a chapter used as context.
    pub fn tail_of(&self, chapter: &Chapter) -> String {
        chapter.tail(*self.config.tail_chars())
    }

    /// One or two paragraphs to replace the chapter's last paragraph.
    #[tracing::instrument(skip_all)]
    pub async fn compose_ending<D: ScriptoriumDriver>(
        &self,
        client: &GenerationClient<D>,
        ctx: &TransitionContext<'_>,
        next: Option<&ChapterPlan>,
    ) -> ScriptoriumResult<String> {
        let spec = PromptSpec::new(roles::ENDING_WRITER, prompts::ending(ctx, next))
            .with_min_words(client.short_min_words(20));
        let ending = paragraphs(&client.generate(&spec).await?, 2);
        debug!(chars = ending.len(), "Ending composed");
        Ok(ending)
    }

    /// The opening paragraph of the next chapter.
    #[tracing::instrument(skip_all, fields(next = next.number()))]
    pub async fn compose_opener<D: ScriptoriumDriver>(
        &self,
        client: &GenerationClient<D>,
        ctx: &TransitionContext<'_>,
        next: &ChapterPlan,
    ) -> ScriptoriumResult<String> {
        let spec = PromptSpec::new(roles::OPENER_WRITER, prompts::opener(ctx, next))
            .with_min_words(client.short_min_words(15));
        let opener = paragraphs(&client.generate(&spec).await?, 1);
        debug!(chars = opener.len(), "Opener composed");
        Ok(opener)
    }
}

/// The first `max` prose paragraphs of a response, without fences, quotes
/// or a leading "Here is..." line.
fn paragraphs(text: &str, max: usize) -> String {
    split_blocks(text.trim())
        .into_iter()
        .map(strip_annotations)
        .map(|block| block.trim().trim_matches('"').trim().to_string())
        .filter(|block| !block.is_empty() && !block.starts_with("```"))
        .filter(|block| !(block.to_lowercase().starts_with("here") && block.ends_with(':')))
        .take(max)
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paragraphs_strip_preamble() {
        let text = "Here is the ending:\n\n\"The bell tolled once.\"\n\nMara did not move.\n\nA third.";
        assert_eq!(paragraphs(text, 2), "The bell tolled once.\n\nMara did not move.");
        assert_eq!(paragraphs(text, 1), "The bell tolled once.");
    }

    #[test]
    fn test_context_from_store() {
        let mut store = ContinuityStore::new("premise");
        store.set_motifs(vec!["salt".to_string()]);
        store.record_emotion(1, EmotionalBeat::new("dread", 7, "the bell"));
        let chapter = Chapter::draft(1, 1, "One", "Text.");
        let ctx = TransitionContext::finalized(&chapter, "Text.", &store);
        assert_eq!(ctx.beat.map(|b| b.emotion().as_str()), Some("dread"));
        assert_eq!(ctx.motif, Some("salt"));
        assert!(ctx.end_time.is_none());
    }
}
