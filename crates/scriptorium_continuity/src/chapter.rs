//! Chapters and their lifecycle.

use crate::scene::{Scene, split_blocks, strip_annotations};
use derive_getters::Getters;
use scriptorium_core::word_count;
use scriptorium_error::{ContinuityError, ContinuityErrorKind};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Where a chapter is in its lifecycle.
///
/// `Draft → {Validated, Flagged}`, `Flagged → Draft` (a repair pass),
/// `{Validated, Flagged} → Finalized`. Finalized chapters are immutable.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    strum::Display,
)]
pub enum ChapterStatus {
    /// Freshly generated
    Draft,
    /// Checked with no issues
    Validated,
    /// Checked with issues
    Flagged,
    /// Accepted and immutable
    Finalized,
}

/// One chapter of the manuscript.
///
/// # Examples
///
/// ```
/// use scriptorium_continuity::{Chapter, ChapterStatus};
///
/// let mut chapter = Chapter::draft(1, 1, "Low Tide", "The harbor slept.\n\nThen the bell rang.");
/// chapter.mark_validated().unwrap();
/// chapter.finalize().unwrap();
/// assert_eq!(*chapter.status(), ChapterStatus::Finalized);
/// assert!(chapter.revise("Something else").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Getters)]
pub struct Chapter {
    /// Position in the manuscript, 1-based and contiguous
    number: usize,
    /// Plan entry this chapter realises
    plan_entry: usize,
    title: String,
    text: String,
    summary: Option<String>,
    word_count: usize,
    status: ChapterStatus,
    active_threads: BTreeSet<String>,
    /// Character name to the development recorded for this chapter
    character_developments: BTreeMap<String, String>,
    /// Consistency issues still open when the chapter was accepted
    unresolved_issues: Vec<String>,
    repair_passes: usize,
}

impl Chapter {
    /// Create a chapter in the `Draft` state.
    pub fn draft(
        number: usize,
        plan_entry: usize,
        title: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        let text = text.into();
        Self {
            number,
            plan_entry,
            title: title.into(),
            word_count: word_count(&text),
            text,
            summary: None,
            status: ChapterStatus::Draft,
            active_threads: BTreeSet::new(),
            character_developments: BTreeMap::new(),
            unresolved_issues: Vec::new(),
            repair_passes: 0,
        }
    }

    /// Whether the chapter can no longer change.
    pub fn is_finalized(&self) -> bool {
        self.status == ChapterStatus::Finalized
    }

    /// Scene views over the text.
    pub fn scenes(&self) -> Vec<Scene> {
        Scene::segment(&self.text)
    }

    /// Text with scene annotations removed, for reading and export.
    pub fn clean_text(&self) -> String {
        split_blocks(&self.text)
            .into_iter()
            .map(strip_annotations)
            .filter(|block| !block.is_empty())
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    /// Last `chars` characters of the clean text, cut at a character boundary.
    pub fn tail(&self, chars: usize) -> String {
        let clean = self.clean_text();
        let total = clean.chars().count();
        clean.chars().skip(total.saturating_sub(chars)).collect()
    }

    /// Check passed with no issues.
    pub fn mark_validated(&mut self) -> Result<(), ContinuityError> {
        self.transition(ChapterStatus::Validated)?;
        self.unresolved_issues.clear();
        Ok(())
    }

    /// Check reported issues; they stay recorded until a later pass clears them.
    pub fn mark_flagged(&mut self, issues: Vec<String>) -> Result<(), ContinuityError> {
        self.transition(ChapterStatus::Flagged)?;
        self.unresolved_issues = issues;
        Ok(())
    }

    /// Replace the text with a repaired draft, returning to `Draft`.
    pub fn revise(&mut self, text: impl Into<String>) -> Result<(), ContinuityError> {
        if self.status == ChapterStatus::Draft {
            self.ensure_mutable()?;
        } else {
            self.transition(ChapterStatus::Draft)?;
            self.repair_passes += 1;
        }
        self.set_text(text.into());
        Ok(())
    }

    /// Replace only the final paragraph with `ending`.
    ///
    /// Text with a single paragraph gets `ending` appended instead, so the
    /// body is never rewritten.
    pub fn splice_ending(&mut self, ending: &str) -> Result<(), ContinuityError> {
        self.ensure_mutable()?;
        let ending = ending.trim();
        if ending.is_empty() {
            return Ok(());
        }
        let mut blocks: Vec<String> = split_blocks(&self.text)
            .into_iter()
            .map(str::to_string)
            .collect();
        if blocks.len() > 1 {
            blocks.pop();
        }
        blocks.push(ending.to_string());
        self.set_text(blocks.join("\n\n"));
        Ok(())
    }

    /// Append an unresolved-issue note without changing the status.
    pub fn add_unresolved(&mut self, note: impl Into<String>) -> Result<(), ContinuityError> {
        self.ensure_mutable()?;
        self.unresolved_issues.push(note.into());
        Ok(())
    }

    /// Store the summary; only before finalization.
    pub fn set_summary(&mut self, summary: impl Into<String>) -> Result<(), ContinuityError> {
        self.ensure_mutable()?;
        self.summary = Some(summary.into());
        Ok(())
    }

    /// Record the threads this chapter advanced.
    pub fn set_active_threads(
        &mut self,
        threads: impl IntoIterator<Item = String>,
    ) -> Result<(), ContinuityError> {
        self.ensure_mutable()?;
        self.active_threads = threads.into_iter().collect();
        Ok(())
    }

    /// Record per-character developments extracted from this chapter.
    pub fn set_character_developments(
        &mut self,
        developments: BTreeMap<String, String>,
    ) -> Result<(), ContinuityError> {
        self.ensure_mutable()?;
        self.character_developments = developments;
        Ok(())
    }

    /// Move to `Finalized`.
    pub fn finalize(&mut self) -> Result<(), ContinuityError> {
        self.transition(ChapterStatus::Finalized)
    }

    fn set_text(&mut self, text: String) {
        self.word_count = word_count(&text);
        self.text = text;
    }

    fn ensure_mutable(&self) -> Result<(), ContinuityError> {
        if self.is_finalized() {
            return Err(ContinuityError::new(ContinuityErrorKind::ChapterFinalized(
                self.number,
            )));
        }
        Ok(())
    }

    fn transition(&mut self, to: ChapterStatus) -> Result<(), ContinuityError> {
        use ChapterStatus::*;
        self.ensure_mutable()?;
        let allowed = matches!(
            (self.status, to),
            (Draft, Validated) | (Draft, Flagged) | (Flagged, Draft) | (Validated, Finalized)
                | (Flagged, Finalized)
        );
        if !allowed {
            return Err(ContinuityError::new(ContinuityErrorKind::InvalidTransition {
                chapter: self.number,
                from: self.status.to_string(),
                to: to.to_string(),
            }));
        }
        self.status = to;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_draft_cannot_finalize_without_check() {
        let mut chapter = Chapter::draft(1, 1, "T", "text");
        let err = chapter.finalize().unwrap_err();
        assert!(matches!(err.kind, ContinuityErrorKind::InvalidTransition { .. }));
    }

    #[test]
    fn test_repair_pass_counts_and_returns_to_draft() {
        let mut chapter = Chapter::draft(2, 2, "T", "first draft");
        chapter.mark_flagged(vec!["Oren appears early".into()]).unwrap();
        chapter.revise("second draft here").unwrap();
        assert_eq!(chapter.status, ChapterStatus::Draft);
        assert_eq!(chapter.repair_passes, 1);
        assert_eq!(chapter.word_count, 3);
        chapter.mark_validated().unwrap();
        assert!(chapter.unresolved_issues.is_empty());
    }

    #[test]
    fn test_splice_replaces_only_final_paragraph() {
        let mut chapter = Chapter::draft(1, 1, "T", "Body one.\n\nBody two.\n\nOld ending.");
        chapter.splice_ending("New ending.").unwrap();
        assert_eq!(chapter.text, "Body one.\n\nBody two.\n\nNew ending.");

        let mut single = Chapter::draft(1, 1, "T", "Only paragraph.");
        single.splice_ending("Coda.").unwrap();
        assert_eq!(single.text, "Only paragraph.\n\nCoda.");
    }

    #[test]
    fn test_finalized_chapter_rejects_edits() {
        let mut chapter = Chapter::draft(1, 1, "T", "text");
        chapter.mark_flagged(vec!["note".into()]).unwrap();
        chapter.finalize().unwrap();
        assert_eq!(chapter.unresolved_issues, vec!["note"]);
        for err in [
            chapter.splice_ending("x").unwrap_err(),
            chapter.set_summary("x").unwrap_err(),
            chapter.mark_validated().unwrap_err(),
        ] {
            assert!(matches!(err.kind, ContinuityErrorKind::ChapterFinalized(1)));
        }
    }

    #[test]
    fn test_tail_counts_characters() {
        let chapter = Chapter::draft(1, 1, "T", "[POV: A]\nabcdé");
        assert_eq!(chapter.tail(2), "dé");
    }
}
