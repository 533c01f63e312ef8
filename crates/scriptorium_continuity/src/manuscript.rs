//! The ordered collection of finalized chapters.

use crate::Chapter;
use scriptorium_error::{ContinuityError, ContinuityErrorKind};
use serde::{Deserialize, Serialize};

/// Finalized chapters in order, numbered 1..=n without gaps.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Manuscript {
    chapters: Vec<Chapter>,
}

impl Manuscript {
    /// Create an empty manuscript.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number the next chapter must carry.
    pub fn next_number(&self) -> usize {
        self.chapters.len() + 1
    }

    /// Append a finalized chapter with the next contiguous number.
    pub fn push(&mut self, chapter: Chapter) -> Result<(), ContinuityError> {
        if !chapter.is_finalized() {
            return Err(ContinuityError::new(
                ContinuityErrorKind::ChapterNotFinalized(*chapter.number()),
            ));
        }
        let expected = self.next_number();
        if *chapter.number() != expected {
            return Err(ContinuityError::new(ContinuityErrorKind::ChapterOutOfOrder {
                expected,
                found: *chapter.number(),
            }));
        }
        tracing::debug!(chapter = expected, words = chapter.word_count(), "Chapter added to manuscript");
        self.chapters.push(chapter);
        Ok(())
    }

    /// Chapter by 1-based number.
    pub fn get(&self, number: usize) -> Option<&Chapter> {
        number.checked_sub(1).and_then(|i| self.chapters.get(i))
    }

    /// Most recent chapter.
    pub fn last(&self) -> Option<&Chapter> {
        self.chapters.last()
    }

    /// All chapters in order.
    pub fn chapters(&self) -> &[Chapter] {
        &self.chapters
    }

    /// Number of chapters.
    pub fn len(&self) -> usize {
        self.chapters.len()
    }

    /// True when no chapter has been finalized.
    pub fn is_empty(&self) -> bool {
        self.chapters.is_empty()
    }

    /// Total words across chapters.
    pub fn total_words(&self) -> usize {
        self.chapters.iter().map(|c| *c.word_count()).sum()
    }

    pub(crate) fn into_chapters(self) -> Vec<Chapter> {
        self.chapters
    }
}
