//! Book snapshot for exporters.

use crate::{
    Chapter, Character, ContinuityStore, EmotionalArc, Manuscript, PlotThread, Timeline,
};
use chrono::{DateTime, Utc};
use derive_getters::Getters;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Title block of a book.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Getters)]
pub struct BookHeader {
    title: String,
    subtitle: String,
    synopsis: String,
}

impl BookHeader {
    /// Create a header; a blank title becomes "Untitled".
    pub fn new(
        title: impl Into<String>,
        subtitle: impl Into<String>,
        synopsis: impl Into<String>,
    ) -> Self {
        let title = title.into();
        Self {
            title: if title.trim().is_empty() {
                "Untitled".to_string()
            } else {
                title.trim().to_string()
            },
            subtitle: subtitle.into(),
            synopsis: synopsis.into(),
        }
    }
}

impl Default for BookHeader {
    fn default() -> Self {
        Self::new("Untitled", "", "")
    }
}

/// Whether the run produced every planned chapter.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum BookStatus {
    /// Every plan entry was finalized
    Complete,
    /// The run stopped early or skipped chapters
    Partial {
        /// Why the book is partial
        reason: String,
    },
}

/// A plan entry that produced no chapter.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Getters)]
pub struct SkippedChapter {
    plan_entry: usize,
    title: String,
    reason: String,
}

impl SkippedChapter {
    /// Record a skipped plan entry.
    pub fn new(plan_entry: usize, title: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            plan_entry,
            title: title.into(),
            reason: reason.into(),
        }
    }
}

/// Structured snapshot of a generated book.
///
/// The core never writes files; exporters serialise this value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Getters)]
pub struct Book {
    id: Uuid,
    generated_at: DateTime<Utc>,
    title: String,
    subtitle: String,
    synopsis: String,
    premise: String,
    world_name: String,
    characters: Vec<Character>,
    chapters: Vec<Chapter>,
    plot_threads: Vec<PlotThread>,
    timeline: Timeline,
    emotional_arc: EmotionalArc,
    motifs: Vec<String>,
    skipped: Vec<SkippedChapter>,
    status: BookStatus,
}

impl Book {
    /// Snapshot the store and the finalized chapters.
    pub fn assemble(
        header: BookHeader,
        store: &ContinuityStore,
        manuscript: Manuscript,
        skipped: Vec<SkippedChapter>,
        status: BookStatus,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            generated_at: Utc::now(),
            title: header.title,
            subtitle: header.subtitle,
            synopsis: header.synopsis,
            premise: store.premise().clone(),
            world_name: store.world_name().clone(),
            characters: store.characters().values().cloned().collect(),
            chapters: manuscript.into_chapters(),
            plot_threads: store.plot_threads().values().cloned().collect(),
            timeline: store.timeline().clone(),
            emotional_arc: store.emotional_arc().clone(),
            motifs: store.motifs().clone(),
            skipped,
            status,
        }
    }

    /// Whether every planned chapter was produced.
    pub fn is_complete(&self) -> bool {
        self.status == BookStatus::Complete
    }

    /// Total words across chapters.
    pub fn total_words(&self) -> usize {
        self.chapters.iter().map(|c| *c.word_count()).sum()
    }

    /// Render the manuscript as Markdown.
    ///
    /// # Examples
    ///
    /// ```
    /// use scriptorium_continuity::{Book, BookHeader, BookStatus, Chapter, ContinuityStore, Manuscript};
    ///
    /// let mut chapter = Chapter::draft(1, 1, "Low Tide", "[POV: Mara]\nThe harbor slept.");
    /// chapter.mark_validated().unwrap();
    /// chapter.finalize().unwrap();
    /// let mut manuscript = Manuscript::new();
    /// manuscript.push(chapter).unwrap();
    ///
    /// let store = ContinuityStore::new("A drowned bell.");
    /// let book = Book::assemble(
    ///     BookHeader::new("Saltmere", "", ""),
    ///     &store,
    ///     manuscript,
    ///     vec![],
    ///     BookStatus::Complete,
    /// );
    /// let markdown = book.render_markdown();
    /// assert!(markdown.starts_with("# Saltmere"));
    /// assert!(markdown.contains("## Chapter 1: Low Tide"));
    /// assert!(!markdown.contains("[POV"));
    /// ```
    pub fn render_markdown(&self) -> String {
        let mut out = format!("# {}\n\n", self.title);
        if !self.subtitle.is_empty() {
            out.push_str(&format!("*{}*\n\n", self.subtitle));
        }
        if !self.synopsis.is_empty() {
            out.push_str(&format!("> {}\n\n", self.synopsis.replace('\n', "\n> ")));
        }
        for chapter in &self.chapters {
            out.push_str(&format!(
                "## Chapter {}: {}\n\n{}\n\n",
                chapter.number(),
                chapter.title(),
                chapter.clean_text()
            ));
        }
        if let BookStatus::Partial { reason } = &self.status {
            out.push_str(&format!("---\n\n*Incomplete: {}*\n", reason));
        }
        out
    }
}
