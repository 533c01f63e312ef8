//! Write-once timeline entries.

use derive_getters::Getters;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Time descriptor for one chapter.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize, Getters)]
pub struct TimelineEntry {
    /// Free-text elapsed time ("two days")
    elapsed: String,
    /// Elapsed time in travel units, when the chapter states one
    units: Option<u32>,
    /// Free-text time at the chapter's end ("dawn of the third day")
    end_time: String,
    /// Explicit time markers mentioned in the chapter
    markers: Vec<String>,
}

impl TimelineEntry {
    /// Create an entry.
    pub fn new(
        elapsed: impl Into<String>,
        units: Option<u32>,
        end_time: impl Into<String>,
        markers: Vec<String>,
    ) -> Self {
        Self {
            elapsed: elapsed.into(),
            units,
            end_time: end_time.into(),
            markers,
        }
    }

    /// One line for prompts and projections.
    pub fn describe(&self) -> String {
        let mut parts = Vec::new();
        if !self.elapsed.is_empty() {
            parts.push(format!("elapsed {}", self.elapsed));
        }
        if !self.end_time.is_empty() {
            parts.push(format!("ends {}", self.end_time));
        }
        if !self.markers.is_empty() {
            parts.push(format!("markers: {}", self.markers.join(", ")));
        }
        if parts.is_empty() {
            "unspecified".to_string()
        } else {
            parts.join("; ")
        }
    }
}

/// Chapter number to time descriptor; each chapter is written at most once.
///
/// # Examples
///
/// ```
/// use scriptorium_continuity::{Timeline, TimelineEntry};
///
/// let mut timeline = Timeline::default();
/// assert!(timeline.record(1, TimelineEntry::new("one night", Some(1), "dawn", vec![])));
/// assert!(!timeline.record(1, TimelineEntry::new("a week", None, "dusk", vec![])));
/// assert_eq!(timeline.get(1).map(|e| e.end_time().as_str()), Some("dawn"));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timeline {
    entries: BTreeMap<usize, TimelineEntry>,
}

impl Timeline {
    /// Record an entry if the chapter has none; returns whether it was stored.
    pub fn record(&mut self, chapter: usize, entry: TimelineEntry) -> bool {
        if self.entries.contains_key(&chapter) {
            return false;
        }
        self.entries.insert(chapter, entry);
        true
    }

    /// Entry for a chapter.
    pub fn get(&self, chapter: usize) -> Option<&TimelineEntry> {
        self.entries.get(&chapter)
    }

    /// Entries in chapter order.
    pub fn iter(&self) -> impl Iterator<Item = (&usize, &TimelineEntry)> {
        self.entries.iter()
    }

    /// Number of recorded chapters.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when nothing is recorded.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
