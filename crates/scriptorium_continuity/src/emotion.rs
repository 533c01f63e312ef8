//! Per-chapter emotional arc.

use derive_getters::Getters;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The dominant emotion and tension of one chapter.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Getters)]
pub struct EmotionalBeat {
    emotion: String,
    /// 1 (calm) to 10 (peak)
    tension: u8,
    /// What the chapter leaves open
    unresolved: String,
}

impl EmotionalBeat {
    /// Create a beat; tension is clamped to 1..=10.
    pub fn new(emotion: impl Into<String>, tension: u8, unresolved: impl Into<String>) -> Self {
        Self {
            emotion: emotion.into(),
            tension: tension.clamp(1, 10),
            unresolved: unresolved.into(),
        }
    }

    /// One line for prompts.
    pub fn describe(&self) -> String {
        let mut line = format!("{} (tension {}/10)", self.emotion, self.tension);
        if !self.unresolved.is_empty() {
            line.push_str(&format!(", unresolved: {}", self.unresolved));
        }
        line
    }
}

/// Chapter number to emotional beat; the first write wins.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EmotionalArc {
    beats: BTreeMap<usize, EmotionalBeat>,
}

impl EmotionalArc {
    /// Record a beat if the chapter has none; returns whether it was stored.
    pub fn record(&mut self, chapter: usize, beat: EmotionalBeat) -> bool {
        if self.beats.contains_key(&chapter) {
            return false;
        }
        self.beats.insert(chapter, beat);
        true
    }

    /// Beat for a chapter.
    pub fn get(&self, chapter: usize) -> Option<&EmotionalBeat> {
        self.beats.get(&chapter)
    }

    /// Beats in chapter order.
    pub fn iter(&self) -> impl Iterator<Item = (&usize, &EmotionalBeat)> {
        self.beats.iter()
    }

    /// True when nothing is recorded.
    pub fn is_empty(&self) -> bool {
        self.beats.is_empty()
    }
}
