//! The continuity store.
//!
//! Owns every piece of cross-chapter state: characters, the location graph,
//! plot threads with the completed-event set, the timeline, the emotional arc,
//! chapter summaries and recurring motifs. It performs no I/O; the narrative
//! engine injects it into each component.

use crate::{
    Character, CharacterStatus, EmotionalArc, EmotionalBeat, LocationGraph, PlotThread,
    ThreadStatus, Timeline, TimelineEntry,
};
use derive_getters::Getters;
use regex::Regex;
use scriptorium_error::{ContinuityError, ContinuityErrorKind};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info};

/// Most motifs a store keeps.
pub const MAX_MOTIFS: usize = 5;

/// Observed changes for one character in one chapter.
///
/// Every field is optional; absent fields leave the character untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CharacterUpdate {
    /// New status
    pub status: Option<CharacterStatus>,
    /// One-line development
    pub development: Option<String>,
    /// Current location
    pub location: Option<String>,
    /// Emotional state
    pub emotion: Option<String>,
}

/// What an update actually changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CharacterUpdateOutcome {
    /// A status change was appended to the history
    pub status_changed: bool,
    /// A development entry was recorded
    pub development_recorded: bool,
    /// The location was changed
    pub moved: bool,
}

/// Cross-chapter continuity state.
///
/// # Examples
///
/// ```
/// use scriptorium_continuity::{Character, ContinuityStore};
///
/// let mut store = ContinuityStore::new("A harbor town hides a drowned bell.");
/// store.add_transition("Harbor", "Market", 1);
/// store.add_transition("Market", "Tower", 2);
/// store.record_character(Character::named("Mara"));
/// store.place_character("Mara", "Harbor").unwrap();
///
/// assert!(!store.validate_movement("Mara", "Tower", 1));
/// assert!(store.validate_movement("Mara", "Tower", 3));
/// assert_eq!(store.find_path("Harbor", "Tower"), vec!["Harbor", "Market", "Tower"]);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Getters)]
pub struct ContinuityStore {
    premise: String,
    world_name: String,
    characters: BTreeMap<String, Character>,
    locations: LocationGraph,
    plot_threads: BTreeMap<String, PlotThread>,
    completed_events: BTreeSet<String>,
    timeline: Timeline,
    emotional_arc: EmotionalArc,
    summaries: BTreeMap<usize, String>,
    motifs: Vec<String>,
    #[serde(skip)]
    #[getter(skip)]
    name_index: NameIndex,
}

/// Compiled name patterns, keyed by character name.
///
/// Derived from the character map and rebuilt as characters are recorded;
/// a deserialized store starts empty and compiles on demand.
#[derive(Debug, Clone, Default)]
struct NameIndex(BTreeMap<String, Regex>);

impl PartialEq for NameIndex {
    fn eq(&self, _other: &Self) -> bool {
        true
    }
}

impl ContinuityStore {
    /// Create a store for a premise.
    pub fn new(premise: impl Into<String>) -> Self {
        Self {
            premise: premise.into(),
            ..Self::default()
        }
    }

    /// Set the world name used literally in every chapter.
    pub fn set_world_name(&mut self, world_name: impl Into<String>) {
        self.world_name = world_name.into();
    }

    /// Replace the motifs, keeping at most [`MAX_MOTIFS`] distinct non-empty ones.
    pub fn set_motifs(&mut self, motifs: impl IntoIterator<Item = String>) {
        let mut kept: Vec<String> = Vec::new();
        for motif in motifs {
            let motif = motif.trim().to_string();
            if !motif.is_empty() && !kept.contains(&motif) {
                kept.push(motif);
            }
            if kept.len() == MAX_MOTIFS {
                break;
            }
        }
        self.motifs = kept;
    }

    /// Motif for a chapter, rotating by `chapter mod len`.
    pub fn motif_for(&self, chapter: usize) -> Option<&str> {
        if self.motifs.is_empty() {
            return None;
        }
        self.motifs
            .get(chapter % self.motifs.len())
            .map(String::as_str)
    }

    // ----- characters -----

    /// Add a character, or fill empty profile fields of an existing one.
    ///
    /// Returns true when the character was new.
    pub fn record_character(&mut self, character: Character) -> bool {
        match self.characters.get_mut(character.name()) {
            Some(existing) => {
                existing.merge_profile(&character);
                false
            }
            None => {
                debug!(name = %character.name(), "Recording character");
                if let Some(pattern) = name_pattern(character.name()) {
                    self.name_index.0.insert(character.name().clone(), pattern);
                }
                self.characters.insert(character.name().clone(), character);
                true
            }
        }
    }

    /// Look up a character.
    pub fn character(&self, name: &str) -> Option<&Character> {
        self.characters.get(name)
    }

    fn character_mut(&mut self, name: &str) -> Result<&mut Character, ContinuityError> {
        self.characters.get_mut(name).ok_or_else(|| {
            ContinuityError::new(ContinuityErrorKind::UnknownCharacter(name.to_string()))
        })
    }

    /// Apply one chapter's observations to a character.
    ///
    /// Status changes append to the history only when the status differs, and
    /// a chapter records at most one development per character. The location
    /// is set as given; callers check reachability with
    /// [`validate_movement`](Self::validate_movement) first.
    pub fn update_character_status(
        &mut self,
        name: &str,
        chapter: usize,
        update: CharacterUpdate,
    ) -> Result<CharacterUpdateOutcome, ContinuityError> {
        let character = self.characters.get_mut(name).ok_or_else(|| {
            ContinuityError::new(ContinuityErrorKind::UnknownCharacter(name.to_string()))
        })?;
        let mut outcome = CharacterUpdateOutcome::default();

        if let Some(status) = update.status {
            outcome.status_changed = character.change_status(chapter, status);
        }
        if let Some(development) = update.development {
            outcome.development_recorded = character.record_development(chapter, development);
        }
        if let Some(location) = update.location {
            if character.location().as_deref() != Some(location.as_str()) {
                character.set_location(location.clone());
                self.locations.add_location(location);
                outcome.moved = true;
            }
        }
        if let Some(emotion) = update.emotion {
            character.set_emotional_state(emotion);
        }
        Ok(outcome)
    }

    /// Put a character somewhere without a movement check (initial placement).
    pub fn place_character(&mut self, name: &str, location: &str) -> Result<(), ContinuityError> {
        self.character_mut(name)?.set_location(location.to_string());
        self.locations.add_location(location);
        Ok(())
    }

    /// Record a relationship and mirror it onto the other character when that
    /// character has no entry for the first.
    pub fn add_relationship(
        &mut self,
        name: &str,
        other: &str,
        description: &str,
    ) -> Result<(), ContinuityError> {
        if !self.characters.contains_key(other) {
            return Err(ContinuityError::new(ContinuityErrorKind::UnknownCharacter(
                other.to_string(),
            )));
        }
        self.character_mut(name)?.set_relationship(other, description);
        self.character_mut(other)?.relate(name, description);
        Ok(())
    }

    /// Mark a character's first appearance; later chapters never overwrite it.
    pub fn mark_appearance(&mut self, name: &str, chapter: usize) -> Result<bool, ContinuityError> {
        let first = self.character_mut(name)?.mark_appearance(chapter);
        if first {
            info!(name, chapter, "Character first appearance");
        }
        Ok(first)
    }

    /// Known characters whose name occurs in `text`.
    ///
    /// A character matches on the full name or, for multi-word names, on
    /// the first name, as a whole word and case-sensitively. First names that
    /// are also common words ("Will", "May") only match as part of the full name.
    pub fn referenced_characters(&self, text: &str) -> BTreeSet<String> {
        self.characters
            .keys()
            .filter(|name| match self.name_index.0.get(name.as_str()) {
                Some(re) => re.is_match(text),
                None => name_pattern(name).is_some_and(|re| re.is_match(text)),
            })
            .cloned()
            .collect()
    }

    /// Characters introduced in a chapter before `chapter`.
    pub fn introduced_characters(&self, chapter: usize) -> Vec<&Character> {
        self.characters
            .values()
            .filter(|c| c.has_appeared() && *c.first_appearance() < chapter)
            .collect()
    }

    // ----- locations -----

    /// Add a location to the graph.
    pub fn add_location(&mut self, location: impl Into<String>) -> bool {
        self.locations.add_location(location)
    }

    /// Add a directed transition with a travel cost.
    pub fn add_transition(&mut self, from: impl Into<String>, to: impl Into<String>, cost: u32) {
        self.locations.add_transition(from, to, cost)
    }

    /// Whether `character` may move to `new_location` in `elapsed` time units.
    ///
    /// An empty graph or a character without a known location permits the
    /// move. Otherwise the cheapest route must exist and cost no more than
    /// `elapsed`.
    pub fn validate_movement(&self, character: &str, new_location: &str, elapsed: u32) -> bool {
        if self.locations.is_empty() {
            return true;
        }
        let Some(current) = self.characters.get(character).and_then(|c| c.location().clone())
        else {
            return true;
        };
        self.locations.permits(&current, new_location, elapsed)
    }

    /// Fewest-hop route between two locations, empty when unreachable.
    pub fn find_path(&self, from: &str, to: &str) -> Vec<String> {
        self.locations.find_path(from, to)
    }

    // ----- plot threads -----

    /// Add a thread; an existing thread of the same name is kept.
    pub fn add_plot_thread(&mut self, thread: PlotThread) -> bool {
        if self.plot_threads.contains_key(thread.name()) {
            return false;
        }
        debug!(thread = %thread.name(), "Recording plot thread");
        self.plot_threads.insert(thread.name().clone(), thread);
        true
    }

    /// Look up a thread.
    pub fn plot_thread(&self, name: &str) -> Option<&PlotThread> {
        self.plot_threads.get(name)
    }

    /// Threads that are still active.
    pub fn active_plot_threads(&self) -> Vec<&PlotThread> {
        self.plot_threads.values().filter(|t| t.is_active()).collect()
    }

    /// Append an event to a thread and add it to the completed-event set.
    ///
    /// The thread resolves on its own once every resolution condition is
    /// completed. Closed threads reject events; every dependency must exist
    /// and be active or resolved.
    pub fn advance_plot_thread(
        &mut self,
        name: &str,
        event: &str,
    ) -> Result<ThreadStatus, ContinuityError> {
        let thread = self.plot_threads.get(name).ok_or_else(|| {
            ContinuityError::new(ContinuityErrorKind::UnknownThread(name.to_string()))
        })?;
        if !thread.is_active() {
            return Err(ContinuityError::new(ContinuityErrorKind::ThreadClosed(
                name.to_string(),
            )));
        }
        for dependency in thread.dependencies() {
            let met = self
                .plot_threads
                .get(dependency)
                .is_some_and(|d| *d.status() != ThreadStatus::Abandoned);
            if !met {
                return Err(ContinuityError::new(ContinuityErrorKind::DependencyNotMet {
                    thread: name.to_string(),
                    dependency: dependency.clone(),
                }));
            }
        }

        let event = event.trim().to_string();
        self.completed_events.insert(event.clone());
        let completed = &self.completed_events;
        let thread = self.plot_threads.get_mut(name).ok_or_else(|| {
            ContinuityError::new(ContinuityErrorKind::UnknownThread(name.to_string()))
        })?;
        thread.push_event(event);
        if thread.can_resolve(completed) {
            thread.set_status(ThreadStatus::Resolved);
            info!(thread = name, "Plot thread resolved");
        }
        Ok(*thread.status())
    }

    /// Whether a thread's resolution conditions are all completed.
    pub fn can_resolve(&self, name: &str) -> Result<bool, ContinuityError> {
        self.plot_threads
            .get(name)
            .map(|t| t.can_resolve(&self.completed_events))
            .ok_or_else(|| {
                ContinuityError::new(ContinuityErrorKind::UnknownThread(name.to_string()))
            })
    }

    /// Resolve a thread explicitly; fails while conditions are missing.
    pub fn resolve_plot_thread(&mut self, name: &str) -> Result<(), ContinuityError> {
        let completed = &self.completed_events;
        let thread = self.plot_threads.get_mut(name).ok_or_else(|| {
            ContinuityError::new(ContinuityErrorKind::UnknownThread(name.to_string()))
        })?;
        match *thread.status() {
            ThreadStatus::Resolved => Ok(()),
            ThreadStatus::Abandoned => Err(ContinuityError::new(ContinuityErrorKind::ThreadClosed(
                name.to_string(),
            ))),
            ThreadStatus::Active => {
                let missing = thread.missing_conditions(completed);
                if !missing.is_empty() {
                    return Err(ContinuityError::new(
                        ContinuityErrorKind::UnresolvedConditions {
                            thread: name.to_string(),
                            missing,
                        },
                    ));
                }
                thread.set_status(ThreadStatus::Resolved);
                Ok(())
            }
        }
    }

    /// Abandon an active thread.
    pub fn abandon_plot_thread(&mut self, name: &str) -> Result<(), ContinuityError> {
        let thread = self.plot_threads.get_mut(name).ok_or_else(|| {
            ContinuityError::new(ContinuityErrorKind::UnknownThread(name.to_string()))
        })?;
        if !thread.is_active() {
            return Err(ContinuityError::new(ContinuityErrorKind::ThreadClosed(
                name.to_string(),
            )));
        }
        thread.set_status(ThreadStatus::Abandoned);
        Ok(())
    }

    // ----- timeline, arc, summaries -----

    /// Record a chapter's timeline entry; entries are write-once.
    pub fn record_timeline(
        &mut self,
        chapter: usize,
        entry: TimelineEntry,
    ) -> Result<(), ContinuityError> {
        if self.timeline.record(chapter, entry) {
            Ok(())
        } else {
            Err(ContinuityError::new(ContinuityErrorKind::TimelineEntryExists(chapter)))
        }
    }

    /// Record a chapter's emotional beat; the first write wins.
    pub fn record_emotion(&mut self, chapter: usize, beat: EmotionalBeat) -> bool {
        self.emotional_arc.record(chapter, beat)
    }

    /// Store a chapter summary unless one exists.
    pub fn record_summary(&mut self, chapter: usize, summary: impl Into<String>) -> bool {
        if self.summaries.contains_key(&chapter) {
            return false;
        }
        self.summaries.insert(chapter, summary.into());
        true
    }

    /// Summary of a chapter.
    pub fn summary(&self, chapter: usize) -> Option<&str> {
        self.summaries.get(&chapter).map(String::as_str)
    }

    /// Compact text projection of the state through `up_to_chapter`.
    ///
    /// Carries the world name, prior summaries, a character status table and a
    /// timeline table. Characters not yet introduced are left out.
    pub fn render_projection(&self, up_to_chapter: usize) -> String {
        let mut out = String::new();
        if !self.world_name.is_empty() {
            out.push_str(&format!("WORLD: {}\n\n", self.world_name));
        }

        out.push_str("PRIOR CHAPTERS:\n");
        let prior: Vec<_> = self.summaries.range(..up_to_chapter).collect();
        if prior.is_empty() {
            out.push_str("- none\n");
        }
        for (chapter, summary) in prior {
            out.push_str(&format!("- Chapter {}: {}\n", chapter, summary));
        }

        out.push_str("\nCHARACTERS (name | status | first appearance | location):\n");
        let introduced = self.introduced_characters(up_to_chapter);
        if introduced.is_empty() {
            out.push_str("- none introduced yet\n");
        }
        for character in introduced {
            out.push_str(&format!(
                "- {} | {} | chapter {} | {}\n",
                character.name(),
                character.status(),
                character.first_appearance(),
                character.location().as_deref().unwrap_or("unknown"),
            ));
        }

        out.push_str("\nTIMELINE:\n");
        let mut any = false;
        for (chapter, entry) in self.timeline.iter().filter(|(c, _)| **c < up_to_chapter) {
            any = true;
            out.push_str(&format!("- Chapter {}: {}\n", chapter, entry.describe()));
        }
        if !any {
            out.push_str("- no entries\n");
        }
        out
    }
}

/// First names that read as ordinary words at the start of a sentence.
const ALIAS_STOPLIST: &[&str] = &[
    "Will", "May", "Mark", "Rose", "Grace", "Hope", "Faith", "Joy", "June", "April", "August",
    "Bill", "Pat", "Sue", "Art", "Guy", "Dawn", "Eve", "Summer", "Hunter", "Chance", "Sky",
];

/// Whole-word pattern for a character name and its first name.
fn name_pattern(name: &str) -> Option<Regex> {
    let mut alternatives = vec![regex::escape(name)];
    let words: Vec<&str> = name.split_whitespace().collect();
    if words.len() > 1 && words[0].chars().count() >= 3 && !ALIAS_STOPLIST.contains(&words[0]) {
        alternatives.push(regex::escape(words[0]));
    }
    Regex::new(&format!(r"\b(?:{})\b", alternatives.join("|"))).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> ContinuityStore {
        let mut store = ContinuityStore::new("premise");
        for name in ["Mara Vance", "Oren", "Ilse"] {
            store.record_character(Character::named(name));
        }
        store
    }

    #[test]
    fn test_referenced_characters_whole_word() {
        let store = store();
        let found = store.referenced_characters("Mara waited. The Orenburg train was late.");
        assert_eq!(found.into_iter().collect::<Vec<_>>(), vec!["Mara Vance"]);
    }

    #[test]
    fn test_common_word_first_name_needs_full_name() {
        let mut store = store();
        store.record_character(Character::named("Will Harrow"));
        let found = store.referenced_characters("Will the tide turn? Mara doubted it.");
        assert!(!found.contains("Will Harrow"));
        let found = store.referenced_characters("Will Harrow rowed out alone.");
        assert!(found.contains("Will Harrow"));
    }

    #[test]
    fn test_deserialized_store_still_matches_names() {
        let store = store();
        let json = serde_json::to_string(&store).unwrap();
        let restored: ContinuityStore = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, store);
        let found = restored.referenced_characters("Oren and Mara met at dawn.");
        assert_eq!(
            found.into_iter().collect::<Vec<_>>(),
            vec!["Mara Vance", "Oren"]
        );
    }

    #[test]
    fn test_introduced_excludes_future_and_unseen() {
        let mut store = store();
        store.mark_appearance("Mara Vance", 1).unwrap();
        store.mark_appearance("Oren", 3).unwrap();
        let names: Vec<_> = store
            .introduced_characters(3)
            .into_iter()
            .map(|c| c.name().clone())
            .collect();
        assert_eq!(names, vec!["Mara Vance"]);
    }

    #[test]
    fn test_relationship_mirrored_only_when_absent() {
        let mut store = store();
        store.add_relationship("Oren", "Ilse", "sister").unwrap();
        assert_eq!(store.character("Ilse").unwrap().relationships()["Oren"], "sister");
        store.add_relationship("Ilse", "Oren", "rival").unwrap();
        assert_eq!(store.character("Ilse").unwrap().relationships()["Oren"], "rival");
        assert_eq!(store.character("Oren").unwrap().relationships()["Ilse"], "sister");
        assert!(store.add_relationship("Oren", "Nobody", "x").is_err());
    }

    #[test]
    fn test_update_unknown_character_errors() {
        let mut store = store();
        let err = store
            .update_character_status("Nobody", 1, CharacterUpdate::default())
            .unwrap_err();
        assert!(matches!(err.kind, ContinuityErrorKind::UnknownCharacter(_)));
    }

    #[test]
    fn test_motifs_capped_and_rotated() {
        let mut store = store();
        store.set_motifs(
            ["bells", "salt", "bells", "ash", "lanterns", "gulls", "rope"]
                .into_iter()
                .map(String::from),
        );
        assert_eq!(store.motifs().len(), MAX_MOTIFS);
        assert_eq!(store.motif_for(0), Some("bells"));
        assert_eq!(store.motif_for(6), Some("salt"));
    }

    #[test]
    fn test_projection_hides_unintroduced_characters() {
        let mut store = store();
        store.set_world_name("Saltmere");
        store.mark_appearance("Mara Vance", 1).unwrap();
        store.record_summary(1, "Mara finds the bell.");
        let projection = store.render_projection(2);
        assert!(projection.contains("WORLD: Saltmere"));
        assert!(projection.contains("Chapter 1: Mara finds the bell."));
        assert!(projection.contains("Mara Vance | alive | chapter 1"));
        assert!(!projection.contains("Oren"));
    }
}
