//! Projecting finalized chapters back into the continuity store.
//!
//! Extraction and application are separate steps. [`StateUpdater::extract`]
//! talks to the backend and reads the store; [`StateUpdater::apply`] is
//! synchronous and is the only place a chapter's observations are written.
//!
//! The extraction answer is a fixed line format:
//!
//! ```text
//! Mara Vance: injured | learned the bell is real | Oren: wary ally | Tower | afraid
//! TIME_ELAPSED: two days
//! TIME_UNITS: 2
//! END_TIME: dusk of the second day
//! TIME_MARKERS: the next morning, at dusk
//! EMOTION: dread
//! TENSION: 7
//! UNRESOLVED: who rang the bell
//! THREAD: The Drowned Bell | EVENT: the bell is raised
//! ```
//!
//! Lines that fit none of these shapes are skipped and counted.

use crate::client::{GenerationClient, PromptSpec, is_cancellation};
use crate::prompts::{self, roles};
use derive_getters::Getters;
use scriptorium_continuity::{
    Chapter, CharacterStatus, CharacterUpdate, ContinuityStore, EmotionalBeat, ThreadStatus,
    TimelineEntry,
};
use scriptorium_error::ScriptoriumResult;
use scriptorium_interface::ScriptoriumDriver;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info, warn};

/// Values the extractor writes when a field does not apply.
fn meaningful(text: &str) -> Option<String> {
    let text = text.trim().trim_matches(['"', '.']).trim();
    match text.to_lowercase().as_str() {
        "" | "none" | "-" | "n/a" | "na" | "unchanged" | "same" | "unknown" | "no change" => None,
        _ => Some(text.to_string()),
    }
}

fn first_number<T: std::str::FromStr>(text: &str) -> Option<T> {
    text.split(|c: char| !c.is_ascii_digit())
        .find(|s| !s.is_empty())
        .and_then(|s| s.parse().ok())
}

/// One character's observations in a chapter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Getters)]
pub struct CharacterRecord {
    name: String,
    status: Option<CharacterStatus>,
    development: Option<String>,
    /// Other character and relationship description
    relationships: Vec<(String, String)>,
    location: Option<String>,
    emotion: Option<String>,
}

impl CharacterRecord {
    /// Read `name` and the `|`-separated fields after it.
    ///
    /// Missing trailing fields are absent rather than an error.
    ///
    /// ```
    /// use scriptorium_narrative::CharacterRecord;
    ///
    /// let record = CharacterRecord::parse("Oren", "dead | none").unwrap();
    /// assert_eq!(record.status().as_ref().map(|s| s.to_string()).as_deref(), Some("dead"));
    /// assert!(record.development().is_none());
    /// assert!(record.location().is_none());
    /// ```
    pub fn parse(name: &str, fields: &str) -> Option<Self> {
        let name = name.trim().trim_matches('*').trim();
        if name.is_empty() || !fields.contains('|') {
            return None;
        }
        let mut parts = fields.split('|');
        let mut next = || parts.next().and_then(meaningful);
        let status = next().map(|s| CharacterStatus::parse(&s));
        let development = next();
        let relationships = next().map(|r| parse_relationships(&r)).unwrap_or_default();
        let location = next();
        let emotion = next();
        Some(Self {
            name: name.to_string(),
            status,
            development,
            relationships,
            location,
            emotion,
        })
    }
}

fn parse_relationships(text: &str) -> Vec<(String, String)> {
    text.split(';')
        .filter_map(|part| {
            let (other, description) = part
                .split_once(':')
                .or_else(|| part.split_once(" - "))
                .or_else(|| {
                    let (other, rest) = part.split_once('(')?;
                    Some((other, rest.trim_end_matches(')')))
                })?;
            let other = other.trim();
            let description = meaningful(description)?;
            (!other.is_empty()).then(|| (other.to_string(), description))
        })
        .collect()
}

/// Everything extracted from one finalized chapter.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Getters)]
pub struct StateDelta {
    chapter: usize,
    characters: Vec<CharacterRecord>,
    timeline: Option<TimelineEntry>,
    emotion: Option<EmotionalBeat>,
    /// Thread name and event text
    thread_events: Vec<(String, String)>,
    summary: Option<String>,
    /// Known characters named in the chapter text
    referenced: BTreeSet<String>,
    /// Lines of the extraction answer that fit no record shape
    skipped_lines: usize,
}

impl StateDelta {
    /// An empty delta for a chapter.
    pub fn empty(chapter: usize) -> Self {
        Self {
            chapter,
            ..Self::default()
        }
    }

    /// Parse an extraction answer.
    pub fn parse(chapter: usize, answer: &str) -> Self {
        let mut delta = Self::empty(chapter);
        let mut elapsed = None;
        let mut units = None;
        let mut end_time = None;
        let mut markers = Vec::new();
        let mut emotion = None;
        let mut tension = None;
        let mut unresolved = None;

        for raw in answer.lines() {
            let line = raw.trim().trim_start_matches(['-', '*', '•']).replace("**", "");
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let Some((key, value)) = line.split_once(':') else {
                delta.skipped_lines += 1;
                continue;
            };
            let tag = key.trim().to_uppercase().replace([' ', '-'], "_");
            match tag.as_str() {
                "CHARACTERS" | "CHARACTER_UPDATES" if value.trim().is_empty() => {}
                "TIME_ELAPSED" => elapsed = meaningful(value),
                "TIME_UNITS" => units = first_number(value),
                "END_TIME" => end_time = meaningful(value),
                "TIME_MARKERS" => {
                    markers = value.split(',').filter_map(meaningful).collect();
                }
                "EMOTION" => emotion = meaningful(value),
                "TENSION" => tension = first_number::<u8>(value),
                "UNRESOLVED" => unresolved = meaningful(value),
                "SUMMARY" => delta.summary = meaningful(value),
                "THREAD" => match parse_thread_event(value) {
                    Some(event) => delta.thread_events.push(event),
                    None => delta.skipped_lines += 1,
                },
                _ => match CharacterRecord::parse(key, value) {
                    Some(record) => delta.characters.push(record),
                    None => delta.skipped_lines += 1,
                },
            }
        }

        if elapsed.is_some() || units.is_some() || end_time.is_some() || !markers.is_empty() {
            delta.timeline = Some(TimelineEntry::new(
                elapsed.unwrap_or_default(),
                units,
                end_time.unwrap_or_default(),
                markers,
            ));
        }
        if let Some(emotion) = emotion {
            delta.emotion = Some(EmotionalBeat::new(
                emotion,
                tension.unwrap_or(5),
                unresolved.unwrap_or_default(),
            ));
        }
        debug!(
            chapter,
            characters = delta.characters.len(),
            threads = delta.thread_events.len(),
            skipped = delta.skipped_lines,
            "Extraction parsed"
        );
        delta
    }

    /// Redo the name scan, for when the text changed after extraction.
    pub fn rescan(&mut self, text: &str, store: &ContinuityStore) {
        self.referenced = store.referenced_characters(text);
    }

    /// Use `summary` unless the delta already has one.
    pub fn fill_summary(&mut self, summary: impl Into<String>) {
        if self.summary.is_none() {
            self.summary = meaningful(&summary.into());
        }
    }

    /// Development notes keyed by the store's character names.
    pub fn developments(&self, store: &ContinuityStore) -> BTreeMap<String, String> {
        self.characters
            .iter()
            .filter_map(|r| {
                let name = resolve_character(store, &r.name)?;
                Some((name, r.development.clone()?))
            })
            .collect()
    }

    /// Threads the chapter advanced.
    pub fn advanced_threads(&self) -> BTreeSet<String> {
        self.thread_events.iter().map(|(t, _)| t.clone()).collect()
    }
}

fn parse_thread_event(value: &str) -> Option<(String, String)> {
    let (thread, event) = value.split_once('|')?;
    let event = event.trim();
    let event = match event.split_once(':') {
        Some((tag, text)) if tag.trim().eq_ignore_ascii_case("event") => text,
        _ => event,
    };
    let thread = meaningful(thread)?;
    let event = meaningful(event)?;
    Some((thread, event))
}

/// The store's name for a character as the extractor wrote it.
fn resolve_character(store: &ContinuityStore, name: &str) -> Option<String> {
    let name = name.trim();
    if store.character(name).is_some() {
        return Some(name.to_string());
    }
    let lower = name.to_lowercase();
    let names = store.characters().keys();
    if let Some(exact) = names.clone().find(|k| k.to_lowercase() == lower) {
        return Some(exact.clone());
    }
    let mut by_first_name = names.filter(|k| {
        k.split_whitespace()
            .next()
            .is_some_and(|first| first.to_lowercase() == lower)
    });
    match (by_first_name.next(), by_first_name.next()) {
        (Some(only), None) => Some(only.clone()),
        _ => None,
    }
}

fn resolve_thread(store: &ContinuityStore, name: &str) -> Option<String> {
    let lower = name.trim().to_lowercase();
    store
        .plot_threads()
        .keys()
        .find(|k| k.to_lowercase() == lower)
        .cloned()
}

/// What applying a delta changed and what it refused.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, Getters)]
pub struct UpdateReport {
    first_appearances: Vec<String>,
    developments: usize,
    status_changes: usize,
    moves: usize,
    rejected_moves: Vec<String>,
    unknown_characters: Vec<String>,
    thread_events: usize,
    resolved_threads: Vec<String>,
    skipped_events: Vec<String>,
    skipped_lines: usize,
}

/// Extracts chapter deltas and applies them to the store.
#[derive(Debug, Clone, Default)]
pub struct StateUpdater;

impl StateUpdater {
    /// Create an updater.
    pub fn new() -> Self {
        Self
    }

    /// Extract a chapter's state changes without touching the store.
    ///
    /// Backend failures degrade: a failed extraction leaves only the name
    /// scan, and a failed summary falls back to `fallback_summary`.
    #[tracing::instrument(skip_all, fields(chapter = chapter.number()))]
    pub async fn extract<D: ScriptoriumDriver>(
        &self,
        client: &GenerationClient<D>,
        chapter: &Chapter,
        store: &ContinuityStore,
        fallback_summary: &str,
    ) -> ScriptoriumResult<StateDelta> {
        let number = *chapter.number();
        let text = chapter.clean_text();
        let known: Vec<String> = store.characters().keys().cloned().collect();
        let threads: Vec<String> = store
            .active_plot_threads()
            .iter()
            .map(|t| t.name().clone())
            .collect();

        let spec = PromptSpec::new(
            roles::STATE_EXTRACTOR,
            prompts::extraction(&text, &known, &threads),
        )
        .with_temperature(0.2)
        .with_min_words(client.short_min_words(3));
        let mut delta = match client.generate(&spec).await {
            Ok(answer) => StateDelta::parse(number, &answer),
            Err(e) if is_cancellation(&e) => return Err(e),
            Err(e) => {
                warn!(error = %e, "State extraction failed, keeping the name scan only");
                StateDelta::empty(number)
            }
        };
        delta.rescan(chapter.text(), store);

        if delta.summary.is_none() {
            let spec = PromptSpec::new(roles::SUMMARIZER, prompts::summary(&text))
                .with_temperature(0.3)
                .with_min_words(client.short_min_words(5));
            match client.generate(&spec).await {
                Ok(summary) => delta.fill_summary(summary),
                Err(e) if is_cancellation(&e) => return Err(e),
                Err(e) => warn!(error = %e, "Summary request failed, using the plan summary"),
            }
            delta.fill_summary(fallback_summary);
        }
        Ok(delta)
    }

    /// Write a delta into the store.
    ///
    /// Re-applying the same delta adds nothing: first appearances,
    /// developments, timeline and emotional entries are all write-once per
    /// chapter, and events a thread already holds are not appended again.
    pub fn apply(&self, delta: &StateDelta, store: &mut ContinuityStore) -> UpdateReport {
        let chapter = delta.chapter;
        let mut report = UpdateReport {
            skipped_lines: delta.skipped_lines,
            ..UpdateReport::default()
        };

        for name in &delta.referenced {
            if let Ok(true) = store.mark_appearance(name, chapter) {
                report.first_appearances.push(name.clone());
            }
        }

        let units = delta.timeline.as_ref().and_then(|t| *t.units());
        for record in &delta.characters {
            let Some(name) = resolve_character(store, &record.name) else {
                debug!(name = %record.name, "Extraction named an unknown character");
                report.unknown_characters.push(record.name.clone());
                continue;
            };

            let location = record.location.as_ref().and_then(|destination| {
                let checkable = store.locations().contains(destination);
                match units {
                    Some(elapsed) if checkable && !store.validate_movement(&name, destination, elapsed) => {
                        warn!(
                            character = %name,
                            destination = %destination,
                            elapsed,
                            "Movement not reachable in the elapsed time, not applied"
                        );
                        report
                            .rejected_moves
                            .push(format!("{} -> {}", name, destination));
                        None
                    }
                    _ => Some(destination.clone()),
                }
            });

            let update = CharacterUpdate {
                status: record.status.clone(),
                development: record.development.clone(),
                location,
                emotion: record.emotion.clone(),
            };
            match store.update_character_status(&name, chapter, update) {
                Ok(outcome) => {
                    report.status_changes += usize::from(outcome.status_changed);
                    report.developments += usize::from(outcome.development_recorded);
                    report.moves += usize::from(outcome.moved);
                }
                Err(e) => warn!(error = %e, "Character update failed"),
            }

            for (other, description) in &record.relationships {
                if let Some(other) = resolve_character(store, other).filter(|o| *o != name) {
                    if let Err(e) = store.add_relationship(&name, &other, description) {
                        warn!(error = %e, "Relationship not recorded");
                    }
                }
            }
        }

        if let Some(entry) = &delta.timeline {
            if store.record_timeline(chapter, entry.clone()).is_err() {
                debug!(chapter, "Timeline entry already recorded");
            }
        }
        if let Some(beat) = &delta.emotion {
            store.record_emotion(chapter, beat.clone());
        }

        for (thread, event) in &delta.thread_events {
            let Some(name) = resolve_thread(store, thread) else {
                report.skipped_events.push(format!("{}: unknown thread", thread));
                continue;
            };
            let already = store
                .plot_thread(&name)
                .is_some_and(|t| t.key_events().iter().any(|e| e == event));
            if already {
                continue;
            }
            match store.advance_plot_thread(&name, event) {
                Ok(status) => {
                    report.thread_events += 1;
                    if status == ThreadStatus::Resolved {
                        report.resolved_threads.push(name);
                    }
                }
                Err(e) => {
                    warn!(thread = %name, error = %e, "Plot event skipped");
                    report.skipped_events.push(format!("{}: {}", name, e));
                }
            }
        }

        if let Some(summary) = &delta.summary {
            store.record_summary(chapter, summary.as_str());
        }

        info!(
            chapter,
            first_appearances = report.first_appearances.len(),
            developments = report.developments,
            moves = report.moves,
            rejected_moves = report.rejected_moves.len(),
            thread_events = report.thread_events,
            "Continuity state updated"
        );
        report
    }

    /// Extract and apply in one step.
    pub async fn update<D: ScriptoriumDriver>(
        &self,
        client: &GenerationClient<D>,
        chapter: &Chapter,
        store: &mut ContinuityStore,
        fallback_summary: &str,
    ) -> ScriptoriumResult<UpdateReport> {
        let delta = self.extract(client, chapter, store, fallback_summary).await?;
        Ok(self.apply(&delta, store))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scriptorium_continuity::{Character, PlotThread};

    const ANSWER: &str = "CHARACTERS:\n\
- Mara Vance: injured | learned the bell is real | Oren: wary ally | Market | afraid\n\
**Oren**: none | none\n\
Nobody: alive | arrived\n\
this line is noise\n\
TIME_ELAPSED: one day\nTIME_UNITS: 1\nEND_TIME: dusk\nTIME_MARKERS: the next morning, at dusk\n\
EMOTION: dread\nTENSION: 12\nUNRESOLVED: who rang the bell\n\
THREAD: the drowned bell | EVENT: bell raised\n\
THREAD: Missing Thread | EVENT: something\n";

    fn store() -> ContinuityStore {
        let mut store = ContinuityStore::new("premise");
        store.record_character(Character::named("Mara Vance"));
        store.record_character(Character::named("Oren"));
        store.add_transition("Harbor", "Market", 1);
        store.add_transition("Market", "Tower", 2);
        store.place_character("Mara Vance", "Harbor").unwrap();
        store.add_plot_thread(
            PlotThread::builder()
                .name("The Drowned Bell")
                .resolution_conditions(vec!["bell raised".to_string()])
                .build()
                .unwrap(),
        );
        store
    }

    #[test]
    fn test_parse_tolerates_noise() {
        let delta = StateDelta::parse(2, ANSWER);
        assert_eq!(delta.characters().len(), 3);
        assert_eq!(*delta.skipped_lines(), 1);
        let mara = &delta.characters()[0];
        assert_eq!(mara.name(), "Mara Vance");
        assert_eq!(*mara.status(), Some(CharacterStatus::Injured));
        assert_eq!(mara.relationships(), &vec![("Oren".to_string(), "wary ally".to_string())]);
        assert_eq!(mara.location().as_deref(), Some("Market"));
        let timeline = delta.timeline().as_ref().unwrap();
        assert_eq!(*timeline.units(), Some(1));
        assert_eq!(timeline.markers().len(), 2);
        assert_eq!(*delta.emotion().as_ref().unwrap().tension(), 10);
        assert_eq!(delta.thread_events().len(), 2);
    }

    #[test]
    fn test_apply_reports_and_resolves() {
        let mut store = store();
        let mut delta = StateDelta::parse(1, ANSWER);
        delta.rescan("Mara Vance walked with Oren.", &store);
        let report = StateUpdater::new().apply(&delta, &mut store);

        assert_eq!(report.first_appearances(), &vec!["Mara Vance".to_string(), "Oren".to_string()]);
        assert_eq!(report.unknown_characters(), &vec!["Nobody".to_string()]);
        assert_eq!(*report.moves(), 1);
        assert_eq!(report.resolved_threads(), &vec!["The Drowned Bell".to_string()]);
        assert_eq!(report.skipped_events().len(), 1);

        let oren = store.character("Oren").unwrap();
        assert_eq!(oren.relationships().get("Mara Vance").map(String::as_str), Some("wary ally"));
        assert_eq!(store.character("Mara Vance").unwrap().location().as_deref(), Some("Market"));
    }

    #[test]
    fn test_unreachable_move_rejected() {
        let mut store = store();
        let delta = StateDelta::parse(
            1,
            "Mara Vance: alive | climbed | none | Tower | calm\nTIME_UNITS: 1",
        );
        let report = StateUpdater::new().apply(&delta, &mut store);
        assert_eq!(report.rejected_moves().len(), 1);
        assert_eq!(store.character("Mara Vance").unwrap().location().as_deref(), Some("Harbor"));
        assert_eq!(store.character("Mara Vance").unwrap().development_log().len(), 1);
    }

    #[test]
    fn test_reapplying_adds_nothing() {
        let mut store = store();
        let mut delta = StateDelta::parse(1, ANSWER);
        delta.rescan("Mara Vance", &store);
        let updater = StateUpdater::new();
        updater.apply(&delta, &mut store);
        let before = store.clone();
        let again = updater.apply(&delta, &mut store);
        assert_eq!(store, before);
        assert_eq!(*again.developments(), 0);
        assert!(again.first_appearances().is_empty());
    }

    #[test]
    fn test_first_name_resolution() {
        let store = store();
        assert_eq!(resolve_character(&store, "mara").as_deref(), Some("Mara Vance"));
        assert_eq!(resolve_character(&store, "OREN").as_deref(), Some("Oren"));
        assert_eq!(resolve_character(&store, "Ilse"), None);
    }
}
