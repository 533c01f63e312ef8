//! Book planning: outline, act balancing and store seeding.

use crate::client::{GenerationClient, PromptSpec, is_cancellation};
use crate::parser::{ParseTier, ShapeTemplate, StructuredResponseParser};
use crate::prompts::{self, roles};
use derive_getters::Getters;
use regex::Regex;
use scriptorium_continuity::{BookHeader, Character, ContinuityStore, MAX_MOTIFS, PlotThread};
use scriptorium_error::{BuilderError, PlanningError, PlanningErrorKind, ScriptoriumResult};
use scriptorium_interface::ScriptoriumDriver;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::LazyLock;
use tracing::{debug, info, warn};

static CHAPTER_HEADING: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r"(?im)^[ \t#*]*chapter[ \t]+(\d+)[ \t]*[:.\-–—]?[ \t]*(.*)$").ok()
});

static WORLD_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"\bNeo-[A-Z][A-Za-z]+\b",
        r"\b[A-Z][a-z]+land\b",
        r"\b[A-Z][a-z]+ (?:Kingdom|Empire|Realm|World|City)\b",
    ]
    .iter()
    .filter_map(|p| Regex::new(p).ok())
    .collect()
});

/// Capitalised words the world-name patterns catch that are not names.
const NOT_WORLD_NAMES: &[&str] = &[
    "Island", "Inland", "Mainland", "Homeland", "Wasteland", "Woodland", "Farmland",
    "Heartland", "Highland", "Lowland", "Midland", "Wetland", "Grassland", "Hinterland",
    "Borderland",
];

const NOT_NAME_PREFIXES: &[&str] = &["The", "A", "An", "This", "That", "Every", "Our", "Their"];

/// A character the author insists on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Getters)]
pub struct CharacterSeed {
    name: String,
    description: String,
}

impl CharacterSeed {
    /// Create a seed.
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
        }
    }

    /// Parse `"Name: description"`; text without a colon is a bare name.
    ///
    /// ```
    /// use scriptorium_narrative::CharacterSeed;
    ///
    /// let seed = CharacterSeed::parse("Mara Vance: a harbor pilot who hears bells");
    /// assert_eq!(seed.name(), "Mara Vance");
    /// assert_eq!(seed.description(), "a harbor pilot who hears bells");
    /// ```
    pub fn parse(text: &str) -> Self {
        match text.split_once(':') {
            Some((name, description)) => Self::new(name.trim(), description.trim()),
            None => Self::new(text.trim(), ""),
        }
    }
}

/// What to plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Getters, derive_setters::Setters)]
#[setters(prefix = "with_")]
pub struct PlanRequest {
    #[setters(skip)]
    num_chapters: usize,
    #[setters(skip)]
    premise: String,
    characters: Vec<CharacterSeed>,
    themes: Vec<String>,
}

impl PlanRequest {
    /// Plan `num_chapters` chapters for a premise.
    pub fn new(num_chapters: usize, premise: impl Into<String>) -> Self {
        Self {
            num_chapters,
            premise: premise.into(),
            characters: Vec::new(),
            themes: Vec::new(),
        }
    }

    /// Reject requests that cannot be planned.
    pub fn validate(&self) -> Result<(), PlanningError> {
        if self.num_chapters == 0 {
            return Err(PlanningError::new(PlanningErrorKind::InvalidChapterCount(0)));
        }
        if self.premise.trim().is_empty() {
            return Err(PlanningError::new(PlanningErrorKind::EmptyPremise));
        }
        Ok(())
    }
}

/// Three-act position of a chapter.
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
pub enum Act {
    /// Act 1
    Setup,
    /// Act 2
    Confrontation,
    /// Act 3
    Resolution,
}

/// Chapters per act for a book of `num_chapters`.
///
/// Acts 1 and 3 target a quarter of the book each, act 2 takes the rest, and
/// no act drops below one chapter. Rounding surplus comes out of act 2, then
/// act 1, then act 3. Books of three or fewer chapters get at most one
/// chapter per act: `1` is all setup and `2` skips the confrontation.
///
/// ```
/// use scriptorium_narrative::act_lengths;
///
/// assert_eq!(act_lengths(3), [1, 1, 1]);
/// assert_eq!(act_lengths(10), [3, 4, 3]);
/// assert_eq!(act_lengths(2), [1, 0, 1]);
/// ```
pub fn act_lengths(num_chapters: usize) -> [usize; 3] {
    match num_chapters {
        0 => return [0, 0, 0],
        1 => return [1, 0, 0],
        2 => return [1, 0, 1],
        3 => return [1, 1, 1],
        _ => {}
    }

    let quarter = ((num_chapters as f64) * 0.25).round().max(1.0) as usize;
    let mut acts = [quarter, 1, quarter];
    let mut total: usize = acts.iter().sum();
    while total < num_chapters {
        acts[1] += 1;
        total += 1;
    }
    // Surplus order: act 2, act 1, act 3
    while total > num_chapters {
        let Some(i) = [1, 0, 2].into_iter().find(|&i| acts[i] > 1) else {
            break;
        };
        acts[i] -= 1;
        total -= 1;
    }
    acts
}

fn act_for(position: usize, lengths: [usize; 3]) -> Act {
    if position <= lengths[0] {
        Act::Setup
    } else if position <= lengths[0] + lengths[1] {
        Act::Confrontation
    } else {
        Act::Resolution
    }
}

/// One chapter of the plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Getters)]
pub struct ChapterPlan {
    /// Plan entry, 1-based
    number: usize,
    title: String,
    summary: String,
    act: Act,
    characters: Vec<String>,
    locations: Vec<String>,
    plot_threads: Vec<String>,
}

/// A character as the outline describes it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutlineCharacter {
    /// Unique name
    pub name: String,
    /// History and role
    pub background: String,
    /// Temperament
    pub personality: String,
    /// What the character wants
    pub goals: String,
    /// Starting location, empty when unknown
    pub location: String,
}

/// A directed travel connection.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutlineConnection {
    /// Destination location
    pub to: String,
    /// Travel cost in narrative time units
    pub travel_time: f64,
}

/// A location with its outgoing connections.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutlineLocation {
    /// Location name
    pub name: String,
    /// Outgoing connections
    pub connections: Vec<OutlineConnection>,
}

/// A plot thread as the outline describes it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutlineThread {
    /// Unique thread name
    pub name: String,
    /// Characters involved
    pub characters: Vec<String>,
    /// Threads that must be active first
    pub dependencies: Vec<String>,
    /// Events that must happen before the thread resolves
    pub resolution_conditions: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
struct OutlineChapter {
    title: String,
    summary: String,
    characters: Vec<String>,
    locations: Vec<String>,
    plot_threads: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
struct Outline {
    title: String,
    subtitle: String,
    synopsis: String,
    world_name: String,
    chapters: Vec<OutlineChapter>,
    characters: Vec<OutlineCharacter>,
    locations: Vec<OutlineLocation>,
    plot_threads: Vec<OutlineThread>,
    motifs: Vec<String>,
}

/// The whole plan for a book.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Getters)]
pub struct BookPlan {
    header: BookHeader,
    world_name: String,
    chapters: Vec<ChapterPlan>,
    act_lengths: [usize; 3],
    characters: Vec<OutlineCharacter>,
    locations: Vec<OutlineLocation>,
    plot_threads: Vec<OutlineThread>,
    motifs: Vec<String>,
    /// Parser tier that read the outline
    tier: ParseTier,
}

/// Builds chapter plans and seeds the continuity store.
#[derive(Debug, Clone)]
pub struct PlotPlanner {
    parser: StructuredResponseParser,
}

impl PlotPlanner {
    /// Create a planner.
    pub fn new(parser: StructuredResponseParser) -> Self {
        Self { parser }
    }

    /// Shape of the outline record.
    pub fn outline_template() -> ShapeTemplate {
        ShapeTemplate::new(json!({
            "title": "",
            "subtitle": "",
            "synopsis": "",
            "world_name": "",
            "chapters": [{
                "title": "",
                "summary": "",
                "characters": [""],
                "locations": [""],
                "plot_threads": [""]
            }],
            "characters": [{
                "name": "",
                "background": "",
                "personality": "",
                "goals": "",
                "location": ""
            }],
            "locations": [{
                "name": "",
                "connections": [{"to": "", "travel_time": 1}]
            }],
            "plot_threads": [{
                "name": "",
                "characters": [""],
                "dependencies": [""],
                "resolution_conditions": [""]
            }],
            "motifs": [""]
        }))
    }

    /// Plan a book.
    ///
    /// # Errors
    ///
    /// Invalid requests and outlines with fewer distinct chapters than
    /// requested fail with a [`PlanningError`]; a failed outline request
    /// propagates its backend error.
    #[tracing::instrument(skip_all, fields(chapters = request.num_chapters()))]
    pub async fn plan<D: ScriptoriumDriver>(
        &self,
        client: &GenerationClient<D>,
        request: &PlanRequest,
    ) -> ScriptoriumResult<BookPlan> {
        request.validate()?;
        let template = Self::outline_template();
        let spec = PromptSpec::new(
            roles::PLANNER,
            prompts::outline(request, &template.to_prompt_json()),
        );
        let raw = client.generate(&spec).await?;

        let (outline, tier) = match self.parser.parse_as::<Outline, D>(client, &raw, &template).await {
            Ok(parsed) => parsed,
            Err(e) if is_cancellation(&e) => return Err(e),
            Err(e) => {
                warn!(error = %e, "Outline record unusable, scanning chapter headings only");
                (Outline::default(), ParseTier::KeyValue)
            }
        };
        debug!(%tier, chapters = outline.chapters.len(), "Outline parsed");

        let entries = select_entries(&outline.chapters, &raw, *request.num_chapters())?;
        let lengths = act_lengths(entries.len());
        let chapters = entries
            .into_iter()
            .enumerate()
            .map(|(i, entry)| ChapterPlan {
                number: i + 1,
                act: act_for(i + 1, lengths),
                title: entry.title,
                summary: entry.summary,
                characters: entry.characters,
                locations: entry.locations,
                plot_threads: entry.plot_threads,
            })
            .collect::<Vec<_>>();

        let world_name = match non_blank(&outline.world_name).or_else(|| detect_world_name(&raw)) {
            Some(name) => name,
            None => self.request_world_name(client, request, &raw).await?,
        };
        let motifs = if outline.motifs.iter().any(|m| !m.trim().is_empty()) {
            cap_motifs(outline.motifs)
        } else {
            self.request_motifs(client, request).await?
        };

        info!(
            chapters = chapters.len(),
            acts = ?lengths,
            world = %world_name,
            motifs = motifs.len(),
            "Book planned"
        );
        Ok(BookPlan {
            header: BookHeader::new(outline.title, outline.subtitle, outline.synopsis),
            world_name,
            chapters,
            act_lengths: lengths,
            characters: outline.characters,
            locations: outline.locations,
            plot_threads: outline.plot_threads,
            motifs,
            tier,
        })
    }

    async fn request_world_name<D: ScriptoriumDriver>(
        &self,
        client: &GenerationClient<D>,
        request: &PlanRequest,
        outline_text: &str,
    ) -> ScriptoriumResult<String> {
        let spec = PromptSpec::new(
            roles::WORLD_NAMER,
            prompts::world_name(request.premise(), outline_text),
        )
        .with_min_words(1);
        match client.generate(&spec).await {
            Ok(text) => Ok(clean_line(&text)),
            Err(e) if is_cancellation(&e) => Err(e),
            Err(e) => {
                warn!(error = %e, "World name request failed, leaving the world unnamed");
                Ok(String::new())
            }
        }
    }

    async fn request_motifs<D: ScriptoriumDriver>(
        &self,
        client: &GenerationClient<D>,
        request: &PlanRequest,
    ) -> ScriptoriumResult<Vec<String>> {
        let spec = PromptSpec::new(
            roles::MOTIF_WRITER,
            prompts::motifs(request.premise(), request.themes()),
        )
        .with_min_words(1);
        match client.generate(&spec).await {
            Ok(text) => Ok(cap_motifs(
                text.split([',', '\n'])
                    .map(|m| clean_line(m.trim_start_matches(['-', '*', ' '])))
                    .collect(),
            )),
            Err(e) if is_cancellation(&e) => Err(e),
            Err(e) => {
                warn!(error = %e, "Motif request failed, continuing without motifs");
                Ok(Vec::new())
            }
        }
    }

    /// Write the plan's initial state into a fresh store.
    ///
    /// The author's character seeds are recorded before the outline's own
    /// characters, whose profiles only fill fields the seeds left empty.
    pub fn seed(
        plan: &BookPlan,
        request: &PlanRequest,
        store: &mut ContinuityStore,
    ) -> ScriptoriumResult<()> {
        store.set_world_name(plan.world_name());
        store.set_motifs(plan.motifs().iter().cloned());

        for seed in request.characters() {
            let character = Character::builder()
                .name(seed.name().as_str())
                .background(seed.description().as_str())
                .build()
                .map_err(|e| BuilderError::from(e.to_string()))?;
            store.record_character(character);
        }
        for outlined in plan.characters().iter().filter(|c| !c.name.trim().is_empty()) {
            let character = Character::builder()
                .name(outlined.name.trim())
                .background(outlined.background.as_str())
                .personality(outlined.personality.as_str())
                .goals(outlined.goals.as_str())
                .build()
                .map_err(|e| BuilderError::from(e.to_string()))?;
            store.record_character(character);
            if let Some(location) = non_blank(&outlined.location) {
                store.place_character(outlined.name.trim(), &location)?;
            }
        }
        // Planned characters the outline never profiled still need records
        for name in plan.chapters().iter().flat_map(|c| c.characters()) {
            if !name.trim().is_empty() && store.character(name.trim()).is_none() {
                store.record_character(Character::named(name.trim()));
            }
        }

        for location in plan.locations().iter().filter(|l| !l.name.trim().is_empty()) {
            store.add_location(location.name.trim());
            for connection in location.connections.iter().filter(|c| !c.to.trim().is_empty()) {
                let cost = connection.travel_time.max(0.0).round() as u32;
                store.add_transition(location.name.trim(), connection.to.trim(), cost);
            }
        }
        for location in plan.chapters().iter().flat_map(|c| c.locations()) {
            if !location.trim().is_empty() {
                store.add_location(location.trim());
            }
        }

        for thread in plan.plot_threads().iter().filter(|t| !t.name.trim().is_empty()) {
            let thread = PlotThread::builder()
                .name(thread.name.trim())
                .characters(thread.characters.clone())
                .dependencies(thread.dependencies.clone())
                .resolution_conditions(thread.resolution_conditions.clone())
                .build()
                .map_err(|e| BuilderError::from(e.to_string()))?;
            store.add_plot_thread(thread);
        }

        info!(
            characters = store.characters().len(),
            threads = store.plot_threads().len(),
            "Continuity store seeded"
        );
        Ok(())
    }
}

/// Distinct, usable chapter entries, at most `requested` of them.
fn select_entries(
    structured: &[OutlineChapter],
    raw: &str,
    requested: usize,
) -> Result<Vec<OutlineChapter>, PlanningError> {
    let mut entries = distinct(structured.to_vec());
    if entries.len() < requested {
        let scanned = distinct(scan_chapter_sections(raw));
        debug!(
            structured = entries.len(),
            scanned = scanned.len(),
            "Outline short of chapters, scanned headings"
        );
        if scanned.len() > entries.len() {
            entries = scanned;
        }
    }
    if entries.len() < requested {
        return Err(PlanningError::new(PlanningErrorKind::TooFewChapters {
            expected: requested,
            found: entries.len(),
        }));
    }
    entries.truncate(requested);
    Ok(entries)
}

fn distinct(entries: Vec<OutlineChapter>) -> Vec<OutlineChapter> {
    let mut seen = BTreeSet::new();
    entries
        .into_iter()
        .filter(|e| !e.summary.trim().is_empty())
        .filter(|e| seen.insert(e.summary.trim().to_lowercase()))
        .collect()
}

/// `Chapter N: Title` sections of a prose outline.
fn scan_chapter_sections(raw: &str) -> Vec<OutlineChapter> {
    let Some(re) = CHAPTER_HEADING.as_ref() else {
        return Vec::new();
    };
    let headings: Vec<_> = re.captures_iter(raw).collect();
    headings
        .iter()
        .enumerate()
        .filter_map(|(i, caps)| {
            let whole = caps.get(0)?;
            let body_end = headings
                .get(i + 1)
                .and_then(|next| next.get(0))
                .map(|m| m.start())
                .unwrap_or(raw.len());
            let title = clean_line(&caps[2]);
            let body = raw[whole.end()..body_end]
                .lines()
                .map(|l| l.trim().trim_start_matches("Summary:").trim())
                .filter(|l| !l.is_empty())
                .collect::<Vec<_>>()
                .join(" ");
            let summary = if body.is_empty() { title.clone() } else { body };
            Some(OutlineChapter {
                title: if title.is_empty() {
                    format!("Chapter {}", &caps[1])
                } else {
                    title
                },
                summary,
                ..OutlineChapter::default()
            })
        })
        .collect()
}

/// The most frequent name-like world reference in `text`.
///
/// ```
/// use scriptorium_narrative::detect_world_name;
///
/// let text = "In Neo-Carthage the towers hum. Everyone in Neo-Carthage hears them. Tidewater City is far.";
/// assert_eq!(detect_world_name(text).as_deref(), Some("Neo-Carthage"));
/// assert_eq!(detect_world_name("no names here"), None);
/// ```
pub fn detect_world_name(text: &str) -> Option<String> {
    let mut counts: BTreeMap<String, (usize, usize)> = BTreeMap::new();
    for re in WORLD_PATTERNS.iter() {
        for m in re.find_iter(text) {
            let name = m.as_str();
            let first_word = name.split_whitespace().next().unwrap_or(name);
            if NOT_WORLD_NAMES.contains(&name) || NOT_NAME_PREFIXES.contains(&first_word) {
                continue;
            }
            let entry = counts.entry(name.to_string()).or_insert((0, m.start()));
            entry.0 += 1;
            entry.1 = entry.1.min(m.start());
        }
    }
    counts
        .into_iter()
        .max_by(|(_, (ca, pa)), (_, (cb, pb))| ca.cmp(cb).then(pb.cmp(pa)))
        .map(|(name, _)| name)
}

fn cap_motifs(motifs: Vec<String>) -> Vec<String> {
    let mut seen = BTreeSet::new();
    motifs
        .into_iter()
        .map(|m| m.trim().to_string())
        .filter(|m| !m.is_empty() && seen.insert(m.to_lowercase()))
        .take(MAX_MOTIFS)
        .collect()
}

fn non_blank(text: &str) -> Option<String> {
    let text = text.trim();
    (!text.is_empty()).then(|| text.to_string())
}

/// First line, without markup or quotes.
fn clean_line(text: &str) -> String {
    text.lines()
        .next()
        .unwrap_or("")
        .replace("**", "")
        .trim()
        .trim_matches(['"', '\'', '.', '*'])
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_act_lengths_sum_for_every_size() {
        for n in 3..=60 {
            let acts = act_lengths(n);
            assert_eq!(acts.iter().sum::<usize>(), n, "n = {}", n);
            assert!(acts.iter().all(|&a| a >= 1), "n = {}: {:?}", n, acts);
        }
    }

    #[test]
    fn test_act_lengths_quarters() {
        assert_eq!(act_lengths(4), [1, 2, 1]);
        assert_eq!(act_lengths(6), [2, 2, 2]);
        assert_eq!(act_lengths(8), [2, 4, 2]);
        assert_eq!(act_lengths(12), [3, 6, 3]);
        assert_eq!(act_lengths(10), [3, 4, 3]);
        assert_eq!(act_lengths(18), [5, 8, 5]);
        assert_eq!(act_lengths(1), [1, 0, 0]);
    }

    #[test]
    fn test_act_for_positions() {
        let lengths = act_lengths(8);
        assert_eq!(act_for(2, lengths), Act::Setup);
        assert_eq!(act_for(3, lengths), Act::Confrontation);
        assert_eq!(act_for(7, lengths), Act::Resolution);
        assert_eq!(act_for(2, act_lengths(2)), Act::Resolution);
    }

    #[test]
    fn test_scan_chapter_sections() {
        let raw = "Outline\n\nChapter 1: Arrival\nMara lands at the harbor.\n\n\
**Chapter 2 - The Bell**\nSummary: The bell rings at night.\nChapter 3: Mara climbs the tower.";
        let entries = scan_chapter_sections(raw);
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].title, "Arrival");
        assert_eq!(entries[0].summary, "Mara lands at the harbor.");
        assert_eq!(entries[1].title, "The Bell");
        assert_eq!(entries[1].summary, "The bell rings at night.");
        assert_eq!(entries[2].summary, "Mara climbs the tower");
    }

    #[test]
    fn test_duplicate_entries_do_not_count() {
        let chapter = |summary: &str| OutlineChapter {
            title: "t".into(),
            summary: summary.into(),
            ..OutlineChapter::default()
        };
        let structured = vec![chapter("Same."), chapter("same."), chapter("Other.")];
        let err = select_entries(&structured, "", 3).unwrap_err();
        assert_eq!(
            err.kind,
            PlanningErrorKind::TooFewChapters {
                expected: 3,
                found: 2
            }
        );
        assert_eq!(select_entries(&structured, "", 1).unwrap().len(), 1);
    }

    #[test]
    fn test_world_name_ignores_common_words() {
        assert_eq!(detect_world_name("The Kingdom fell. An Island rose."), None);
        assert_eq!(
            detect_world_name("Eldoria Kingdom and Frostland; Frostland again.").as_deref(),
            Some("Frostland")
        );
    }

    #[test]
    fn test_request_validation() {
        assert!(PlanRequest::new(0, "premise").validate().is_err());
        assert!(PlanRequest::new(3, "  ").validate().is_err());
        assert!(PlanRequest::new(3, "premise").validate().is_ok());
    }

    #[test]
    fn test_cap_motifs() {
        let motifs = cap_motifs(
            ["salt", "Salt", "bells", "", "fog", "rope", "gulls", "lanterns"]
                .map(String::from)
                .to_vec(),
        );
        assert_eq!(motifs, vec!["salt", "bells", "fog", "rope", "gulls"]);
    }
}
