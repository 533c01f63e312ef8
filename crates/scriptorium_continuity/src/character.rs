//! Characters and their append-only histories.

use derive_getters::Getters;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Life status of a character.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
pub enum CharacterStatus {
    /// Alive and unharmed
    #[default]
    Alive,
    /// Dead; the character can be remembered but not act
    Dead,
    /// Alive but hurt
    Injured,
    /// Anything else the backend reports ("missing", "imprisoned")
    Custom(String),
}

impl CharacterStatus {
    /// Parse a free-text status.
    ///
    /// # Examples
    ///
    /// ```
    /// use scriptorium_continuity::CharacterStatus;
    ///
    /// assert_eq!(CharacterStatus::parse("Deceased"), CharacterStatus::Dead);
    /// assert_eq!(CharacterStatus::parse(" wounded "), CharacterStatus::Injured);
    /// assert_eq!(
    ///     CharacterStatus::parse("imprisoned"),
    ///     CharacterStatus::Custom("imprisoned".into())
    /// );
    /// ```
    pub fn parse(text: &str) -> Self {
        let lower = text.trim().to_lowercase();
        match lower.as_str() {
            "alive" | "living" | "healthy" | "well" => CharacterStatus::Alive,
            "dead" | "deceased" | "killed" | "slain" => CharacterStatus::Dead,
            "injured" | "wounded" | "hurt" => CharacterStatus::Injured,
            _ => CharacterStatus::Custom(text.trim().to_string()),
        }
    }
}

impl std::fmt::Display for CharacterStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CharacterStatus::Alive => write!(f, "alive"),
            CharacterStatus::Dead => write!(f, "dead"),
            CharacterStatus::Injured => write!(f, "injured"),
            CharacterStatus::Custom(s) => write!(f, "{}", s),
        }
    }
}

/// One entry of a character's status history.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StatusChange {
    /// Chapter in which the change was observed
    pub chapter: usize,
    /// Previous status
    pub from: CharacterStatus,
    /// New status
    pub to: CharacterStatus,
}

/// A tracked character.
///
/// `first_appearance` is 0 until the character is first referenced and then
/// never changes. Status and development histories only grow.
///
/// # Examples
///
/// ```
/// use scriptorium_continuity::Character;
///
/// let mara = Character::builder()
///     .name("Mara Vance")
///     .background("Harbor pilot")
///     .build()
///     .unwrap();
/// assert_eq!(*mara.first_appearance(), 0);
/// assert!(mara.development_log().is_empty());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Getters, derive_builder::Builder)]
#[builder(setter(into))]
pub struct Character {
    /// Unique name
    name: String,
    #[builder(default)]
    #[serde(default)]
    background: String,
    #[builder(default)]
    #[serde(default)]
    personality: String,
    #[builder(default)]
    #[serde(default)]
    goals: String,
    /// Other character name to relationship description
    #[builder(default)]
    #[serde(default)]
    relationships: BTreeMap<String, String>,
    /// Where the character currently is
    #[builder(default)]
    #[serde(default)]
    location: Option<String>,
    #[builder(default)]
    #[serde(default)]
    status: CharacterStatus,
    #[builder(default)]
    #[serde(default)]
    status_history: Vec<StatusChange>,
    /// Chapter number to development note, at most one per chapter
    #[builder(default)]
    #[serde(default)]
    development_log: BTreeMap<usize, String>,
    #[builder(default)]
    #[serde(default)]
    emotional_state: Option<String>,
    /// First chapter referencing the character, 0 when not yet seen
    #[builder(default)]
    #[serde(default)]
    first_appearance: usize,
}

impl Character {
    /// Create a builder for a character.
    pub fn builder() -> CharacterBuilder {
        CharacterBuilder::default()
    }

    /// Create a character with only a name.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            background: String::new(),
            personality: String::new(),
            goals: String::new(),
            relationships: BTreeMap::new(),
            location: None,
            status: CharacterStatus::Alive,
            status_history: Vec::new(),
            development_log: BTreeMap::new(),
            emotional_state: None,
            first_appearance: 0,
        }
    }

    /// Whether the character has been referenced in any chapter.
    pub fn has_appeared(&self) -> bool {
        self.first_appearance > 0
    }

    /// Record the first appearance; later calls are ignored.
    pub(crate) fn mark_appearance(&mut self, chapter: usize) -> bool {
        if self.first_appearance == 0 && chapter > 0 {
            self.first_appearance = chapter;
            true
        } else {
            false
        }
    }

    /// Append a status change if the status differs.
    pub(crate) fn change_status(&mut self, chapter: usize, status: CharacterStatus) -> bool {
        if self.status == status {
            return false;
        }
        let from = std::mem::replace(&mut self.status, status.clone());
        self.status_history.push(StatusChange {
            chapter,
            from,
            to: status,
        });
        true
    }

    /// Record a development note unless this chapter already has one.
    pub(crate) fn record_development(&mut self, chapter: usize, note: String) -> bool {
        if self.development_log.contains_key(&chapter) {
            return false;
        }
        self.development_log.insert(chapter, note);
        true
    }

    pub(crate) fn set_location(&mut self, location: String) {
        self.location = Some(location);
    }

    pub(crate) fn set_emotional_state(&mut self, emotion: String) {
        self.emotional_state = Some(emotion);
    }

    /// Insert a relationship, keeping an existing description for the same person.
    pub(crate) fn relate(&mut self, other: &str, description: &str) -> bool {
        if other == self.name || self.relationships.contains_key(other) {
            return false;
        }
        self.relationships
            .insert(other.to_string(), description.to_string());
        true
    }

    /// Overwrite a relationship description.
    pub(crate) fn set_relationship(&mut self, other: &str, description: &str) {
        if other != self.name {
            self.relationships
                .insert(other.to_string(), description.to_string());
        }
    }

    /// Fill empty profile fields from another record of the same character.
    pub(crate) fn merge_profile(&mut self, other: &Character) {
        if self.background.is_empty() {
            self.background = other.background.clone();
        }
        if self.personality.is_empty() {
            self.personality = other.personality.clone();
        }
        if self.goals.is_empty() {
            self.goals = other.goals.clone();
        }
    }

    /// One line for prompts and projections.
    pub fn profile_line(&self) -> String {
        let mut parts = vec![format!("{} ({})", self.name, self.status)];
        if !self.background.is_empty() {
            parts.push(self.background.clone());
        }
        if !self.personality.is_empty() {
            parts.push(format!("personality: {}", self.personality));
        }
        if !self.goals.is_empty() {
            parts.push(format!("goals: {}", self.goals));
        }
        if let Some(location) = &self.location {
            parts.push(format!("at {}", location));
        }
        if let Some(emotion) = &self.emotional_state {
            parts.push(format!("feeling {}", emotion));
        }
        if let Some((chapter, note)) = self.development_log.iter().next_back() {
            parts.push(format!("latest development (ch. {}): {}", chapter, note));
        }
        parts.join("; ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_appearance_set_once() {
        let mut c = Character::named("Ilse");
        assert!(!c.mark_appearance(0));
        assert!(c.mark_appearance(2));
        assert!(!c.mark_appearance(1));
        assert_eq!(c.first_appearance, 2);
    }

    #[test]
    fn test_status_history_appends_only_on_change() {
        let mut c = Character::named("Ilse");
        assert!(!c.change_status(1, CharacterStatus::Alive));
        assert!(c.change_status(2, CharacterStatus::Injured));
        assert!(c.change_status(4, CharacterStatus::Dead));
        assert_eq!(c.status_history.len(), 2);
        assert_eq!(c.status_history[0].from, CharacterStatus::Alive);
        assert_eq!(c.status_history[1].chapter, 4);
    }

    #[test]
    fn test_one_development_per_chapter() {
        let mut c = Character::named("Ilse");
        assert!(c.record_development(3, "learns the truth".into()));
        assert!(!c.record_development(3, "learns it again".into()));
        assert_eq!(c.development_log[&3], "learns the truth");
    }

    #[test]
    fn test_relate_ignores_self_and_existing() {
        let mut c = Character::named("Ilse");
        assert!(!c.relate("Ilse", "herself"));
        assert!(c.relate("Oren", "brother"));
        assert!(!c.relate("Oren", "rival"));
        assert_eq!(c.relationships["Oren"], "brother");
    }
}
