//! Plot threads.

use derive_getters::Getters;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Lifecycle of a plot thread.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Default,
    Serialize,
    Deserialize,
    strum::Display,
)]
#[strum(serialize_all = "lowercase")]
pub enum ThreadStatus {
    /// Open and accepting events
    #[default]
    Active,
    /// Every resolution condition was met
    Resolved,
    /// Dropped without resolution
    Abandoned,
}

/// A tracked narrative thread with explicit resolution conditions.
///
/// # Examples
///
/// ```
/// use scriptorium_continuity::{PlotThread, ThreadStatus};
///
/// let thread = PlotThread::builder()
///     .name("The stolen map")
///     .resolution_conditions(vec!["map recovered".to_string()])
///     .build()
///     .unwrap();
/// assert_eq!(*thread.status(), ThreadStatus::Active);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Getters, derive_builder::Builder)]
#[builder(setter(into))]
pub struct PlotThread {
    /// Unique name
    name: String,
    #[builder(default)]
    #[serde(default)]
    status: ThreadStatus,
    #[builder(default)]
    #[serde(default)]
    characters: Vec<String>,
    /// Append-only event log
    #[builder(default)]
    #[serde(default)]
    key_events: Vec<String>,
    /// Threads that must be active (or resolved) before this one advances
    #[builder(default)]
    #[serde(default)]
    dependencies: Vec<String>,
    /// Events that must all be completed before resolution
    #[builder(default)]
    #[serde(default)]
    resolution_conditions: Vec<String>,
}

impl PlotThread {
    /// Create a builder for a thread.
    pub fn builder() -> PlotThreadBuilder {
        PlotThreadBuilder::default()
    }

    /// Whether the thread still accepts events.
    pub fn is_active(&self) -> bool {
        self.status == ThreadStatus::Active
    }

    /// Conditions not yet present in `completed`.
    pub fn missing_conditions(&self, completed: &BTreeSet<String>) -> Vec<String> {
        self.resolution_conditions
            .iter()
            .filter(|c| !completed.contains(c.as_str()))
            .cloned()
            .collect()
    }

    /// True when the thread has conditions and every one is in `completed`.
    ///
    /// A thread without conditions never resolves on its own.
    pub fn can_resolve(&self, completed: &BTreeSet<String>) -> bool {
        !self.resolution_conditions.is_empty() && self.missing_conditions(completed).is_empty()
    }

    pub(crate) fn push_event(&mut self, event: String) {
        self.key_events.push(event);
    }

    pub(crate) fn set_status(&mut self, status: ThreadStatus) {
        self.status = status;
    }

    /// One line for prompts and projections.
    pub fn summary_line(&self) -> String {
        let mut line = format!("{} [{}]", self.name, self.status);
        if !self.characters.is_empty() {
            line.push_str(&format!(" involving {}", self.characters.join(", ")));
        }
        if let Some(last) = self.key_events.last() {
            line.push_str(&format!("; latest: {}", last));
        }
        if !self.resolution_conditions.is_empty() {
            line.push_str(&format!("; resolves when: {}", self.resolution_conditions.join(", ")));
        }
        line
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_line_lists_conditions_only_when_present() {
        let thread = PlotThread::builder()
            .name("The Bell")
            .build()
            .unwrap();
        assert!(!thread.summary_line().contains("resolves when"));

        let thread = PlotThread::builder()
            .name("Heist")
            .resolution_conditions(vec!["vault opened".to_string(), "crew escaped".to_string()])
            .build()
            .unwrap();
        assert!(thread.summary_line().ends_with("; resolves when: vault opened, crew escaped"));
    }

    #[test]
    fn test_can_resolve_requires_every_condition() {
        let thread = PlotThread::builder()
            .name("Heist")
            .resolution_conditions(vec!["vault opened".to_string(), "crew escaped".to_string()])
            .build()
            .unwrap();
        let mut completed = BTreeSet::new();
        completed.insert("vault opened".to_string());
        assert!(!thread.can_resolve(&completed));
        assert_eq!(thread.missing_conditions(&completed), vec!["crew escaped"]);
        completed.insert("crew escaped".to_string());
        assert!(thread.can_resolve(&completed));
    }

    #[test]
    fn test_no_conditions_never_resolves() {
        let thread = PlotThread::builder().name("Rumor").build().unwrap();
        assert!(!thread.can_resolve(&BTreeSet::new()));
    }
}
