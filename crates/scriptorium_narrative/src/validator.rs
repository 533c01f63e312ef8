//! Consistency checks of chapter drafts against the continuity state.
//!
//! The backend's judgment is advisory: it compares the draft with a text
//! projection of the store and answers `CONSISTENT` or a list of problems.
//! A deterministic first-appearance check runs before it.

use crate::client::{GenerationClient, PromptSpec};
use crate::planner::ChapterPlan;
use crate::prompts::{self, roles};
use derive_getters::Getters;
use regex::Regex;
use scriptorium_continuity::ContinuityStore;
use scriptorium_error::ScriptoriumResult;
use scriptorium_interface::ScriptoriumDriver;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;
use tracing::{debug, info};

static CONSISTENT_LINE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?i)^\W*consistent\W*$").ok());

static CONSISTENT_TOKEN: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"\bCONSISTENT\b").ok());

static NEGATED_TOKEN: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(?:not|isn'?t|never|no\s+longer)\s+(?:(?:fully|entirely|quite|wholly)\s+)?consistent\b",
    )
    .ok()
});

static ISSUE_LINE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^\s*(?:\d+[.)]|[-*•])\s+(.+?)\s*$").ok());

/// Kind of continuity problem.
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
pub enum IssueClass {
    /// A character appears before being introduced
    FirstAppearance,
    /// The world or setting name drifted
    WorldName,
    /// Events out of chronological order
    Timeline,
    /// A character acts against their recorded status
    CharacterStatus,
    /// Impossible movement between locations
    Location,
    /// Anything else the backend reported
    Other,
}

impl IssueClass {
    /// Classify free issue text by keyword.
    ///
    /// ```
    /// use scriptorium_narrative::IssueClass;
    ///
    /// assert_eq!(IssueClass::classify("Oren is dead but speaks"), IssueClass::CharacterStatus);
    /// assert_eq!(IssueClass::classify("The city is called Vell here"), IssueClass::Other);
    /// ```
    pub fn classify(text: &str) -> Self {
        const RULES: &[(IssueClass, &[&str])] = &[
            (
                IssueClass::FirstAppearance,
                &["first appear", "introduc", "not yet appeared", "before they", "before being"],
            ),
            (
                IssueClass::CharacterStatus,
                &["dead", "died", "deceased", "killed", "status", "injur", "wounded"],
            ),
            (
                IssueClass::Timeline,
                &["timeline", "chronolog", "out of order", "earlier than", "time "],
            ),
            (
                IssueClass::Location,
                &["location", "travel", "distance", "reach", "moved", "journey"],
            ),
            (
                IssueClass::WorldName,
                &["world name", "setting name", "world is", "realm", "named"],
            ),
        ];
        let lower = text.to_lowercase();
        RULES
            .iter()
            .find(|(_, keywords)| keywords.iter().any(|k| lower.contains(k)))
            .map(|(class, _)| *class)
            .unwrap_or(IssueClass::Other)
    }
}

/// One continuity problem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Getters)]
pub struct ConsistencyIssue {
    class: IssueClass,
    description: String,
    /// Raised by the deterministic pre-check rather than the backend
    #[getter(rename = "is_local")]
    local: bool,
}

impl ConsistencyIssue {
    /// An issue reported by the backend, classified by keyword.
    pub fn reported(description: impl Into<String>) -> Self {
        let description = description.into();
        Self {
            class: IssueClass::classify(&description),
            description,
            local: false,
        }
    }

    /// An issue raised by a local check.
    pub fn local(class: IssueClass, description: impl Into<String>) -> Self {
        Self {
            class,
            description: description.into(),
            local: true,
        }
    }

    /// The issue as recorded on a chapter.
    pub fn note(&self) -> String {
        format!("[{}] {}", self.class, self.description)
    }
}

/// Verdict for one draft.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, Getters)]
pub struct ConsistencyReport {
    issues: Vec<ConsistencyIssue>,
}

impl ConsistencyReport {
    /// A report with the given issues.
    pub fn new(issues: Vec<ConsistencyIssue>) -> Self {
        Self { issues }
    }

    /// No issues at all.
    pub fn is_consistent(&self) -> bool {
        self.issues.is_empty()
    }

    /// Whether any issue is of `class`.
    pub fn has_class(&self, class: IssueClass) -> bool {
        self.issues.iter().any(|i| i.class == class)
    }

    /// Issue notes for the chapter record.
    pub fn notes(&self) -> Vec<String> {
        self.issues.iter().map(ConsistencyIssue::note).collect()
    }
}

/// Checks drafts against the store.
#[derive(Debug, Clone, Default)]
pub struct ConsistencyValidator;

impl ConsistencyValidator {
    /// Create a validator.
    pub fn new() -> Self {
        Self
    }

    /// Check a draft of chapter `number`.
    ///
    /// Local first-appearance issues are merged with the backend's. The draft
    /// is consistent only when there are no local issues and the backend
    /// answered with the `CONSISTENT` token.
    #[tracing::instrument(skip_all, fields(chapter = number))]
    pub async fn check<D: ScriptoriumDriver>(
        &self,
        client: &GenerationClient<D>,
        draft: &str,
        number: usize,
        plan: &ChapterPlan,
        store: &ContinuityStore,
    ) -> ScriptoriumResult<ConsistencyReport> {
        let mut issues = Self::local_issues(draft, number, plan, store);

        let projection = store.render_projection(number);
        let spec = PromptSpec::new(
            roles::CONTINUITY_EDITOR,
            prompts::consistency(draft, &projection, plan),
        )
        .with_temperature(0.2)
        .with_min_words(0);
        let answer = client.generate(&spec).await?;
        let reported = Self::parse_verdict(&answer);
        debug!(local = issues.len(), reported = reported.len(), "Consistency verdict");
        issues.extend(reported);

        let report = ConsistencyReport::new(issues);
        info!(
            consistent = report.is_consistent(),
            issues = report.issues().len(),
            "Chapter checked"
        );
        Ok(report)
    }

    /// Known characters referenced in a draft of a chapter after the first
    /// who have not appeared yet and are not planned for this chapter.
    pub fn local_issues(
        draft: &str,
        number: usize,
        plan: &ChapterPlan,
        store: &ContinuityStore,
    ) -> Vec<ConsistencyIssue> {
        if number <= 1 {
            return Vec::new();
        }
        let planned = |name: &str| {
            plan.characters()
                .iter()
                .any(|p| p.trim().eq_ignore_ascii_case(name))
        };
        store
            .referenced_characters(draft)
            .into_iter()
            .filter(|name| {
                store
                    .character(name)
                    .is_some_and(|c| !c.has_appeared())
                    && !planned(name)
            })
            .map(|name| {
                ConsistencyIssue::local(
                    IssueClass::FirstAppearance,
                    format!(
                        "{} appears in chapter {} but has not been introduced and is not planned for it",
                        name, number
                    ),
                )
            })
            .collect()
    }

    /// Issues in a backend answer; empty when the answer is `CONSISTENT`.
    ///
    /// ```
    /// use scriptorium_narrative::ConsistencyValidator;
    ///
    /// assert!(ConsistencyValidator::parse_verdict("CONSISTENT").is_empty());
    /// assert!(ConsistencyValidator::parse_verdict("**Consistent.**").is_empty());
    /// let issues = ConsistencyValidator::parse_verdict("INCONSISTENT\n1. Oren is dead but speaks");
    /// assert_eq!(issues.len(), 1);
    /// ```
    pub fn parse_verdict(answer: &str) -> Vec<ConsistencyIssue> {
        let first_line = answer.lines().map(str::trim).find(|l| !l.is_empty()).unwrap_or("");
        if CONSISTENT_LINE.as_ref().is_some_and(|re| re.is_match(first_line)) {
            return Vec::new();
        }

        let issues: Vec<ConsistencyIssue> = answer
            .lines()
            .filter_map(|line| {
                ISSUE_LINE
                    .as_ref()
                    .and_then(|re| re.captures(line))
                    .map(|caps| ConsistencyIssue::reported(&caps[1]))
            })
            .collect();
        if !issues.is_empty() {
            return issues;
        }

        let negated = NEGATED_TOKEN.as_ref().is_some_and(|re| re.is_match(answer));
        if !negated && CONSISTENT_TOKEN.as_ref().is_some_and(|re| re.is_match(answer)) {
            return Vec::new();
        }
        let description: String = answer.trim().chars().take(300).collect();
        vec![ConsistencyIssue::reported(if description.is_empty() {
            "the consistency check returned no verdict".to_string()
        } else {
            description
        })]
    }
}
