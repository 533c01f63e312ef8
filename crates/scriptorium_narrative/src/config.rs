//! Engine configuration sections.
//!
//! Every section deserialises with per-field defaults, so a partial TOML
//! table only overrides what it names.

use derive_getters::Getters;
use serde::{Deserialize, Serialize};

/// Backend call settings: retries, pacing and sampling defaults.
#[derive(
    Debug,
    Clone,
    PartialEq,
    Serialize,
    Deserialize,
    Getters,
    derive_setters::Setters,
    derive_builder::Builder,
)]
#[setters(prefix = "with_")]
#[builder(default)]
pub struct GenerationConfig {
    /// Total attempts per call, first attempt included
    #[serde(default = "default_max_attempts")]
    max_attempts: usize,
    /// Responses with fewer words are retried
    #[serde(default = "default_min_words")]
    min_words: usize,
    /// First backoff delay
    #[serde(default = "default_initial_backoff_ms")]
    initial_backoff_ms: u64,
    /// Backoff ceiling
    #[serde(default = "default_max_backoff_secs")]
    max_backoff_secs: u64,
    /// Per-attempt timeout
    #[serde(default = "default_request_timeout_secs")]
    request_timeout_secs: u64,
    #[serde(default = "default_temperature")]
    temperature: f32,
    #[serde(default = "default_top_p")]
    top_p: f32,
    #[serde(default = "default_max_tokens")]
    max_tokens: u32,
    /// Read responses as streams
    #[serde(default = "default_stream")]
    stream: bool,
    /// Pace calls to at most this many per minute
    #[serde(default)]
    requests_per_minute: Option<u32>,
}

fn default_max_attempts() -> usize {
    3
}

fn default_min_words() -> usize {
    50
}

fn default_initial_backoff_ms() -> u64 {
    1000
}

fn default_max_backoff_secs() -> u64 {
    30
}

fn default_request_timeout_secs() -> u64 {
    600
}

fn default_temperature() -> f32 {
    0.7
}

fn default_top_p() -> f32 {
    0.9
}

fn default_max_tokens() -> u32 {
    4096
}

fn default_stream() -> bool {
    true
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            min_words: default_min_words(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_secs: default_max_backoff_secs(),
            request_timeout_secs: default_request_timeout_secs(),
            temperature: default_temperature(),
            top_p: default_top_p(),
            max_tokens: default_max_tokens(),
            stream: default_stream(),
            requests_per_minute: None,
        }
    }
}

/// Structured response parser settings.
#[derive(
    Debug,
    Clone,
    PartialEq,
    Serialize,
    Deserialize,
    Getters,
    derive_setters::Setters,
    derive_builder::Builder,
)]
#[setters(prefix = "with_")]
#[builder(default)]
pub struct ParserConfig {
    /// Temperature of the reformat request
    #[serde(default = "default_reformat_temperature")]
    reformat_temperature: f32,
}

fn default_reformat_temperature() -> f32 {
    0.1
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            reformat_temperature: default_reformat_temperature(),
        }
    }
}

/// Chapter drafting settings.
#[derive(
    Debug,
    Clone,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    Getters,
    derive_setters::Setters,
    derive_builder::Builder,
)]
#[setters(prefix = "with_")]
#[builder(default)]
pub struct ChapterConfig {
    /// Drafts below this length get one expansion retry
    #[serde(default = "default_chapter_min_words")]
    min_words: usize,
    #[serde(default = "default_true")]
    expansion_retry: bool,
}

fn default_chapter_min_words() -> usize {
    1500
}

fn default_true() -> bool {
    true
}

impl Default for ChapterConfig {
    fn default() -> Self {
        Self {
            min_words: default_chapter_min_words(),
            expansion_retry: true,
        }
    }
}

/// Consistency repair settings.
#[derive(
    Debug,
    Clone,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    Getters,
    derive_setters::Setters,
    derive_builder::Builder,
)]
#[setters(prefix = "with_")]
#[builder(default)]
pub struct RepairConfig {
    /// Regenerate-and-recheck passes allowed per chapter
    #[serde(default = "default_max_cycles")]
    max_cycles: usize,
}

fn default_max_cycles() -> usize {
    1
}

impl Default for RepairConfig {
    fn default() -> Self {
        Self {
            max_cycles: default_max_cycles(),
        }
    }
}

/// Chapter ending and opener settings.
#[derive(
    Debug,
    Clone,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    Getters,
    derive_setters::Setters,
    derive_builder::Builder,
)]
#[setters(prefix = "with_")]
#[builder(default)]
pub struct TransitionConfig {
    /// Trailing characters of the chapter sent as context
    #[serde(default = "default_tail_chars")]
    tail_chars: usize,
    #[serde(default = "default_true")]
    enabled: bool,
}

fn default_tail_chars() -> usize {
    1000
}

impl Default for TransitionConfig {
    fn default() -> Self {
        Self {
            tail_chars: default_tail_chars(),
            enabled: true,
        }
    }
}

/// What a book run does when a chapter's drafting fails at the backend.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Default,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum FailurePolicy {
    /// Record the chapter as skipped and continue
    #[default]
    Skip,
    /// Stop and return the partial book
    Abort,
}

/// Book run settings.
#[derive(
    Debug,
    Clone,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    Getters,
    derive_setters::Setters,
    derive_builder::Builder,
)]
#[setters(prefix = "with_")]
#[builder(default)]
pub struct BookConfig {
    /// Pause between chapters
    #[serde(default = "default_inter_chapter_delay_ms")]
    inter_chapter_delay_ms: u64,
    #[serde(default)]
    failure_policy: FailurePolicy,
    /// Upper bound on one chapter's whole pipeline
    #[serde(default)]
    chapter_deadline_secs: Option<u64>,
}

fn default_inter_chapter_delay_ms() -> u64 {
    3000
}

impl Default for BookConfig {
    fn default() -> Self {
        Self {
            inter_chapter_delay_ms: default_inter_chapter_delay_ms(),
            failure_policy: FailurePolicy::Skip,
            chapter_deadline_secs: None,
        }
    }
}

/// Every engine section.
///
/// # Examples
///
/// ```
/// use scriptorium_narrative::{EngineConfig, FailurePolicy};
///
/// let config = EngineConfig::default();
/// assert_eq!(*config.generation().max_attempts(), 3);
/// assert_eq!(*config.repair().max_cycles(), 1);
/// assert_eq!(*config.book().failure_policy(), FailurePolicy::Skip);
/// ```
#[derive(
    Debug,
    Clone,
    Default,
    PartialEq,
    Serialize,
    Deserialize,
    Getters,
    derive_setters::Setters,
)]
#[setters(prefix = "with_")]
pub struct EngineConfig {
    #[serde(default)]
    generation: GenerationConfig,
    #[serde(default)]
    parser: ParserConfig,
    #[serde(default)]
    chapter: ChapterConfig,
    #[serde(default)]
    repair: RepairConfig,
    #[serde(default)]
    transition: TransitionConfig,
    #[serde(default)]
    book: BookConfig,
}

impl EngineConfig {
    /// Settings that make tests fast: no backoff, no inter-chapter delay,
    /// short minimums.
    pub fn for_testing() -> Self {
        Self::default()
            .with_generation(
                GenerationConfig::default()
                    .with_initial_backoff_ms(1)
                    .with_max_backoff_secs(0)
                    .with_min_words(1)
                    .with_stream(false),
            )
            .with_chapter(ChapterConfig::default().with_min_words(1))
            .with_book(BookConfig::default().with_inter_chapter_delay_ms(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_table_keeps_other_defaults() {
        let config: EngineConfig = serde_json::from_str(
            r#"{"generation": {"max_attempts": 5}, "book": {"failure_policy": "abort"}}"#,
        )
        .unwrap();
        assert_eq!(*config.generation().max_attempts(), 5);
        assert_eq!(*config.generation().min_words(), 50);
        assert_eq!(*config.book().failure_policy(), FailurePolicy::Abort);
        assert_eq!(*config.book().inter_chapter_delay_ms(), 3000);
        assert_eq!(*config.chapter().min_words(), 1500);
    }

    #[test]
    fn test_failure_policy_parses() {
        assert_eq!("skip".parse::<FailurePolicy>().unwrap(), FailurePolicy::Skip);
        assert_eq!("abort".parse::<FailurePolicy>().unwrap(), FailurePolicy::Abort);
    }
}
