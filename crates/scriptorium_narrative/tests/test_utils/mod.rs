//! Test utilities for the narrative engine.
//!
//! [`StoryDriver`] answers every backend call of a three-chapter book,
//! routing on the system instruction of each request.

#![allow(dead_code)]

use async_trait::async_trait;
use scriptorium_core::{GenerateRequest, GenerateResponse};
use scriptorium_error::{GenerationError, GenerationErrorKind, ScriptoriumResult};
use scriptorium_interface::ScriptoriumDriver;
use scriptorium_narrative::roles;
use std::sync::Mutex;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Outline of "The Drowned Bell": Ilse is only planned for chapter 3.
pub const OUTLINE: &str = r#"{
  "title": "The Drowned Bell",
  "subtitle": "A Tidewater Story",
  "synopsis": "A harbor town hides a bell that rings under the sea.",
  "world_name": "Tidewater",
  "chapters": [
    {"title": "Low Tide", "summary": "Mara and Oren find the bell rope cut.",
     "characters": ["Mara", "Oren"], "locations": ["Harbor"], "plot_threads": ["The Bell"]},
    {"title": "The Undertow", "summary": "Mara searches the wreck alone.",
     "characters": ["Mara"], "locations": ["Harbor"], "plot_threads": ["The Bell"]},
    {"title": "Bell Tower", "summary": "A stranger shows Mara the tower stair.",
     "characters": ["Mara", "Ilse"], "locations": ["Tower"], "plot_threads": ["The Bell"]}
  ],
  "characters": [
    {"name": "Mara", "background": "a salvage diver", "personality": "stubborn",
     "goals": "raise the bell", "location": "Harbor"},
    {"name": "Oren", "background": "the harbor master", "personality": "wary",
     "goals": "keep the town calm", "location": "Harbor"},
    {"name": "Ilse", "background": "the tower keeper", "personality": "secretive",
     "goals": "hide the bell", "location": "Tower"}
  ],
  "locations": [
    {"name": "Harbor", "connections": [{"to": "Tower", "travel_time": 2}]},
    {"name": "Tower", "connections": [{"to": "Harbor", "travel_time": 2}]}
  ],
  "plot_threads": [
    {"name": "The Bell", "characters": ["Mara"], "dependencies": [],
     "resolution_conditions": ["the bell is raised"]}
  ],
  "motifs": ["bells", "salt"]
}"#;

/// The same outline as prose, with no JSON in it.
pub const PROSE_OUTLINE: &str = "Here is the outline you asked for.\n\n\
Chapter 1: Low Tide\nMara and Oren find the bell rope cut.\n\n\
Chapter 2: The Undertow\nMara searches the wreck alone.\n\n\
Chapter 3: Bell Tower\nA stranger shows Mara the tower stair.\n";

pub const LOW_TIDE: &str = "[POV: Mara] [Location: Harbor]\n\
Mara and Oren walked the harbor wall at dawn. The bell rope hung from the post, cut clean.\n\n\
Oren said the tide would turn by nightfall, and Mara believed him.";

/// Draft of chapter 2 that brings Ilse in a chapter early.
pub const UNDERTOW_DRAFT: &str = "[POV: Mara] [Location: Harbor]\n\
Mara dove on the wreck alone while Ilse watched from the tower window.\n\n\
The hull groaned around her and the water tasted of salt and rust.";

pub const UNDERTOW_REPAIRED: &str = "[POV: Mara] [Location: Harbor]\n\
Mara dove on the wreck alone while a light burned in the tower window.\n\n\
The hull groaned around her and the water tasted of salt and rust.";

pub const BELL_TOWER: &str = "[POV: Mara] [Location: Tower]\n\
Ilse opened the tower door before Mara could knock.\n\n\
The stair wound up into the dark, and somewhere above them a bell was breathing.";

pub const EXTRACTION: &str = "TIME_ELAPSED: one day\nTIME_UNITS: 1\nEND_TIME: dusk\n\
EMOTION: unease\nTENSION: 6\nUNRESOLVED: who cut the rope\n\
SUMMARY: The search for the bell goes on as the tide turns.";

pub const ENDING: &str = "Far out past the breakwater, something rang once under the water.\n\n\
Nobody on the wall would say what it was.";

pub const OPENER: &str = "The next morning the harbor was quiet, and the rope was gone.";

/// Short name of the role a request was made under.
pub fn role_name(system: &str) -> &'static str {
    match system {
        s if s == roles::PLANNER => "planner",
        s if s == roles::REFORMATTER => "reformatter",
        s if s == roles::WORLD_NAMER => "world_namer",
        s if s == roles::MOTIF_WRITER => "motif_writer",
        s if s == roles::NOVELIST => "novelist",
        s if s == roles::CONTINUITY_EDITOR => "continuity_editor",
        s if s == roles::REPAIR_EDITOR => "repair_editor",
        s if s == roles::STATE_EXTRACTOR => "state_extractor",
        s if s == roles::SUMMARIZER => "summarizer",
        s if s == roles::ENDING_WRITER => "ending_writer",
        s if s == roles::OPENER_WRITER => "opener_writer",
        _ => "unknown",
    }
}

/// Whether a novelist prompt drafts the chapter titled `title`.
fn drafting(prompt: &str, title: &str) -> bool {
    prompt.contains(&format!("): {}\n", title))
}

/// Mock backend for a whole book run.
pub struct StoryDriver {
    outline: String,
    reformatted: String,
    failing: Option<String>,
    stalling: Option<String>,
    cancel_on: Option<(String, CancellationToken)>,
    calls: Mutex<Vec<(&'static str, String)>>,
}

impl StoryDriver {
    pub fn new() -> Self {
        Self {
            outline: OUTLINE.to_string(),
            reformatted: OUTLINE.to_string(),
            failing: None,
            stalling: None,
            cancel_on: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Answer the planner with `outline` instead of the JSON outline.
    pub fn with_outline(mut self, outline: &str) -> Self {
        self.outline = outline.to_string();
        self
    }

    /// Answer reformatting requests with `text`.
    pub fn with_reformatted(mut self, text: &str) -> Self {
        self.reformatted = text.to_string();
        self
    }

    /// Fail every draft of the chapter titled `title`.
    pub fn failing(mut self, title: &str) -> Self {
        self.failing = Some(title.to_string());
        self
    }

    /// Never answer drafts of the chapter titled `title`.
    pub fn stalling(mut self, title: &str) -> Self {
        self.stalling = Some(title.to_string());
        self
    }

    /// Cancel `token` when the chapter titled `title` is drafted.
    pub fn cancelling(mut self, title: &str, token: CancellationToken) -> Self {
        self.cancel_on = Some((title.to_string(), token));
        self
    }

    /// How many calls were made under a role.
    pub fn calls_to(&self, role: &str) -> usize {
        self.calls
            .lock()
            .map(|calls| calls.iter().filter(|(r, _)| *r == role).count())
            .unwrap_or(0)
    }

    /// Prompts sent under a role, in order.
    pub fn prompts_to(&self, role: &str) -> Vec<String> {
        self.calls
            .lock()
            .map(|calls| {
                calls
                    .iter()
                    .filter(|(r, _)| *r == role)
                    .map(|(_, p)| p.clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    async fn draft(&self, prompt: &str) -> ScriptoriumResult<String> {
        if let Some((title, token)) = &self.cancel_on {
            if drafting(prompt, title) {
                token.cancel();
            }
        }
        if self.failing.as_deref().is_some_and(|t| drafting(prompt, t)) {
            return Err(GenerationError::new(GenerationErrorKind::Backend(
                "connection refused".to_string(),
            ))
            .into());
        }
        if self.stalling.as_deref().is_some_and(|t| drafting(prompt, t)) {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        }
        let text = if drafting(prompt, "Low Tide") {
            LOW_TIDE
        } else if drafting(prompt, "The Undertow") {
            UNDERTOW_DRAFT
        } else {
            BELL_TOWER
        };
        Ok(text.to_string())
    }
}

#[async_trait]
impl ScriptoriumDriver for StoryDriver {
    async fn generate(&self, req: &GenerateRequest) -> ScriptoriumResult<GenerateResponse> {
        let role = role_name(req.system_text().unwrap_or_default());
        let prompt = req.prompt_text();
        if let Ok(mut calls) = self.calls.lock() {
            calls.push((role, prompt.clone()));
        }

        let text = match role {
            "planner" => self.outline.clone(),
            "reformatter" => self.reformatted.clone(),
            "world_namer" => "Tidewater".to_string(),
            "motif_writer" => "bells, salt".to_string(),
            "novelist" => self.draft(&prompt).await?,
            "continuity_editor" => "CONSISTENT".to_string(),
            "repair_editor" => UNDERTOW_REPAIRED.to_string(),
            "state_extractor" => EXTRACTION.to_string(),
            "summarizer" => "The search goes on.".to_string(),
            "ending_writer" => ENDING.to_string(),
            "opener_writer" => OPENER.to_string(),
            _ => String::new(),
        };
        Ok(GenerateResponse::text_only(text))
    }

    fn provider_name(&self) -> &'static str {
        "story"
    }

    fn model_name(&self) -> &str {
        "story-mock"
    }
}
