//! Novel generation engine for Scriptorium.
//!
//! This crate turns a premise into a book, one chapter at a time, while
//! keeping a [`ContinuityStore`](scriptorium_continuity::ContinuityStore)
//! faithful to what has actually been written.
//!
//! # Pipeline
//!
//! - **Planning**: [`PlotPlanner`] asks for a structured outline and seeds
//!   the store with characters, locations, threads and motifs
//! - **Drafting**: [`ChapterGenerator`] writes each chapter against a
//!   projection of the store
//! - **Repair**: [`RepairLoop`] checks drafts with [`ConsistencyValidator`]
//!   and rewrites flagged ones a bounded number of times
//! - **Update**: [`StateUpdater`] extracts what changed and commits it
//! - **Transitions**: [`TransitionComposer`] bridges chapter boundaries
//!
//! Structured answers go through [`StructuredResponseParser`], which falls
//! back from direct JSON to a reformatting request to a key-value scan.
//!
//! # Example
//!
//! ```rust,ignore
//! use scriptorium_narrative::{EngineConfig, NovelExecutor, PlanRequest};
//! use scriptorium_narrative::CharacterSeed;
//! use scriptorium_server::ServerConfig;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let driver = ServerConfig::default().connect();
//! let executor = NovelExecutor::new(driver, EngineConfig::default());
//!
//! let request = PlanRequest::new(9, "A lighthouse keeper hears the sea answer back.")
//!     .with_characters(vec![CharacterSeed::parse("Ines: the keeper")])
//!     .with_themes(vec!["isolation".to_string()]);
//! let run = executor.run(request).await;
//! println!("{}", run.book.render_markdown());
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod client;
mod config;
mod executor;
mod extraction;
mod generator;
mod parser;
mod planner;
mod prompts;
mod repair;
mod transition;
mod updater;
mod validator;

pub use client::{GenerationClient, PromptSpec, is_cancellation};
pub use config::{
    BookConfig, BookConfigBuilder, ChapterConfig, ChapterConfigBuilder, EngineConfig,
    FailurePolicy, GenerationConfig, GenerationConfigBuilder, ParserConfig, ParserConfigBuilder,
    RepairConfig, RepairConfigBuilder, TransitionConfig, TransitionConfigBuilder,
};
pub use executor::{BookRun, NovelExecutor};
pub use extraction::{decode_json, extract_json};
pub use generator::{ChapterGenerator, DraftContext};
pub use parser::{ParseTier, ParsedRecord, ShapeTemplate, StructuredResponseParser};
pub use planner::{
    Act, BookPlan, ChapterPlan, CharacterSeed, OutlineCharacter, OutlineConnection,
    OutlineLocation, OutlineThread, PlanRequest, PlotPlanner, act_lengths, detect_world_name,
};
pub use prompts::roles;
pub use repair::{RepairLoop, RepairOutcome, RepairState};
pub use transition::{TransitionComposer, TransitionContext};
pub use updater::{CharacterRecord, StateDelta, StateUpdater, UpdateReport};
pub use validator::{ConsistencyIssue, ConsistencyReport, ConsistencyValidator, IssueClass};
