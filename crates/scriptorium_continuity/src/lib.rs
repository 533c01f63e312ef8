//! Continuity state for Scriptorium.
//!
//! The [`ContinuityStore`] is the single owner of cross-chapter state:
//! characters, the location graph, plot threads, the timeline and the
//! emotional arc. Chapters move through a checked lifecycle and, once
//! finalized, are appended to the [`Manuscript`]. [`Book`] is the plain
//! snapshot handed to exporters.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod book;
mod chapter;
mod character;
mod emotion;
mod location;
mod manuscript;
mod plot;
mod scene;
mod store;
mod timeline;

pub use book::{Book, BookHeader, BookStatus, SkippedChapter};
pub use chapter::{Chapter, ChapterStatus};
pub use character::{Character, CharacterBuilder, CharacterStatus, StatusChange};
pub use emotion::{EmotionalArc, EmotionalBeat};
pub use location::{LocationGraph, Transition};
pub use manuscript::Manuscript;
pub use plot::{PlotThread, PlotThreadBuilder, ThreadStatus};
pub use scene::{Scene, split_blocks, strip_annotations};
pub use store::{CharacterUpdate, CharacterUpdateOutcome, ContinuityStore, MAX_MOTIFS};
pub use timeline::{Timeline, TimelineEntry};
