//! Scene views over chapter text.
//!
//! A scene is a blank-line separated block. Bracketed annotations such as
//! `[POV: Mara]` or `[Location: Harbor]` inside a block are lifted into the
//! scene's fields and removed from its content.

use derive_getters::Getters;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::LazyLock;

static ANNOTATION: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r"(?i)\[\s*(pov|location|time|characters|threads)\s*:\s*([^\]]*)\]").ok()
});

static BLANK_LINES: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"\n[ \t]*\n").ok());

/// A derived view of one scene.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, Getters)]
pub struct Scene {
    content: String,
    pov: Option<String>,
    location: Option<String>,
    /// Elapsed time units
    time_units: u32,
    characters: BTreeSet<String>,
    threads: BTreeSet<String>,
}

impl Scene {
    /// Build a scene from one block of text.
    pub fn from_block(block: &str) -> Self {
        let mut scene = Scene::default();
        if let Some(re) = ANNOTATION.as_ref() {
            for caps in re.captures_iter(block) {
                let value = caps[2].trim();
                match caps[1].to_lowercase().as_str() {
                    "pov" => scene.pov = non_empty(value),
                    "location" => scene.location = non_empty(value),
                    "time" => {
                        scene.time_units = value
                            .split_whitespace()
                            .next()
                            .and_then(|n| n.parse().ok())
                            .unwrap_or(0)
                    }
                    "characters" => scene.characters.extend(split_list(value)),
                    _ => scene.threads.extend(split_list(value)),
                }
            }
        }
        scene.content = strip_annotations(block);
        scene
    }

    /// Segment chapter text into scenes, skipping blocks that hold only annotations.
    ///
    /// # Examples
    ///
    /// ```
    /// use scriptorium_continuity::Scene;
    ///
    /// let text = "[POV: Mara] [Location: Harbor]\nThe fog came in.\n\n[Time: 2]\nBy noon it lifted.";
    /// let scenes = Scene::segment(text);
    /// assert_eq!(scenes.len(), 2);
    /// assert_eq!(scenes[0].pov().as_deref(), Some("Mara"));
    /// assert_eq!(scenes[0].content(), "The fog came in.");
    /// assert_eq!(*scenes[1].time_units(), 2);
    /// ```
    pub fn segment(text: &str) -> Vec<Scene> {
        split_blocks(text)
            .into_iter()
            .map(Scene::from_block)
            .filter(|scene| !scene.content.is_empty())
            .collect()
    }
}

/// Remove scene annotations, dropping lines left empty.
pub fn strip_annotations(text: &str) -> String {
    let stripped = match ANNOTATION.as_ref() {
        Some(re) => re.replace_all(text, "").into_owned(),
        None => text.to_string(),
    };
    stripped
        .lines()
        .map(str::trim_end)
        .filter(|line| !line.trim().is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Split text into trimmed, non-empty blank-line separated blocks.
pub fn split_blocks(text: &str) -> Vec<&str> {
    let normalized: Vec<&str> = match BLANK_LINES.as_ref() {
        Some(re) => re.split(text).collect(),
        None => text.split("\n\n").collect(),
    };
    normalized
        .into_iter()
        .map(str::trim)
        .filter(|block| !block.is_empty())
        .collect()
}

fn non_empty(value: &str) -> Option<String> {
    (!value.is_empty()).then(|| value.to_string())
}

fn split_list(value: &str) -> impl Iterator<Item = String> + '_ {
    value
        .split([',', ';'])
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_annotations_lifted_and_stripped() {
        let block = "[Characters: Mara, Oren] [Threads: The stolen map]\nThey argued.";
        let scene = Scene::from_block(block);
        assert_eq!(scene.characters.len(), 2);
        assert!(scene.threads.contains("The stolen map"));
        assert_eq!(scene.content, "They argued.");
    }

    #[test]
    fn test_blank_lines_with_spaces_split_blocks() {
        let blocks = split_blocks("one\n  \ntwo\n\n\nthree");
        assert_eq!(blocks, vec!["one", "two", "three"]);
    }

    #[test]
    fn test_annotation_only_block_is_not_a_scene() {
        let scenes = Scene::segment("[POV: Mara]\n\nRain.");
        assert_eq!(scenes.len(), 1);
        assert_eq!(scenes[0].content, "Rain.");
    }
}
