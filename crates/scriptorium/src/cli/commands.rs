//! CLI command definitions.

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use scriptorium::{CharacterSeed, PlanRequest};
use std::path::PathBuf;

/// Scriptorium - plan and write continuity-checked novels with a local LLM
#[derive(Parser, Debug)]
#[command(name = "scriptorium")]
#[command(about = "Plan and write continuity-checked novels with a local LLM", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub json_logs: bool,

    /// Configuration file layered over the defaults
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
}

/// What to write.
#[derive(Args, Debug, Clone)]
pub struct BookArgs {
    /// The story premise
    #[arg(long, required_unless_present = "premise_file", conflicts_with = "premise_file")]
    pub premise: Option<String>,

    /// Read the premise from a file
    #[arg(long)]
    pub premise_file: Option<PathBuf>,

    /// Number of chapters
    #[arg(short = 'n', long, default_value_t = 12)]
    pub chapters: usize,

    /// A character as "Name: description" (repeatable)
    #[arg(long = "character")]
    pub characters: Vec<String>,

    /// A theme to develop (repeatable)
    #[arg(long = "theme")]
    pub themes: Vec<String>,
}

impl BookArgs {
    /// Build the plan request, reading the premise file if one was given.
    pub fn to_request(&self) -> anyhow::Result<PlanRequest> {
        let premise = match (&self.premise, &self.premise_file) {
            (Some(premise), _) => premise.clone(),
            (None, Some(path)) => std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read premise from {}", path.display()))?,
            (None, None) => anyhow::bail!("Either --premise or --premise-file is required"),
        };
        Ok(PlanRequest::new(self.chapters, premise.trim())
            .with_characters(
                self.characters
                    .iter()
                    .map(|c| CharacterSeed::parse(c))
                    .collect(),
            )
            .with_themes(self.themes.clone()))
    }
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Plan and write a book
    Run {
        #[command(flatten)]
        book: BookArgs,

        /// Where to write the book JSON
        #[arg(short, long, default_value = "book.json")]
        output: PathBuf,

        /// Also write the manuscript as Markdown
        #[arg(long)]
        markdown: Option<PathBuf>,
    },

    /// Plan a book and print the plan as JSON
    Plan {
        #[command(flatten)]
        book: BookArgs,

        /// Write the plan to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Check that the configured backend is reachable
    Check,

    /// Print the effective configuration as TOML
    Config,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_arguments_parse() {
        let cli = Cli::try_parse_from([
            "scriptorium",
            "--verbose",
            "run",
            "--premise",
            "A drowned bell rings.",
            "-n",
            "5",
            "--character",
            "Mara: a salvage diver",
            "--character",
            "Oren",
            "--theme",
            "grief",
        ])
        .unwrap();
        assert!(cli.verbose);
        let Commands::Run { book, output, markdown } = cli.command else {
            panic!("expected the run command");
        };
        assert_eq!(output, PathBuf::from("book.json"));
        assert!(markdown.is_none());

        let request = book.to_request().unwrap();
        assert_eq!(*request.num_chapters(), 5);
        assert_eq!(request.characters().len(), 2);
        assert_eq!(request.characters()[0].name(), "Mara");
        assert_eq!(request.characters()[1].description(), "");
        assert_eq!(request.themes(), &vec!["grief".to_string()]);
    }

    #[test]
    fn test_premise_is_required() {
        assert!(Cli::try_parse_from(["scriptorium", "plan"]).is_err());
        assert!(
            Cli::try_parse_from([
                "scriptorium",
                "plan",
                "--premise",
                "x",
                "--premise-file",
                "p.txt"
            ])
            .is_err()
        );
    }

    #[test]
    fn test_global_flags_follow_the_subcommand() {
        let cli = Cli::try_parse_from(["scriptorium", "check", "--json-logs", "--config", "s.toml"])
            .unwrap();
        assert!(cli.json_logs);
        assert_eq!(cli.config, Some(PathBuf::from("s.toml")));
        assert!(matches!(cli.command, Commands::Check));
    }
}
