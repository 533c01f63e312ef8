//! Layered configuration.
//!
//! Sources, later ones overriding earlier ones key by key:
//! 1. Bundled defaults (`scriptorium.toml` shipped with the crate)
//! 2. `~/.config/scriptorium/scriptorium.toml`
//! 3. `./scriptorium.toml`
//! 4. A file named on the command line
//! 5. `INFERENCE_SERVER_*` environment variables, for the backend section only

use config::{Config, ConfigBuilder, File, FileFormat, builder::DefaultState};
use derive_getters::Getters;
use scriptorium_error::{ConfigError, ScriptoriumResult};
use scriptorium_narrative::{
    BookConfig, ChapterConfig, EngineConfig, GenerationConfig, ParserConfig, RepairConfig,
    TransitionConfig,
};
use scriptorium_server::ServerConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, instrument};

const BUNDLED: &str = include_str!("../../../scriptorium.toml");

/// Every configuration section.
///
/// # Example
///
/// ```no_run
/// use scriptorium::ScriptoriumConfig;
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let config = ScriptoriumConfig::load(None)?;
/// println!("Writing with {} at {}", config.backend().model(), config.backend().base_url());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Getters)]
pub struct ScriptoriumConfig {
    #[serde(default)]
    backend: ServerConfig,
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

impl ScriptoriumConfig {
    /// Load every layer, then apply environment overrides.
    ///
    /// User files are optional; `explicit`, when given, must exist.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if a file cannot be read or parsed, or if
    /// the merged configuration is unusable.
    #[instrument(skip_all, fields(explicit = ?explicit))]
    pub fn load(explicit: Option<&Path>) -> ScriptoriumResult<Self> {
        debug!("Loading configuration: bundled < home < current dir < explicit < env");

        let mut builder = bundled();
        if let Some(home) = dirs::home_dir() {
            let home_config = home.join(".config/scriptorium/scriptorium.toml");
            builder = builder.add_source(File::from(home_config).required(false));
        }
        builder = builder.add_source(File::with_name("scriptorium").required(false));
        if let Some(path) = explicit {
            builder = builder.add_source(File::from(path));
        }

        let mut config = finish(builder, explicit)?;
        config.backend = config.backend.with_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Bundled defaults overlaid with one file, without user files or the
    /// environment.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if the file cannot be read or parsed.
    #[instrument(skip(path), fields(path = %path.as_ref().display()))]
    pub fn from_file(path: impl AsRef<Path>) -> ScriptoriumResult<Self> {
        let builder = bundled().add_source(File::from(path.as_ref()));
        let config = finish(builder, Some(path.as_ref()))?;
        config.validate()?;
        Ok(config)
    }

    /// The engine sections as one value.
    pub fn engine(&self) -> EngineConfig {
        EngineConfig::default()
            .with_generation(self.generation.clone())
            .with_parser(self.parser.clone())
            .with_chapter(self.chapter.clone())
            .with_repair(self.repair.clone())
            .with_transition(self.transition.clone())
            .with_book(self.book.clone())
    }

    /// Reject settings no run could use.
    pub fn validate(&self) -> ScriptoriumResult<()> {
        self.backend.validate()?;
        if *self.generation.max_attempts() == 0 {
            return Err(ConfigError::new("generation.max_attempts must be at least 1").into());
        }
        if *self.generation.request_timeout_secs() == 0 {
            return Err(
                ConfigError::new("generation.request_timeout_secs must be at least 1").into(),
            );
        }
        if self.book.chapter_deadline_secs().is_some_and(|s| s == 0) {
            return Err(ConfigError::new("book.chapter_deadline_secs must be at least 1").into());
        }
        Ok(())
    }

    /// The effective configuration as TOML, API key omitted.
    pub fn to_toml(&self) -> ScriptoriumResult<String> {
        let mut redacted = self.clone();
        redacted.backend = ServerConfig::new(
            *self.backend.protocol(),
            self.backend.base_url().as_str(),
            self.backend.model().as_str(),
        );
        toml::to_string_pretty(&redacted).map_err(|e| {
            ConfigError::new(format!("Failed to render configuration: {}", e)).into()
        })
    }
}

fn bundled() -> ConfigBuilder<DefaultState> {
    Config::builder().add_source(File::from_str(BUNDLED, FileFormat::Toml))
}

fn finish(
    builder: ConfigBuilder<DefaultState>,
    source: Option<&Path>,
) -> ScriptoriumResult<ScriptoriumConfig> {
    let source_name = source
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| "layered".to_string());
    let config = builder
        .build()
        .map_err(|e| {
            ConfigError::new(format!("Failed to build configuration: {}", e))
                .with_source_name(source_name.as_str())
        })?
        .try_deserialize()
        .map_err(|e| {
            ConfigError::new(format!("Failed to parse configuration: {}", e))
                .with_source_name(source_name.as_str())
        })?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use scriptorium_narrative::FailurePolicy;
    use scriptorium_server::ServerProtocol;
    use std::io::Write;

    fn write_config(text: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new()
            .suffix(".toml")
            .tempfile()
            .unwrap();
        file.write_all(text.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_bundled_matches_defaults() {
        let config: ScriptoriumConfig = toml::from_str(BUNDLED).unwrap();
        assert_eq!(config.engine(), EngineConfig::default());
        assert_eq!(config.backend(), &ServerConfig::default());
    }

    #[test]
    fn test_file_overrides_only_named_keys() {
        let file = write_config(
            r#"
            [backend]
            protocol = "openai"
            base_url = "http://localhost:8080"
            model = "mistral-7b"

            [generation]
            max_attempts = 5

            [book]
            failure_policy = "abort"
            chapter_deadline_secs = 900
            "#,
        );
        let config = ScriptoriumConfig::from_file(file.path()).unwrap();

        assert_eq!(*config.backend().protocol(), ServerProtocol::OpenAi);
        assert_eq!(config.backend().model(), "mistral-7b");
        assert_eq!(*config.generation().max_attempts(), 5);
        assert_eq!(*config.generation().min_words(), 50);
        assert_eq!(*config.book().failure_policy(), FailurePolicy::Abort);
        assert_eq!(*config.book().chapter_deadline_secs(), Some(900));
        assert_eq!(*config.book().inter_chapter_delay_ms(), 3000);
        assert_eq!(*config.chapter().min_words(), 1500);
    }

    #[test]
    fn test_zero_attempts_rejected() {
        let file = write_config("[generation]\nmax_attempts = 0\n");
        assert!(ScriptoriumConfig::from_file(file.path()).is_err());
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("absent.toml");
        assert!(ScriptoriumConfig::from_file(&missing).is_err());
    }

    #[test]
    fn test_to_toml_round_trips_without_api_key() {
        let file = write_config(
            "[backend]\nprotocol = \"openai\"\nbase_url = \"http://localhost:8080\"\nmodel = \"m\"\napi_key = \"secret\"\n",
        );
        let config = ScriptoriumConfig::from_file(file.path()).unwrap();
        assert_eq!(config.backend().api_key().as_deref(), Some("secret"));

        let rendered = config.to_toml().unwrap();
        assert!(!rendered.contains("secret"));
        let reparsed: ScriptoriumConfig = toml::from_str(&rendered).unwrap();
        assert_eq!(reparsed.engine(), config.engine());
        assert_eq!(reparsed.backend().model(), "m");
    }
}
