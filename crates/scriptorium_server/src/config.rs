//! Configuration for the backend connection.

use crate::{BackendClient, OllamaClient, ServerClient, ServerError, ServerErrorKind};
use derive_getters::Getters;
use serde::{Deserialize, Serialize};

/// Wire format spoken by the backend.
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
pub enum ServerProtocol {
    /// Ollama native `/api/generate`
    #[default]
    Ollama,
    /// OpenAI-compatible `/v1/chat/completions`
    #[serde(alias = "openai-compatible")]
    #[strum(to_string = "openai", serialize = "openai-compatible")]
    OpenAi,
}

/// Configuration for the backend connection.
///
/// # Examples
///
/// ```
/// use scriptorium_server::{ServerConfig, ServerProtocol};
///
/// let config = ServerConfig::builder()
///     .protocol(ServerProtocol::OpenAi)
///     .base_url("http://localhost:8080")
///     .model("mistral-7b")
///     .build()
///     .unwrap();
/// assert_eq!(config.base_url(), "http://localhost:8080");
/// assert!(config.api_key().is_none());
/// ```
#[derive(
    Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Getters, derive_builder::Builder,
)]
#[builder(setter(into))]
#[serde(default)]
pub struct ServerConfig {
    /// Wire format
    #[builder(default)]
    protocol: ServerProtocol,
    /// Base URL of the server (e.g., "http://localhost:11434")
    base_url: String,
    /// Model identifier to use for inference
    model: String,
    /// Optional bearer token
    #[builder(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    api_key: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::new(ServerProtocol::Ollama, "http://localhost:11434", "llama3")
    }
}

impl ServerConfig {
    /// Create a new server configuration
    pub fn new(
        protocol: ServerProtocol,
        base_url: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            protocol,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
            api_key: None,
        }
    }

    /// Create a builder.
    pub fn builder() -> ServerConfigBuilder {
        ServerConfigBuilder::default()
    }

    /// Create config from environment variables
    ///
    /// Reads:
    /// - `INFERENCE_SERVER_PROTOCOL` (default: "ollama")
    /// - `INFERENCE_SERVER_BASE_URL` (default: "http://localhost:11434")
    /// - `INFERENCE_SERVER_MODEL` (required)
    /// - `INFERENCE_SERVER_API_KEY` (optional)
    pub fn from_env() -> Result<Self, ServerError> {
        let model = std::env::var("INFERENCE_SERVER_MODEL").map_err(|_| {
            ServerError::new(ServerErrorKind::Configuration(
                "INFERENCE_SERVER_MODEL not set".into(),
            ))
        })?;
        let config = Self {
            model,
            ..Self::default()
        };
        config.with_env_overrides()
    }

    /// Apply any `INFERENCE_SERVER_*` variables that are set on top of this config.
    pub fn with_env_overrides(mut self) -> Result<Self, ServerError> {
        if let Ok(protocol) = std::env::var("INFERENCE_SERVER_PROTOCOL") {
            self.protocol = protocol.parse().map_err(|_| {
                ServerError::new(ServerErrorKind::Configuration(format!(
                    "Unknown INFERENCE_SERVER_PROTOCOL: {}",
                    protocol
                )))
            })?;
        }
        if let Ok(base_url) = std::env::var("INFERENCE_SERVER_BASE_URL") {
            self.base_url = base_url.trim_end_matches('/').to_string();
        }
        if let Ok(model) = std::env::var("INFERENCE_SERVER_MODEL") {
            self.model = model;
        }
        if let Ok(api_key) = std::env::var("INFERENCE_SERVER_API_KEY") {
            self.api_key = Some(api_key);
        }
        Ok(self)
    }

    /// Set the API key
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Check that the configuration can be used to build a client.
    pub fn validate(&self) -> Result<(), ServerError> {
        if self.model.trim().is_empty() {
            return Err(ServerError::new(ServerErrorKind::Configuration(
                "backend model is empty".into(),
            )));
        }
        if !(self.base_url.starts_with("http://") || self.base_url.starts_with("https://")) {
            return Err(ServerError::new(ServerErrorKind::Configuration(format!(
                "backend base_url must be http(s): {}",
                self.base_url
            ))));
        }
        Ok(())
    }

    /// Build the client for the configured protocol.
    pub fn connect(&self) -> BackendClient {
        match self.protocol {
            ServerProtocol::Ollama => BackendClient::Ollama(OllamaClient::new(self.clone())),
            ServerProtocol::OpenAi => BackendClient::OpenAi(ServerClient::new(self.clone())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_protocol_parses_aliases() {
        assert_eq!("ollama".parse::<ServerProtocol>().unwrap(), ServerProtocol::Ollama);
        assert_eq!("openai".parse::<ServerProtocol>().unwrap(), ServerProtocol::OpenAi);
        assert_eq!(
            "openai-compatible".parse::<ServerProtocol>().unwrap(),
            ServerProtocol::OpenAi
        );
        assert!("grpc".parse::<ServerProtocol>().is_err());
    }

    #[test]
    fn test_new_trims_trailing_slash() {
        let config = ServerConfig::new(ServerProtocol::Ollama, "http://localhost:11434/", "llama3");
        assert_eq!(config.base_url(), "http://localhost:11434");
    }

    #[test]
    fn test_validate_rejects_empty_model_and_bad_scheme() {
        let config = ServerConfig::new(ServerProtocol::Ollama, "http://localhost:11434", " ");
        assert!(config.validate().is_err());

        let config = ServerConfig::new(ServerProtocol::OpenAi, "localhost:8080", "mistral");
        assert!(config.validate().is_err());

        assert!(ServerConfig::default().validate().is_ok());
    }

    #[test]
    fn test_connect_matches_protocol() {
        let ollama = ServerConfig::default().connect();
        assert!(matches!(ollama, BackendClient::Ollama(_)));

        let openai = ServerConfig::new(ServerProtocol::OpenAi, "http://localhost:8080", "m").connect();
        assert!(matches!(openai, BackendClient::OpenAi(_)));
    }
}
