//! Protocol-dispatching backend client.

use crate::{OllamaClient, ServerClient};
use scriptorium_core::{GenerateRequest, GenerateResponse};
use scriptorium_error::{ScriptoriumResult, ServerError};
use scriptorium_interface::{ChunkStream, ScriptoriumDriver, Streaming};

/// A connected backend, one variant per supported wire format.
///
/// Built by [`ServerConfig::connect`](crate::ServerConfig::connect).
#[derive(Debug, Clone)]
pub enum BackendClient {
    /// Ollama native API
    Ollama(OllamaClient),
    /// OpenAI-compatible chat completions
    OpenAi(ServerClient),
}

impl BackendClient {
    /// Check that the backend is reachable.
    pub async fn health_check(&self) -> Result<(), ServerError> {
        match self {
            BackendClient::Ollama(client) => client.health_check().await,
            BackendClient::OpenAi(client) => client.health_check().await,
        }
    }
}

#[async_trait::async_trait]
impl ScriptoriumDriver for BackendClient {
    async fn generate(&self, req: &GenerateRequest) -> ScriptoriumResult<GenerateResponse> {
        match self {
            BackendClient::Ollama(client) => client.generate(req).await,
            BackendClient::OpenAi(client) => client.generate(req).await,
        }
    }

    fn provider_name(&self) -> &'static str {
        match self {
            BackendClient::Ollama(client) => client.provider_name(),
            BackendClient::OpenAi(client) => client.provider_name(),
        }
    }

    fn model_name(&self) -> &str {
        match self {
            BackendClient::Ollama(client) => client.model_name(),
            BackendClient::OpenAi(client) => client.model_name(),
        }
    }
}

#[async_trait::async_trait]
impl Streaming for BackendClient {
    async fn generate_stream(&self, req: &GenerateRequest) -> ScriptoriumResult<ChunkStream> {
        match self {
            BackendClient::Ollama(client) => client.generate_stream(req).await,
            BackendClient::OpenAi(client) => client.generate_stream(req).await,
        }
    }
}
