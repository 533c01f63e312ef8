//! Ollama native API client.

use crate::{
    LineDecoder, OllamaGenerateRequest, OllamaGenerateResponse, ServerConfig, client::check_status,
    convert,
};
use futures::{Stream, StreamExt};
use scriptorium_core::{GenerateRequest, GenerateResponse};
use scriptorium_error::{ScriptoriumError, ScriptoriumResult, ServerError, ServerErrorKind};
use scriptorium_interface::{ChunkStream, ScriptoriumDriver, Streaming, collect_stream};
use std::pin::Pin;
use tracing::instrument;

/// Decoded objects of a streamed `/api/generate` response
type OllamaStream =
    Pin<Box<dyn Stream<Item = Result<OllamaGenerateResponse, ServerError>> + Send>>;

/// Client for an Ollama server.
#[derive(Debug, Clone)]
pub struct OllamaClient {
    config: ServerConfig,
    client: reqwest::Client,
}

impl OllamaClient {
    /// Create a new Ollama client
    #[instrument(skip(config), fields(base_url = %config.base_url(), model = %config.model()))]
    pub fn new(config: ServerConfig) -> Self {
        tracing::debug!("Creating Ollama client");
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }

    /// Get the server configuration
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Check that the server answers on `/api/tags`.
    #[instrument(skip(self))]
    pub async fn health_check(&self) -> Result<(), ServerError> {
        let url = format!("{}/api/tags", self.config.base_url());
        tracing::debug!(url = %url, "Checking Ollama health");

        let response = self.client.get(&url).send().await.map_err(|e| {
            tracing::error!(error = %e, "Health check failed");
            ServerError::new(ServerErrorKind::Http(format!("Health check failed: {}", e)))
        })?;

        check_status(response).await.map(|_| ())
    }

    /// Send a non-streaming generate request.
    #[instrument(skip(self, request), fields(model = %request.model))]
    pub async fn generate_once(
        &self,
        mut request: OllamaGenerateRequest,
    ) -> Result<OllamaGenerateResponse, ServerError> {
        request.stream = false;
        let response = self.post(&request).await?;

        response.json().await.map_err(|e| {
            tracing::error!(error = %e, "Failed to parse response");
            ServerError::new(ServerErrorKind::Deserialization(format!(
                "Failed to parse response: {}",
                e
            )))
        })
    }

    /// Send a streaming generate request and return its decoded lines.
    #[instrument(skip(self, request), fields(model = %request.model))]
    pub async fn generate_lines(
        &self,
        mut request: OllamaGenerateRequest,
    ) -> Result<OllamaStream, ServerError> {
        request.stream = true;
        let response = self.post(&request).await?;
        Ok(Box::pin(parse_ndjson_stream(response)))
    }

    async fn post(&self, request: &OllamaGenerateRequest) -> Result<reqwest::Response, ServerError> {
        let url = format!("{}/api/generate", self.config.base_url());
        tracing::debug!(url = %url, stream = request.stream, "Sending generate request");

        let mut req = self.client.post(&url).json(request);
        if let Some(api_key) = self.config.api_key() {
            req = req.header("Authorization", format!("Bearer {}", api_key));
        }

        let response = req.send().await.map_err(|e| {
            tracing::error!(error = %e, "Request failed");
            ServerError::new(ServerErrorKind::Http(format!("Request failed: {}", e)))
        })?;

        check_status(response).await
    }
}

/// Parse a newline-delimited JSON body; ends after the object marked `done`.
fn parse_ndjson_stream(
    response: reqwest::Response,
) -> impl Stream<Item = Result<OllamaGenerateResponse, ServerError>> + Send {
    async_stream::stream! {
        let mut bytes = response.bytes_stream();
        let mut decoder = LineDecoder::new();
        'read: loop {
            let (lines, at_end) = match bytes.next().await {
                Some(Ok(chunk)) => (decoder.push(&chunk), false),
                Some(Err(e)) => {
                    yield Err(ServerError::new(ServerErrorKind::Stream(format!(
                        "Stream error: {}",
                        e
                    ))));
                    break 'read;
                }
                None => (decoder.finish().map(|rest| rest.into_iter().collect()), true),
            };
            let lines: Vec<String> = match lines {
                Ok(lines) => lines,
                Err(e) => {
                    yield Err(e);
                    break 'read;
                }
            };
            for line in lines.iter().filter(|l| !l.trim().is_empty()) {
                match serde_json::from_str::<OllamaGenerateResponse>(line) {
                    Ok(object) => {
                        let done = object.done;
                        yield Ok(object);
                        if done {
                            break 'read;
                        }
                    }
                    Err(e) => {
                        yield Err(ServerError::new(ServerErrorKind::Deserialization(format!(
                            "Failed to parse line: {}",
                            e
                        ))));
                        break 'read;
                    }
                }
            }
            if at_end {
                break 'read;
            }
        }
    }
}

#[async_trait::async_trait]
impl ScriptoriumDriver for OllamaClient {
    #[instrument(skip(self, req), fields(stream = req.stream()))]
    async fn generate(&self, req: &GenerateRequest) -> ScriptoriumResult<GenerateResponse> {
        if req.stream() {
            let stream = self.generate_stream(req).await?;
            let text = collect_stream(stream).await?;
            return Ok(GenerateResponse::text_only(text));
        }

        let request = convert::to_ollama_request(req, self.config.model())?;
        let response = self.generate_once(request).await?;
        Ok(convert::from_ollama_response(response)?)
    }

    fn provider_name(&self) -> &'static str {
        "ollama"
    }

    fn model_name(&self) -> &str {
        self.config.model()
    }
}

#[async_trait::async_trait]
impl Streaming for OllamaClient {
    async fn generate_stream(&self, req: &GenerateRequest) -> ScriptoriumResult<ChunkStream> {
        let request = convert::to_ollama_request(req, self.config.model())?;
        let lines = self.generate_lines(request).await?;

        let converted = lines.map(|line| {
            line.and_then(convert::ollama_to_stream_chunk)
                .map_err(ScriptoriumError::from)
        });

        Ok(Box::pin(converted))
    }
}
