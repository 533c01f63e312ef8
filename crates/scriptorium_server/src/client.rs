use crate::{
    ChatCompletionChunk, ChatCompletionRequest, ChatCompletionResponse, ServerConfig, SseDecoder,
    SseEvent, convert,
};
use futures::{Stream, StreamExt};
use scriptorium_core::{GenerateRequest, GenerateResponse};
use scriptorium_error::{ScriptoriumError, ScriptoriumResult, ServerError, ServerErrorKind};
use scriptorium_interface::{ChunkStream, ScriptoriumDriver, Streaming, collect_stream};
use std::pin::Pin;
use tracing::instrument;

/// Type alias for streaming responses
type ChatCompletionStream =
    Pin<Box<dyn Stream<Item = Result<ChatCompletionChunk, ServerError>> + Send>>;

/// Client for OpenAI-compatible inference servers
#[derive(Debug, Clone)]
pub struct ServerClient {
    config: ServerConfig,
    client: reqwest::Client,
}

impl ServerClient {
    /// Create a new server client
    #[instrument(skip(config), fields(base_url = %config.base_url(), model = %config.model()))]
    pub fn new(config: ServerConfig) -> Self {
        tracing::debug!("Creating server client");
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }

    /// Get the server configuration
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Check if the server is running and responding
    #[instrument(skip(self))]
    pub async fn health_check(&self) -> Result<(), ServerError> {
        let url = format!("{}/health", self.config.base_url());
        tracing::debug!(url = %url, "Checking server health");

        let response = self.client.get(&url).send().await.map_err(|e| {
            tracing::error!(error = %e, "Health check failed");
            ServerError::new(ServerErrorKind::Http(format!("Health check failed: {}", e)))
        })?;

        check_status(response).await.map(|_| {
            tracing::debug!("Server is healthy");
        })
    }

    /// Send a chat completion request
    #[instrument(skip(self, request), fields(model = %request.model))]
    pub async fn chat_completion(
        &self,
        mut request: ChatCompletionRequest,
    ) -> Result<ChatCompletionResponse, ServerError> {
        request.stream = Some(false);
        let response = self.post(&request).await?;

        let result = response.json().await.map_err(|e| {
            tracing::error!(error = %e, "Failed to parse response");
            ServerError::new(ServerErrorKind::Deserialization(format!(
                "Failed to parse response: {}",
                e
            )))
        })?;

        tracing::debug!("Chat completion successful");
        Ok(result)
    }

    /// Send a streaming chat completion request
    #[instrument(skip(self, request), fields(model = %request.model))]
    pub async fn chat_completion_stream(
        &self,
        mut request: ChatCompletionRequest,
    ) -> Result<ChatCompletionStream, ServerError> {
        request.stream = Some(true);
        let response = self.post(&request).await?;

        tracing::debug!("Streaming request accepted, reading SSE stream");
        Ok(Box::pin(parse_sse_stream(response)))
    }

    async fn post(&self, request: &ChatCompletionRequest) -> Result<reqwest::Response, ServerError> {
        let url = format!("{}/v1/chat/completions", self.config.base_url());
        tracing::debug!(url = %url, "Sending chat completion request");

        let mut req = self
            .client
            .post(&url)
            .json(request)
            .header("Content-Type", "application/json");

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

/// Turn a non-success status into a [`ServerErrorKind::Status`] carrying the body.
pub(crate) async fn check_status(
    response: reqwest::Response,
) -> Result<reqwest::Response, ServerError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    tracing::error!(status = status.as_u16(), body = %body, "Server returned error");
    let message = if body.trim().is_empty() {
        status.canonical_reason().unwrap_or("unknown").to_string()
    } else {
        body
    };
    Err(ServerError::new(ServerErrorKind::Status {
        status_code: status.as_u16(),
        message,
    }))
}

/// Parse a Server-Sent Events body into chat completion chunks.
fn parse_sse_stream(
    response: reqwest::Response,
) -> impl Stream<Item = Result<ChatCompletionChunk, ServerError>> + Send {
    async_stream::stream! {
        let mut bytes = response.bytes_stream();
        let mut decoder = SseDecoder::new();
        'read: loop {
            let (events, at_end) = match bytes.next().await {
                Some(Ok(chunk)) => (decoder.push(&chunk), false),
                Some(Err(e)) => {
                    yield Err(ServerError::new(ServerErrorKind::Stream(format!(
                        "Stream error: {}",
                        e
                    ))));
                    break 'read;
                }
                None => (decoder.finish(), true),
            };
            let events = match events {
                Ok(events) => events,
                Err(e) => {
                    yield Err(e);
                    break 'read;
                }
            };
            for event in events {
                match event {
                    SseEvent::Done => break 'read,
                    SseEvent::Data(data) => {
                        yield serde_json::from_str::<ChatCompletionChunk>(&data).map_err(|e| {
                            ServerError::new(ServerErrorKind::Deserialization(format!(
                                "Failed to parse chunk: {}",
                                e
                            )))
                        });
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
impl ScriptoriumDriver for ServerClient {
    #[instrument(skip(self, req), fields(stream = req.stream()))]
    async fn generate(&self, req: &GenerateRequest) -> ScriptoriumResult<GenerateResponse> {
        if req.stream() {
            let stream = self.generate_stream(req).await?;
            let text = collect_stream(stream).await?;
            return Ok(GenerateResponse::text_only(text));
        }

        let chat_request = convert::to_chat_request(req, self.config.model())?;
        let response = self.chat_completion(chat_request).await?;
        Ok(convert::from_chat_response(response)?)
    }

    fn provider_name(&self) -> &'static str {
        "openai-compatible"
    }

    fn model_name(&self) -> &str {
        self.config.model()
    }
}

#[async_trait::async_trait]
impl Streaming for ServerClient {
    async fn generate_stream(&self, req: &GenerateRequest) -> ScriptoriumResult<ChunkStream> {
        tracing::debug!("Starting stream generation");

        let chat_request = convert::to_chat_request(req, self.config.model())?;
        let stream = self.chat_completion_stream(chat_request).await?;

        let converted = stream.map(|chunk_result| {
            chunk_result
                .and_then(convert::chunk_to_stream_chunk)
                .map_err(ScriptoriumError::from)
        });

        Ok(Box::pin(converted))
    }
}
