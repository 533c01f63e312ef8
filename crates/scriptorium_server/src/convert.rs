//! Conversion between engine requests and backend wire types.

use crate::{
    ChatCompletionChunk, ChatCompletionRequest, ChatCompletionResponse, Message,
    OllamaGenerateRequest, OllamaGenerateResponse, OllamaOptions,
};
use scriptorium_core::{GenerateRequest, GenerateResponse, Output, Role};
use scriptorium_error::{ServerError, ServerErrorKind};
use scriptorium_interface::{FinishReason, StreamChunk};

/// Convert a [`GenerateRequest`] to an OpenAI-compatible chat request.
///
/// The request's model override wins over the configured `model`.
#[tracing::instrument(skip(request), fields(messages = request.messages().len()))]
pub fn to_chat_request(
    request: &GenerateRequest,
    model: &str,
) -> Result<ChatCompletionRequest, ServerError> {
    if request.messages().is_empty() {
        return Err(ServerError::new(ServerErrorKind::Api(
            "Request must contain at least one message".into(),
        )));
    }

    let messages = request
        .messages()
        .iter()
        .map(|m| Message::new(m.role().as_wire(), m.content().as_str()))
        .collect::<Vec<_>>();

    ChatCompletionRequest::builder()
        .model(request.model().clone().unwrap_or_else(|| model.to_string()))
        .messages(messages)
        .max_tokens(*request.max_tokens())
        .temperature(*request.temperature())
        .top_p(*request.top_p())
        .stream(Some(request.stream()))
        .build()
        .map_err(|e| {
            ServerError::new(ServerErrorKind::Api(format!(
                "Failed to build request: {}",
                e
            )))
        })
}

/// Convert a chat completion response to a [`GenerateResponse`].
#[tracing::instrument(skip(response))]
pub fn from_chat_response(
    response: ChatCompletionResponse,
) -> Result<GenerateResponse, ServerError> {
    let choice = response
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| ServerError::new(ServerErrorKind::Api("No choices in response".into())))?;

    Ok(GenerateResponse::text_only(
        choice.message.content.unwrap_or_default(),
    ))
}

/// Convert one SSE chunk to a [`StreamChunk`].
pub fn chunk_to_stream_chunk(chunk: ChatCompletionChunk) -> Result<StreamChunk, ServerError> {
    let choice = chunk.choices.into_iter().next();
    let (content, finish_reason) = match choice {
        Some(choice) => (
            choice.delta.content.unwrap_or_default(),
            choice.finish_reason.as_deref().map(FinishReason::from_wire),
        ),
        None => (String::new(), None),
    };

    StreamChunk::builder()
        .content(content)
        .is_final(finish_reason.is_some())
        .finish_reason(finish_reason)
        .build()
        .map_err(|e| {
            ServerError::new(ServerErrorKind::Stream(format!(
                "Failed to build chunk: {}",
                e
            )))
        })
}

/// Convert a [`GenerateRequest`] to an Ollama `/api/generate` body.
///
/// The first system message becomes `system`; user and assistant messages are
/// joined with blank lines into `prompt`.
#[tracing::instrument(skip(request), fields(messages = request.messages().len()))]
pub fn to_ollama_request(
    request: &GenerateRequest,
    model: &str,
) -> Result<OllamaGenerateRequest, ServerError> {
    let prompt = request
        .messages()
        .iter()
        .filter(|m| *m.role() != Role::System)
        .map(|m| m.content().as_str())
        .collect::<Vec<_>>()
        .join("\n\n");

    if prompt.trim().is_empty() {
        return Err(ServerError::new(ServerErrorKind::Api(
            "Request must contain prompt text".into(),
        )));
    }

    Ok(OllamaGenerateRequest {
        model: request.model().clone().unwrap_or_else(|| model.to_string()),
        prompt,
        system: request.system_text().map(str::to_string),
        stream: request.stream(),
        options: OllamaOptions {
            temperature: *request.temperature(),
            top_p: *request.top_p(),
            num_predict: *request.max_tokens(),
        },
    })
}

/// Convert a complete Ollama response to a [`GenerateResponse`].
pub fn from_ollama_response(
    response: OllamaGenerateResponse,
) -> Result<GenerateResponse, ServerError> {
    if let Some(error) = response.error {
        return Err(ServerError::new(ServerErrorKind::Api(error)));
    }
    Ok(GenerateResponse::new(vec![Output::Text(response.response)]))
}

/// Convert one NDJSON line of an Ollama stream to a [`StreamChunk`].
pub fn ollama_to_stream_chunk(chunk: OllamaGenerateResponse) -> Result<StreamChunk, ServerError> {
    if let Some(error) = chunk.error {
        return Err(ServerError::new(ServerErrorKind::Stream(error)));
    }

    let finish_reason = if chunk.done {
        Some(
            chunk
                .done_reason
                .as_deref()
                .map(FinishReason::from_wire)
                .unwrap_or(FinishReason::Stop),
        )
    } else {
        None
    };

    StreamChunk::builder()
        .content(chunk.response)
        .is_final(chunk.done)
        .finish_reason(finish_reason)
        .build()
        .map_err(|e| {
            ServerError::new(ServerErrorKind::Stream(format!(
                "Failed to build chunk: {}",
                e
            )))
        })
}
