//! Trait definitions for text-generation backends.

use crate::ChunkStream;
use async_trait::async_trait;
use futures_util::StreamExt;
use scriptorium_core::{GenerateRequest, GenerateResponse};
use scriptorium_error::ScriptoriumResult;

/// Core trait that every text-generation backend adapter implements.
///
/// Adapters must return the complete text: when the request asks for
/// streaming, the adapter reads its own chunk stream and concatenates it
/// before returning.
#[async_trait]
pub trait ScriptoriumDriver: Send + Sync {
    /// Generate a response for the request.
    async fn generate(&self, req: &GenerateRequest) -> ScriptoriumResult<GenerateResponse>;

    /// Provider name (e.g., "ollama", "openai-compatible").
    fn provider_name(&self) -> &'static str;

    /// Model identifier (e.g., "llama3").
    fn model_name(&self) -> &str;
}

#[async_trait]
impl<D: ScriptoriumDriver + ?Sized> ScriptoriumDriver for Box<D> {
    async fn generate(&self, req: &GenerateRequest) -> ScriptoriumResult<GenerateResponse> {
        (**self).generate(req).await
    }

    fn provider_name(&self) -> &'static str {
        (**self).provider_name()
    }

    fn model_name(&self) -> &str {
        (**self).model_name()
    }
}

/// Trait for backends that can expose their raw chunk stream.
#[async_trait]
pub trait Streaming: ScriptoriumDriver {
    /// Generate a streaming response.
    ///
    /// Returns a stream that yields chunks as they arrive from the backend.
    async fn generate_stream(&self, req: &GenerateRequest) -> ScriptoriumResult<ChunkStream>;
}

/// Drain a chunk stream, concatenating its text.
///
/// Stops at the first chunk marked final or at the end of the stream; the
/// first error aborts the read.
///
/// # Examples
///
/// ```
/// use futures_util::stream;
/// use scriptorium_interface::{ChunkStream, StreamChunk, collect_stream};
///
/// # tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(async {
/// let chunks: ChunkStream = Box::pin(stream::iter(vec![
///     Ok(StreamChunk::builder().content("Salt ").build().unwrap()),
///     Ok(StreamChunk::builder().content("wind").is_final(true).build().unwrap()),
/// ]));
/// assert_eq!(collect_stream(chunks).await.unwrap(), "Salt wind");
/// # });
/// ```
pub async fn collect_stream(mut stream: ChunkStream) -> ScriptoriumResult<String> {
    let mut text = String::new();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        text.push_str(chunk.content());
        if *chunk.is_final() {
            break;
        }
    }
    Ok(text)
}
