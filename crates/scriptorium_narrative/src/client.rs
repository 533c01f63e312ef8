//! Bounded, retrying generation calls.

use crate::GenerationConfig;
use derive_getters::Getters;
use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use scriptorium_core::{GenerateRequest, Message, word_count};
use scriptorium_error::{
    BuilderError, GenerationError, GenerationErrorKind, RetryableError, ScriptoriumError,
    ScriptoriumErrorKind, ScriptoriumResult,
};
use scriptorium_interface::ScriptoriumDriver;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio_retry2::strategy::{ExponentialBackoff, jitter};
use tokio_retry2::{Retry, RetryError};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

type DirectRateLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// One generation call: role instructions, prompt and per-call overrides.
///
/// Unset overrides fall back to the client's [`GenerationConfig`].
///
/// # Examples
///
/// ```
/// use scriptorium_narrative::PromptSpec;
///
/// let spec = PromptSpec::new("You are a careful editor.", "Is this consistent?")
///     .with_temperature(0.2)
///     .with_min_words(0);
/// assert_eq!(*spec.min_words(), Some(0));
/// assert!(spec.top_p().is_none());
/// ```
#[derive(Debug, Clone, PartialEq, Getters, derive_setters::Setters)]
#[setters(prefix = "with_", strip_option)]
pub struct PromptSpec {
    #[setters(skip)]
    role_instructions: String,
    #[setters(skip)]
    prompt: String,
    temperature: Option<f32>,
    top_p: Option<f32>,
    /// Responses shorter than this are retried
    min_words: Option<usize>,
    max_tokens: Option<u32>,
}

impl PromptSpec {
    /// Create a call description.
    pub fn new(role_instructions: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            role_instructions: role_instructions.into(),
            prompt: prompt.into(),
            temperature: None,
            top_p: None,
            min_words: None,
            max_tokens: None,
        }
    }
}

/// Sends prompts to the backend with bounded retries.
///
/// Each attempt is paced (when a per-minute quota is set), bounded by the
/// request timeout, and rejected if the text is empty or shorter than the
/// word minimum. Retryable failures back off exponentially with jitter;
/// after the last attempt the call fails with
/// [`GenerationErrorKind::Exhausted`].
pub struct GenerationClient<D: ScriptoriumDriver> {
    driver: D,
    config: GenerationConfig,
    limiter: Option<Arc<DirectRateLimiter>>,
    cancel: CancellationToken,
}

impl<D: ScriptoriumDriver> GenerationClient<D> {
    /// Create a client over a driver.
    pub fn new(driver: D, config: GenerationConfig) -> Self {
        let limiter = (*config.requests_per_minute())
            .and_then(NonZeroU32::new)
            .map(|n| Arc::new(RateLimiter::direct(Quota::per_minute(n))));
        Self {
            driver,
            config,
            limiter,
            cancel: CancellationToken::new(),
        }
    }

    /// Abort in-flight and future calls when `token` is cancelled.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// The wrapped driver.
    pub fn driver(&self) -> &D {
        &self.driver
    }

    /// Call settings.
    pub fn config(&self) -> &GenerationConfig {
        &self.config
    }

    /// Word minimum for short-answer calls: `cap`, or less if the configured
    /// minimum is lower.
    pub fn short_min_words(&self, cap: usize) -> usize {
        (*self.config.min_words()).min(cap)
    }

    /// Generate text for a prompt.
    #[tracing::instrument(
        skip(self, spec),
        fields(provider = self.driver.provider_name(), prompt_chars = spec.prompt().len())
    )]
    pub async fn generate(&self, spec: &PromptSpec) -> ScriptoriumResult<String> {
        if self.cancel.is_cancelled() {
            return Err(GenerationError::new(GenerationErrorKind::Cancelled).into());
        }
        let request = self.build_request(spec)?;
        let min_words = spec.min_words().unwrap_or(*self.config.min_words());

        tokio::select! {
            _ = self.cancel.cancelled() => {
                warn!("Generation cancelled");
                Err(GenerationError::new(GenerationErrorKind::Cancelled).into())
            }
            result = self.generate_with_retry(&request, min_words) => result,
        }
    }

    async fn generate_with_retry(
        &self,
        request: &GenerateRequest,
        min_words: usize,
    ) -> ScriptoriumResult<String> {
        let max_attempts = (*self.config.max_attempts()).max(1);
        let strategy = ExponentialBackoff::from_millis(*self.config.initial_backoff_ms())
            .factor(2)
            .max_delay(Duration::from_secs(*self.config.max_backoff_secs()))
            .map(jitter)
            .take(max_attempts - 1);
        let attempts = AtomicUsize::new(0);

        let result = Retry::spawn(strategy, || {
            let attempt = attempts.fetch_add(1, Ordering::SeqCst) + 1;
            async move {
                match self.attempt(request, min_words).await {
                    Ok(text) => {
                        debug!(attempt, words = word_count(&text), "Generation succeeded");
                        Ok(text)
                    }
                    Err(e) if e.is_retryable() && attempt < max_attempts => {
                        warn!(attempt, max_attempts, error = %e, "Generation attempt failed, will retry");
                        Err(RetryError::Transient {
                            err: e,
                            retry_after: None,
                        })
                    }
                    Err(e) => {
                        warn!(attempt, max_attempts, error = %e, "Generation attempt failed");
                        Err(RetryError::Permanent(e))
                    }
                }
            }
        })
        .await;

        result.map_err(|e| {
            let made = attempts.load(Ordering::SeqCst);
            if e.is_retryable() {
                error!(attempts = made, error = %e, "Generation failed after every attempt");
                GenerationError::new(GenerationErrorKind::Exhausted {
                    attempts: made,
                    last: e.to_string(),
                })
                .into()
            } else {
                error!(attempts = made, error = %e, "Generation failed permanently");
                e
            }
        })
    }

    async fn attempt(&self, request: &GenerateRequest, min_words: usize) -> ScriptoriumResult<String> {
        if let Some(limiter) = &self.limiter {
            limiter.until_ready().await;
        }

        let seconds = *self.config.request_timeout_secs();
        let response = tokio::time::timeout(
            Duration::from_secs(seconds),
            self.driver.generate(request),
        )
        .await
        .map_err(|_| GenerationError::new(GenerationErrorKind::Timeout(seconds)))??;

        let text = response.text().trim().to_string();
        if text.is_empty() {
            return Err(GenerationError::new(GenerationErrorKind::EmptyResponse).into());
        }
        let words = word_count(&text);
        if words < min_words {
            return Err(GenerationError::new(GenerationErrorKind::TooShort {
                words,
                minimum: min_words,
            })
            .into());
        }
        Ok(text)
    }

    fn build_request(&self, spec: &PromptSpec) -> ScriptoriumResult<GenerateRequest> {
        let mut messages = Vec::with_capacity(2);
        if !spec.role_instructions().is_empty() {
            messages.push(Message::system(spec.role_instructions().as_str()));
        }
        messages.push(Message::user(spec.prompt().as_str()));

        GenerateRequest::builder()
            .messages(messages)
            .temperature(Some(spec.temperature().unwrap_or(*self.config.temperature())))
            .top_p(Some(spec.top_p().unwrap_or(*self.config.top_p())))
            .max_tokens(Some(spec.max_tokens().unwrap_or(*self.config.max_tokens())))
            .stream(*self.config.stream())
            .build()
            .map_err(|e| BuilderError::from(e.to_string()).into())
    }
}

/// True when the error is a user cancellation rather than a failure.
pub fn is_cancellation(error: &ScriptoriumError) -> bool {
    match error.kind() {
        ScriptoriumErrorKind::Generation(e) => e.kind == GenerationErrorKind::Cancelled,
        ScriptoriumErrorKind::Narrative(e) => {
            matches!(e.kind, scriptorium_error::NarrativeErrorKind::Cancelled(_))
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use scriptorium_core::GenerateResponse;
    use scriptorium_error::{ServerError, ServerErrorKind};
    use std::sync::Mutex;

    struct Scripted {
        replies: Mutex<Vec<ScriptoriumResult<String>>>,
        calls: AtomicUsize,
    }

    impl Scripted {
        fn new(replies: Vec<ScriptoriumResult<String>>) -> Self {
            Self {
                replies: Mutex::new(replies),
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl ScriptoriumDriver for Scripted {
        async fn generate(&self, _req: &GenerateRequest) -> ScriptoriumResult<GenerateResponse> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut replies = self.replies.lock().unwrap();
            let reply = if replies.len() > 1 {
                replies.remove(0)
            } else {
                match &replies[0] {
                    Ok(text) => Ok(text.clone()),
                    Err(_) => Err(ServerError::new(ServerErrorKind::Http("down".into())).into()),
                }
            };
            reply.map(GenerateResponse::text_only)
        }

        fn provider_name(&self) -> &'static str {
            "scripted"
        }

        fn model_name(&self) -> &str {
            "scripted"
        }
    }

    fn config() -> GenerationConfig {
        GenerationConfig::default()
            .with_initial_backoff_ms(1)
            .with_max_backoff_secs(0)
            .with_min_words(3)
    }

    #[tokio::test]
    async fn test_short_response_retried_then_accepted() {
        let driver = Scripted::new(vec![Ok("too short".into()), Ok("long enough reply here".into())]);
        let client = GenerationClient::new(driver, config());
        let text = client.generate(&PromptSpec::new("role", "prompt")).await.unwrap();
        assert_eq!(text, "long enough reply here");
        assert_eq!(client.driver().calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_exhaustion_after_max_attempts() {
        let driver = Scripted::new(vec![Ok("short".into())]);
        let client = GenerationClient::new(driver, config());
        let err = client.generate(&PromptSpec::new("role", "prompt")).await.unwrap_err();
        match err.kind() {
            ScriptoriumErrorKind::Generation(e) => {
                assert!(matches!(e.kind, GenerationErrorKind::Exhausted { attempts: 3, .. }))
            }
            other => panic!("unexpected error: {}", other),
        }
        assert!(err.is_backend_failure());
        assert_eq!(client.driver().calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_per_call_min_words_override() {
        let driver = Scripted::new(vec![Ok("CONSISTENT".into())]);
        let client = GenerationClient::new(driver, config());
        let spec = PromptSpec::new("role", "prompt").with_min_words(0);
        assert_eq!(client.generate(&spec).await.unwrap(), "CONSISTENT");
    }

    #[tokio::test]
    async fn test_non_retryable_error_fails_immediately() {
        let driver = Scripted::new(vec![
            Err(ServerError::new(ServerErrorKind::Configuration("no model".into())).into()),
            Ok("never reached in this test".into()),
        ]);
        let client = GenerationClient::new(driver, config());
        let err = client.generate(&PromptSpec::new("role", "prompt")).await.unwrap_err();
        assert!(matches!(err.kind(), ScriptoriumErrorKind::Server(_)));
        assert_eq!(client.driver().calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_cancelled_client_makes_no_call() {
        let token = CancellationToken::new();
        token.cancel();
        let client = GenerationClient::new(Scripted::new(vec![Ok("a b c d".into())]), config())
            .with_cancellation(token);
        let err = client.generate(&PromptSpec::new("role", "prompt")).await.unwrap_err();
        assert!(is_cancellation(&err));
        assert_eq!(client.driver().calls.load(Ordering::SeqCst), 0);
    }
}
