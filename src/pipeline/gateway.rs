//! Model gateway: "send a prompt (+ optional image), get raw text back".
//!
//! Both stages talk to language models through this one narrow trait, so
//! tests drive the whole pipeline with a stub and production code plugs in
//! any `edgequake_llm` provider through [`LlmGateway`].
//!
//! ## Retry Strategy
//!
//! Retry belongs here and nowhere above. Each call gets a per-attempt
//! timeout and exponential backoff (`retry_backoff_ms * 2^attempt`); with
//! 500 ms base and 3 retries the wait sequence is 500 ms → 1 s → 2 s.
//! After the last attempt the failure surfaces as one [`ModelCallError`].

use crate::error::ModelCallError;
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, ImageData, LLMProvider};
use std::sync::Arc;
use std::time::Instant;
use tokio::time::{sleep, timeout, Duration};
use tracing::{debug, warn};

/// What the user turn of a request carries.
#[derive(Debug, Clone)]
pub enum UserContent {
    /// Plain text (translation calls).
    Text(String),
    /// Text plus one page image (transcription calls).
    TextWithImage { text: String, image: ImageData },
}

/// One request to a model.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub system_prompt: String,
    pub content: UserContent,
    /// Ask for reproducible sampling (temperature 0).
    pub deterministic: bool,
}

/// Raw model output plus token accounting.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Completion {
    pub text: String,
    pub input_tokens: usize,
    pub output_tokens: usize,
}

impl Completion {
    /// A completion with no token accounting.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Default::default()
        }
    }
}

/// The capability both pipeline stages depend on.
#[async_trait]
pub trait ModelGateway: Send + Sync {
    async fn complete(&self, request: &CompletionRequest) -> Result<Completion, ModelCallError>;
}

/// [`ModelGateway`] backed by an `edgequake_llm` provider.
pub struct LlmGateway {
    provider: Arc<dyn LLMProvider>,
    temperature: f32,
    max_tokens: usize,
    max_retries: u32,
    retry_backoff_ms: u64,
    call_timeout: Duration,
}

impl LlmGateway {
    pub fn new(provider: Arc<dyn LLMProvider>) -> Self {
        Self {
            provider,
            temperature: 0.3,
            max_tokens: 4096,
            max_retries: 3,
            retry_backoff_ms: 500,
            call_timeout: Duration::from_secs(120),
        }
    }

    /// Temperature used when a request is not deterministic.
    pub fn with_temperature(mut self, t: f32) -> Self {
        self.temperature = t;
        self
    }

    pub fn with_max_tokens(mut self, n: usize) -> Self {
        self.max_tokens = n;
        self
    }

    pub fn with_retries(mut self, max_retries: u32, backoff_ms: u64) -> Self {
        self.max_retries = max_retries;
        self.retry_backoff_ms = backoff_ms;
        self
    }

    pub fn with_call_timeout(mut self, secs: u64) -> Self {
        self.call_timeout = Duration::from_secs(secs);
        self
    }

    fn options(&self, deterministic: bool) -> CompletionOptions {
        CompletionOptions {
            temperature: Some(if deterministic { 0.0 } else { self.temperature }),
            max_tokens: Some(self.max_tokens),
            ..Default::default()
        }
    }
}

/// Build the chat transcript for a request.
///
/// Images ride on the user turn; VLM APIs need a user turn to answer anyway.
fn build_messages(request: &CompletionRequest) -> Vec<ChatMessage> {
    let user = match &request.content {
        UserContent::Text(text) => ChatMessage::user(text.as_str()),
        UserContent::TextWithImage { text, image } => {
            ChatMessage::user_with_images(text.as_str(), vec![image.clone()])
        }
    };
    vec![ChatMessage::system(request.system_prompt.as_str()), user]
}

#[async_trait]
impl ModelGateway for LlmGateway {
    async fn complete(&self, request: &CompletionRequest) -> Result<Completion, ModelCallError> {
        let start = Instant::now();
        let messages = build_messages(request);
        let options = self.options(request.deterministic);
        let mut last_err: Option<ModelCallError> = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let backoff = self.retry_backoff_ms * 2u64.pow(attempt - 1);
                warn!(
                    "Model call: retry {}/{} after {}ms",
                    attempt, self.max_retries, backoff
                );
                sleep(Duration::from_millis(backoff)).await;
            }

            match timeout(self.call_timeout, self.provider.chat(&messages, Some(&options))).await {
                Ok(Ok(response)) => {
                    debug!(
                        "Model call: {} input tokens, {} output tokens, {:?}",
                        response.prompt_tokens,
                        response.completion_tokens,
                        start.elapsed()
                    );
                    return Ok(Completion {
                        text: response.content,
                        input_tokens: response.prompt_tokens,
                        output_tokens: response.completion_tokens,
                    });
                }
                Ok(Err(e)) => {
                    warn!("Model call: attempt {} failed: {}", attempt + 1, e);
                    last_err = Some(ModelCallError::Failed {
                        attempts: attempt + 1,
                        detail: e.to_string(),
                    });
                }
                Err(_) => {
                    warn!(
                        "Model call: attempt {} timed out after {}s",
                        attempt + 1,
                        self.call_timeout.as_secs()
                    );
                    last_err = Some(ModelCallError::Timeout {
                        secs: self.call_timeout.as_secs(),
                    });
                }
            }
        }

        Err(last_err.unwrap_or(ModelCallError::Failed {
            attempts: self.max_retries + 1,
            detail: "Unknown error".to_string(),
        }))
    }
}
