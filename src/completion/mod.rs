//! Completion requests and the fixed-policy retrying client.
//!
//! The [`CompletionBackend`] trait is the seam to the model server; the
//! [`RetryingCompletionClient`] wraps any backend with a bounded number of
//! attempts and a constant pause between them. Exhausting the budget is a
//! value ([`CompletionOutcome::Exhausted`]) rather than an error so callers
//! can always render something.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{error, info, warn};

use crate::config::RequestConfig;
use crate::error::OllamaResult;
use crate::steps::StepRecord;

/// Finish reason reported when the model hit the token limit.
pub const FINISH_REASON_LENGTH: &str = "length";

/// Message in a chat conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Who wrote the message
    pub role: MessageRole,
    /// Message text
    pub content: String,
}

/// Message role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    /// Instructions for the model
    System,
    /// The asking user
    User,
    /// A model reply
    Assistant,
}

impl Message {
    /// Create a system message
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::System,
            content: content.into(),
        }
    }

    /// Create a user message
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
        }
    }

    /// Create an assistant message
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: content.into(),
        }
    }

    /// Echo a previously produced step back to the model as JSON.
    pub fn assistant_step(step: &StepRecord) -> Self {
        let content = serde_json::to_string(step).unwrap_or_else(|_| step.embedding_text());
        Self::assistant(content)
    }
}

/// A single completion request
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    /// Conversation so far, system prompt first
    pub messages: Vec<Message>,
    /// Token cap for the reply
    pub max_tokens: u32,
    /// Sampling temperature
    pub temperature: f64,
}

impl CompletionRequest {
    /// Create a request with the default temperature
    pub fn new(messages: Vec<Message>, max_tokens: u32) -> Self {
        Self {
            messages,
            max_tokens,
            temperature: 0.2,
        }
    }

    /// Set temperature
    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = temperature;
        self
    }
}

/// Raw completion text from one successful call
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionResponse {
    /// Generated text
    pub text: String,
    /// Why generation stopped, e.g. `stop` or `length`
    pub finish_reason: Option<String>,
}

/// A model server able to run one chat completion.
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    /// Run a single completion call without retrying.
    async fn complete(&self, request: &CompletionRequest) -> OllamaResult<CompletionResponse>;
}

/// Result of a retried completion.
#[derive(Debug, Clone, PartialEq)]
pub enum CompletionOutcome {
    /// One attempt succeeded.
    Completed {
        /// Generated text
        text: String,
        /// Why generation stopped
        finish_reason: Option<String>,
        /// Calls made, including the successful one
        attempts: u32,
        /// Time across all attempts and delays
        elapsed: Duration,
    },
    /// Every attempt failed; `error` is the last failure.
    Exhausted {
        /// Message of the last failure
        error: String,
        /// Calls made
        attempts: u32,
        /// Time across all attempts and delays
        elapsed: Duration,
    },
}

impl CompletionOutcome {
    /// Number of calls made.
    pub fn attempts(&self) -> u32 {
        match self {
            Self::Completed { attempts, .. } | Self::Exhausted { attempts, .. } => *attempts,
        }
    }

    /// Wall time spent on calls and retry pauses.
    pub fn elapsed(&self) -> Duration {
        match self {
            Self::Completed { elapsed, .. } | Self::Exhausted { elapsed, .. } => *elapsed,
        }
    }

    /// Finish reason of the successful call, if any.
    pub fn finish_reason(&self) -> Option<&str> {
        match self {
            Self::Completed { finish_reason, .. } => finish_reason.as_deref(),
            Self::Exhausted { .. } => None,
        }
    }
}

/// Retries a [`CompletionBackend`] with a fixed delay.
#[derive(Clone)]
pub struct RetryingCompletionClient {
    backend: Arc<dyn CompletionBackend>,
    max_attempts: u32,
    retry_delay: Duration,
}

impl RetryingCompletionClient {
    /// Wrap a backend using the configured attempt budget and delay
    pub fn new(backend: Arc<dyn CompletionBackend>, request_config: &RequestConfig) -> Self {
        Self {
            backend,
            max_attempts: request_config.max_retries.max(1),
            retry_delay: request_config.retry_delay(),
        }
    }

    /// Maximum number of calls per request
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Run the request until it succeeds or the attempt budget is spent
    pub async fn complete(&self, request: &CompletionRequest) -> CompletionOutcome {
        let start = Instant::now();
        let mut last_error = None;
        let mut attempts = 0;

        while attempts < self.max_attempts {
            if attempts > 0 {
                warn!(
                    retry = attempts,
                    delay_ms = self.retry_delay.as_millis(),
                    "Retrying completion request"
                );
                tokio::time::sleep(self.retry_delay).await;
            }
            attempts += 1;

            let call_start = Instant::now();
            match self.backend.complete(request).await {
                Ok(response) => {
                    info!(
                        attempt = attempts,
                        latency_ms = call_start.elapsed().as_millis(),
                        finish_reason = ?response.finish_reason,
                        "Completion call succeeded"
                    );
                    return CompletionOutcome::Completed {
                        text: response.text,
                        finish_reason: response.finish_reason,
                        attempts,
                        elapsed: start.elapsed(),
                    };
                }
                Err(e) => {
                    error!(
                        error = %e,
                        attempt = attempts,
                        latency_ms = call_start.elapsed().as_millis(),
                        "Completion call failed"
                    );
                    last_error = Some(e);
                }
            }
        }

        CompletionOutcome::Exhausted {
            error: last_error
                .map(|e| e.to_string())
                .unwrap_or_else(|| "Unknown error".to_string()),
            attempts,
            elapsed: start.elapsed(),
        }
    }
}
