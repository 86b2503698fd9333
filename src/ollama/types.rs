use serde::{Deserialize, Serialize};

use crate::completion::{CompletionRequest, Message};

/// Request body for `POST /api/chat`
#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest {
    /// Chat model name
    pub model: String,
    /// Conversation to continue
    pub messages: Vec<Message>,
    /// Always false; the client reads a single JSON response
    pub stream: bool,
    /// Generation options
    pub options: ChatOptions,
}

/// Generation options for a chat request
#[derive(Debug, Clone, Serialize)]
pub struct ChatOptions {
    /// Token cap
    pub num_predict: u32,
    /// Sampling temperature
    pub temperature: f64,
}

/// Response body from `POST /api/chat`
#[derive(Debug, Clone, Deserialize)]
pub struct ChatResponse {
    /// Model that answered
    #[serde(default)]
    pub model: Option<String>,
    /// Assistant reply
    #[serde(default)]
    pub message: Option<ChatMessage>,
    /// Generation finished
    #[serde(default)]
    pub done: bool,
    /// `stop` or `length`
    #[serde(default)]
    pub done_reason: Option<String>,
    /// Server-side duration in nanoseconds
    #[serde(default)]
    pub total_duration: Option<u64>,
    /// Generated token count
    #[serde(default)]
    pub eval_count: Option<u32>,
}

/// Assistant message inside a chat response
#[derive(Debug, Clone, Deserialize)]
pub struct ChatMessage {
    /// Normally `assistant`
    #[serde(default)]
    pub role: Option<String>,
    /// Reply text
    #[serde(default)]
    pub content: Option<String>,
}

/// Request body for `POST /api/embeddings`
#[derive(Debug, Clone, Serialize)]
pub struct EmbeddingRequest {
    /// Embedding model name
    pub model: String,
    /// Text to embed
    pub prompt: String,
}

/// Response body from `POST /api/embeddings`
#[derive(Debug, Clone, Deserialize)]
pub struct EmbeddingResponse {
    /// The vector, empty when the server sent none
    #[serde(default)]
    pub embedding: Vec<f32>,
}

/// Response body from `GET /api/tags`
#[derive(Debug, Clone, Deserialize)]
pub struct TagsResponse {
    /// Installed models
    #[serde(default)]
    pub models: Vec<ModelInfo>,
}

/// A locally available model
#[derive(Debug, Clone, Deserialize)]
pub struct ModelInfo {
    /// Name with tag, e.g. `llama3.1:latest`
    pub name: String,
    /// Size on disk in bytes
    #[serde(default)]
    pub size: Option<u64>,
}

impl ChatRequest {
    /// Build a non-streaming chat request for a model
    pub fn from_completion(model: impl Into<String>, request: &CompletionRequest) -> Self {
        Self {
            model: model.into(),
            messages: request.messages.clone(),
            stream: false,
            options: ChatOptions {
                num_predict: request.max_tokens,
                temperature: request.temperature,
            },
        }
    }
}

impl ChatResponse {
    /// Assistant text, if the response carried any
    pub fn content(&self) -> Option<&str> {
        self.message.as_ref()?.content.as_deref()
    }
}

impl EmbeddingRequest {
    /// Create an embedding request
    pub fn new(model: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            prompt: prompt.into(),
        }
    }
}
