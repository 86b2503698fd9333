use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use super::types::{ChatRequest, ChatResponse, EmbeddingRequest, EmbeddingResponse, TagsResponse};
use crate::completion::{CompletionBackend, CompletionRequest, CompletionResponse};
use crate::config::{OllamaConfig, RequestConfig};
use crate::embedding::EmbeddingProvider;
use crate::error::{EmbeddingError, EmbeddingResult, OllamaError, OllamaResult};

/// Client for a local or remote Ollama server
#[derive(Clone)]
pub struct OllamaClient {
    client: Client,
    base_url: String,
    model: String,
    /// Explicit embedding model; `None` follows `model`
    embedding_model: Option<String>,
    request_config: RequestConfig,
}

impl OllamaClient {
    /// Create a new Ollama client
    pub fn new(config: &OllamaConfig, request_config: RequestConfig) -> OllamaResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_millis(request_config.timeout_ms))
            .build()
            .map_err(OllamaError::Http)?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            embedding_model: config.embedding_model.clone(),
            request_config,
        })
    }

    /// Use a different chat model, keeping everything else
    ///
    /// Embeddings switch with it unless an embedding model was set explicitly.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Get the base URL (for testing)
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Chat model name
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Model sent to `/api/embeddings`
    pub fn embedding_model(&self) -> &str {
        self.embedding_model.as_deref().unwrap_or(&self.model)
    }

    /// Run one non-streaming chat completion
    pub async fn chat(&self, request: &ChatRequest) -> OllamaResult<ChatResponse> {
        debug!(
            model = %request.model,
            messages = request.messages.len(),
            num_predict = request.options.num_predict,
            "Calling Ollama chat"
        );
        let url = format!("{}/api/chat", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(request)
            .send()
            .await
            .map_err(|e| self.classify(e))?;
        Self::read_json(response).await
    }

    /// Embed a text with the embedding model
    pub async fn embeddings(&self, request: &EmbeddingRequest) -> OllamaResult<EmbeddingResponse> {
        let url = format!("{}/api/embeddings", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(request)
            .send()
            .await
            .map_err(|e| self.classify(e))?;
        Self::read_json(response).await
    }

    /// Names of locally installed models
    pub async fn list_models(&self) -> OllamaResult<Vec<String>> {
        let url = format!("{}/api/tags", self.base_url);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| self.classify(e))?;
        let tags: TagsResponse = Self::read_json(response).await?;
        Ok(tags.models.into_iter().map(|m| m.name).collect())
    }

    /// Installed models, or the configured model when listing fails
    pub async fn available_models(&self) -> Vec<String> {
        match self.list_models().await {
            Ok(models) if !models.is_empty() => models,
            Ok(_) => vec![self.model.clone()],
            Err(e) => {
                warn!(error = %e, fallback = %self.model, "Failed to fetch models");
                vec![self.model.clone()]
            }
        }
    }

    fn classify(&self, e: reqwest::Error) -> OllamaError {
        if e.is_timeout() {
            OllamaError::Timeout {
                timeout_ms: self.request_config.timeout_ms,
            }
        } else {
            OllamaError::Http(e)
        }
    }

    async fn read_json<T: DeserializeOwned>(response: reqwest::Response) -> OllamaResult<T> {
        let status = response.status();

        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            return Err(OllamaError::Api {
                status: status.as_u16(),
                message: error_body,
            });
        }

        response
            .json()
            .await
            .map_err(|e| OllamaError::InvalidResponse {
                message: format!("Failed to parse response: {}", e),
            })
    }
}

#[async_trait]
impl CompletionBackend for OllamaClient {
    async fn complete(&self, request: &CompletionRequest) -> OllamaResult<CompletionResponse> {
        let start = Instant::now();
        let chat = ChatRequest::from_completion(&self.model, request);
        let response = self.chat(&chat).await?;

        let text = response
            .content()
            .ok_or_else(|| OllamaError::InvalidResponse {
                message: "Unexpected response structure: missing message.content".to_string(),
            })?
            .to_string();

        info!(
            model = %self.model,
            latency_ms = start.elapsed().as_millis(),
            chars = text.len(),
            done_reason = ?response.done_reason,
            "Ollama chat completed"
        );

        Ok(CompletionResponse {
            text,
            finish_reason: response.done_reason,
        })
    }
}

#[async_trait]
impl EmbeddingProvider for OllamaClient {
    async fn embed(&self, text: &str) -> EmbeddingResult<Vec<f32>> {
        let request = EmbeddingRequest::new(self.embedding_model(), text);
        let response = self.embeddings(&request).await?;

        if response.embedding.is_empty() {
            return Err(EmbeddingError::Empty { chars: text.len() });
        }

        debug!(
            model = %self.embedding_model(),
            dimensions = response.embedding.len(),
            "Embedded text"
        );
        Ok(response.embedding)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_creation() {
        let client = OllamaClient::new(&OllamaConfig::default(), RequestConfig::default());
        assert!(client.is_ok());
    }

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let config = OllamaConfig {
            base_url: "http://localhost:11434/".to_string(),
            ..OllamaConfig::default()
        };
        let client = OllamaClient::new(&config, RequestConfig::default()).unwrap();
        assert_eq!(client.base_url(), "http://localhost:11434");
    }

    #[test]
    fn test_with_model() {
        let client = OllamaClient::new(&OllamaConfig::default(), RequestConfig::default())
            .unwrap()
            .with_model("qwen2.5");
        assert_eq!(client.model(), "qwen2.5");
        assert_eq!(client.embedding_model(), "qwen2.5");
    }

    #[test]
    fn test_with_model_keeps_explicit_embedding_model() {
        let config = OllamaConfig {
            embedding_model: Some("nomic-embed-text".to_string()),
            ..OllamaConfig::default()
        };
        let client = OllamaClient::new(&config, RequestConfig::default())
            .unwrap()
            .with_model("qwen2.5");
        assert_eq!(client.model(), "qwen2.5");
        assert_eq!(client.embedding_model(), "nomic-embed-text");
    }
}
