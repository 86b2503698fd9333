//! Integration tests for the Ollama client
//!
//! Tests HTTP client behavior using wiremock for request/response mocking.

use serde_json::json;
use wiremock::{
    matchers::{body_partial_json, method, path},
    Mock, MockServer, ResponseTemplate,
};

use reasoning_graph::completion::{CompletionBackend, CompletionRequest, Message};
use reasoning_graph::config::{OllamaConfig, RequestConfig};
use reasoning_graph::embedding::EmbeddingProvider;
use reasoning_graph::error::{EmbeddingError, OllamaError};
use reasoning_graph::ollama::OllamaClient;

/// Create a test client pointing to mock server
fn create_test_client(base_url: &str) -> OllamaClient {
    let config = OllamaConfig {
        base_url: base_url.to_string(),
        model: "llama3.1".to_string(),
        embedding_model: Some("nomic-embed-text".to_string()),
    };

    let request_config = RequestConfig {
        timeout_ms: 5000,
        max_retries: 1,
        retry_delay_ms: 10,
    };

    OllamaClient::new(&config, request_config).expect("Failed to create client")
}

fn create_test_request(content: &str) -> CompletionRequest {
    CompletionRequest::new(vec![Message::user(content)], 256)
}

#[cfg(test)]
mod chat_tests {
    use super::*;

    #[tokio::test]
    async fn test_successful_completion() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .and(body_partial_json(json!({
                "model": "llama3.1",
                "stream": false,
                "options": {"num_predict": 256, "temperature": 0.2}
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "model": "llama3.1",
                "message": {"role": "assistant", "content": "### Step 1: A\nB"},
                "done": true,
                "done_reason": "stop"
            })))
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = create_test_client(&mock_server.uri());
        let result = client.complete(&create_test_request("Why?")).await;

        assert!(result.is_ok(), "Completion should succeed: {:?}", result.err());
        let response = result.unwrap();
        assert_eq!(response.text, "### Step 1: A\nB");
        assert_eq!(response.finish_reason.as_deref(), Some("stop"));
    }

    #[tokio::test]
    async fn test_length_finish_reason_passes_through() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "message": {"role": "assistant", "content": "### Step 1: Cut"},
                "done": true,
                "done_reason": "length"
            })))
            .mount(&mock_server)
            .await;

        let client = create_test_client(&mock_server.uri());
        let response = client
            .complete(&create_test_request("Long question"))
            .await
            .unwrap();

        assert_eq!(response.finish_reason.as_deref(), Some("length"));
    }

    #[tokio::test]
    async fn test_missing_content_is_invalid_response() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"done": true})))
            .mount(&mock_server)
            .await;

        let client = create_test_client(&mock_server.uri());
        let err = client
            .complete(&create_test_request("Test"))
            .await
            .unwrap_err();

        assert!(matches!(err, OllamaError::InvalidResponse { .. }));
    }

    #[tokio::test]
    async fn test_malformed_json_is_invalid_response() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&mock_server)
            .await;

        let client = create_test_client(&mock_server.uri());
        let err = client
            .complete(&create_test_request("Test"))
            .await
            .unwrap_err();

        assert!(matches!(err, OllamaError::InvalidResponse { .. }));
    }

    #[tokio::test]
    async fn test_model_not_found() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .respond_with(
                ResponseTemplate::new(404).set_body_json(json!({"error": "model 'x' not found"})),
            )
            .mount(&mock_server)
            .await;

        let client = create_test_client(&mock_server.uri());
        let err = client
            .complete(&create_test_request("Test"))
            .await
            .unwrap_err();

        match err {
            OllamaError::Api { status, message } => {
                assert_eq!(status, 404);
                assert!(message.contains("not found"));
            }
            other => panic!("expected API error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_connection_refused() {
        let client = create_test_client("http://127.0.0.1:1");
        let err = client
            .complete(&create_test_request("Test"))
            .await
            .unwrap_err();

        assert!(matches!(err, OllamaError::Http(_)));
    }
}

#[cfg(test)]
mod embedding_tests {
    use super::*;

    #[tokio::test]
    async fn test_embed_uses_embedding_model() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/api/embeddings"))
            .and(body_partial_json(json!({
                "model": "nomic-embed-text",
                "prompt": "### Step 1: A\nB"
            })))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"embedding": [0.5, -0.25, 1.0]})),
            )
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = create_test_client(&mock_server.uri());
        let embedding = client.embed("### Step 1: A\nB").await.unwrap();

        assert_eq!(embedding, vec![0.5, -0.25, 1.0]);
    }

    #[tokio::test]
    async fn test_embed_follows_overridden_chat_model() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/api/embeddings"))
            .and(body_partial_json(json!({"model": "qwen2.5"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"embedding": [1.0, 0.0]})))
            .expect(1)
            .mount(&mock_server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/embeddings"))
            .respond_with(
                ResponseTemplate::new(404).set_body_json(json!({"error": "model not found"})),
            )
            .mount(&mock_server)
            .await;

        let config = OllamaConfig {
            base_url: mock_server.uri(),
            model: "llama3.1".to_string(),
            embedding_model: None,
        };
        let client = OllamaClient::new(&config, RequestConfig::default())
            .unwrap()
            .with_model("qwen2.5");
        let embedding = client.embed("text").await.unwrap();

        assert_eq!(embedding, vec![1.0, 0.0]);
    }

    #[tokio::test]
    async fn test_explicit_embedding_model_survives_model_override() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/api/embeddings"))
            .and(body_partial_json(json!({"model": "nomic-embed-text"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"embedding": [0.0, 1.0]})))
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = create_test_client(&mock_server.uri()).with_model("qwen2.5");
        let embedding = client.embed("text").await.unwrap();

        assert_eq!(embedding, vec![0.0, 1.0]);
    }

    #[tokio::test]
    async fn test_empty_embedding_is_error() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/api/embeddings"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"embedding": []})))
            .mount(&mock_server)
            .await;

        let client = create_test_client(&mock_server.uri());
        let err = client.embed("text").await.unwrap_err();

        assert!(matches!(err, EmbeddingError::Empty { chars: 4 }));
    }

    #[tokio::test]
    async fn test_embedding_server_error() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/api/embeddings"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&mock_server)
            .await;

        let client = create_test_client(&mock_server.uri());
        let err = client.embed("text").await.unwrap_err();

        assert!(matches!(
            err,
            EmbeddingError::Backend(OllamaError::Api { status: 500, .. })
        ));
    }
}

#[cfg(test)]
mod model_listing_tests {
    use super::*;

    #[tokio::test]
    async fn test_list_models() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/api/tags"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "models": [
                    {"name": "llama3.1:latest"},
                    {"name": "qwen2.5:7b"}
                ]
            })))
            .mount(&mock_server)
            .await;

        let client = create_test_client(&mock_server.uri());
        let models = client.list_models().await.unwrap();

        assert_eq!(models, vec!["llama3.1:latest", "qwen2.5:7b"]);
    }

    #[tokio::test]
    async fn test_available_models_falls_back_to_configured_model() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/api/tags"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&mock_server)
            .await;

        let client = create_test_client(&mock_server.uri());
        assert_eq!(client.available_models().await, vec!["llama3.1"]);
    }
}
