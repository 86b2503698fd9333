use thiserror::Error;

/// Application-level errors
#[derive(Debug, Error)]
pub enum AppError {
    /// Missing or invalid configuration
    #[error("Configuration error: {message}")]
    Config {
        /// What was wrong
        message: String,
    },

    /// Ollama call failed
    #[error("Ollama error: {0}")]
    Ollama(#[from] OllamaError),

    /// Embedding failed
    #[error("Embedding error: {0}")]
    Embedding(#[from] EmbeddingError),

    /// Broken internal invariant
    #[error("Internal error: {message}")]
    Internal {
        /// What was wrong
        message: String,
    },
}

/// Ollama API errors
///
/// Every variant is treated as transient by the retrying completion client.
#[derive(Debug, Error)]
pub enum OllamaError {
    /// Non-success HTTP status
    #[error("API error: {status} - {message}")]
    Api {
        /// HTTP status code
        status: u16,
        /// Response body
        message: String,
    },

    /// Body could not be parsed or lacked expected fields
    #[error("Invalid response: {message}")]
    InvalidResponse {
        /// Parse failure detail
        message: String,
    },

    /// Request exceeded the configured timeout
    #[error("Request timeout after {timeout_ms}ms")]
    Timeout {
        /// Configured timeout
        timeout_ms: u64,
    },

    /// Transport failure
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Embedding provider errors, fatal for the current query
#[derive(Debug, Error)]
pub enum EmbeddingError {
    /// The backend call failed
    #[error("Embedding backend failed: {0}")]
    Backend(#[from] OllamaError),

    /// The backend returned no vector
    #[error("Embedding for {chars} chars of text was empty")]
    Empty {
        /// Length of the embedded text
        chars: usize,
    },
}

/// Result type alias for application errors
pub type AppResult<T> = Result<T, AppError>;

/// Result type alias for Ollama operations
pub type OllamaResult<T> = Result<T, OllamaError>;

/// Result type alias for embedding operations
pub type EmbeddingResult<T> = Result<T, EmbeddingError>;
