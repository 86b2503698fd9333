use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::error::AppError;
use crate::graph::PathCost;

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    /// Ollama server and model names
    pub ollama: OllamaConfig,
    /// Completion parameters
    pub generation: GenerationConfig,
    /// Log level and format
    pub logging: LoggingConfig,
    /// Timeouts and retry budget
    pub request: RequestConfig,
    /// Similarity graph settings
    pub graph: GraphConfig,
}

/// Ollama server configuration
#[derive(Debug, Clone)]
pub struct OllamaConfig {
    /// Server URL, e.g. `http://localhost:11434`
    pub base_url: String,
    /// Chat model name
    pub model: String,
    /// Embedding model; `None` follows the chat model
    pub embedding_model: Option<String>,
}

/// Completion generation parameters
#[derive(Debug, Clone)]
pub struct GenerationConfig {
    /// Token cap for one completion (`num_predict`)
    pub max_tokens: u32,
    /// Sampling temperature
    pub temperature: f64,
}

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Default filter directive when `RUST_LOG` is unset
    pub level: String,
    /// Output format
    pub format: LogFormat,
}

/// Log output format
#[derive(Debug, Clone, PartialEq)]
pub enum LogFormat {
    /// Human-readable lines
    Pretty,
    /// One JSON object per event
    Json,
}

/// HTTP request and retry configuration
#[derive(Debug, Clone)]
pub struct RequestConfig {
    /// Per-request HTTP timeout
    pub timeout_ms: u64,
    /// Total completion attempts, including the first call
    pub max_retries: u32,
    /// Fixed pause between attempts
    pub retry_delay_ms: u64,
}

/// Similarity graph configuration
#[derive(Debug, Clone)]
pub struct GraphConfig {
    /// Edges are created only above this cosine similarity (strict)
    pub similarity_threshold: f64,
    /// How edge weights become path costs
    pub path_cost: PathCost,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, AppError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let ollama = OllamaConfig {
            base_url: env::var("OLLAMA_BASE_URL")
                .unwrap_or_else(|_| "http://localhost:11434".to_string()),
            model: env::var("OLLAMA_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string()),
            embedding_model: env::var("OLLAMA_EMBEDDING_MODEL")
                .ok()
                .filter(|m| !m.trim().is_empty()),
        };

        let generation = GenerationConfig {
            max_tokens: parse_var("MAX_TOKENS", 1024)?,
            temperature: parse_var("TEMPERATURE", 0.2)?,
        };
        if generation.max_tokens == 0 {
            return Err(AppError::Config {
                message: "MAX_TOKENS must be greater than zero".to_string(),
            });
        }

        let logging = LoggingConfig {
            level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            format: match env::var("LOG_FORMAT")
                .unwrap_or_else(|_| "pretty".to_string())
                .to_lowercase()
                .as_str()
            {
                "json" => LogFormat::Json,
                _ => LogFormat::Pretty,
            },
        };

        let request = RequestConfig {
            timeout_ms: parse_var("REQUEST_TIMEOUT_MS", 120_000)?,
            max_retries: parse_var("MAX_RETRIES", 3)?,
            retry_delay_ms: parse_var("RETRY_DELAY_MS", 1000)?,
        };
        if request.max_retries == 0 {
            return Err(AppError::Config {
                message: "MAX_RETRIES must allow at least one attempt".to_string(),
            });
        }

        let graph = GraphConfig {
            similarity_threshold: parse_var("SIMILARITY_THRESHOLD", 0.5)?,
            path_cost: match env::var("PATH_COST") {
                Ok(value) => value.parse().map_err(|message| AppError::Config { message })?,
                Err(_) => PathCost::default(),
            },
        };
        if !(0.0..=1.0).contains(&graph.similarity_threshold) {
            return Err(AppError::Config {
                message: format!(
                    "SIMILARITY_THRESHOLD must be within [0, 1], got {}",
                    graph.similarity_threshold
                ),
            });
        }

        Ok(Config {
            ollama,
            generation,
            logging,
            request,
            graph,
        })
    }
}

/// Model used when nothing is configured and the server cannot list models
pub const DEFAULT_MODEL: &str = "llama3.1";

fn parse_var<T: FromStr>(name: &str, default: T) -> Result<T, AppError> {
    match env::var(name) {
        Ok(raw) => raw.trim().parse().map_err(|_| AppError::Config {
            message: format!("{} has an invalid value: {:?}", name, raw),
        }),
        Err(_) => Ok(default),
    }
}

impl RequestConfig {
    /// Pause between two completion attempts
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

impl Default for RequestConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 120_000,
            max_retries: 3,
            retry_delay_ms: 1000,
        }
    }
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            max_tokens: 1024,
            temperature: 0.2,
        }
    }
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: 0.5,
            path_cost: PathCost::default(),
        }
    }
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434".to_string(),
            model: DEFAULT_MODEL.to_string(),
            embedding_model: None,
        }
    }
}

impl OllamaConfig {
    /// Model used for embeddings: the explicit one, else the chat model
    pub fn embedding_model(&self) -> &str {
        self.embedding_model.as_deref().unwrap_or(&self.model)
    }
}
