//! # Reasoning Graph
//!
//! Turns a free-text, step-by-step reasoning transcript from a language model
//! into titled reasoning steps, links the steps into a weighted graph by
//! embedding similarity, and extracts the strongest path from the first step
//! to the final answer.
//!
//! ## Pipeline
//!
//! ```text
//! query → RetryingCompletionClient → StepParser → SimilarityGraphBuilder → PathScorer
//!               (Ollama /api/chat)                 (Ollama /api/embeddings)
//! ```
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use reasoning_graph::{Config, ReasoningPipeline};
//! use reasoning_graph::ollama::OllamaClient;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::from_env()?;
//!     let client = Arc::new(OllamaClient::new(&config.ollama, config.request.clone())?);
//!     let pipeline = ReasoningPipeline::new(client.clone(), client, &config);
//!     let state = pipeline.run_to_completion("How many r's are in strawberry?").await?;
//!     println!("{:?}", state.strongest_path);
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]

/// Command-line interface.
pub mod cli;
/// Completion requests and the retrying completion client.
pub mod completion;
/// Configuration management.
pub mod config;
/// Embedding provider trait and cosine similarity.
pub mod embedding;
/// Error types and result aliases for the application.
pub mod error;
/// Similarity graph construction and path scoring.
pub mod graph;
/// Ollama API client and types.
pub mod ollama;
/// End-to-end query pipeline.
pub mod pipeline;
/// System prompts sent to the model.
pub mod prompts;
/// Reasoning step records and parsing.
pub mod steps;

pub use config::Config;
pub use error::{AppError, AppResult};
pub use pipeline::{PipelineState, ReasoningPipeline};
