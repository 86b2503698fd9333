//! Ollama HTTP client implementing the completion backend and the embedding
//! provider.

mod client;
mod types;


pub use client::*;
pub use types::*;
