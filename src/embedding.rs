//! Embedding provider seam.

use async_trait::async_trait;
use tracing::warn;

use crate::error::EmbeddingResult;

/// Maps text to a fixed-length vector.
///
/// Implementations must be deterministic for a given text and model. No retry
/// happens at this layer: a failure aborts the current query.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embed a single text.
    async fn embed(&self, text: &str) -> EmbeddingResult<Vec<f32>>;
}

/// Cosine similarity of two vectors.
///
/// Returns 0.0 for mismatched lengths or zero-magnitude input so such pairs
/// never clear a positive threshold. A length mismatch means two different
/// embedding models were mixed and is logged as a warning.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() {
        warn!(
            left = a.len(),
            right = b.len(),
            "Embedding dimensions differ, treating pair as unrelated"
        );
        return 0.0;
    }
    if a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;
    for (&x, &y) in a.iter().zip(b.iter()) {
        let x64 = f64::from(x);
        let y64 = f64::from(y);
        dot += x64 * y64;
        norm_a += x64 * x64;
        norm_b += y64 * y64;
    }
    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom <= f64::EPSILON {
        return 0.0;
    }
    (dot / denom).clamp(-1.0, 1.0)
}
