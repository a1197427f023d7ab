//! Embedding generation for semantic search and retrieval.

mod ollama;
mod resilient;
#[cfg(test)]
pub(crate) mod testing;

pub use ollama::OllamaEmbedder;
pub use resilient::{BatchOutcome, EmbeddedBatch, EmbeddingFailure, ResilientEmbedder};

use crate::error::{KildeError, Result};
use async_trait::async_trait;

/// Trait for embedding generation.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Generate embeddings for multiple texts in a single request.
    ///
    /// Output is returned as produced by the service: not validated, not normalized.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Generate an embedding for a single text.
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let embeddings = self.embed_batch(&[text.to_string()]).await?;
        embeddings
            .into_iter()
            .next()
            .ok_or_else(|| KildeError::Validation("Empty embedding response".to_string()))
    }

    /// Get the embedding dimensions.
    fn dimensions(&self) -> usize;

    /// Name of the embedding model.
    fn model(&self) -> &str;
}

/// Validate a raw embedding and scale it to unit length.
///
/// Rejects wrong dimensions, NaN or infinite components, and zero vectors.
pub fn unit_vector(mut vector: Vec<f32>, dimensions: usize) -> Result<Vec<f32>> {
    if vector.len() != dimensions {
        return Err(KildeError::DimensionMismatch {
            expected: dimensions,
            actual: vector.len(),
        });
    }

    if let Some(i) = vector.iter().position(|v| v.is_nan()) {
        return Err(KildeError::Validation(format!("NaN value at index {}", i)));
    }
    if let Some(i) = vector.iter().position(|v| v.is_infinite()) {
        return Err(KildeError::Validation(format!("Infinite value at index {}", i)));
    }

    let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm == 0.0 || !norm.is_finite() {
        return Err(KildeError::Validation("Degenerate embedding (zero norm)".to_string()));
    }

    for x in vector.iter_mut() {
        *x /= norm;
    }
    Ok(vector)
}

/// Validate a batch response against its request and normalize every vector.
pub fn unit_vectors(
    vectors: Vec<Vec<f32>>,
    expected_count: usize,
    dimensions: usize,
) -> Result<Vec<Vec<f32>>> {
    if vectors.len() != expected_count {
        return Err(KildeError::Validation(format!(
            "Expected {} embeddings, got {}",
            expected_count,
            vectors.len()
        )));
    }

    vectors
        .into_iter()
        .map(|v| unit_vector(v, dimensions))
        .collect()
}
