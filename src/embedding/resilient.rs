//! Batch embedding with per-text fallback, retries and validation.

use super::{unit_vector, unit_vectors, Embedder};
use crate::config::EmbeddingSettings;
use crate::error::{KildeError, Result};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument, warn};

const DEFAULT_RETRY_COUNT: u32 = 3;
const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(500);

/// How a batch made it through the embedding service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchOutcome {
    /// One request embedded every text.
    BatchSucceeded,
    /// The batch request failed and texts were embedded one at a time;
    /// `dropped` texts could not be embedded at all.
    PartiallyDegraded { dropped: usize },
    /// No text in the batch could be embedded.
    Failed,
}

/// A text that could not be embedded.
#[derive(Debug, Clone)]
pub struct EmbeddingFailure {
    /// Position of the text in the submitted batch.
    pub position: usize,
    /// Last error seen for this text.
    pub reason: String,
}

/// Result of embedding one batch.
#[derive(Debug)]
pub struct EmbeddedBatch {
    /// One slot per submitted text; `None` where the text was dropped.
    /// Vectors are unit length.
    pub vectors: Vec<Option<Vec<f32>>>,
    pub failures: Vec<EmbeddingFailure>,
    pub outcome: BatchOutcome,
}

impl EmbeddedBatch {
    /// Number of texts that produced a vector.
    pub fn embedded_count(&self) -> usize {
        self.vectors.iter().filter(|v| v.is_some()).count()
    }
}

/// Wraps an [`Embedder`] with the ingestion failure policy.
#[derive(Clone)]
pub struct ResilientEmbedder {
    inner: Arc<dyn Embedder>,
    retry_count: u32,
    retry_delay: Duration,
}

impl ResilientEmbedder {
    /// Wrap an embedder with the default retry policy.
    pub fn new(inner: Arc<dyn Embedder>) -> Self {
        Self {
            inner,
            retry_count: DEFAULT_RETRY_COUNT,
            retry_delay: DEFAULT_RETRY_DELAY,
        }
    }

    /// Wrap an embedder with the retry policy from configuration.
    pub fn from_settings(inner: Arc<dyn Embedder>, settings: &EmbeddingSettings) -> Self {
        Self::new(inner).with_retry(settings.retry_count, settings.retry_delay())
    }

    /// Set attempts per single text and the delay between attempts.
    pub fn with_retry(mut self, retry_count: u32, retry_delay: Duration) -> Self {
        self.retry_count = retry_count.max(1);
        self.retry_delay = retry_delay;
        self
    }

    pub fn dimensions(&self) -> usize {
        self.inner.dimensions()
    }

    pub fn model(&self) -> &str {
        self.inner.model()
    }

    /// Embed a batch, degrading to per-text embedding when the batch request fails.
    ///
    /// Never fails as a whole: texts that cannot be embedded are reported in
    /// [`EmbeddedBatch::failures`].
    #[instrument(skip(self, texts), fields(count = texts.len()))]
    pub async fn embed_batch(&self, texts: &[String]) -> EmbeddedBatch {
        if texts.is_empty() {
            return EmbeddedBatch {
                vectors: Vec::new(),
                failures: Vec::new(),
                outcome: BatchOutcome::BatchSucceeded,
            };
        }

        let batch_error = match self.request(texts).await {
            Ok(vectors) => {
                debug!("Batch of {} embedded in one request", texts.len());
                return EmbeddedBatch {
                    vectors: vectors.into_iter().map(Some).collect(),
                    failures: Vec::new(),
                    outcome: BatchOutcome::BatchSucceeded,
                };
            }
            Err(e) => e,
        };

        warn!(
            "Batch of {} failed ({}), embedding texts individually",
            texts.len(),
            batch_error
        );

        let mut vectors = Vec::with_capacity(texts.len());
        let mut failures = Vec::new();

        for (position, text) in texts.iter().enumerate() {
            match self.embed_single(text).await {
                Ok(vector) => vectors.push(Some(vector)),
                Err(e) => {
                    warn!(
                        "Skipping text {} after {} attempts: {} ({:.80})",
                        position, self.retry_count, e, text
                    );
                    vectors.push(None);
                    failures.push(EmbeddingFailure {
                        position,
                        reason: e.to_string(),
                    });
                }
            }
        }

        let outcome = if failures.len() == texts.len() {
            BatchOutcome::Failed
        } else {
            BatchOutcome::PartiallyDegraded {
                dropped: failures.len(),
            }
        };

        EmbeddedBatch {
            vectors,
            failures,
            outcome,
        }
    }

    /// Embed one query text. Errors propagate once retries are exhausted.
    #[instrument(skip(self, text))]
    pub async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        if text.trim().is_empty() {
            return Err(KildeError::EmptyInput("query text is empty".to_string()));
        }
        self.embed_single(text).await
    }

    async fn embed_single(&self, text: &str) -> Result<Vec<f32>> {
        let mut attempt = 1;
        loop {
            let result = self
                .inner
                .embed(text)
                .await
                .and_then(|v| unit_vector(v, self.inner.dimensions()));

            match result {
                Ok(vector) => return Ok(vector),
                Err(e) if attempt >= self.retry_count => return Err(e),
                Err(e) => {
                    debug!("Attempt {}/{} failed: {}", attempt, self.retry_count, e);
                    attempt += 1;
                    tokio::time::sleep(self.retry_delay).await;
                }
            }
        }
    }

    async fn request(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let raw = self.inner.embed_batch(texts).await?;
        unit_vectors(raw, texts.len(), self.inner.dimensions())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::testing::{FakeEmbedder, POISON};

    fn texts(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn resilient(fake: Arc<FakeEmbedder>) -> ResilientEmbedder {
        ResilientEmbedder::new(fake).with_retry(3, Duration::ZERO)
    }

    #[tokio::test]
    async fn test_clean_batch_uses_one_request() {
        let fake = Arc::new(FakeEmbedder::new(4));
        let embedder = resilient(fake.clone());

        let batch = embedder.embed_batch(&texts(&["alpha", "beta", "gamma"])).await;

        assert_eq!(batch.outcome, BatchOutcome::BatchSucceeded);
        assert_eq!(batch.embedded_count(), 3);
        assert_eq!(fake.calls(), 1);

        for v in batch.vectors.iter().flatten() {
            let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
            assert!((norm - 1.0).abs() < 1e-5);
        }
    }

    #[tokio::test]
    async fn test_nan_text_degrades_to_per_item() {
        let fake = Arc::new(FakeEmbedder::new(4));
        let embedder = resilient(fake.clone());
        let input = texts(&["one", "two", POISON, "three", "four"]);

        let batch = embedder.embed_batch(&input).await;

        assert_eq!(batch.outcome, BatchOutcome::PartiallyDegraded { dropped: 1 });
        assert_eq!(batch.embedded_count(), 4);
        assert!(batch.vectors[2].is_none());
        assert_eq!(batch.failures.len(), 1);
        assert_eq!(batch.failures[0].position, 2);
        // 1 batch request + 4 good singles + 3 attempts for the poisoned text
        assert_eq!(fake.calls(), 1 + 4 + 3);
    }

    #[tokio::test]
    async fn test_all_texts_failing_is_failed_outcome() {
        let fake = Arc::new(FakeEmbedder::new(4));
        let embedder = resilient(fake);

        let batch = embedder.embed_batch(&texts(&[POISON, "POISON again"])).await;

        assert_eq!(batch.outcome, BatchOutcome::Failed);
        assert_eq!(batch.embedded_count(), 0);
        assert_eq!(batch.failures.len(), 2);
    }

    #[tokio::test]
    async fn test_transient_batch_failure_recovers_per_item() {
        let fake = Arc::new(FakeEmbedder::new(4).failing_first(1));
        let embedder = resilient(fake.clone());

        let batch = embedder.embed_batch(&texts(&["one", "two"])).await;

        assert_eq!(batch.outcome, BatchOutcome::PartiallyDegraded { dropped: 0 });
        assert_eq!(batch.embedded_count(), 2);
        assert_eq!(fake.calls(), 3);
    }

    #[tokio::test]
    async fn test_single_text_retries_until_success() {
        let fake = Arc::new(FakeEmbedder::new(4).failing_first(2));
        let embedder = resilient(fake.clone());

        let vector = embedder.embed_query("what is a pointer").await.unwrap();

        assert_eq!(vector.len(), 4);
        assert_eq!(fake.calls(), 3);
    }

    #[tokio::test]
    async fn test_query_fails_after_retries() {
        let fake = Arc::new(FakeEmbedder::new(4).failing_first(10));
        let embedder = resilient(fake.clone());

        let err = embedder.embed_query("what is a pointer").await.unwrap_err();

        assert!(matches!(err, KildeError::TransientService(_)));
        assert_eq!(fake.calls(), 3);
    }

    #[tokio::test]
    async fn test_dimension_mismatch_is_rejected() {
        let fake = Arc::new(FakeEmbedder::new(4).with_keyword("short", vec![1.0, 0.0]));
        let embedder = resilient(fake);

        let batch = embedder.embed_batch(&texts(&["short vector", "normal"])).await;

        assert_eq!(batch.outcome, BatchOutcome::PartiallyDegraded { dropped: 1 });
        assert!(batch.failures[0].reason.contains("Dimension mismatch"));
    }

    #[tokio::test]
    async fn test_empty_query_rejected() {
        let embedder = resilient(Arc::new(FakeEmbedder::new(4)));
        assert!(matches!(
            embedder.embed_query("   ").await,
            Err(KildeError::EmptyInput(_))
        ));
    }
}
