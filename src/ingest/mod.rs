//! Ingestion pipeline: normalize, embed, append.
//!
//! Batches are processed one after another with a fixed pause in between to
//! stay inside the embedding service's rate limits.

mod loader;

pub use loader::{load_records, parse_records};

use crate::config::Settings;
use crate::embedding::{BatchOutcome, ResilientEmbedder};
use crate::error::{KildeError, Result};
use crate::normalize::TextNormalizer;
use crate::vector_store::{Record, VectorStore};
use indicatif::ProgressBar;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

const DEFAULT_BATCH_SIZE: usize = 32;
const DEFAULT_BATCH_DELAY: Duration = Duration::from_millis(200);

/// A record that made it past normalization but could not be embedded.
#[derive(Debug, Clone)]
pub struct SkippedRecord {
    /// Position in the submitted record list.
    pub position: usize,
    pub source_name: Option<String>,
    pub reason: String,
}

/// What an ingestion run did.
#[derive(Debug, Clone, Default)]
pub struct IngestSummary {
    /// Records submitted.
    pub records_seen: usize,
    /// Records appended to the store.
    pub ingested: usize,
    /// Records whose text was rejected as low-signal.
    pub rejected: usize,
    /// Records dropped after embedding failed.
    pub skipped: Vec<SkippedRecord>,
    /// Batches processed.
    pub batches: usize,
    /// Batches with no usable text.
    pub empty_batches: usize,
    /// Batches that fell back to per-text embedding.
    pub degraded_batches: usize,
    /// Batches where nothing could be embedded.
    pub failed_batches: usize,
}

impl IngestSummary {
    /// Whether any batch needed the per-text fallback.
    pub fn is_degraded(&self) -> bool {
        self.degraded_batches > 0 || self.failed_batches > 0
    }
}

/// Pushes records through the normalizer and embedder into a store.
pub struct Ingestor {
    embedder: ResilientEmbedder,
    normalizer: TextNormalizer,
    batch_size: usize,
    batch_delay: Duration,
    progress: Option<ProgressBar>,
}

impl Ingestor {
    /// Create an ingestor with default batching.
    pub fn new(embedder: ResilientEmbedder, normalizer: TextNormalizer) -> Self {
        Self {
            embedder,
            normalizer,
            batch_size: DEFAULT_BATCH_SIZE,
            batch_delay: DEFAULT_BATCH_DELAY,
            progress: None,
        }
    }

    /// Create an ingestor with batching and normalization from configuration.
    pub fn from_settings(embedder: ResilientEmbedder, settings: &Settings) -> Self {
        Self::new(embedder, TextNormalizer::with_settings(&settings.normalizer))
            .with_batch_size(settings.embedding.batch_size)
            .with_batch_delay(settings.embedding.batch_delay())
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn with_batch_delay(mut self, batch_delay: Duration) -> Self {
        self.batch_delay = batch_delay;
        self
    }

    /// Report progress in records on the given bar.
    pub fn with_progress(mut self, progress: ProgressBar) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Ingest `records` into `store`.
    ///
    /// Per-text failures end up in the summary; only a store that cannot
    /// accept this embedder's vectors is an error.
    #[instrument(skip_all, fields(records = records.len(), batch_size = self.batch_size))]
    pub async fn ingest(&self, store: &mut VectorStore, records: Vec<Record>) -> Result<IngestSummary> {
        if store.dimension() != self.embedder.dimensions() {
            return Err(KildeError::DimensionMismatch {
                expected: store.dimension(),
                actual: self.embedder.dimensions(),
            });
        }
        match store.model() {
            Some(model) if model != self.embedder.model() => {
                return Err(KildeError::Config(format!(
                    "store was built with model '{}', embedder uses '{}'",
                    model,
                    self.embedder.model()
                )));
            }
            Some(_) => {}
            None => store.set_model(self.embedder.model()),
        }

        let mut summary = IngestSummary {
            records_seen: records.len(),
            ..IngestSummary::default()
        };

        let mut pending = records.into_iter().enumerate();
        loop {
            let batch: Vec<(usize, Record)> = pending.by_ref().take(self.batch_size).collect();
            if batch.is_empty() {
                break;
            }

            if summary.batches > 0 && !self.batch_delay.is_zero() {
                tokio::time::sleep(self.batch_delay).await;
            }
            summary.batches += 1;

            let batch_len = batch.len() as u64;
            self.ingest_batch(store, batch, &mut summary).await?;

            if let Some(pb) = &self.progress {
                pb.inc(batch_len);
            }
        }

        info!(
            "Ingested {}/{} records ({} rejected, {} skipped, {} degraded batches)",
            summary.ingested,
            summary.records_seen,
            summary.rejected,
            summary.skipped.len(),
            summary.degraded_batches
        );
        Ok(summary)
    }

    async fn ingest_batch(
        &self,
        store: &mut VectorStore,
        batch: Vec<(usize, Record)>,
        summary: &mut IngestSummary,
    ) -> Result<()> {
        let mut texts = Vec::with_capacity(batch.len());
        let mut kept = Vec::with_capacity(batch.len());

        for (position, record) in batch {
            match self.normalizer.check(&record.embedding_text) {
                Ok(text) => {
                    texts.push(text);
                    kept.push((position, record));
                }
                Err(reason) => {
                    debug!("Rejected record {}: {}", position, reason);
                    summary.rejected += 1;
                }
            }
        }

        if texts.is_empty() {
            debug!("Batch {} has no usable text, skipping", summary.batches);
            summary.empty_batches += 1;
            return Ok(());
        }

        let embedded = self.embedder.embed_batch(&texts).await;
        match embedded.outcome {
            BatchOutcome::BatchSucceeded => {}
            BatchOutcome::PartiallyDegraded { dropped } => {
                warn!(
                    "Batch {} degraded to per-text embedding, {} dropped",
                    summary.batches, dropped
                );
                summary.degraded_batches += 1;
            }
            BatchOutcome::Failed => {
                warn!("Batch {} failed entirely, nothing ingested", summary.batches);
                summary.failed_batches += 1;
            }
        }

        let mut reasons: HashMap<usize, String> = embedded
            .failures
            .into_iter()
            .map(|f| (f.position, f.reason))
            .collect();

        let mut records = Vec::with_capacity(kept.len());
        let mut vectors = Vec::with_capacity(kept.len());
        for (slot, ((position, record), vector)) in kept.into_iter().zip(embedded.vectors).enumerate() {
            match vector {
                Some(vector) => {
                    records.push(record);
                    vectors.push(vector);
                }
                None => summary.skipped.push(SkippedRecord {
                    position,
                    source_name: record.source_name,
                    reason: reasons.remove(&slot).unwrap_or_default(),
                }),
            }
        }

        summary.ingested += store.append(records, vectors)?;
        Ok(())
    }
}
