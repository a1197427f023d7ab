//! Semantic search over a store snapshot.

use super::StoreHandle;
use crate::config::QuerySettings;
use crate::embedding::ResilientEmbedder;
use crate::error::{KildeError, Result};
use crate::normalize::{token_count, TextNormalizer};
use crate::vector_store::SearchResult;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

/// Per-request search parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QueryOptions {
    /// Neighbors requested from the index.
    pub top_k: usize,
    /// Matches scoring below this are dropped.
    pub score_threshold: f32,
    /// Matches whose display text has fewer whitespace tokens are dropped.
    pub min_display_tokens: usize,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self::from(&QuerySettings::default())
    }
}

impl From<&QuerySettings> for QueryOptions {
    fn from(settings: &QuerySettings) -> Self {
        Self {
            top_k: settings.top_k,
            score_threshold: settings.score_threshold,
            min_display_tokens: settings.min_display_tokens,
        }
    }
}

impl QueryOptions {
    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    pub fn with_score_threshold(mut self, score_threshold: f32) -> Self {
        self.score_threshold = score_threshold;
        self
    }

    pub fn with_min_display_tokens(mut self, min_display_tokens: usize) -> Self {
        self.min_display_tokens = min_display_tokens;
        self
    }
}

/// Answers free-text queries against a store.
pub struct QueryService {
    store: Arc<StoreHandle>,
    embedder: ResilientEmbedder,
    normalizer: TextNormalizer,
}

impl QueryService {
    pub fn new(store: Arc<StoreHandle>, embedder: ResilientEmbedder, normalizer: TextNormalizer) -> Self {
        Self {
            store,
            embedder,
            normalizer,
        }
    }

    pub fn store(&self) -> &StoreHandle {
        &self.store
    }

    /// Records most similar to `query`, best first.
    #[instrument(skip(self, options), fields(top_k = options.top_k, threshold = options.score_threshold))]
    pub async fn search_vector_db(&self, query: &str, options: &QueryOptions) -> Result<Vec<SearchResult>> {
        let store = self.store.for_query()?;

        if let Some(model) = store.model() {
            if model != self.embedder.model() {
                warn!(
                    "Store was built with '{}' but queries use '{}'; scores may be meaningless",
                    model,
                    self.embedder.model()
                );
            }
        }

        // Same transform as ingestion, without the length and alpha gates.
        let cleaned = self.normalizer.clean(query);
        if cleaned.is_empty() {
            return Err(KildeError::EmptyInput(format!(
                "query {:?} has no searchable text",
                query
            )));
        }

        let vector = self.embedder.embed_query(&cleaned).await?;
        let candidates = store.search(&vector, options.top_k)?;
        let found = candidates.len();

        let results: Vec<SearchResult> = candidates
            .into_iter()
            .filter(|r| r.score >= options.score_threshold)
            .filter(|r| {
                options.min_display_tokens == 0
                    || token_count(r.record.display_text()) >= options.min_display_tokens
            })
            .collect();

        debug!("{} of {} candidates passed filters", results.len(), found);
        Ok(results)
    }
}
