//! Retrieval over a persisted store.
//!
//! Queries run against an immutable snapshot held by a [`StoreHandle`]; a
//! concurrent ingestion only becomes visible after a reload.

pub mod context;
mod handle;
mod query;

pub use handle::StoreHandle;
pub use query::{QueryOptions, QueryService};

use crate::vector_store::SearchResult;

/// A search result prepared for display.
#[derive(Debug, Clone)]
pub struct ContextChunk {
    /// Where the passage came from, e.g. "guide.pdf (page 4)".
    pub source: String,
    /// Text shown to the reader.
    pub content: String,
    /// Similarity score.
    pub score: f32,
    /// Index row of the match.
    pub row: usize,
}

impl From<SearchResult> for ContextChunk {
    fn from(result: SearchResult) -> Self {
        Self {
            source: result.record.provenance(),
            content: result.record.display_text().to_string(),
            score: result.score,
            row: result.row,
        }
    }
}
