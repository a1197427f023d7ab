//! Vector store for Kilde.
//!
//! Pairs a similarity index with the records behind each row. Row position is
//! the only join key, so the two halves are only ever grown together.

mod index;
mod metadata;
pub mod persistence;

pub use index::{FlatIndex, Neighbor, VectorIndex, MAX_PADDING, MISSING_ROW};
pub use metadata::MetadataStore;
pub use persistence::{Manifest, WriterLock};

use crate::error::{KildeError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

/// A unit of ingested content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Text the searchable vector is derived from.
    pub embedding_text: String,
    /// Longer passage shown to readers, when it differs from `embedding_text`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paragraph_text: Option<String>,
    /// File or media the record came from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_name: Option<String>,
    /// Page number for documents.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
    /// Start of the segment in seconds, for transcribed media.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<f64>,
    /// End of the segment in seconds, for transcribed media.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<f64>,
    /// Any other fields present at ingestion, kept verbatim.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Record {
    /// Create a record with only its embedding text.
    pub fn new(embedding_text: impl Into<String>) -> Self {
        Self {
            embedding_text: embedding_text.into(),
            paragraph_text: None,
            source_name: None,
            page: None,
            start_time: None,
            end_time: None,
            extra: serde_json::Map::new(),
        }
    }

    pub fn with_source(mut self, source_name: impl Into<String>) -> Self {
        self.source_name = Some(source_name.into());
        self
    }

    pub fn with_paragraph(mut self, paragraph_text: impl Into<String>) -> Self {
        self.paragraph_text = Some(paragraph_text.into());
        self
    }

    pub fn with_page(mut self, page: u32) -> Self {
        self.page = Some(page);
        self
    }

    pub fn with_time_span(mut self, start_time: f64, end_time: f64) -> Self {
        self.start_time = Some(start_time);
        self.end_time = Some(end_time);
        self
    }

    /// Text shown to readers: the paragraph if present, else the embedding text.
    pub fn display_text(&self) -> &str {
        self.paragraph_text.as_deref().unwrap_or(&self.embedding_text)
    }

    /// Where the record came from, for citations.
    pub fn provenance(&self) -> String {
        let source = self.source_name.as_deref().unwrap_or("unknown");

        if let Some(page) = self.page {
            format!("{} (page {})", source, page)
        } else if let (Some(start), Some(end)) = (self.start_time, self.end_time) {
            format!("{} (timestamp {:?}s–{:?}s)", source, start, end)
        } else {
            source.to_string()
        }
    }
}

/// A search result with score.
#[derive(Debug, Clone, Serialize)]
pub struct SearchResult {
    /// The matched record.
    #[serde(flatten)]
    pub record: Record,
    /// Similarity score (higher is better).
    pub score: f32,
    /// Index row the match came from.
    #[serde(skip)]
    pub row: usize,
}

/// Index and metadata kept in lockstep.
pub struct VectorStore {
    index: Box<dyn VectorIndex>,
    metadata: MetadataStore,
    model: Option<String>,
}

impl VectorStore {
    /// Create an empty store with an exact index.
    pub fn new(dimension: usize) -> Self {
        Self {
            index: Box::new(FlatIndex::new(dimension)),
            metadata: MetadataStore::new(),
            model: None,
        }
    }

    /// Assemble a store from existing halves, which must agree on length.
    pub fn from_parts(index: Box<dyn VectorIndex>, metadata: MetadataStore) -> Result<Self> {
        if index.len() != metadata.len() {
            return Err(KildeError::CorruptState(format!(
                "index has {} rows but metadata has {} records",
                index.len(),
                metadata.len()
            )));
        }
        Ok(Self {
            index,
            metadata,
            model: None,
        })
    }

    /// Record which embedding model produced the vectors.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn set_model(&mut self, model: impl Into<String>) {
        self.model = Some(model.into());
    }

    pub fn model(&self) -> Option<&str> {
        self.model.as_deref()
    }

    pub fn dimension(&self) -> usize {
        self.index.dimension()
    }

    pub fn len(&self) -> usize {
        self.metadata.len()
    }

    pub fn is_empty(&self) -> bool {
        self.metadata.is_empty()
    }

    pub fn get(&self, row: usize) -> Option<&Record> {
        self.metadata.get(row)
    }

    pub fn vector(&self, row: usize) -> Option<&[f32]> {
        self.index.vector(row)
    }

    pub fn records(&self) -> &MetadataStore {
        &self.metadata
    }

    pub fn index(&self) -> &dyn VectorIndex {
        self.index.as_ref()
    }

    /// Append records with their vectors. Nothing is appended on error.
    pub fn append(&mut self, records: Vec<Record>, vectors: Vec<Vec<f32>>) -> Result<usize> {
        if records.len() != vectors.len() {
            return Err(KildeError::InvalidInput(format!(
                "{} records but {} vectors",
                records.len(),
                vectors.len()
            )));
        }

        let count = records.len();
        self.index.add(&vectors)?;
        self.metadata.append(records);

        debug!("Appended {} rows, store now has {}", count, self.len());
        Ok(count)
    }

    /// Top-`k` records for a unit query vector, sentinel slots removed.
    ///
    /// `k` is capped at the number of rows, so any `k` is accepted.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchResult>> {
        let neighbors = self.index.search(query, k.min(self.index.len()))?;

        let mut results = Vec::with_capacity(neighbors.len());
        for neighbor in neighbors {
            let Some(row) = neighbor.row_index() else {
                continue;
            };
            let record = self.metadata.get(row).ok_or_else(|| {
                KildeError::CorruptState(format!("index row {} has no metadata", row))
            })?;
            results.push(SearchResult {
                record: record.clone(),
                score: neighbor.score,
                row,
            });
        }

        Ok(results)
    }

    /// Persist the store atomically to `dir`.
    pub fn save(&self, dir: &Path) -> Result<()> {
        persistence::save(self, dir)
    }

    /// Load a store previously written with [`VectorStore::save`].
    pub fn load(dir: &Path) -> Result<Self> {
        persistence::load(dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_store() -> VectorStore {
        let mut store = VectorStore::new(2);
        store
            .append(
                vec![
                    Record::new("east").with_source("compass.pdf").with_page(1),
                    Record::new("north").with_source("talk.mp4").with_time_span(65.0, 90.0),
                ],
                vec![vec![1.0, 0.0], vec![0.0, 1.0]],
            )
            .unwrap();
        store
    }

    #[test]
    fn test_search_joins_records() {
        let store = sample_store();
        let results = store.search(&[0.0, 1.0], 5).unwrap();

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].record.embedding_text, "north");
        assert_eq!(results[0].row, 1);
        assert!((results[0].score - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_search_with_huge_k_returns_every_row() {
        let store = sample_store();
        let results = store.search(&[1.0, 0.0], usize::MAX).unwrap();

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].row, 0);
    }

    #[test]
    fn test_append_length_mismatch_changes_nothing() {
        let mut store = sample_store();
        let err = store
            .append(vec![Record::new("a"), Record::new("b")], vec![vec![1.0, 0.0]])
            .unwrap_err();
        assert!(matches!(err, KildeError::InvalidInput(_)));
        assert_eq!(store.len(), 2);
        assert_eq!(store.index().len(), 2);
    }

    #[test]
    fn test_append_bad_dimension_changes_nothing() {
        let mut store = sample_store();
        let err = store
            .append(vec![Record::new("a")], vec![vec![1.0, 0.0, 0.0]])
            .unwrap_err();
        assert!(matches!(err, KildeError::DimensionMismatch { .. }));
        assert_eq!(store.len(), 2);
        assert_eq!(store.index().len(), 2);
    }

    #[test]
    fn test_from_parts_requires_equal_lengths() {
        let index = Box::new(FlatIndex::new(2));
        let metadata = MetadataStore::from(vec![Record::new("orphan")]);
        assert!(matches!(
            VectorStore::from_parts(index, metadata),
            Err(KildeError::CorruptState(_))
        ));
    }

    #[test]
    fn test_provenance_formats() {
        let store = sample_store();
        assert_eq!(store.get(0).unwrap().provenance(), "compass.pdf (page 1)");
        assert_eq!(store.get(1).unwrap().provenance(), "talk.mp4 (timestamp 65.0s–90.0s)");
        assert_eq!(Record::new("x").provenance(), "unknown");
    }

    #[test]
    fn test_display_text_prefers_paragraph() {
        let record = Record::new("short").with_paragraph("the full paragraph");
        assert_eq!(record.display_text(), "the full paragraph");
        assert_eq!(Record::new("short").display_text(), "short");
    }

    #[test]
    fn test_record_keeps_unknown_fields() {
        let json = r#"{"embedding_text":"t","source_name":"s","page":3,"chunk_id":7}"#;
        let record: Record = serde_json::from_str(json).unwrap();
        assert_eq!(record.page, Some(3));
        assert_eq!(record.extra["chunk_id"], 7);

        let back = serde_json::to_value(&record).unwrap();
        assert_eq!(back["chunk_id"], 7);
        assert!(back.get("start_time").is_none());
    }
}
