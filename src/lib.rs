//! Kilde - Retrieval store for documents and transcripts
//!
//! A local-first vector store: clean text, embed it with a remote model, and
//! search it by meaning with the source of every match attached.
//!
//! The name "Kilde" is the Norwegian word for "source."
//!
//! # Architecture
//!
//! - `config` - Configuration management
//! - `normalize` - Text cleaning and low-signal rejection
//! - `embedding` - Embedding client and batch fallback
//! - `vector_store` - Index, records, and on-disk persistence
//! - `ingest` - Batched ingestion pipeline
//! - `rag` - Query service over a reloadable store snapshot
//!
//! # Example
//!
//! ```rust,no_run
//! use kilde::config::Settings;
//! use kilde::embedding::{OllamaEmbedder, ResilientEmbedder};
//! use kilde::normalize::TextNormalizer;
//! use kilde::rag::{QueryOptions, QueryService, StoreHandle};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let settings = Settings::load()?;
//!     let embedder = ResilientEmbedder::from_settings(
//!         Arc::new(OllamaEmbedder::new(&settings.embedding)?),
//!         &settings.embedding,
//!     );
//!     let store = StoreHandle::open(settings.store_path(), settings.query.reload_policy)?;
//!     let service = QueryService::new(Arc::new(store), embedder, TextNormalizer::new());
//!
//!     let options = QueryOptions::from(&settings.query);
//!     for result in service.search_vector_db("what is a pointer?", &options).await? {
//!         println!("{:.2} {}", result.score, result.record.provenance());
//!     }
//!
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod config;
pub mod embedding;
pub mod error;
pub mod ingest;
pub mod normalize;
pub mod rag;
pub mod vector_store;

pub use error::{KildeError, Result};
