//! CLI command implementations.

mod config;
mod info;
mod ingest;
mod search;

pub use config::run_config;
pub use info::run_info;
pub use ingest::run_ingest;
pub use search::run_search;

use crate::config::Settings;
use crate::embedding::{OllamaEmbedder, ResilientEmbedder};
use std::path::PathBuf;
use std::sync::Arc;

/// Embedding client with retry and fallback, from configuration.
fn build_embedder(settings: &Settings) -> crate::Result<ResilientEmbedder> {
    let client = OllamaEmbedder::new(&settings.embedding)?;
    Ok(ResilientEmbedder::from_settings(
        Arc::new(client),
        &settings.embedding,
    ))
}

/// Store directory from a `--store` flag, falling back to configuration.
fn resolve_store_path(store: Option<&str>, settings: &Settings) -> PathBuf {
    store
        .map(Settings::expand_path)
        .unwrap_or_else(|| settings.store_path())
}
