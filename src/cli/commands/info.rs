//! Info command implementation.

use super::resolve_store_path;
use crate::cli::Output;
use crate::config::Settings;
use crate::vector_store::{persistence, VectorStore};
use anyhow::Result;
use std::collections::BTreeMap;

/// Run the info command.
pub fn run_info(store: Option<&str>, settings: &Settings) -> Result<()> {
    let store_path = resolve_store_path(store, settings);

    if !persistence::exists(&store_path) {
        Output::info(&format!(
            "No store at {}. Use 'kilde ingest <files>' to create one.",
            store_path.display()
        ));
        return Ok(());
    }

    let manifest = persistence::read_manifest(&store_path)?;
    let vector_store = VectorStore::load(&store_path)?;

    Output::header("Vector store");
    Output::kv("Path", &store_path.display().to_string());
    Output::kv("Format version", &manifest.format_version.to_string());
    Output::kv("Dimension", &manifest.dimension.to_string());
    Output::kv("Records", &vector_store.len().to_string());
    Output::kv("Model", manifest.model.as_deref().unwrap_or("unknown"));
    Output::kv("Saved at", &manifest.saved_at.to_rfc3339());

    if manifest.model.as_deref().is_some_and(|m| m != settings.embedding.model) {
        Output::warning(&format!(
            "Configured model '{}' differs from the one that built this store",
            settings.embedding.model
        ));
    }

    let mut per_source: BTreeMap<&str, usize> = BTreeMap::new();
    for record in vector_store.records().iter() {
        *per_source
            .entry(record.source_name.as_deref().unwrap_or("unknown"))
            .or_default() += 1;
    }

    if !per_source.is_empty() {
        Output::header(&format!("Sources ({})", per_source.len()));
        for (source, count) in &per_source {
            Output::list_item(&format!("{} ({} records)", source, count));
        }
    }

    Ok(())
}
