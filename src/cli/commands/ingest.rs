//! Ingest command implementation.

use super::{build_embedder, resolve_store_path};
use crate::cli::Output;
use crate::config::Settings;
use crate::ingest::{load_records, Ingestor};
use crate::vector_store::{persistence, VectorStore, WriterLock};
use anyhow::{Context, Result};

/// Run the ingest command.
pub async fn run_ingest(
    files: &[String],
    store: Option<&str>,
    append: bool,
    settings: Settings,
) -> Result<()> {
    let store_path = resolve_store_path(store, &settings);

    // Held until the new state is saved.
    let lock = WriterLock::acquire(&store_path)
        .with_context(|| format!("Cannot write to {:?}", store_path))?;
    tracing::debug!("Holding writer lock {:?}", lock.path());
    persistence::check_replaceable(&store_path)?;

    let mut records = Vec::new();
    for file in files {
        let path = Settings::expand_path(file);
        let loaded = load_records(&path)?;
        Output::info(&format!("Loaded {} records from {}", loaded.len(), path.display()));
        records.extend(loaded);
    }

    if records.is_empty() {
        Output::warning("No records to ingest.");
        return Ok(());
    }

    let dimensions = settings.embedding.dimensions as usize;
    let mut vector_store = if append && persistence::exists(&store_path) {
        let existing = VectorStore::load(&store_path)?;
        Output::info(&format!("Appending to {} existing records", existing.len()));
        existing
    } else {
        if persistence::exists(&store_path) {
            Output::warning(&format!(
                "Replacing existing store at {} (use --append to keep it)",
                store_path.display()
            ));
        }
        VectorStore::new(dimensions)
    };

    let progress = Output::progress_bar(records.len() as u64, "Embedding");
    let ingestor = Ingestor::from_settings(build_embedder(&settings)?, &settings)
        .with_progress(progress.clone());

    let summary = ingestor.ingest(&mut vector_store, records).await;
    progress.finish_and_clear();
    let summary = summary?;

    if summary.ingested == 0 && !append {
        Output::warning("Nothing was embedded; existing store left untouched.");
        Output::ingest_summary(&summary);
        return Ok(());
    }

    let spinner = Output::spinner("Saving store...");
    let saved = vector_store.save(&store_path);
    spinner.finish_and_clear();
    saved?;
    drop(lock);

    Output::ingest_summary(&summary);
    if summary.is_degraded() {
        Output::warning("Some batches needed per-text fallback; see skipped records above.");
    }
    Output::success(&format!(
        "Store at {} now holds {} records",
        store_path.display(),
        vector_store.len()
    ));

    Ok(())
}
