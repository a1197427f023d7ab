//! Search command implementation.

use super::build_embedder;
use crate::cli::Output;
use crate::config::Settings;
use crate::normalize::TextNormalizer;
use crate::rag::{context, QueryOptions, QueryService, StoreHandle};
use anyhow::Result;
use std::sync::Arc;

/// Run the search command.
pub async fn run_search(
    query: &str,
    top_k: Option<usize>,
    threshold: Option<f32>,
    min_tokens: Option<usize>,
    settings: Settings,
) -> Result<()> {
    let mut options = QueryOptions::from(&settings.query);
    if let Some(k) = top_k {
        options = options.with_top_k(k);
    }
    if let Some(t) = threshold {
        options = options.with_score_threshold(t);
    }
    if let Some(n) = min_tokens {
        options = options.with_min_display_tokens(n);
    }

    let handle = StoreHandle::open(settings.store_path(), settings.query.reload_policy)?;
    let service = QueryService::new(
        Arc::new(handle),
        build_embedder(&settings)?,
        TextNormalizer::with_settings(&settings.normalizer),
    );

    let spinner = Output::spinner("Searching...");
    let results = service.search_vector_db(query, &options).await;
    spinner.finish_and_clear();

    match results {
        Ok(results) => {
            let chunks = context::from_results(results);
            if chunks.is_empty() {
                Output::warning(&format!(
                    "No results found matching your query among {} records.",
                    service.store().snapshot().len()
                ));
            } else {
                Output::success(&format!("Found {} results", chunks.len()));
                for (i, chunk) in chunks.iter().enumerate() {
                    Output::search_result(i + 1, chunk);
                }
                Output::header("Sources");
                println!("{}", context::format_sources(&chunks));
            }
        }
        Err(e) => {
            Output::error(&format!("Search failed: {}", e));
            return Err(e.into());
        }
    }

    Ok(())
}
