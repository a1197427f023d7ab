//! CLI output formatting utilities.

use crate::ingest::IngestSummary;
use crate::rag::ContextChunk;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};

/// Output helper for CLI formatting.
pub struct Output;

impl Output {
    /// Print an info message.
    pub fn info(msg: &str) {
        println!("{} {}", style(">>").cyan().bold(), msg);
    }

    /// Print a success message.
    pub fn success(msg: &str) {
        println!("{} {}", style(">>").green().bold(), msg);
    }

    /// Print a warning message.
    pub fn warning(msg: &str) {
        eprintln!("{} {}", style(">>").yellow().bold(), msg);
    }

    /// Print an error message.
    pub fn error(msg: &str) {
        eprintln!("{} {}", style(">>").red().bold(), msg);
    }

    /// Print a header.
    pub fn header(msg: &str) {
        println!("\n{}", style(msg).bold().underlined());
    }

    /// Print a key-value pair.
    pub fn kv(key: &str, value: &str) {
        println!("  {}: {}", style(key).dim(), value);
    }

    /// Print a list item.
    pub fn list_item(msg: &str) {
        println!("  {} {}", style("*").cyan(), msg);
    }

    /// Print search result.
    pub fn search_result(rank: usize, chunk: &ContextChunk) {
        println!(
            "\n{} {} {} (score: {:.2})",
            style(format!("[{}]", rank)).green(),
            style(&chunk.source).bold(),
            style(format!("row {}", chunk.row)).dim(),
            chunk.score
        );
        println!("   {}", content_preview(&chunk.content, 200));
    }

    /// Print an ingestion summary.
    pub fn ingest_summary(summary: &IngestSummary) {
        Output::header("Ingestion summary");
        Output::kv("Records seen", &summary.records_seen.to_string());
        Output::kv("Ingested", &summary.ingested.to_string());
        Output::kv("Rejected as low-signal", &summary.rejected.to_string());
        Output::kv("Skipped after embedding failed", &summary.skipped.len().to_string());
        Output::kv(
            "Batches",
            &format!(
                "{} ({} empty, {} degraded, {} failed)",
                summary.batches,
                summary.empty_batches,
                summary.degraded_batches,
                summary.failed_batches
            ),
        );

        for skipped in &summary.skipped {
            Output::list_item(&format!(
                "#{} {}: {}",
                skipped.position,
                skipped.source_name.as_deref().unwrap_or("unknown"),
                skipped.reason
            ));
        }
    }

    /// Create a progress bar.
    pub fn progress_bar(len: u64, msg: &str) -> ProgressBar {
        let pb = ProgressBar::new(len);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
                .unwrap()
                .progress_chars("#>-"),
        );
        pb.set_message(msg.to_string());
        pb
    }

    /// Create a spinner.
    pub fn spinner(msg: &str) -> ProgressBar {
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} {msg}")
                .unwrap(),
        );
        pb.set_message(msg.to_string());
        pb.enable_steady_tick(std::time::Duration::from_millis(100));
        pb
    }
}

/// Truncate content with ellipsis, on a character boundary.
fn content_preview(content: &str, max_chars: usize) -> String {
    let content = content.replace('\n', " ");
    match content.char_indices().nth(max_chars) {
        None => content,
        Some((cut, _)) => format!("{}...", &content[..cut]),
    }
}
