//! Kilde CLI entry point.

use anyhow::Result;
use clap::Parser;
use kilde::cli::{commands, Cli, Commands};
use kilde::config::Settings;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let settings = match &cli.config {
        Some(path) => Settings::load_from(Some(&std::path::PathBuf::from(path)))?,
        None => Settings::load()?,
    };

    // Initialize logging
    let log_level = match cli.verbose {
        0 => settings.general.log_level.as_str(),
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::registry()
        .with(EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| format!("kilde={}", log_level)),
        ))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    std::fs::create_dir_all(settings.data_dir())?;

    match &cli.command {
        Commands::Ingest {
            files,
            store,
            append,
        } => {
            commands::run_ingest(files, store.as_deref(), *append, settings).await?;
        }

        Commands::Search {
            query,
            top_k,
            threshold,
            min_tokens,
        } => {
            commands::run_search(query, *top_k, *threshold, *min_tokens, settings).await?;
        }

        Commands::Info { store } => {
            commands::run_info(store.as_deref(), &settings)?;
        }

        Commands::Config { action } => {
            commands::run_config(action, &cli.config, settings)?;
        }
    }

    Ok(())
}
