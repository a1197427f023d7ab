//! CLI module for Kilde.

pub mod commands;
mod output;

pub use output::Output;

use clap::{Parser, Subcommand};

/// Kilde - Retrieval store for documents and transcripts
///
/// Ingest cleaned text into a local vector store and search it by meaning.
/// The name "Kilde" is the Norwegian word for "source."
#[derive(Parser, Debug)]
#[command(name = "kilde")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Increase verbosity (-v for info, -vv for debug, -vvv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Path to configuration file
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Embed records from JSON files and save them to the store
    Ingest {
        /// JSON files holding a record array or a transcript with chunks
        #[arg(required = true)]
        files: Vec<String>,

        /// Store directory (defaults to vector_store.path)
        #[arg(short, long)]
        store: Option<String>,

        /// Add to the existing store instead of replacing it
        #[arg(short, long)]
        append: bool,
    },

    /// Search the store
    Search {
        /// Search query
        query: String,

        /// Number of neighbors to retrieve
        #[arg(short = 'k', long)]
        top_k: Option<usize>,

        /// Minimum similarity score
        #[arg(short, long)]
        threshold: Option<f32>,

        /// Minimum whitespace tokens in a result's text (0 disables)
        #[arg(long)]
        min_tokens: Option<usize>,
    },

    /// Show what the store holds
    Info {
        /// Store directory (defaults to vector_store.path)
        #[arg(short, long)]
        store: Option<String>,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Show configuration file path
    Path,

    /// Write the default configuration file
    Init {
        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },
}
