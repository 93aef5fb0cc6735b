//! CLI module for Svar.

pub mod commands;
mod output;

pub use output::{content_preview, Output};

use clap::{Parser, Subcommand};

/// Svar - Retrieval-Augmented Question Answering
///
/// A service that answers questions from a curated text corpus with
/// citations and streamed responses. The name "Svar" comes from the
/// Norwegian/Scandinavian word for "answer."
#[derive(Parser, Debug)]
#[command(name = "svar")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Increase verbosity (-v for debug, -vv for trace)
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
    /// Initialize Svar configuration and data directory
    Init,

    /// Start the HTTP API server
    Serve {
        /// Host to bind to (overrides config)
        #[arg(long)]
        host: Option<String>,

        /// Port to bind to (overrides config)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Ask a question against the corpus
    Ask {
        /// The question to ask
        question: String,
    },

    /// Register a source from text, a file, or a web page
    Register {
        /// Source title (required for text/file input)
        #[arg(short, long)]
        title: Option<String>,

        /// Body text passed directly
        #[arg(short, long, conflicts_with_all = ["file", "url"])]
        body: Option<String>,

        /// Read body text from a file
        #[arg(short, long, conflicts_with = "url")]
        file: Option<String>,

        /// Fetch and extract a web page as the source
        #[arg(short, long)]
        url: Option<String>,
    },

    /// Import video transcripts
    Import {
        #[command(subcommand)]
        target: ImportTarget,
    },

    /// List registered sources
    List,

    /// Delete a source and its chunks
    Delete {
        /// Source ID
        id: String,
    },

    /// Show logged questions
    Questions {
        /// Maximum entries to show
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum ImportTarget {
    /// Import one video by URL or ID
    Video {
        /// YouTube URL or 11-character video ID
        url: String,

        /// Title override
        #[arg(short, long)]
        title: Option<String>,
    },

    /// Import a channel's videos
    Channel {
        /// Channel handle (e.g. @somechannel)
        handle: String,

        /// Which videos to import (latest, all)
        #[arg(short, long, default_value = "latest")]
        mode: String,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Show configuration file path
    Path,
}
