//! Svar - Retrieval-Augmented Question Answering
//!
//! A service that answers questions from a curated text corpus: sources
//! (manual text, web pages, video transcripts) are chunked and embedded,
//! questions retrieve the nearest chunks, and a language model streams a
//! grounded answer with citations and follow-up suggestions.
//!
//! The name "Svar" comes from the Norwegian/Scandinavian word for "answer."
//!
//! # Overview
//!
//! Svar allows you to:
//! - Register knowledge sources by text, web page, or YouTube transcript
//! - Ask questions and stream grounded answers with citations
//! - Serve the whole flow over an HTTP API (SSE for answers)
//! - Review what end users asked and whether it was answerable
//!
//! # Architecture
//!
//! The library is organized into several modules:
//!
//! - `config` - Configuration and prompt templates
//! - `chunking` - Windowed text chunking
//! - `embedding` - Embedding generation
//! - `chat` - Chat model abstraction (blocking and streaming)
//! - `store` - Corpus store (sources, chunks, question log)
//! - `fetch` - Web page and transcript fetch adapters
//! - `weather` - Auxiliary forecast context
//! - `ingest` - Ingestion pipeline (register, update, delete, import)
//! - `rag` - Answer engine, suggestions, scope logging
//! - `server` - HTTP API (axum, SSE)
//!
//! # Example
//!
//! ```rust,no_run
//! use svar::config::Settings;
//! use svar::server::AppState;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let settings = Settings::load()?;
//!     let state = AppState::from_settings(&settings)?;
//!
//!     let source = state.pipeline.register_text("タイトル", "本文。").await?;
//!     println!("Registered source {}", source.id);
//!
//!     Ok(())
//! }
//! ```

pub mod chat;
pub mod chunking;
pub mod cli;
pub mod config;
pub mod embedding;
pub mod error;
pub mod fetch;
pub mod ingest;
pub mod openai;
pub mod rag;
pub mod server;
pub mod store;
pub mod weather;

pub use error::{Result, SvarError};
