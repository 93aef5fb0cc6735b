//! Text chunking for embedding and retrieval.
//!
//! Splits source bodies into overlapping windows, preferring sentence or
//! line boundaries so chunks don't cut mid-sentence.

use serde::{Deserialize, Serialize};

/// Configuration for the windowed chunker.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Target window size in characters.
    pub window: usize,
    /// Overlap between consecutive chunks in characters.
    pub overlap: usize,
    /// How far back from the window boundary to search for a sentence end.
    pub lookback: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            window: 500,
            overlap: 50,
            lookback: 100,
        }
    }
}

/// Split text into overlapping chunks using the default configuration.
pub fn chunk_text(text: &str) -> Vec<String> {
    chunk_text_with(text, &ChunkingConfig::default())
}

/// Split text into overlapping chunks.
///
/// Walks the text in `window`-sized steps. When a window ends before the
/// text does, the cut is moved back to the nearest `。` or newline within
/// `lookback` characters. The next window starts `overlap` characters
/// before the cut, but always at least one character past the previous
/// start so degenerate input (e.g. a run of sentence terminators) cannot
/// stall the walk.
pub fn chunk_text_with(text: &str, config: &ChunkingConfig) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    let mut chunks = Vec::new();
    let mut start = 0usize;

    while start < chars.len() {
        let end = (start + config.window).min(chars.len());
        let mut split = end;

        if end < chars.len() {
            let floor = end.saturating_sub(config.lookback).max(start);
            for i in (floor..end).rev() {
                if is_boundary(chars[i]) {
                    split = i + 1;
                    break;
                }
            }
        }

        let piece: String = chars[start..split].iter().collect();
        let piece = piece.trim();
        if !piece.is_empty() {
            chunks.push(piece.to_string());
        }

        if split >= chars.len() {
            break;
        }

        start = (start + 1).max(split.saturating_sub(config.overlap));
    }

    chunks
}

fn is_boundary(c: char) -> bool {
    c == '。' || c == '\n'
}
