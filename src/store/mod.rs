//! Corpus store abstraction.
//!
//! Owns the three persistent shapes: registered sources, their embedded
//! chunks, and the question log. Backends implement a trait-based interface
//! so the pipeline can run against SQLite or an in-memory double.

mod memory;
mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A registered unit of knowledge.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Source {
    /// Unique source ID.
    pub id: Uuid,
    /// Display title.
    pub title: String,
    /// Full body text.
    pub body: String,
    /// Origin URL, when imported from the web or a video.
    pub url: Option<String>,
    /// When the source was registered.
    pub created_at: DateTime<Utc>,
}

impl Source {
    /// Create a new source.
    pub fn new(title: String, body: String, url: Option<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            title,
            body,
            url,
            created_at: Utc::now(),
        }
    }
}

/// Listing view of a source, without the body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceSummary {
    pub id: Uuid,
    pub title: String,
    pub url: Option<String>,
    pub chunk_count: u32,
    pub created_at: DateTime<Utc>,
}

/// Citation view of a source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceRef {
    pub id: Uuid,
    pub title: String,
    pub url: Option<String>,
}

/// One embedded slice of a source's body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkRecord {
    /// Unique chunk ID.
    pub id: Uuid,
    /// Owning source.
    pub source_id: Uuid,
    /// Text content of this chunk.
    pub content: String,
    /// Embedding vector.
    pub embedding: Vec<f32>,
}

impl ChunkRecord {
    /// Create a new chunk record.
    pub fn new(source_id: Uuid, content: String, embedding: Vec<f32>) -> Self {
        Self {
            id: Uuid::new_v4(),
            source_id,
            content,
            embedding,
        }
    }
}

/// A retrieved chunk with its similarity score.
#[derive(Debug, Clone)]
pub struct ScoredChunk {
    pub content: String,
    pub source_id: Uuid,
    pub score: f32,
}

/// A logged end-user interaction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionRecord {
    pub id: Uuid,
    pub question: String,
    pub answer: String,
    pub is_out_of_scope: bool,
    pub created_at: DateTime<Utc>,
}

impl QuestionRecord {
    /// Create a new question log entry.
    pub fn new(question: String, answer: String, is_out_of_scope: bool) -> Self {
        Self {
            id: Uuid::new_v4(),
            question,
            answer,
            is_out_of_scope,
            created_at: Utc::now(),
        }
    }
}

/// Trait for corpus store implementations.
#[async_trait]
pub trait CorpusStore: Send + Sync {
    /// Insert a new source row.
    async fn insert_source(&self, source: &Source) -> Result<()>;

    /// Fetch a source by ID.
    async fn get_source(&self, id: Uuid) -> Result<Option<Source>>;

    /// Find a source by its canonical origin URL (bulk-import dedupe key).
    async fn find_source_by_url(&self, url: &str) -> Result<Option<Source>>;

    /// List all sources, newest first.
    async fn list_sources(&self) -> Result<Vec<SourceSummary>>;

    /// Replace a source's title and body. Returns false if the source
    /// does not exist.
    async fn update_source(&self, id: Uuid, title: &str, body: &str) -> Result<bool>;

    /// Delete a source and all of its chunks. Returns false if the source
    /// does not exist. The cascade is explicit, not delegated to the
    /// storage engine.
    async fn delete_source(&self, id: Uuid) -> Result<bool>;

    /// Atomically replace a source's chunk set. Concurrent readers see
    /// either the old full set or the new full set, never a mix.
    async fn replace_chunks(&self, source_id: Uuid, chunks: &[ChunkRecord]) -> Result<usize>;

    /// All chunks for a source, in insertion order.
    async fn chunks_for_source(&self, source_id: Uuid) -> Result<Vec<ChunkRecord>>;

    /// Return the k most similar chunks to the query vector, best first.
    async fn search(&self, query_embedding: &[f32], k: usize) -> Result<Vec<ScoredChunk>>;

    /// Resolve citation refs for a set of source IDs.
    async fn sources_by_ids(&self, ids: &[Uuid]) -> Result<Vec<SourceRef>>;

    /// Append a question log entry.
    async fn log_question(&self, entry: &QuestionRecord) -> Result<()>;

    /// List logged questions, newest first.
    async fn list_questions(&self, limit: usize) -> Result<Vec<QuestionRecord>>;

    /// Total chunk count across all sources.
    async fn chunk_count(&self) -> Result<usize>;
}

/// Compute cosine similarity between two vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot_product / (norm_a * norm_b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cosine_similarity() {
        let a = vec![1.0, 0.0, 0.0];
        let b = vec![1.0, 0.0, 0.0];
        assert!((cosine_similarity(&a, &b) - 1.0).abs() < 0.001);

        let c = vec![0.0, 1.0, 0.0];
        assert!((cosine_similarity(&a, &c)).abs() < 0.001);

        let d = vec![-1.0, 0.0, 0.0];
        assert!((cosine_similarity(&a, &d) + 1.0).abs() < 0.001);
    }

    #[test]
    fn test_mismatched_lengths_score_zero() {
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[1.0]), 0.0);
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
    }
}
