//! In-memory corpus store implementation.
//!
//! Useful for testing and small corpora.

use super::{
    cosine_similarity, ChunkRecord, CorpusStore, QuestionRecord, ScoredChunk, Source, SourceRef,
    SourceSummary,
};
use crate::error::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::RwLock;
use uuid::Uuid;

/// In-memory corpus store.
#[derive(Default)]
pub struct MemoryStore {
    sources: RwLock<HashMap<Uuid, Source>>,
    chunks: RwLock<Vec<ChunkRecord>>,
    questions: RwLock<Vec<QuestionRecord>>,
}

impl MemoryStore {
    /// Create a new in-memory corpus store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CorpusStore for MemoryStore {
    async fn insert_source(&self, source: &Source) -> Result<()> {
        let mut sources = self.sources.write().unwrap();
        sources.insert(source.id, source.clone());
        Ok(())
    }

    async fn get_source(&self, id: Uuid) -> Result<Option<Source>> {
        let sources = self.sources.read().unwrap();
        Ok(sources.get(&id).cloned())
    }

    async fn find_source_by_url(&self, url: &str) -> Result<Option<Source>> {
        let sources = self.sources.read().unwrap();
        Ok(sources
            .values()
            .find(|s| s.url.as_deref() == Some(url))
            .cloned())
    }

    async fn list_sources(&self) -> Result<Vec<SourceSummary>> {
        let sources = self.sources.read().unwrap();
        let chunks = self.chunks.read().unwrap();

        let mut summaries: Vec<SourceSummary> = sources
            .values()
            .map(|s| SourceSummary {
                id: s.id,
                title: s.title.clone(),
                url: s.url.clone(),
                chunk_count: chunks.iter().filter(|c| c.source_id == s.id).count() as u32,
                created_at: s.created_at,
            })
            .collect();

        summaries.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(summaries)
    }

    async fn update_source(&self, id: Uuid, title: &str, body: &str) -> Result<bool> {
        let mut sources = self.sources.write().unwrap();
        match sources.get_mut(&id) {
            Some(source) => {
                source.title = title.to_string();
                source.body = body.to_string();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_source(&self, id: Uuid) -> Result<bool> {
        let mut sources = self.sources.write().unwrap();
        let existed = sources.remove(&id).is_some();
        if existed {
            let mut chunks = self.chunks.write().unwrap();
            chunks.retain(|c| c.source_id != id);
        }
        Ok(existed)
    }

    async fn replace_chunks(&self, source_id: Uuid, new_chunks: &[ChunkRecord]) -> Result<usize> {
        let mut chunks = self.chunks.write().unwrap();
        chunks.retain(|c| c.source_id != source_id);
        chunks.extend_from_slice(new_chunks);
        Ok(new_chunks.len())
    }

    async fn chunks_for_source(&self, source_id: Uuid) -> Result<Vec<ChunkRecord>> {
        let chunks = self.chunks.read().unwrap();
        Ok(chunks
            .iter()
            .filter(|c| c.source_id == source_id)
            .cloned()
            .collect())
    }

    async fn search(&self, query_embedding: &[f32], k: usize) -> Result<Vec<ScoredChunk>> {
        let chunks = self.chunks.read().unwrap();

        let mut results: Vec<ScoredChunk> = chunks
            .iter()
            .map(|c| ScoredChunk {
                content: c.content.clone(),
                source_id: c.source_id,
                score: cosine_similarity(query_embedding, &c.embedding),
            })
            .collect();

        results.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        results.truncate(k);

        Ok(results)
    }

    async fn sources_by_ids(&self, ids: &[Uuid]) -> Result<Vec<SourceRef>> {
        let sources = self.sources.read().unwrap();
        Ok(ids
            .iter()
            .filter_map(|id| sources.get(id))
            .map(|s| SourceRef {
                id: s.id,
                title: s.title.clone(),
                url: s.url.clone(),
            })
            .collect())
    }

    async fn log_question(&self, entry: &QuestionRecord) -> Result<()> {
        let mut questions = self.questions.write().unwrap();
        questions.push(entry.clone());
        Ok(())
    }

    async fn list_questions(&self, limit: usize) -> Result<Vec<QuestionRecord>> {
        let questions = self.questions.read().unwrap();
        let mut entries: Vec<QuestionRecord> = questions.clone();
        entries.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        entries.truncate(limit);
        Ok(entries)
    }

    async fn chunk_count(&self) -> Result<usize> {
        let chunks = self.chunks.read().unwrap();
        Ok(chunks.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_store_search_and_cascade() {
        let store = MemoryStore::new();

        let source = Source::new("Test".to_string(), "Hello world".to_string(), None);
        store.insert_source(&source).await.unwrap();

        store
            .replace_chunks(
                source.id,
                &[
                    ChunkRecord::new(source.id, "Hello".to_string(), vec![1.0, 0.0, 0.0]),
                    ChunkRecord::new(source.id, "Goodbye".to_string(), vec![0.0, 1.0, 0.0]),
                ],
            )
            .await
            .unwrap();

        assert_eq!(store.chunk_count().await.unwrap(), 2);

        let results = store.search(&[1.0, 0.0, 0.0], 10).await.unwrap();
        assert_eq!(results.len(), 2);
        assert!(results[0].score > results[1].score);
        assert_eq!(results[0].content, "Hello");

        store.delete_source(source.id).await.unwrap();
        assert_eq!(store.chunk_count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_list_sources_counts_chunks() {
        let store = MemoryStore::new();

        let source = Source::new("Test".to_string(), "body".to_string(), None);
        store.insert_source(&source).await.unwrap();
        store
            .replace_chunks(source.id, &[ChunkRecord::new(source.id, "body".to_string(), vec![1.0])])
            .await
            .unwrap();

        let listed = store.list_sources().await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].chunk_count, 1);
    }
}
