//! SQLite-based corpus store implementation.
//!
//! Uses SQLite with cosine similarity computed in Rust for simplicity.
//! For large corpora, consider the sqlite-vec extension or a dedicated
//! vector database.

use super::{
    cosine_similarity, ChunkRecord, CorpusStore, QuestionRecord, ScoredChunk, Source, SourceRef,
    SourceSummary,
};
use crate::error::{Result, SvarError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::Mutex;
use tracing::{debug, info, instrument};
use uuid::Uuid;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS sources (
    id TEXT PRIMARY KEY,
    title TEXT NOT NULL,
    body TEXT NOT NULL,
    url TEXT,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_sources_url ON sources(url);
CREATE INDEX IF NOT EXISTS idx_sources_created_at ON sources(created_at);

CREATE TABLE IF NOT EXISTS source_chunks (
    id TEXT PRIMARY KEY,
    source_id TEXT NOT NULL,
    content TEXT NOT NULL,
    embedding BLOB NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_chunks_source_id ON source_chunks(source_id);

CREATE TABLE IF NOT EXISTS questions (
    id TEXT PRIMARY KEY,
    question TEXT NOT NULL,
    answer TEXT NOT NULL,
    is_out_of_scope INTEGER NOT NULL,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_questions_created_at ON questions(created_at);
"#;

/// SQLite-based corpus store.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Create a new SQLite corpus store.
    #[instrument(skip_all)]
    pub fn new(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;

        // WAL keeps readers unblocked during chunk rebuilds.
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        conn.execute_batch(SCHEMA)?;

        info!("Initialized SQLite corpus store at {:?}", path);

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory SQLite corpus store (useful for testing).
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| SvarError::Store(format!("Failed to acquire lock: {}", e)))
    }

    /// Serialize embedding to bytes.
    fn embedding_to_bytes(embedding: &[f32]) -> Vec<u8> {
        embedding.iter().flat_map(|f| f.to_le_bytes()).collect()
    }

    /// Deserialize embedding from bytes.
    fn bytes_to_embedding(bytes: &[u8]) -> Vec<f32> {
        bytes
            .chunks_exact(4)
            .map(|chunk| {
                let arr: [u8; 4] = chunk.try_into().unwrap_or_default();
                f32::from_le_bytes(arr)
            })
            .collect()
    }

    fn parse_uuid(value: &str) -> Result<Uuid> {
        Uuid::parse_str(value).map_err(|e| SvarError::Store(format!("Bad UUID in store: {}", e)))
    }

    fn parse_timestamp(value: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(value)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now())
    }
}

#[async_trait]
impl CorpusStore for SqliteStore {
    #[instrument(skip(self, source), fields(id = %source.id))]
    async fn insert_source(&self, source: &Source) -> Result<()> {
        let conn = self.lock()?;

        conn.execute(
            "INSERT INTO sources (id, title, body, url, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                source.id.to_string(),
                source.title,
                source.body,
                source.url,
                source.created_at.to_rfc3339(),
            ],
        )?;

        debug!("Inserted source {}", source.id);
        Ok(())
    }

    async fn get_source(&self, id: Uuid) -> Result<Option<Source>> {
        let conn = self.lock()?;

        let row = conn
            .query_row(
                "SELECT id, title, body, url, created_at FROM sources WHERE id = ?1",
                params![id.to_string()],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, Option<String>>(3)?,
                        row.get::<_, String>(4)?,
                    ))
                },
            )
            .optional()?;

        match row {
            Some((id, title, body, url, created_at)) => Ok(Some(Source {
                id: Self::parse_uuid(&id)?,
                title,
                body,
                url,
                created_at: Self::parse_timestamp(&created_at),
            })),
            None => Ok(None),
        }
    }

    async fn find_source_by_url(&self, url: &str) -> Result<Option<Source>> {
        let conn = self.lock()?;

        let row = conn
            .query_row(
                "SELECT id, title, body, url, created_at FROM sources WHERE url = ?1",
                params![url],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, Option<String>>(3)?,
                        row.get::<_, String>(4)?,
                    ))
                },
            )
            .optional()?;

        match row {
            Some((id, title, body, url, created_at)) => Ok(Some(Source {
                id: Self::parse_uuid(&id)?,
                title,
                body,
                url,
                created_at: Self::parse_timestamp(&created_at),
            })),
            None => Ok(None),
        }
    }

    async fn list_sources(&self) -> Result<Vec<SourceSummary>> {
        let conn = self.lock()?;

        let mut stmt = conn.prepare(
            r#"
            SELECT s.id, s.title, s.url, s.created_at, COUNT(c.id)
            FROM sources s
            LEFT JOIN source_chunks c ON c.source_id = s.id
            GROUP BY s.id
            ORDER BY s.created_at DESC
            "#,
        )?;

        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, Option<String>>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, u32>(4)?,
            ))
        })?;

        let mut sources = Vec::new();
        for row in rows {
            let (id, title, url, created_at, chunk_count) = row?;
            sources.push(SourceSummary {
                id: Self::parse_uuid(&id)?,
                title,
                url,
                chunk_count,
                created_at: Self::parse_timestamp(&created_at),
            });
        }

        Ok(sources)
    }

    #[instrument(skip(self, title, body))]
    async fn update_source(&self, id: Uuid, title: &str, body: &str) -> Result<bool> {
        let conn = self.lock()?;

        let changed = conn.execute(
            "UPDATE sources SET title = ?1, body = ?2 WHERE id = ?3",
            params![title, body, id.to_string()],
        )?;

        Ok(changed > 0)
    }

    #[instrument(skip(self))]
    async fn delete_source(&self, id: Uuid) -> Result<bool> {
        let conn = self.lock()?;
        let tx = conn.unchecked_transaction()?;

        tx.execute(
            "DELETE FROM source_chunks WHERE source_id = ?1",
            params![id.to_string()],
        )?;
        let deleted = tx.execute("DELETE FROM sources WHERE id = ?1", params![id.to_string()])?;

        tx.commit()?;

        debug!("Deleted source {} ({} row)", id, deleted);
        Ok(deleted > 0)
    }

    #[instrument(skip(self, chunks), fields(count = chunks.len()))]
    async fn replace_chunks(&self, source_id: Uuid, chunks: &[ChunkRecord]) -> Result<usize> {
        let conn = self.lock()?;
        let tx = conn.unchecked_transaction()?;

        tx.execute(
            "DELETE FROM source_chunks WHERE source_id = ?1",
            params![source_id.to_string()],
        )?;

        for chunk in chunks {
            let embedding_bytes = Self::embedding_to_bytes(&chunk.embedding);
            tx.execute(
                "INSERT INTO source_chunks (id, source_id, content, embedding) VALUES (?1, ?2, ?3, ?4)",
                params![
                    chunk.id.to_string(),
                    chunk.source_id.to_string(),
                    chunk.content,
                    embedding_bytes,
                ],
            )?;
        }

        tx.commit()?;
        info!("Replaced chunk set for source {} ({} chunks)", source_id, chunks.len());
        Ok(chunks.len())
    }

    async fn chunks_for_source(&self, source_id: Uuid) -> Result<Vec<ChunkRecord>> {
        let conn = self.lock()?;

        let mut stmt = conn.prepare(
            "SELECT id, source_id, content, embedding FROM source_chunks WHERE source_id = ?1 ORDER BY rowid",
        )?;

        let rows = stmt.query_map(params![source_id.to_string()], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, Vec<u8>>(3)?,
            ))
        })?;

        let mut chunks = Vec::new();
        for row in rows {
            let (id, source_id, content, embedding) = row?;
            chunks.push(ChunkRecord {
                id: Self::parse_uuid(&id)?,
                source_id: Self::parse_uuid(&source_id)?,
                content,
                embedding: Self::bytes_to_embedding(&embedding),
            });
        }

        Ok(chunks)
    }

    #[instrument(skip(self, query_embedding))]
    async fn search(&self, query_embedding: &[f32], k: usize) -> Result<Vec<ScoredChunk>> {
        let conn = self.lock()?;

        let mut stmt = conn.prepare("SELECT source_id, content, embedding FROM source_chunks")?;

        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, Vec<u8>>(2)?,
            ))
        })?;

        let mut results = Vec::new();
        for row in rows {
            let (source_id, content, embedding_bytes) = row?;
            let embedding = Self::bytes_to_embedding(&embedding_bytes);
            let score = cosine_similarity(query_embedding, &embedding);
            results.push(ScoredChunk {
                content,
                source_id: Self::parse_uuid(&source_id)?,
                score,
            });
        }

        results.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        results.truncate(k);

        Ok(results)
    }

    async fn sources_by_ids(&self, ids: &[Uuid]) -> Result<Vec<SourceRef>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let conn = self.lock()?;

        let placeholders: Vec<String> = (1..=ids.len()).map(|i| format!("?{}", i)).collect();
        let sql = format!(
            "SELECT id, title, url FROM sources WHERE id IN ({})",
            placeholders.join(", ")
        );

        let id_strings: Vec<String> = ids.iter().map(|id| id.to_string()).collect();
        let mut stmt = conn.prepare(&sql)?;

        let rows = stmt.query_map(rusqlite::params_from_iter(id_strings.iter()), |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, Option<String>>(2)?,
            ))
        })?;

        let mut refs = Vec::new();
        for row in rows {
            let (id, title, url) = row?;
            refs.push(SourceRef {
                id: Self::parse_uuid(&id)?,
                title,
                url,
            });
        }

        Ok(refs)
    }

    async fn log_question(&self, entry: &QuestionRecord) -> Result<()> {
        let conn = self.lock()?;

        conn.execute(
            "INSERT INTO questions (id, question, answer, is_out_of_scope, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                entry.id.to_string(),
                entry.question,
                entry.answer,
                entry.is_out_of_scope as i32,
                entry.created_at.to_rfc3339(),
            ],
        )?;

        Ok(())
    }

    async fn list_questions(&self, limit: usize) -> Result<Vec<QuestionRecord>> {
        let conn = self.lock()?;

        let mut stmt = conn.prepare(
            "SELECT id, question, answer, is_out_of_scope, created_at FROM questions ORDER BY created_at DESC LIMIT ?1",
        )?;

        let rows = stmt.query_map(params![limit as i64], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, i32>(3)?,
                row.get::<_, String>(4)?,
            ))
        })?;

        let mut entries = Vec::new();
        for row in rows {
            let (id, question, answer, is_out_of_scope, created_at) = row?;
            entries.push(QuestionRecord {
                id: Self::parse_uuid(&id)?,
                question,
                answer,
                is_out_of_scope: is_out_of_scope != 0,
                created_at: Self::parse_timestamp(&created_at),
            });
        }

        Ok(entries)
    }

    async fn chunk_count(&self) -> Result<usize> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM source_chunks", [], |row| row.get(0))?;
        Ok(count as usize)
    }
}
