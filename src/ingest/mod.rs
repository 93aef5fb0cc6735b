//! Ingestion pipeline.
//!
//! Write side of the corpus: resolve raw text (direct input, fetched page,
//! or video transcript), chunk it, embed every chunk, and persist the rows.
//! Edits always rebuild a source's full chunk set.

use crate::chunking::{chunk_text_with, ChunkingConfig};
use crate::embedding::Embedder;
use crate::error::{Result, SvarError};
use crate::fetch::{canonical_video_url, extract_video_id, PageFetcher, TranscriptFetcher};
use crate::store::{ChunkRecord, CorpusStore, Source};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

/// Outcome of one video import.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportStatus {
    Imported,
    Skipped,
    Failed,
}

/// Reason attached to a skipped or failed import.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportReason {
    AlreadyRegistered,
    NoCaptions,
    InsufficientCredits,
}

/// Per-video import record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportDetail {
    pub video_id: String,
    pub title: Option<String>,
    pub status: ImportStatus,
    pub reason: Option<ImportReason>,
}

/// Aggregate result of a channel import.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChannelImport {
    pub imported: usize,
    pub skipped: usize,
    pub failed: usize,
    pub details: Vec<ImportDetail>,
}

impl ChannelImport {
    fn push(&mut self, detail: ImportDetail) {
        match detail.status {
            ImportStatus::Imported => self.imported += 1,
            ImportStatus::Skipped => self.skipped += 1,
            ImportStatus::Failed => self.failed += 1,
        }
        self.details.push(detail);
    }
}

/// Which channel listing to import.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelMode {
    Latest,
    All,
}

impl std::str::FromStr for ChannelMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "latest" => Ok(ChannelMode::Latest),
            "all" => Ok(ChannelMode::All),
            _ => Err(format!("Unknown channel mode: {}", s)),
        }
    }
}

/// The write-side pipeline: raw text in, embedded chunk rows out.
pub struct IngestionPipeline {
    store: Arc<dyn CorpusStore>,
    embedder: Arc<dyn Embedder>,
    pages: Arc<dyn PageFetcher>,
    transcripts: Option<Arc<dyn TranscriptFetcher>>,
    chunking: ChunkingConfig,
}

impl IngestionPipeline {
    /// Create a new ingestion pipeline.
    pub fn new(
        store: Arc<dyn CorpusStore>,
        embedder: Arc<dyn Embedder>,
        pages: Arc<dyn PageFetcher>,
        transcripts: Option<Arc<dyn TranscriptFetcher>>,
        chunking: ChunkingConfig,
    ) -> Self {
        Self {
            store,
            embedder,
            pages,
            transcripts,
            chunking,
        }
    }

    /// Register a manually entered source.
    #[instrument(skip(self, body), fields(title = %title))]
    pub async fn register_text(&self, title: &str, body: &str) -> Result<Source> {
        self.index_source(title, body, None).await
    }

    /// Register a source from a fetched web page. A non-empty title
    /// override takes precedence over the page's own title.
    #[instrument(skip(self), fields(url = %url))]
    pub async fn register_web(&self, url: &str, title_override: Option<&str>) -> Result<Source> {
        let page = self.pages.fetch(url).await?;
        let title = match title_override.map(str::trim) {
            Some(t) if !t.is_empty() => t.to_string(),
            _ => page.title,
        };

        self.index_source(&title, &page.content, Some(url.to_string()))
            .await
    }

    /// Replace a source's title and body, rebuilding its chunk set from
    /// scratch. Correctness over efficiency: edits are rare and partial
    /// patches could leave stale chunks behind.
    #[instrument(skip(self, body), fields(id = %id))]
    pub async fn update(&self, id: Uuid, title: &str, body: &str) -> Result<Source> {
        validate_title_body(title, body)?;

        if !self.store.update_source(id, title, body).await? {
            return Err(SvarError::NotFound(format!("Source not found: {}", id)));
        }

        self.rebuild_chunks(id, body).await?;

        self.store
            .get_source(id)
            .await?
            .ok_or_else(|| SvarError::NotFound(format!("Source not found: {}", id)))
    }

    /// Delete a source and its chunks.
    #[instrument(skip(self), fields(id = %id))]
    pub async fn delete(&self, id: Uuid) -> Result<()> {
        if !self.store.delete_source(id).await? {
            return Err(SvarError::NotFound(format!("Source not found: {}", id)));
        }
        Ok(())
    }

    /// Import one video by URL or bare ID.
    #[instrument(skip(self), fields(input = %input))]
    pub async fn import_video(
        &self,
        input: &str,
        title_override: Option<&str>,
    ) -> Result<ImportDetail> {
        let video_id = extract_video_id(input).ok_or_else(|| {
            SvarError::InvalidInput("有効なYouTube URLまたは動画IDを入力してください".to_string())
        })?;
        let url = canonical_video_url(&video_id);

        if self.store.find_source_by_url(&url).await?.is_some() {
            return Ok(ImportDetail {
                video_id,
                title: None,
                status: ImportStatus::Skipped,
                reason: Some(ImportReason::AlreadyRegistered),
            });
        }

        let transcript = match self.transcript_fetcher()?.fetch_transcript(&url).await {
            Ok(result) => result,
            Err(SvarError::NoCaptions(_)) => {
                return Ok(ImportDetail {
                    video_id,
                    title: None,
                    status: ImportStatus::Failed,
                    reason: Some(ImportReason::NoCaptions),
                });
            }
            Err(SvarError::QuotaExhausted) => {
                return Ok(ImportDetail {
                    video_id,
                    title: None,
                    status: ImportStatus::Failed,
                    reason: Some(ImportReason::InsufficientCredits),
                });
            }
            Err(e) => return Err(e),
        };

        let title = match title_override.map(str::trim) {
            Some(t) if !t.is_empty() => t.to_string(),
            _ => transcript.title,
        };

        self.index_source(&title, &transcript.transcript, Some(url))
            .await?;

        Ok(ImportDetail {
            video_id,
            title: Some(title),
            status: ImportStatus::Imported,
            reason: None,
        })
    }

    /// Import a channel's videos sequentially.
    ///
    /// Missing captions or a failed registration skip one item; exhausted
    /// credits stop the batch immediately with the partial tallies, since
    /// every later fetch would fail the same way.
    #[instrument(skip(self), fields(channel = %channel_handle, mode = ?mode))]
    pub async fn import_channel(
        &self,
        channel_handle: &str,
        mode: ChannelMode,
    ) -> Result<ChannelImport> {
        let fetcher = self.transcript_fetcher()?;

        let videos = match mode {
            ChannelMode::Latest => fetcher.channel_latest(channel_handle).await?,
            ChannelMode::All => fetcher.channel_all(channel_handle).await?,
        };

        info!("Importing {} videos from channel {}", videos.len(), channel_handle);

        let mut report = ChannelImport::default();

        for video in videos {
            if self.store.find_source_by_url(&video.url).await?.is_some() {
                report.push(ImportDetail {
                    video_id: video.video_id,
                    title: Some(video.title),
                    status: ImportStatus::Skipped,
                    reason: Some(ImportReason::AlreadyRegistered),
                });
                continue;
            }

            let transcript = match fetcher.fetch_transcript(&video.url).await {
                Ok(result) => result,
                Err(SvarError::QuotaExhausted) => {
                    report.push(ImportDetail {
                        video_id: video.video_id,
                        title: Some(video.title),
                        status: ImportStatus::Failed,
                        reason: Some(ImportReason::InsufficientCredits),
                    });
                    break;
                }
                Err(SvarError::NoCaptions(_)) => {
                    report.push(ImportDetail {
                        video_id: video.video_id,
                        title: Some(video.title),
                        status: ImportStatus::Failed,
                        reason: Some(ImportReason::NoCaptions),
                    });
                    continue;
                }
                Err(e) => {
                    warn!("Transcript fetch failed for {}: {}", video.video_id, e);
                    report.push(ImportDetail {
                        video_id: video.video_id,
                        title: Some(video.title),
                        status: ImportStatus::Failed,
                        reason: None,
                    });
                    continue;
                }
            };

            let title = if transcript.title.is_empty() {
                video.title.clone()
            } else {
                transcript.title.clone()
            };

            match self
                .index_source(&title, &transcript.transcript, Some(video.url.clone()))
                .await
            {
                Ok(_) => report.push(ImportDetail {
                    video_id: video.video_id,
                    title: Some(title),
                    status: ImportStatus::Imported,
                    reason: None,
                }),
                Err(e) => {
                    warn!("Failed to register {}: {}", video.video_id, e);
                    report.push(ImportDetail {
                        video_id: video.video_id,
                        title: Some(video.title),
                        status: ImportStatus::Failed,
                        reason: None,
                    });
                }
            }
        }

        Ok(report)
    }

    /// Insert a source and its embedded chunks.
    ///
    /// If chunking or embedding fails after the source row exists, the
    /// error propagates and the row stays; an edit rebuilds it. See
    /// DESIGN.md for the rollback decision.
    async fn index_source(&self, title: &str, body: &str, url: Option<String>) -> Result<Source> {
        validate_title_body(title, body)?;

        let source = Source::new(title.to_string(), body.to_string(), url);
        self.store.insert_source(&source).await?;

        self.rebuild_chunks(source.id, body).await?;

        info!("Registered source '{}' ({})", source.title, source.id);
        Ok(source)
    }

    /// Chunk, embed and persist a source's chunk set in one replace.
    async fn rebuild_chunks(&self, source_id: Uuid, body: &str) -> Result<usize> {
        let chunks = chunk_text_with(body, &self.chunking);
        let embeddings = self.embedder.embed_batch(&chunks).await?;

        let rows: Vec<ChunkRecord> = chunks
            .into_iter()
            .zip(embeddings)
            .map(|(content, embedding)| ChunkRecord::new(source_id, content, embedding))
            .collect();

        self.store.replace_chunks(source_id, &rows).await
    }

    fn transcript_fetcher(&self) -> Result<&Arc<dyn TranscriptFetcher>> {
        self.transcripts.as_ref().ok_or_else(|| {
            SvarError::Config("Transcript API key is not configured".to_string())
        })
    }
}

fn validate_title_body(title: &str, body: &str) -> Result<()> {
    if title.trim().is_empty() || body.trim().is_empty() {
        return Err(SvarError::InvalidInput("title and body are required".to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunking::chunk_text;
    use crate::fetch::{ChannelVideo, TranscriptResult, WebPage};
    use crate::store::MemoryStore;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct StubEmbedder;

    #[async_trait]
    impl Embedder for StubEmbedder {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
            Ok(vec![1.0, 0.0])
        }

        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Ok(texts.iter().map(|_| vec![1.0, 0.0]).collect())
        }

        fn dimensions(&self) -> usize {
            2
        }
    }

    struct StubPages;

    #[async_trait]
    impl PageFetcher for StubPages {
        async fn fetch(&self, _url: &str) -> Result<WebPage> {
            Ok(WebPage {
                title: "取得したページ".to_string(),
                content: "ページ本文。".to_string(),
            })
        }
    }

    /// Transcript stub: per-video outcomes keyed by video ID, with a call
    /// counter to assert the quota short-circuit.
    struct StubTranscripts {
        videos: Vec<ChannelVideo>,
        // (video_id, outcome): Ok => transcript text, Err => error kind
        outcomes: Vec<(String, std::result::Result<String, &'static str>)>,
        fetch_calls: AtomicUsize,
    }

    impl StubTranscripts {
        fn outcome_for(&self, url: &str) -> Result<TranscriptResult> {
            let video_id = extract_video_id(url).unwrap_or_default();
            match self.outcomes.iter().find(|(id, _)| *id == video_id) {
                Some((_, Ok(text))) => Ok(TranscriptResult {
                    video_id: video_id.clone(),
                    title: format!("動画 {}", video_id),
                    transcript: text.clone(),
                }),
                Some((_, Err("quota"))) => Err(SvarError::QuotaExhausted),
                Some((_, Err("no_captions"))) => Err(SvarError::NoCaptions(url.to_string())),
                _ => Err(SvarError::Transcript("unknown video".to_string())),
            }
        }
    }

    #[async_trait]
    impl TranscriptFetcher for StubTranscripts {
        async fn fetch_transcript(&self, video_url: &str) -> Result<TranscriptResult> {
            self.fetch_calls.fetch_add(1, Ordering::SeqCst);
            self.outcome_for(video_url)
        }

        async fn channel_latest(&self, _handle: &str) -> Result<Vec<ChannelVideo>> {
            Ok(self.videos.clone())
        }

        async fn channel_all(&self, _handle: &str) -> Result<Vec<ChannelVideo>> {
            Ok(self.videos.clone())
        }
    }

    fn video(id: &str) -> ChannelVideo {
        ChannelVideo {
            video_id: id.to_string(),
            title: format!("動画 {}", id),
            url: canonical_video_url(id),
        }
    }

    fn pipeline_with(
        store: Arc<MemoryStore>,
        transcripts: Option<Arc<dyn TranscriptFetcher>>,
    ) -> IngestionPipeline {
        IngestionPipeline::new(
            store,
            Arc::new(StubEmbedder),
            Arc::new(StubPages),
            transcripts,
            ChunkingConfig::default(),
        )
    }

    #[tokio::test]
    async fn register_text_persists_source_and_chunks() {
        let store = Arc::new(MemoryStore::new());
        let pipeline = pipeline_with(store.clone(), None);

        let source = pipeline
            .register_text("ミドスト入門", "ミドストの基本を解説する。")
            .await
            .unwrap();

        assert_eq!(store.chunk_count().await.unwrap(), 1);
        let chunks = store.chunks_for_source(source.id).await.unwrap();
        assert_eq!(chunks[0].content, "ミドストの基本を解説する。");
        assert!(source.url.is_none());
    }

    #[tokio::test]
    async fn register_rejects_empty_fields() {
        let store = Arc::new(MemoryStore::new());
        let pipeline = pipeline_with(store.clone(), None);

        assert!(matches!(
            pipeline.register_text("", "body").await,
            Err(SvarError::InvalidInput(_))
        ));
        assert!(matches!(
            pipeline.register_text("title", "   ").await,
            Err(SvarError::InvalidInput(_))
        ));
        // Nothing persisted on validation failure.
        assert!(store.list_sources().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn register_web_records_origin_url() {
        let store = Arc::new(MemoryStore::new());
        let pipeline = pipeline_with(store.clone(), None);

        let source = pipeline
            .register_web("https://example.com/article", None)
            .await
            .unwrap();
        assert_eq!(source.title, "取得したページ");
        assert_eq!(source.url.as_deref(), Some("https://example.com/article"));

        let overridden = pipeline
            .register_web("https://example.com/other", Some("自分のタイトル"))
            .await
            .unwrap();
        assert_eq!(overridden.title, "自分のタイトル");
    }

    #[tokio::test]
    async fn update_fully_replaces_chunk_set() {
        let store = Arc::new(MemoryStore::new());
        let pipeline = pipeline_with(store.clone(), None);

        let long_body = "春はミドスト。".repeat(120);
        let source = pipeline.register_text("元のタイトル", &long_body).await.unwrap();
        let before = store.chunks_for_source(source.id).await.unwrap();
        assert!(before.len() > 1);

        let new_body = "冬はメタルバイブ。";
        let updated = pipeline.update(source.id, "新タイトル", new_body).await.unwrap();
        assert_eq!(updated.title, "新タイトル");

        let after = store.chunks_for_source(source.id).await.unwrap();
        let expected = chunk_text(new_body);
        assert_eq!(after.len(), expected.len());
        assert_eq!(after[0].content, expected[0]);
        // No chunk from the old body survives.
        assert!(after.iter().all(|c| !c.content.contains("ミドスト")));
    }

    #[tokio::test]
    async fn update_missing_source_is_not_found() {
        let pipeline = pipeline_with(Arc::new(MemoryStore::new()), None);
        assert!(matches!(
            pipeline.update(Uuid::new_v4(), "t", "b").await,
            Err(SvarError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn delete_cascades_and_reports_missing() {
        let store = Arc::new(MemoryStore::new());
        let pipeline = pipeline_with(store.clone(), None);

        let source = pipeline.register_text("t", "本文。").await.unwrap();
        pipeline.delete(source.id).await.unwrap();
        assert_eq!(store.chunk_count().await.unwrap(), 0);

        assert!(matches!(
            pipeline.delete(source.id).await,
            Err(SvarError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn import_video_dedupes_by_canonical_url() {
        let store = Arc::new(MemoryStore::new());
        let transcripts = Arc::new(StubTranscripts {
            videos: vec![],
            outcomes: vec![("aaaaaaaaaaa".to_string(), Ok("字幕テキスト。".to_string()))],
            fetch_calls: AtomicUsize::new(0),
        });
        let pipeline = pipeline_with(store.clone(), Some(transcripts.clone()));

        let first = pipeline
            .import_video("https://youtu.be/aaaaaaaaaaa", None)
            .await
            .unwrap();
        assert_eq!(first.status, ImportStatus::Imported);

        // Same video through a different URL form skips without a fetch.
        let second = pipeline
            .import_video("https://www.youtube.com/watch?v=aaaaaaaaaaa", None)
            .await
            .unwrap();
        assert_eq!(second.status, ImportStatus::Skipped);
        assert_eq!(second.reason, Some(ImportReason::AlreadyRegistered));
        assert_eq!(transcripts.fetch_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn import_video_reports_missing_captions() {
        let transcripts = Arc::new(StubTranscripts {
            videos: vec![],
            outcomes: vec![("bbbbbbbbbbb".to_string(), Err("no_captions"))],
            fetch_calls: AtomicUsize::new(0),
        });
        let pipeline = pipeline_with(Arc::new(MemoryStore::new()), Some(transcripts));

        let detail = pipeline.import_video("bbbbbbbbbbb", None).await.unwrap();
        assert_eq!(detail.status, ImportStatus::Failed);
        assert_eq!(detail.reason, Some(ImportReason::NoCaptions));
    }

    #[tokio::test]
    async fn channel_import_stops_on_quota_exhaustion() {
        let store = Arc::new(MemoryStore::new());
        let ids = ["id000000001", "id000000002", "id000000003", "id000000004", "id000000005"];
        let transcripts = Arc::new(StubTranscripts {
            videos: ids.iter().map(|id| video(id)).collect(),
            outcomes: vec![
                (ids[0].to_string(), Ok("字幕1。".to_string())),
                (ids[1].to_string(), Err("no_captions")),
                (ids[2].to_string(), Err("quota")),
                (ids[3].to_string(), Ok("字幕4。".to_string())),
                (ids[4].to_string(), Ok("字幕5。".to_string())),
            ],
            fetch_calls: AtomicUsize::new(0),
        });
        let pipeline = pipeline_with(store.clone(), Some(transcripts.clone()));

        let report = pipeline.import_channel("@channel", ChannelMode::Latest).await.unwrap();

        // Items 1-2 processed, item 3 recorded as quota failure, 4-5 never attempted.
        assert_eq!(report.details.len(), 3);
        assert_eq!(report.imported, 1);
        assert_eq!(report.failed, 2);
        assert_eq!(report.details[2].reason, Some(ImportReason::InsufficientCredits));
        assert_eq!(transcripts.fetch_calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn channel_import_skips_registered_videos() {
        let store = Arc::new(MemoryStore::new());
        let transcripts = Arc::new(StubTranscripts {
            videos: vec![video("ccccccccccc"), video("ddddddddddd")],
            outcomes: vec![
                ("ccccccccccc".to_string(), Ok("字幕C。".to_string())),
                ("ddddddddddd".to_string(), Ok("字幕D。".to_string())),
            ],
            fetch_calls: AtomicUsize::new(0),
        });
        let pipeline = pipeline_with(store.clone(), Some(transcripts.clone()));

        // Pre-register the first video.
        pipeline.import_video("ccccccccccc", None).await.unwrap();

        let report = pipeline.import_channel("@channel", ChannelMode::Latest).await.unwrap();
        assert_eq!(report.skipped, 1);
        assert_eq!(report.imported, 1);
    }

    #[tokio::test]
    async fn import_without_api_key_is_a_config_error() {
        let pipeline = pipeline_with(Arc::new(MemoryStore::new()), None);
        assert!(matches!(
            pipeline.import_video("aaaaaaaaaaa", None).await,
            Err(SvarError::Config(_))
        ));
    }
}
