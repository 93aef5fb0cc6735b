//! The full ask flow: embed, retrieve, stream, cite, suggest, log.

use super::{AnswerEngine, QuestionLogger, SuggestionGenerator, OUT_OF_SCOPE_MESSAGE};
use crate::embedding::Embedder;
use crate::error::Result;
use crate::store::{CorpusStore, SourceRef};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

/// Generic failure text shown to end users; provider details stay in the
/// operational log.
const GENERIC_FAILURE: &str = "回答の生成に失敗しました";

/// One message in an answer stream, in wire order:
/// `text* → sources → suggestions? → (done | error)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum AnswerEvent {
    Text { delta: String },
    Sources { sources: Vec<SourceRef> },
    Suggestions { suggestions: Vec<String> },
    Error { error: String },
    Done,
}

/// Question-answering service.
///
/// Holds every collaborator explicitly so tests can substitute doubles.
pub struct QaService {
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn CorpusStore>,
    engine: AnswerEngine,
    suggester: SuggestionGenerator,
    logger: QuestionLogger,
    top_k: usize,
    suggestions_enabled: bool,
}

impl QaService {
    /// Create a new QA service.
    pub fn new(
        embedder: Arc<dyn Embedder>,
        store: Arc<dyn CorpusStore>,
        engine: AnswerEngine,
        suggester: SuggestionGenerator,
        top_k: usize,
        suggestions_enabled: bool,
    ) -> Self {
        let logger = QuestionLogger::new(store.clone());
        Self {
            embedder,
            store,
            engine,
            suggester,
            logger,
            top_k,
            suggestions_enabled,
        }
    }

    /// Answer a question, streaming events to the returned receiver.
    ///
    /// The receiver sees increments as the model produces them, then the
    /// side-channel messages, then exactly one terminal. Dropping the
    /// receiver cancels production; whatever text accumulated is still
    /// logged best-effort.
    #[instrument(skip(self, aux), fields(question = %question))]
    pub fn ask_stream(
        self: Arc<Self>,
        question: String,
        aux: Option<String>,
    ) -> mpsc::Receiver<AnswerEvent> {
        let (tx, rx) = mpsc::channel::<AnswerEvent>(32);

        tokio::spawn(async move {
            self.run_ask(question, aux, tx).await;
        });

        rx
    }

    async fn run_ask(&self, question: String, aux: Option<String>, tx: mpsc::Sender<AnswerEvent>) {
        let retrieved = match self.retrieve(&question).await {
            Ok(retrieved) => retrieved,
            Err(e) => {
                error!("Retrieval failed: {}", e);
                let _ = tx
                    .send(AnswerEvent::Error {
                        error: GENERIC_FAILURE.to_string(),
                    })
                    .await;
                self.log(question, String::new(), false, aux.is_some()).await;
                return;
            }
        };

        let chunk_texts: Vec<String> = retrieved.iter().map(|(content, _)| content.clone()).collect();
        let had_chunks = !chunk_texts.is_empty();
        let had_aux = aux.is_some();

        let mut stream = self
            .engine
            .stream_answer(&question, &chunk_texts, aux.as_deref());

        let mut answer = String::new();
        let mut terminated = false;
        let mut disconnected = false;

        while let Some(item) = stream.next().await {
            match item {
                Ok(delta) => {
                    answer.push_str(&delta);
                    if tx.send(AnswerEvent::Text { delta }).await.is_err() {
                        disconnected = true;
                        break;
                    }
                }
                Err(e) => {
                    error!("Answer stream failed: {}", e);
                    let _ = tx
                        .send(AnswerEvent::Error {
                            error: GENERIC_FAILURE.to_string(),
                        })
                        .await;
                    terminated = true;
                    break;
                }
            }
        }

        if !terminated && !disconnected {
            let source_ids: Vec<Uuid> = dedupe_source_ids(&retrieved);
            if !source_ids.is_empty() {
                match self.resolve_sources(&source_ids).await {
                    Ok(sources) if !sources.is_empty() => {
                        let _ = tx.send(AnswerEvent::Sources { sources }).await;
                    }
                    Ok(_) => {}
                    Err(e) => warn!("Failed to resolve sources for citation: {}", e),
                }
            }

            if self.suggestions_enabled && had_chunks && answer != OUT_OF_SCOPE_MESSAGE {
                let suggestions = self.suggester.suggest(&question, &answer, &chunk_texts).await;
                if !suggestions.is_empty() {
                    let _ = tx.send(AnswerEvent::Suggestions { suggestions }).await;
                }
            }

            let _ = tx.send(AnswerEvent::Done).await;
        }

        info!(
            out_of_scope = QuestionLogger::is_out_of_scope(had_chunks, had_aux, &answer),
            "Answer stream finished ({} chars)",
            answer.len()
        );
        self.log(question, answer, had_chunks, had_aux).await;
    }

    /// Answer a question in one call (CLI and tests).
    #[instrument(skip(self, aux), fields(question = %question))]
    pub async fn ask(&self, question: &str, aux: Option<&str>) -> Result<(String, Vec<SourceRef>)> {
        let retrieved = self.retrieve(question).await?;
        let chunk_texts: Vec<String> = retrieved.iter().map(|(content, _)| content.clone()).collect();
        let had_chunks = !chunk_texts.is_empty();

        let answer = self.engine.answer(question, &chunk_texts, aux).await?;

        let source_ids = dedupe_source_ids(&retrieved);
        let sources = self.resolve_sources(&source_ids).await.unwrap_or_default();

        self.log(question.to_string(), answer.clone(), had_chunks, aux.is_some())
            .await;

        Ok((answer, sources))
    }

    async fn retrieve(&self, question: &str) -> Result<Vec<(String, Uuid)>> {
        let embedding = self.embedder.embed(question).await?;
        let scored = self.store.search(&embedding, self.top_k).await?;
        Ok(scored.into_iter().map(|c| (c.content, c.source_id)).collect())
    }

    /// Resolve citation refs, keeping retrieval order.
    async fn resolve_sources(&self, ids: &[Uuid]) -> Result<Vec<SourceRef>> {
        let refs = self.store.sources_by_ids(ids).await?;
        let mut ordered = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(r) = refs.iter().find(|r| r.id == *id) {
                ordered.push(r.clone());
            }
        }
        Ok(ordered)
    }

    async fn log(&self, question: String, answer: String, had_chunks: bool, had_aux: bool) {
        // Awaited only after the stream has fully terminated, so the
        // response path never waits on the store.
        let _ = self.logger.record(question, answer, had_chunks, had_aux).await;
    }
}

fn dedupe_source_ids(retrieved: &[(String, Uuid)]) -> Vec<Uuid> {
    let mut seen = HashSet::new();
    retrieved
        .iter()
        .map(|(_, id)| *id)
        .filter(|id| seen.insert(*id))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::{ChatModel, TokenStream};
    use crate::config::Prompts;
    use crate::error::SvarError;
    use crate::store::{ChunkRecord, MemoryStore, Source};
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

    struct FailingEmbedder;

    #[async_trait]
    impl Embedder for FailingEmbedder {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
            Err(SvarError::Embedding("down".to_string()))
        }

        async fn embed_batch(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Err(SvarError::Embedding("down".to_string()))
        }

        fn dimensions(&self) -> usize {
            2
        }
    }

    /// Stub model: streams the given deltas for answers, returns a fixed
    /// suggestion payload for completions, counting each.
    struct StubModel {
        deltas: Vec<std::result::Result<String, ()>>,
        completion: String,
        complete_calls: AtomicUsize,
    }

    impl StubModel {
        fn new(deltas: Vec<std::result::Result<String, ()>>, completion: &str) -> Self {
            Self {
                deltas,
                completion: completion.to_string(),
                complete_calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl ChatModel for StubModel {
        async fn complete(&self, _prompt: &str) -> Result<String> {
            self.complete_calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.completion.clone())
        }

        async fn stream(&self, _prompt: &str) -> Result<TokenStream> {
            let items: Vec<Result<String>> = self
                .deltas
                .iter()
                .map(|d| match d {
                    Ok(s) => Ok(s.clone()),
                    Err(()) => Err(SvarError::Answer("stub failure".to_string())),
                })
                .collect();
            Ok(Box::pin(futures::stream::iter(items)))
        }
    }

    async fn seeded_store() -> (Arc<MemoryStore>, Uuid) {
        let store = Arc::new(MemoryStore::new());
        let source = Source::new("ミドスト入門".to_string(), "本文。".to_string(), None);
        let id = source.id;
        store.insert_source(&source).await.unwrap();
        store
            .replace_chunks(
                id,
                &[
                    ChunkRecord::new(id, "ミドストの基本。".to_string(), vec![1.0, 0.0]),
                    ChunkRecord::new(id, "ロッドの選び方。".to_string(), vec![0.9, 0.1]),
                ],
            )
            .await
            .unwrap();
        (store, id)
    }

    fn service(
        embedder: Arc<dyn Embedder>,
        store: Arc<MemoryStore>,
        model: Arc<StubModel>,
    ) -> Arc<QaService> {
        let engine = AnswerEngine::new(model.clone(), Prompts::default());
        let suggester = SuggestionGenerator::new(model, Prompts::default());
        Arc::new(QaService::new(embedder, store, engine, suggester, 5, true))
    }

    async fn collect(mut rx: mpsc::Receiver<AnswerEvent>) -> Vec<AnswerEvent> {
        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            events.push(event);
        }
        events
    }

    #[tokio::test]
    async fn full_flow_orders_events() {
        let (store, source_id) = seeded_store().await;
        let model = Arc::new(StubModel::new(
            vec![Ok("ミドストは".to_string()), Ok("中層の釣りです。".to_string())],
            r#"["ロッドは？", "リールは？"]"#,
        ));
        let svc = service(Arc::new(StubEmbedder), store.clone(), model);

        let events = collect(svc.ask_stream("ミドストとは？".to_string(), None)).await;

        assert_eq!(
            events[0],
            AnswerEvent::Text { delta: "ミドストは".to_string() }
        );
        assert_eq!(
            events[1],
            AnswerEvent::Text { delta: "中層の釣りです。".to_string() }
        );
        match &events[2] {
            AnswerEvent::Sources { sources } => {
                assert_eq!(sources.len(), 1);
                assert_eq!(sources[0].id, source_id);
                assert_eq!(sources[0].title, "ミドスト入門");
            }
            other => panic!("expected sources, got {:?}", other),
        }
        match &events[3] {
            AnswerEvent::Suggestions { suggestions } => {
                assert_eq!(suggestions.len(), 2);
            }
            other => panic!("expected suggestions, got {:?}", other),
        }
        assert_eq!(events[4], AnswerEvent::Done);
        assert_eq!(events.len(), 5);

        // Logged in scope once the stream drained.
        let logged = store.list_questions(10).await.unwrap();
        assert_eq!(logged.len(), 1);
        assert!(!logged[0].is_out_of_scope);
        assert_eq!(logged[0].answer, "ミドストは中層の釣りです。");
    }

    #[tokio::test]
    async fn empty_corpus_streams_canonical_message_only() {
        let store = Arc::new(MemoryStore::new());
        let model = Arc::new(StubModel::new(vec![Ok("unused".to_string())], "[]"));
        let svc = service(Arc::new(StubEmbedder), store.clone(), model.clone());

        let events = collect(svc.ask_stream("何か釣れる？".to_string(), None)).await;

        assert_eq!(
            events,
            vec![
                AnswerEvent::Text { delta: OUT_OF_SCOPE_MESSAGE.to_string() },
                AnswerEvent::Done,
            ]
        );
        // Suggestions were never requested.
        assert_eq!(model.complete_calls.load(Ordering::SeqCst), 0);

        let logged = store.list_questions(10).await.unwrap();
        assert!(logged[0].is_out_of_scope);
    }

    #[tokio::test]
    async fn canonical_answer_with_chunks_skips_suggestions() {
        let (store, _) = seeded_store().await;
        // Model itself declines the narrower question.
        let model = Arc::new(StubModel::new(
            vec![Ok(OUT_OF_SCOPE_MESSAGE.to_string())],
            r#"["無視される"]"#,
        ));
        let svc = service(Arc::new(StubEmbedder), store.clone(), model.clone());

        let events = collect(svc.ask_stream("他の魚は？".to_string(), None)).await;

        assert!(events.iter().any(|e| matches!(e, AnswerEvent::Sources { .. })));
        assert!(!events.iter().any(|e| matches!(e, AnswerEvent::Suggestions { .. })));
        assert_eq!(model.complete_calls.load(Ordering::SeqCst), 0);

        let logged = store.list_questions(10).await.unwrap();
        assert!(logged[0].is_out_of_scope);
    }

    #[tokio::test]
    async fn mid_stream_failure_ends_with_error() {
        let (store, _) = seeded_store().await;
        let model = Arc::new(StubModel::new(
            vec![Ok("途中まで".to_string()), Err(())],
            "[]",
        ));
        let svc = service(Arc::new(StubEmbedder), store.clone(), model);

        let events = collect(svc.ask_stream("q".to_string(), None)).await;

        assert_eq!(events[0], AnswerEvent::Text { delta: "途中まで".to_string() });
        assert_eq!(events[1], AnswerEvent::Error { error: GENERIC_FAILURE.to_string() });
        assert_eq!(events.len(), 2);

        // The partial answer is still logged.
        let logged = store.list_questions(10).await.unwrap();
        assert_eq!(logged[0].answer, "途中まで");
    }

    #[tokio::test]
    async fn retrieval_failure_reports_generic_error() {
        let store = Arc::new(MemoryStore::new());
        let model = Arc::new(StubModel::new(vec![], "[]"));
        let svc = service(Arc::new(FailingEmbedder), store.clone(), model);

        let events = collect(svc.ask_stream("q".to_string(), None)).await;

        assert_eq!(
            events,
            vec![AnswerEvent::Error { error: GENERIC_FAILURE.to_string() }]
        );
    }

    #[tokio::test]
    async fn aux_context_answers_without_chunks() {
        let store = Arc::new(MemoryStore::new());
        let model = Arc::new(StubModel::new(vec![Ok("今日は雨です。".to_string())], "[]"));
        let svc = service(Arc::new(StubEmbedder), store.clone(), model.clone());

        let events = collect(
            svc.ask_stream("今日の天気は？".to_string(), Some("**現在**: 雨".to_string())),
        )
        .await;

        assert_eq!(events[0], AnswerEvent::Text { delta: "今日は雨です。".to_string() });
        assert_eq!(*events.last().unwrap(), AnswerEvent::Done);
        // No chunks, so no sources message and no suggestions.
        assert!(!events.iter().any(|e| matches!(e, AnswerEvent::Sources { .. })));
        assert!(!events.iter().any(|e| matches!(e, AnswerEvent::Suggestions { .. })));

        let logged = store.list_questions(10).await.unwrap();
        assert!(!logged[0].is_out_of_scope);
    }

    #[tokio::test]
    async fn blocking_ask_returns_answer_and_sources() {
        let (store, source_id) = seeded_store().await;
        let model = Arc::new(StubModel::new(vec![], "回答です。"));
        let svc = service(Arc::new(StubEmbedder), store.clone(), model);

        let (answer, sources) = svc.ask("ミドストとは？", None).await.unwrap();
        assert_eq!(answer, "回答です。");
        assert_eq!(sources.len(), 1);
        assert_eq!(sources[0].id, source_id);
    }

    #[test]
    fn dedupe_preserves_first_occurrence_order() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let retrieved = vec![
            ("1".to_string(), a),
            ("2".to_string(), b),
            ("3".to_string(), a),
        ];
        assert_eq!(dedupe_source_ids(&retrieved), vec![a, b]);
    }
}
