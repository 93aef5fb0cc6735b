//! Grounded answer generation.

use crate::chat::ChatModel;
use crate::config::Prompts;
use crate::error::Result;
use futures::{Stream, StreamExt};
use std::collections::HashMap;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::sync::mpsc;
use tracing::{debug, instrument};

/// Canonical message for questions the corpus cannot answer.
pub const OUT_OF_SCOPE_MESSAGE: &str = "提供された情報の範囲外のため、お答えできません。";

/// Separator between chunk texts in the grounding prompt.
const CHUNK_SEPARATOR: &str = "\n\n---\n\n";

/// Answer synthesis engine.
pub struct AnswerEngine {
    model: Arc<dyn ChatModel>,
    prompts: Prompts,
}

impl AnswerEngine {
    /// Create a new answer engine.
    pub fn new(model: Arc<dyn ChatModel>, prompts: Prompts) -> Self {
        Self { model, prompts }
    }

    /// Build the grounding prompt, or None when the question is out of
    /// scope (no chunks and no auxiliary context).
    fn build_prompt(&self, question: &str, chunks: &[String], aux: Option<&str>) -> Option<String> {
        let mut vars = HashMap::new();
        vars.insert("question".to_string(), question.to_string());

        let template = match (chunks.is_empty(), aux) {
            (true, None) => return None,
            (false, None) => {
                vars.insert("context".to_string(), chunks.join(CHUNK_SEPARATOR));
                &self.prompts.answer.grounded
            }
            (false, Some(aux)) => {
                vars.insert("context".to_string(), chunks.join(CHUNK_SEPARATOR));
                vars.insert("aux".to_string(), aux.to_string());
                &self.prompts.answer.grounded_with_aux
            }
            (true, Some(aux)) => {
                vars.insert("aux".to_string(), aux.to_string());
                &self.prompts.answer.aux_only
            }
        };

        Some(self.prompts.render_with_custom(template, &vars))
    }

    /// Generate a complete answer.
    #[instrument(skip(self, chunks, aux), fields(question = %question, chunks = chunks.len()))]
    pub async fn answer(
        &self,
        question: &str,
        chunks: &[String],
        aux: Option<&str>,
    ) -> Result<String> {
        let Some(prompt) = self.build_prompt(question, chunks, aux) else {
            debug!("No grounding available, answering out of scope");
            return Ok(OUT_OF_SCOPE_MESSAGE.to_string());
        };

        let answer = self.model.complete(&prompt).await?;
        if answer.trim().is_empty() {
            return Ok(OUT_OF_SCOPE_MESSAGE.to_string());
        }

        Ok(answer)
    }

    /// Generate an answer as a stream of text increments.
    ///
    /// With no chunks and no auxiliary context the stream yields exactly
    /// the canonical out-of-scope message without calling the model.
    /// Increments arrive in generation order; a mid-stream provider error
    /// ends the stream with one final Err item. Dropping the stream stops
    /// production.
    #[instrument(skip(self, chunks, aux), fields(question = %question, chunks = chunks.len()))]
    pub fn stream_answer(
        &self,
        question: &str,
        chunks: &[String],
        aux: Option<&str>,
    ) -> AnswerStream {
        let (tx, rx) = mpsc::channel::<Result<String>>(32);

        match self.build_prompt(question, chunks, aux) {
            None => {
                debug!("No grounding available, streaming out-of-scope message");
                // Capacity is fresh, so this cannot fail.
                let _ = tx.try_send(Ok(OUT_OF_SCOPE_MESSAGE.to_string()));
            }
            Some(prompt) => {
                let model = self.model.clone();
                tokio::spawn(async move {
                    let mut tokens = match model.stream(&prompt).await {
                        Ok(tokens) => tokens,
                        Err(e) => {
                            let _ = tx.send(Err(e)).await;
                            return;
                        }
                    };

                    let mut yielded_text = false;
                    while let Some(item) = tokens.next().await {
                        let failed = item.is_err();
                        if tx.send(item).await.is_err() {
                            // Receiver gone: caller disconnected.
                            return;
                        }
                        if failed {
                            return;
                        }
                        yielded_text = true;
                    }

                    if !yielded_text {
                        let _ = tx.send(Ok(OUT_OF_SCOPE_MESSAGE.to_string())).await;
                    }
                });
            }
        }

        AnswerStream { rx }
    }
}

/// A finite, non-restartable sequence of answer increments.
pub struct AnswerStream {
    rx: mpsc::Receiver<Result<String>>,
}

impl AnswerStream {
    /// Receive the next increment, or None once the stream is exhausted.
    pub async fn next(&mut self) -> Option<Result<String>> {
        self.rx.recv().await
    }
}

impl Stream for AnswerStream {
    type Item = Result<String>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::TokenStream;
    use crate::error::SvarError;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Stub model that streams fixed deltas and counts invocations.
    struct StubModel {
        deltas: Vec<Result<String>>,
        calls: AtomicUsize,
    }

    impl StubModel {
        fn with_deltas(deltas: Vec<Result<String>>) -> Self {
            Self {
                deltas,
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl ChatModel for StubModel {
        async fn complete(&self, _prompt: &str) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut out = String::new();
            for d in &self.deltas {
                if let Ok(d) = d {
                    out.push_str(d);
                }
            }
            Ok(out)
        }

        async fn stream(&self, _prompt: &str) -> Result<TokenStream> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let items: Vec<Result<String>> = self
                .deltas
                .iter()
                .map(|d| match d {
                    Ok(s) => Ok(s.clone()),
                    Err(_) => Err(SvarError::Answer("stub failure".to_string())),
                })
                .collect();
            Ok(Box::pin(futures::stream::iter(items)))
        }
    }

    fn engine_with(model: Arc<StubModel>) -> AnswerEngine {
        AnswerEngine::new(model, Prompts::default())
    }

    #[tokio::test]
    async fn out_of_scope_short_circuits_without_model_call() {
        let model = Arc::new(StubModel::with_deltas(vec![Ok("unused".to_string())]));
        let engine = engine_with(model.clone());

        let mut stream = engine.stream_answer("冬の釣り方は？", &[], None);

        let first = stream.next().await.unwrap().unwrap();
        assert_eq!(first, OUT_OF_SCOPE_MESSAGE);
        assert!(stream.next().await.is_none());
        assert_eq!(model.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn blocking_answer_short_circuits_too() {
        let model = Arc::new(StubModel::with_deltas(vec![Ok("unused".to_string())]));
        let engine = engine_with(model.clone());

        let answer = engine.answer("質問", &[], None).await.unwrap();
        assert_eq!(answer, OUT_OF_SCOPE_MESSAGE);
        assert_eq!(model.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn streams_deltas_in_order() {
        let model = Arc::new(StubModel::with_deltas(vec![
            Ok("ミド".to_string()),
            Ok("ストは".to_string()),
            Ok("中層の釣りです。".to_string()),
        ]));
        let engine = engine_with(model.clone());

        let chunks = vec!["ミドストの解説。".to_string()];
        let mut stream = engine.stream_answer("ミドストとは？", &chunks, None);

        let mut collected = String::new();
        while let Some(item) = stream.next().await {
            collected.push_str(&item.unwrap());
        }
        assert_eq!(collected, "ミドストは中層の釣りです。");
        assert_eq!(model.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn aux_only_reaches_the_model() {
        let model = Arc::new(StubModel::with_deltas(vec![Ok("今日は雨です。".to_string())]));
        let engine = engine_with(model.clone());

        let mut stream = engine.stream_answer("今日の天気は？", &[], Some("**現在**: 雨"));

        let first = stream.next().await.unwrap().unwrap();
        assert_eq!(first, "今日は雨です。");
        assert_eq!(model.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn mid_stream_failure_terminates_cleanly() {
        let model = Arc::new(StubModel::with_deltas(vec![
            Ok("途中まで".to_string()),
            Err(SvarError::Answer("boom".to_string())),
            Ok("届かない".to_string()),
        ]));
        let engine = engine_with(model);

        let chunks = vec!["context".to_string()];
        let mut stream = engine.stream_answer("q", &chunks, None);

        assert_eq!(stream.next().await.unwrap().unwrap(), "途中まで");
        assert!(stream.next().await.unwrap().is_err());
        // Terminates after the error item.
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn empty_model_output_substitutes_canonical_message() {
        let model = Arc::new(StubModel::with_deltas(vec![]));
        let engine = engine_with(model);

        let chunks = vec!["context".to_string()];
        let mut stream = engine.stream_answer("q", &chunks, None);

        assert_eq!(stream.next().await.unwrap().unwrap(), OUT_OF_SCOPE_MESSAGE);
        assert!(stream.next().await.is_none());
    }

    #[test]
    fn prompt_selection_follows_grounding() {
        let model = Arc::new(StubModel::with_deltas(vec![]));
        let engine = engine_with(model);

        let chunks = vec!["チャンクA".to_string(), "チャンクB".to_string()];

        let grounded = engine.build_prompt("q", &chunks, None).unwrap();
        assert!(grounded.contains("チャンクA\n\n---\n\nチャンクB"));
        assert!(!grounded.contains("天気"));

        let with_aux = engine.build_prompt("q", &chunks, Some("晴れ")).unwrap();
        assert!(with_aux.contains("補足情報"));
        assert!(with_aux.contains("晴れ"));

        let aux_only = engine.build_prompt("q", &[], Some("晴れ")).unwrap();
        assert!(aux_only.contains("天気予報"));
        assert!(!aux_only.contains("参考情報"));

        assert!(engine.build_prompt("q", &[], None).is_none());
    }
}
