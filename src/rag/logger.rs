//! Question log recording.

use super::OUT_OF_SCOPE_MESSAGE;
use crate::store::{CorpusStore, QuestionRecord};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::warn;

/// Records completed interactions without blocking the response path.
pub struct QuestionLogger {
    store: Arc<dyn CorpusStore>,
}

impl QuestionLogger {
    /// Create a new question logger.
    pub fn new(store: Arc<dyn CorpusStore>) -> Self {
        Self { store }
    }

    /// Whether an interaction counts as out of scope.
    pub fn is_out_of_scope(had_chunks: bool, had_aux: bool, answer: &str) -> bool {
        (!had_chunks && !had_aux) || answer == OUT_OF_SCOPE_MESSAGE
    }

    /// Record an interaction in the background. Store failures are logged
    /// operationally and swallowed.
    pub fn record(
        &self,
        question: String,
        answer: String,
        had_chunks: bool,
        had_aux: bool,
    ) -> JoinHandle<()> {
        let store = self.store.clone();
        let out_of_scope = Self::is_out_of_scope(had_chunks, had_aux, &answer);

        tokio::spawn(async move {
            let entry = QuestionRecord::new(question, answer, out_of_scope);
            if let Err(e) = store.log_question(&entry).await {
                warn!("Failed to record question log entry: {}", e);
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    #[test]
    fn scope_flag_rules() {
        // No grounding at all.
        assert!(QuestionLogger::is_out_of_scope(false, false, "any"));
        // Canonical message always flags, even with chunks.
        assert!(QuestionLogger::is_out_of_scope(true, false, OUT_OF_SCOPE_MESSAGE));
        // Grounded answers are in scope.
        assert!(!QuestionLogger::is_out_of_scope(true, false, "回答"));
        // Aux-only answers are in scope.
        assert!(!QuestionLogger::is_out_of_scope(false, true, "今日は雨です"));
    }

    #[tokio::test]
    async fn records_asynchronously() {
        let store = Arc::new(MemoryStore::new());
        let logger = QuestionLogger::new(store.clone());

        logger
            .record("質問".to_string(), OUT_OF_SCOPE_MESSAGE.to_string(), false, false)
            .await
            .unwrap();

        let logged = store.list_questions(10).await.unwrap();
        assert_eq!(logged.len(), 1);
        assert!(logged[0].is_out_of_scope);
        assert_eq!(logged[0].question, "質問");
    }
}
