//! Follow-up question suggestions.
//!
//! Best-effort UX sugar: any failure, including unparseable model output,
//! degrades to an empty list and never surfaces to the user.

use crate::chat::ChatModel;
use crate::config::Prompts;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, instrument};

/// Maximum number of suggestions returned.
const MAX_SUGGESTIONS: usize = 3;

/// How many chunk texts feed the theme section of the prompt.
const MAX_THEME_CHUNKS: usize = 3;

/// Character cap per theme chunk.
const THEME_CHAR_CAP: usize = 300;

/// Character cap for the answer excerpt.
const ANSWER_CHAR_CAP: usize = 800;

/// Follow-up suggestion generator.
pub struct SuggestionGenerator {
    model: Arc<dyn ChatModel>,
    prompts: Prompts,
}

impl SuggestionGenerator {
    /// Create a new suggestion generator.
    pub fn new(model: Arc<dyn ChatModel>, prompts: Prompts) -> Self {
        Self { model, prompts }
    }

    /// Propose up to three short follow-up questions.
    #[instrument(skip_all, fields(question = %question))]
    pub async fn suggest(&self, question: &str, answer: &str, chunks: &[String]) -> Vec<String> {
        let themes = chunks
            .iter()
            .take(MAX_THEME_CHUNKS)
            .map(|c| truncate_chars(c, THEME_CHAR_CAP))
            .collect::<Vec<_>>()
            .join("\n---\n");

        let mut vars = HashMap::new();
        vars.insert("question".to_string(), question.to_string());
        vars.insert("answer".to_string(), truncate_chars(answer, ANSWER_CHAR_CAP));
        vars.insert("themes".to_string(), themes);

        let prompt = self
            .prompts
            .render_with_custom(&self.prompts.suggest.template, &vars);

        match self.model.complete(&prompt).await {
            Ok(text) => {
                let suggestions = parse_suggestions(&text);
                debug!("Parsed {} suggestions", suggestions.len());
                suggestions
            }
            Err(e) => {
                debug!("Suggestion generation failed, returning none: {}", e);
                Vec::new()
            }
        }
    }
}

/// Pull string entries out of the first JSON array found in the text.
fn parse_suggestions(text: &str) -> Vec<String> {
    let Some(values) = extract_json_array(text) else {
        return Vec::new();
    };

    values
        .into_iter()
        .filter_map(|v| v.as_str().map(|s| s.to_string()))
        .filter(|s| !s.is_empty())
        .take(MAX_SUGGESTIONS)
        .collect()
}

/// Locate the first well-formed JSON array substring.
///
/// Models wrap their output in prose or code fences often enough that
/// strict parsing of the whole text would throw away good results.
fn extract_json_array(text: &str) -> Option<Vec<serde_json::Value>> {
    let start = text.find('[')?;

    for (end, _) in text.match_indices(']') {
        if end < start {
            continue;
        }
        if let Ok(serde_json::Value::Array(values)) =
            serde_json::from_str::<serde_json::Value>(&text[start..=end])
        {
            return Some(values);
        }
    }

    None
}

fn truncate_chars(text: &str, cap: usize) -> String {
    text.chars().take(cap).collect()
}
