//! Questions command implementation.

use crate::cli::{content_preview, Output};
use crate::config::Settings;
use crate::server::AppState;
use console::style;

/// Show logged questions.
pub async fn run_questions(limit: usize, settings: Settings) -> anyhow::Result<()> {
    let state = AppState::from_settings(&settings)?;

    let questions = state.store.list_questions(limit).await?;

    if questions.is_empty() {
        Output::info("No questions logged yet.");
        return Ok(());
    }

    Output::header(&format!("Questions ({})", questions.len()));
    for entry in &questions {
        let marker = if entry.is_out_of_scope {
            style("out-of-scope").yellow()
        } else {
            style("answered").green()
        };
        println!(
            "  {} [{}] {}",
            style(entry.created_at.format("%Y-%m-%d %H:%M").to_string()).dim(),
            marker,
            entry.question
        );
        println!("    {}", content_preview(&entry.answer, 120));
    }

    Ok(())
}
