//! List command implementation.

use crate::cli::Output;
use crate::config::Settings;
use crate::server::AppState;

/// List registered sources.
pub async fn run_list(settings: Settings) -> anyhow::Result<()> {
    let state = AppState::from_settings(&settings)?;

    let sources = state.store.list_sources().await?;

    if sources.is_empty() {
        Output::info("No sources registered yet. Use 'svar register' to add one.");
        return Ok(());
    }

    Output::header(&format!("Sources ({})", sources.len()));
    for source in &sources {
        Output::source_info(
            &source.title,
            &source.id.to_string(),
            source.chunk_count,
            source.url.as_deref(),
        );
    }

    Ok(())
}
