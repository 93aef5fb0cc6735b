//! Delete command implementation.

use crate::cli::Output;
use crate::config::Settings;
use crate::server::AppState;
use uuid::Uuid;

/// Delete a source and its chunks.
pub async fn run_delete(id: &str, settings: Settings) -> anyhow::Result<()> {
    let id = Uuid::parse_str(id).map_err(|_| anyhow::anyhow!("Invalid source ID: {}", id))?;

    let state = AppState::from_settings(&settings)?;

    match state.pipeline.delete(id).await {
        Ok(()) => {
            Output::success(&format!("Deleted source {}", id));
            Ok(())
        }
        Err(e) => {
            Output::error(&format!("Failed to delete source: {}", e));
            Err(e.into())
        }
    }
}
