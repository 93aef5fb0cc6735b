//! Import command implementation.

use crate::cli::{ImportTarget, Output};
use crate::config::Settings;
use crate::ingest::{ImportDetail, ImportStatus};
use crate::server::AppState;

/// Run the import command.
pub async fn run_import(target: &ImportTarget, settings: Settings) -> anyhow::Result<()> {
    let state = AppState::from_settings(&settings)?;

    match target {
        ImportTarget::Video { url, title } => {
            let spinner = Output::spinner("Fetching transcript...");
            let detail = state.pipeline.import_video(url, title.as_deref()).await;
            spinner.finish_and_clear();

            match detail {
                Ok(detail) => print_detail(&detail),
                Err(e) => {
                    Output::error(&format!("Import failed: {}", e));
                    return Err(e.into());
                }
            }
        }
        ImportTarget::Channel { handle, mode } => {
            let mode = mode.parse().map_err(|e: String| anyhow::anyhow!(e))?;

            let spinner = Output::spinner("Importing channel videos...");
            let report = state.pipeline.import_channel(handle, mode).await;
            spinner.finish_and_clear();

            match report {
                Ok(report) => {
                    Output::header("Channel Import");
                    Output::kv("Imported", &report.imported.to_string());
                    Output::kv("Skipped", &report.skipped.to_string());
                    Output::kv("Failed", &report.failed.to_string());
                    println!();
                    for detail in &report.details {
                        print_detail(detail);
                    }
                }
                Err(e) => {
                    Output::error(&format!("Channel import failed: {}", e));
                    return Err(e.into());
                }
            }
        }
    }

    Ok(())
}

fn print_detail(detail: &ImportDetail) {
    let title = detail.title.as_deref().unwrap_or("(unknown title)");
    let reason = detail
        .reason
        .map(|r| format!(" [{:?}]", r))
        .unwrap_or_default();

    match detail.status {
        ImportStatus::Imported => Output::success(&format!("{} ({}){}", title, detail.video_id, reason)),
        ImportStatus::Skipped => Output::info(&format!("{} ({}){}", title, detail.video_id, reason)),
        ImportStatus::Failed => Output::warning(&format!("{} ({}){}", title, detail.video_id, reason)),
    }
}
