//! Register command implementation.

use crate::cli::Output;
use crate::config::Settings;
use crate::server::AppState;

/// Register a source from direct text, a file, or a web page.
pub async fn run_register(
    title: Option<String>,
    body: Option<String>,
    file: Option<String>,
    url: Option<String>,
    settings: Settings,
) -> anyhow::Result<()> {
    let state = AppState::from_settings(&settings)?;

    let spinner = Output::spinner("Registering source...");

    let result = if let Some(url) = url {
        state.pipeline.register_web(&url, title.as_deref()).await
    } else {
        let body = match (body, file) {
            (Some(body), _) => body,
            (None, Some(path)) => std::fs::read_to_string(&path)?,
            (None, None) => {
                spinner.finish_and_clear();
                anyhow::bail!("Provide --body, --file or --url");
            }
        };
        let title = title.unwrap_or_default();
        state.pipeline.register_text(&title, &body).await
    };

    match result {
        Ok(source) => {
            spinner.finish_and_clear();
            Output::success(&format!("Registered '{}'", source.title));
            Output::kv("ID", &source.id.to_string());
            if let Some(url) = &source.url {
                Output::kv("URL", url);
            }

            let chunks = state.store.chunks_for_source(source.id).await?;
            Output::kv("Chunks", &chunks.len().to_string());
        }
        Err(e) => {
            spinner.finish_and_clear();
            Output::error(&format!("Failed to register source: {}", e));
            return Err(e.into());
        }
    }

    Ok(())
}
