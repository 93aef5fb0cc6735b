//! Ask command implementation.

use crate::cli::{content_preview, Output};
use crate::config::Settings;
use crate::server::AppState;

/// Run the ask command.
pub async fn run_ask(question: &str, settings: Settings) -> anyhow::Result<()> {
    let state = AppState::from_settings(&settings)?;

    let spinner = Output::spinner("Searching the corpus...");

    match state.qa.ask(question, None).await {
        Ok((answer, sources)) => {
            spinner.finish_and_clear();

            println!("\n{}\n", answer);

            if !sources.is_empty() {
                Output::header("Sources");
                for source in &sources {
                    let label = match &source.url {
                        Some(url) => format!("{} ({})", source.title, url),
                        None => source.title.clone(),
                    };
                    Output::list_item(&content_preview(&label, 120));
                }
            }
        }
        Err(e) => {
            spinner.finish_and_clear();
            Output::error(&format!("Failed to generate answer: {}", e));
            return Err(e.into());
        }
    }

    Ok(())
}
