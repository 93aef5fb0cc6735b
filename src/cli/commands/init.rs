//! Init command implementation.

use crate::cli::Output;
use crate::config::Settings;

/// Initialize configuration and data directory.
pub fn run_init(settings: &Settings) -> anyhow::Result<()> {
    Output::header("Svar Setup");
    println!();

    let config_path = Settings::default_config_path();
    if config_path.exists() {
        Output::info(&format!("Configuration exists at {}", config_path.display()));
    } else {
        settings.save_to(&config_path)?;
        Output::success(&format!("Wrote default configuration to {}", config_path.display()));
    }

    let data_dir = settings.data_dir();
    std::fs::create_dir_all(&data_dir)?;
    Output::success(&format!("Data directory ready at {}", data_dir.display()));

    println!();
    Output::header("Environment");
    if std::env::var("OPENAI_API_KEY").is_ok() {
        Output::success("OPENAI_API_KEY is set");
    } else {
        Output::warning("OPENAI_API_KEY is not set (required for embeddings and answers)");
    }
    if settings.transcript_api_key().is_some() {
        Output::success("Transcript API key is configured");
    } else {
        Output::info("TRANSCRIPT_API_KEY not set (video import disabled)");
    }
    if settings.admin_password().is_some() {
        Output::success("Admin password is configured");
    } else {
        Output::info("SVAR_ADMIN_PASSWORD not set (admin API disabled)");
    }

    Ok(())
}
