//! Serve command implementation.

use crate::cli::Output;
use crate::config::Settings;
use crate::server::AppState;

/// Run the HTTP API server.
pub async fn run_serve(
    host: Option<String>,
    port: Option<u16>,
    settings: Settings,
) -> anyhow::Result<()> {
    let host = host.unwrap_or_else(|| settings.server.host.clone());
    let port = port.unwrap_or(settings.server.port);

    let state = AppState::from_settings(&settings)?;

    Output::header("Svar API Server");
    println!();
    Output::success(&format!("Listening on http://{}:{}", host, port));
    println!();
    println!("Endpoints:");
    Output::kv("Health", "GET  /health");
    Output::kv("Ask (SSE)", "POST /ask");
    Output::kv("Popular Questions", "GET  /popular-questions");
    Output::kv("Weather", "GET  /weather?lat=..&lon=..");
    Output::kv("Admin Login", "POST /admin/login");
    Output::kv("Sources", "GET/POST /admin/sources");
    Output::kv("Source", "PUT/DELETE /admin/sources/:id");
    Output::kv("Import Video", "POST /admin/import/video");
    Output::kv("Import Channel", "POST /admin/import/channel");
    Output::kv("Questions", "GET  /admin/questions");
    println!();
    Output::info("Press Ctrl+C to stop the server.");

    crate::server::run(state, &host, port).await?;

    Ok(())
}
