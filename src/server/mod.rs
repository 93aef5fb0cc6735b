//! HTTP API server.
//!
//! Public surface: question answering over SSE, popular questions, and the
//! weather digest. Administrative surface (behind the credential gate):
//! source CRUD, video/channel import, and the question log.

mod auth;
mod sse;

pub use auth::{session_token, SessionStore, ADMIN_COOKIE};
pub use sse::AnswerEventStream;

use crate::chat::OpenAIChat;
use crate::config::{Prompts, Settings};
use crate::embedding::{Embedder, OpenAIEmbedder};
use crate::error::{Result, SvarError};
use crate::fetch::{TranscriptClient, TranscriptFetcher, WebFetcher};
use crate::ingest::{ChannelMode, IngestionPipeline};
use crate::rag::{AnswerEngine, QaService, SuggestionGenerator};
use crate::store::{CorpusStore, MemoryStore, SqliteStore, Source};
use crate::weather::WeatherClient;
use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{sse::Sse, IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};
use uuid::Uuid;

/// Questions offered to users before they type their own.
const POPULAR_QUESTIONS: [&str; 10] = [
    "ミドストの基本は？",
    "ベイトフィネスを始めたい",
    "霞ヶ浦の攻め方は？",
    "冬のバス釣りで釣るには？",
    "ネコリグのセッティング方法",
    "ワカサギパターンとは？",
    "春のプリスポーン攻略",
    "ジグヘッドリグの使い方",
    "スピナーベイトの使いどころ",
    "フィネスワッキーの釣り方",
];

/// Shared application state.
pub struct AppState {
    pub qa: Arc<QaService>,
    pub pipeline: IngestionPipeline,
    pub store: Arc<dyn CorpusStore>,
    pub weather: Option<WeatherClient>,
    pub sessions: SessionStore,
    pub admin_password: Option<String>,
}

impl AppState {
    /// Wire every component from settings. Clients are constructed once
    /// here and injected; nothing holds ambient globals.
    pub fn from_settings(settings: &Settings) -> Result<Arc<Self>> {
        let prompts = Prompts::load(
            settings.prompts.custom_dir.as_deref(),
            Some(&settings.prompts.variables),
        )?;

        let store: Arc<dyn CorpusStore> = match settings.store.provider.as_str() {
            "memory" => Arc::new(MemoryStore::new()),
            _ => Arc::new(SqliteStore::new(&settings.sqlite_path())?),
        };

        let embedder: Arc<dyn Embedder> = Arc::new(OpenAIEmbedder::with_config(
            &settings.embedding.model,
            settings.embedding.dimensions as usize,
        ));

        let answer_model = Arc::new(OpenAIChat::with_config(
            &settings.answer.model,
            settings.answer.max_tokens,
        ));
        let suggest_model = Arc::new(OpenAIChat::with_config(&settings.suggest.model, 256));

        let engine = AnswerEngine::new(answer_model, prompts.clone());
        let suggester = SuggestionGenerator::new(suggest_model, prompts);
        let qa = Arc::new(QaService::new(
            embedder.clone(),
            store.clone(),
            engine,
            suggester,
            settings.retrieval.top_k,
            settings.suggest.enabled,
        ));

        let transcripts: Option<Arc<dyn TranscriptFetcher>> = settings
            .transcript_api_key()
            .map(|key| {
                Arc::new(TranscriptClient::new(&settings.fetch.transcript_base_url, &key))
                    as Arc<dyn TranscriptFetcher>
            });

        let pipeline = IngestionPipeline::new(
            store.clone(),
            embedder,
            Arc::new(WebFetcher::new(&settings.fetch.reader_base_url)),
            transcripts,
            settings.chunking.clone(),
        );

        let weather = settings
            .weather
            .enabled
            .then(|| WeatherClient::new(&settings.weather.base_url));

        Ok(Arc::new(Self {
            qa,
            pipeline,
            store,
            weather,
            sessions: SessionStore::new(settings.auth.session_ttl_hours),
            admin_password: settings.admin_password(),
        }))
    }
}

/// Build the API router.
pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        .route("/ask", post(ask))
        .route("/popular-questions", get(popular_questions))
        .route("/weather", get(weather))
        .route("/admin/login", post(admin_login))
        .route("/admin/logout", post(admin_logout))
        .route("/admin/session", get(admin_session))
        .route("/admin/sources", get(list_sources).post(create_source))
        .route("/admin/sources/{id}", put(update_source).delete(delete_source))
        .route("/admin/import/video", post(import_video))
        .route("/admin/import/channel", post(import_channel))
        .route("/admin/questions", get(list_questions))
        .layer(cors)
        .with_state(state)
}

/// Run the HTTP server until shutdown.
pub async fn run(state: Arc<AppState>, host: &str, port: u16) -> Result<()> {
    let addr = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    info!("Listening on http://{}", addr);
    axum::serve(listener, router(state)).await?;

    Ok(())
}

// === Request/Response Types ===

#[derive(Deserialize)]
struct AskRequest {
    question: Option<String>,
    lat: Option<f64>,
    lon: Option<f64>,
}

#[derive(Deserialize)]
struct WeatherQuery {
    lat: Option<f64>,
    lon: Option<f64>,
}

#[derive(Serialize)]
struct WeatherResponse {
    markdown: String,
}

#[derive(Deserialize)]
struct LoginRequest {
    password: Option<String>,
}

#[derive(Deserialize)]
struct CreateSourceRequest {
    title: Option<String>,
    body: Option<String>,
    url: Option<String>,
}

#[derive(Deserialize)]
struct UpdateSourceRequest {
    title: Option<String>,
    body: Option<String>,
}

#[derive(Deserialize)]
struct ImportVideoRequest {
    video_url: Option<String>,
    title: Option<String>,
}

#[derive(Deserialize)]
struct ImportChannelRequest {
    channel_handle: Option<String>,
    #[serde(default)]
    mode: Option<String>,
}

/// Source row without the (potentially large) body.
#[derive(Serialize)]
struct SourceResponse {
    id: Uuid,
    title: String,
    url: Option<String>,
    created_at: DateTime<Utc>,
}

impl From<Source> for SourceResponse {
    fn from(source: Source) -> Self {
        Self {
            id: source.id,
            title: source.title,
            url: source.url,
            created_at: source.created_at,
        }
    }
}

#[derive(Serialize)]
struct OkResponse {
    ok: bool,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

fn error_response(status: StatusCode, message: &str) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: message.to_string(),
        }),
    )
        .into_response()
}

/// Map pipeline errors onto admin-facing responses. Validation and
/// not-found keep their message; provider faults stay generic.
fn admin_error(e: SvarError) -> Response {
    match e {
        SvarError::InvalidInput(msg) => error_response(StatusCode::BAD_REQUEST, &msg),
        SvarError::NotFound(msg) => error_response(StatusCode::NOT_FOUND, &msg),
        SvarError::QuotaExhausted => {
            error_response(StatusCode::PAYMENT_REQUIRED, "クレジットが不足しています")
        }
        SvarError::Config(msg) => error_response(StatusCode::SERVICE_UNAVAILABLE, &msg),
        other => {
            warn!("Admin operation failed: {}", other);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "操作に失敗しました")
        }
    }
}

fn require_admin(state: &AppState, headers: &HeaderMap) -> std::result::Result<(), Response> {
    let authorized = session_token(headers)
        .map(|token| state.sessions.verify(&token))
        .unwrap_or(false);

    if authorized {
        Ok(())
    } else {
        Err(error_response(StatusCode::UNAUTHORIZED, "Unauthorized"))
    }
}

// === Public Handlers ===

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn popular_questions() -> impl IntoResponse {
    Json(POPULAR_QUESTIONS)
}

async fn ask(State(state): State<Arc<AppState>>, Json(req): Json<AskRequest>) -> Response {
    let question = req.question.as_deref().unwrap_or_default().trim().to_string();
    if question.is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "question is required");
    }

    // Weather is auxiliary: unavailability means answering without it.
    let aux = match (&state.weather, req.lat, req.lon) {
        (Some(weather), Some(lat), Some(lon)) => match weather.forecast_digest(lat, lon).await {
            Ok(digest) => Some(digest),
            Err(e) => {
                warn!("Weather digest unavailable: {}", e);
                None
            }
        },
        _ => None,
    };

    let rx = state.qa.clone().ask_stream(question, aux);
    Sse::new(AnswerEventStream::new(rx)).into_response()
}

async fn weather(
    State(state): State<Arc<AppState>>,
    Query(query): Query<WeatherQuery>,
) -> Response {
    let (Some(lat), Some(lon)) = (query.lat, query.lon) else {
        return error_response(StatusCode::BAD_REQUEST, "lat/lon required");
    };

    let Some(weather) = &state.weather else {
        return error_response(StatusCode::SERVICE_UNAVAILABLE, "weather is disabled");
    };

    match weather.forecast_digest(lat, lon).await {
        Ok(markdown) => Json(WeatherResponse { markdown }).into_response(),
        Err(e) => {
            warn!("Weather lookup failed: {}", e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "failed to fetch weather")
        }
    }
}

// === Admin Handlers ===

async fn admin_login(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoginRequest>,
) -> Response {
    let Some(expected) = &state.admin_password else {
        return error_response(StatusCode::SERVICE_UNAVAILABLE, "admin password is not configured");
    };

    if req.password.as_deref() != Some(expected.as_str()) {
        return error_response(StatusCode::UNAUTHORIZED, "Invalid password");
    }

    let token = state.sessions.issue();
    let cookie = format!(
        "{}={}; HttpOnly; Path=/; Max-Age={}; SameSite=Lax",
        ADMIN_COOKIE,
        token,
        state.sessions.ttl_seconds()
    );

    (
        StatusCode::OK,
        [(header::SET_COOKIE, cookie)],
        Json(OkResponse { ok: true }),
    )
        .into_response()
}

async fn admin_logout(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Response {
    if let Some(token) = session_token(&headers) {
        state.sessions.revoke(&token);
    }

    let cookie = format!("{}=; HttpOnly; Path=/; Max-Age=0; SameSite=Lax", ADMIN_COOKIE);
    (
        StatusCode::OK,
        [(header::SET_COOKIE, cookie)],
        Json(OkResponse { ok: true }),
    )
        .into_response()
}

async fn admin_session(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Response {
    let authenticated = session_token(&headers)
        .map(|token| state.sessions.verify(&token))
        .unwrap_or(false);
    Json(serde_json::json!({ "authenticated": authenticated })).into_response()
}

async fn list_sources(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Response {
    if let Err(denied) = require_admin(&state, &headers) {
        return denied;
    }

    match state.store.list_sources().await {
        Ok(sources) => Json(sources).into_response(),
        Err(e) => admin_error(e),
    }
}

async fn create_source(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<CreateSourceRequest>,
) -> Response {
    if let Err(denied) = require_admin(&state, &headers) {
        return denied;
    }

    let result = match req.url.as_deref().map(str::trim) {
        Some(url) if !url.is_empty() => {
            state.pipeline.register_web(url, req.title.as_deref()).await
        }
        _ => {
            let title = req.title.as_deref().unwrap_or_default();
            let body = req.body.as_deref().unwrap_or_default();
            state.pipeline.register_text(title, body).await
        }
    };

    match result {
        Ok(source) => (StatusCode::CREATED, Json(SourceResponse::from(source))).into_response(),
        Err(e) => admin_error(e),
    }
}

async fn update_source(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateSourceRequest>,
) -> Response {
    if let Err(denied) = require_admin(&state, &headers) {
        return denied;
    }

    let title = req.title.as_deref().unwrap_or_default();
    let body = req.body.as_deref().unwrap_or_default();

    match state.pipeline.update(id, title, body).await {
        Ok(source) => Json(SourceResponse::from(source)).into_response(),
        Err(e) => admin_error(e),
    }
}

async fn delete_source(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Response {
    if let Err(denied) = require_admin(&state, &headers) {
        return denied;
    }

    match state.pipeline.delete(id).await {
        Ok(()) => Json(OkResponse { ok: true }).into_response(),
        Err(e) => admin_error(e),
    }
}

async fn import_video(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<ImportVideoRequest>,
) -> Response {
    if let Err(denied) = require_admin(&state, &headers) {
        return denied;
    }

    let Some(video_url) = req.video_url.as_deref().map(str::trim).filter(|v| !v.is_empty())
    else {
        return error_response(StatusCode::BAD_REQUEST, "video_url is required");
    };

    match state.pipeline.import_video(video_url, req.title.as_deref()).await {
        Ok(detail) => Json(detail).into_response(),
        Err(e) => admin_error(e),
    }
}

async fn import_channel(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<ImportChannelRequest>,
) -> Response {
    if let Err(denied) = require_admin(&state, &headers) {
        return denied;
    }

    let Some(channel) = req
        .channel_handle
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty())
    else {
        return error_response(StatusCode::BAD_REQUEST, "channel_handle is required");
    };

    let mode = match req.mode.as_deref() {
        None | Some("") => ChannelMode::Latest,
        Some(raw) => match raw.parse::<ChannelMode>() {
            Ok(mode) => mode,
            Err(e) => return error_response(StatusCode::BAD_REQUEST, &e),
        },
    };

    match state.pipeline.import_channel(channel, mode).await {
        Ok(report) => Json(report).into_response(),
        Err(e) => admin_error(e),
    }
}

async fn list_questions(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Response {
    if let Err(denied) = require_admin(&state, &headers) {
        return denied;
    }

    match state.store.list_questions(200).await {
        Ok(questions) => Json(questions).into_response(),
        Err(e) => admin_error(e),
    }
}
