use axum::{
    Router,
    extract::{DefaultBodyLimit, Multipart, Path, State},
    http::{HeaderValue, Request, StatusCode},
    middleware::{Next, from_fn},
    response::Json,
    routing::{get, post},
};
use serde_json::{Value, json};
use std::path::{Path as FsPath, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{Instrument, error, info, warn};
use uuid::Uuid;

use crate::{
    analyzer::ReportAnalyzer,
    cache::{CachedGenerator, ResponseCache},
    config::AssistantConfig,
    consultation::{Consultant, SessionSnapshot},
    error::{AnalysisError, UploadError},
    extract::{DocumentExtractor, PdfTextExtractor},
    journal::{AnalysisLog, ConsultationLog, LogSink},
    llm::{GuardedGenerator, OpenRouterGenerator, TextGenerator},
    models::{AnalysisResponse, ChatRequest, ChatResponse},
    sessions::{InMemorySessionStorage, SessionStorage, spawn_session_sweeper},
    terms::TermValidator,
};

const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

type ApiResult<T> = Result<Json<T>, (StatusCode, Json<Value>)>;
type ApiError = (StatusCode, Json<Value>);

fn bad_request_error(message: &str) -> ApiError {
    (StatusCode::BAD_REQUEST, Json(json!({ "error": message })))
}

fn not_found_error(message: &str, id: &str) -> ApiError {
    (
        StatusCode::NOT_FOUND,
        Json(json!({
            "error": message,
            "session_id": id
        })),
    )
}

fn upload_error(e: UploadError) -> ApiError {
    let status = match &e {
        UploadError::NoFilePart | UploadError::NoSelectedFile | UploadError::Multipart(_) => {
            StatusCode::BAD_REQUEST
        }
        UploadError::TooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
        UploadError::Staging(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, Json(json!({ "error": e.to_string() })))
}

fn analysis_error(e: AnalysisError) -> ApiError {
    let status = match &e {
        AnalysisError::Extraction(_) | AnalysisError::NoReadableText => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
        AnalysisError::Generation(_) => StatusCode::BAD_GATEWAY,
        AnalysisError::Log(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, Json(json!({ "error": e.to_string() })))
}

#[derive(Clone)]
pub struct AppState {
    pub sessions: Arc<dyn SessionStorage>,
    pub extractor: Arc<dyn DocumentExtractor>,
    pub generator: Arc<dyn TextGenerator>,
    pub analysis_log: AnalysisLog,
    pub upload_dir: PathBuf,
    pub max_upload_bytes: usize,
}

impl AppState {
    /// Wire every component from configuration around the given generator.
    pub fn from_config(config: &AssistantConfig, generator: Arc<dyn TextGenerator>) -> Self {
        let cached = CachedGenerator::new(generator.clone(), ResponseCache::new(config.cache_capacity));
        let consultant = Consultant::new(
            TermValidator::new(&config.valid_terms),
            config.followup_questions.clone(),
            config.assistant_label.clone(),
            cached,
            ConsultationLog::new(LogSink::new(&config.consultation_log)),
        );

        Self {
            sessions: Arc::new(InMemorySessionStorage::new(
                Arc::new(consultant),
                Duration::from_secs(config.session_idle_secs),
                config.max_sessions,
            )),
            extractor: Arc::new(PdfTextExtractor),
            generator,
            analysis_log: AnalysisLog::new(LogSink::new(&config.analysis_log)),
            upload_dir: config.upload_dir.clone(),
            max_upload_bytes: config.max_upload_bytes,
        }
    }
}

/// Build the production app. Must be called inside a tokio runtime: it starts the idle-session sweeper.
pub fn create_app(config: &AssistantConfig) -> Router {
    let generator = Arc::new(GuardedGenerator::new(
        OpenRouterGenerator::from_env(config.model.clone()),
        Duration::from_secs(config.request_timeout_secs),
    ));
    let state = AppState::from_config(config, generator);

    let idle_ttl = Duration::from_secs(config.session_idle_secs);
    spawn_session_sweeper(state.sessions.clone(), idle_ttl.min(SWEEP_INTERVAL));

    build_router(state)
}

/// Add a correlation ID to every request and run it inside a tracing span
async fn correlation_id_middleware(
    mut request: Request<axum::body::Body>,
    next: Next,
) -> axum::response::Response {
    let correlation_id = Uuid::new_v4().to_string();
    if let Ok(value) = HeaderValue::from_str(&correlation_id) {
        request.headers_mut().insert("x-correlation-id", value);
    }

    let span = tracing::info_span!("http_request", correlation_id = %correlation_id);
    next.run(request).instrument(span).await
}

pub fn build_router(app_state: AppState) -> Router {
    // Leave room for multipart framing on top of the file itself.
    let body_limit = app_state.max_upload_bytes + 64 * 1024;

    Router::new()
        .route("/", get(root))
        .route("/health", get(health_check))
        .route("/chat", post(chat))
        .route("/chat/{session_id}", get(get_session).delete(reset_session))
        .route("/upload", post(upload))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(from_fn(correlation_id_middleware))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(app_state)
}

async fn root() -> Json<Value> {
    Json(json!({
        "service": "AI Medical Consultation Assistant",
        "version": "0.1.0",
        "description": "Symptom triage dialog and pathology report analysis",
        "endpoints": {
            "POST /chat": "Send a message to a consultation (optional session_id)",
            "GET /chat/{session_id}": "Get consultation stage",
            "DELETE /chat/{session_id}": "Forget a consultation",
            "POST /upload": "Upload a pathology report PDF (multipart field 'file')",
            "GET /health": "Health check"
        }
    }))
}

async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

fn resolve_session_id(session_id: Option<String>) -> Result<String, ApiError> {
    match session_id {
        Some(id) => {
            if Uuid::parse_str(&id).is_err() {
                warn!(session_id = %id, "Invalid session ID format");
                return Err(bad_request_error("Invalid session ID format"));
            }
            Ok(id)
        }
        None => Ok(Uuid::new_v4().to_string()),
    }
}

async fn chat(
    State(state): State<AppState>,
    Json(request): Json<ChatRequest>,
) -> ApiResult<ChatResponse> {
    let session_id = resolve_session_id(request.session_id)?;
    info!(
        session_id = %session_id,
        content_length = %request.message.len(),
        "Processing chat message"
    );

    let session = state.sessions.get_or_create(&session_id).await;
    let mut session = session.lock().await;
    let response = session.advance(&request.message).await;

    Ok(Json(ChatResponse {
        session_id,
        response,
        stage: session.stage(),
    }))
}

async fn get_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> ApiResult<SessionSnapshot> {
    match state.sessions.get(&session_id).await {
        Some(session) => Ok(Json(session.lock().await.snapshot())),
        None => Err(not_found_error("Session not found", &session_id)),
    }
}

async fn reset_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> ApiResult<Value> {
    if state.sessions.get(&session_id).await.is_none() {
        return Err(not_found_error("Session not found", &session_id));
    }
    state.sessions.delete(&session_id).await;
    info!(session_id = %session_id, "Session deleted");
    Ok(Json(json!({ "session_id": session_id, "status": "deleted" })))
}

async fn upload(State(state): State<AppState>, mut multipart: Multipart) -> ApiResult<AnalysisResponse> {
    let (filename, bytes) = read_upload(&mut multipart, state.max_upload_bytes)
        .await
        .map_err(upload_error)?;
    let path = stage_upload(&state.upload_dir, &filename, &bytes)
        .await
        .map_err(upload_error)?;
    info!(path = %path.display(), size = bytes.len(), "Staged uploaded report");

    let analyzer = ReportAnalyzer::new(
        path,
        state.extractor.clone(),
        state.generator.clone(),
        state.analysis_log.clone(),
    );

    match analyzer.run().await {
        Ok(response) => Ok(Json(AnalysisResponse { response })),
        Err(e) => {
            error!(error = %e, "Report analysis failed");
            Err(analysis_error(e))
        }
    }
}

/// Pull the `file` field out of the form. A missing field and an empty
/// filename are different errors.
async fn read_upload(
    multipart: &mut Multipart,
    max_bytes: usize,
) -> Result<(String, Vec<u8>), UploadError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| UploadError::Multipart(e.to_string()))?
    {
        if field.name() != Some("file") {
            continue;
        }

        let filename = field.file_name().unwrap_or_default().to_string();
        if filename.trim().is_empty() {
            return Err(UploadError::NoSelectedFile);
        }

        let bytes = field
            .bytes()
            .await
            .map_err(|e| UploadError::Multipart(e.to_string()))?;
        if bytes.len() > max_bytes {
            return Err(UploadError::TooLarge(max_bytes));
        }
        return Ok((filename, bytes.to_vec()));
    }

    Err(UploadError::NoFilePart)
}

async fn stage_upload(dir: &FsPath, filename: &str, bytes: &[u8]) -> Result<PathBuf, UploadError> {
    tokio::fs::create_dir_all(dir).await?;
    let path = dir.join(format!("{}_{}", Uuid::new_v4(), sanitize_filename(filename)));
    tokio::fs::write(&path, bytes).await?;
    Ok(path)
}

/// Keep only the final path component, with anything unusual replaced by `_`.
pub fn sanitize_filename(filename: &str) -> String {
    let name = filename
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default();
    let cleaned: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_start_matches('.');

    if cleaned.is_empty() {
        "document".to_string()
    } else {
        cleaned.to_string()
    }
}
