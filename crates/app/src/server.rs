//! HTTP surface over the shared answering pipeline.

use axum::extract::rejection::JsonRejection;
use axum::extract::{FromRequest, Request, State};
use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use second_brain_core::{
    AnsweringPipeline, Embedder, ErrorKind, Flashcard, Generator, RagError,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

pub type Pipeline = AnsweringPipeline<Arc<dyn Embedder>, Arc<dyn Generator>>;

const TIMEOUT_DETAIL: &str =
    "Request timed out. The AI model may be taking too long to respond.";

/// Outcome of the startup build. A failed build keeps the server up so
/// `/health` can report why.
#[derive(Clone)]
pub enum PipelineState {
    Ready(Arc<Pipeline>),
    Failed(Arc<str>),
}

#[derive(Clone)]
pub struct AppState {
    pub pipeline: PipelineState,
    pub timeout: Duration,
}

impl AppState {
    pub fn new(pipeline: Result<Pipeline, RagError>, timeout: Duration) -> Self {
        let pipeline = match pipeline {
            Ok(pipeline) => PipelineState::Ready(Arc::new(pipeline)),
            Err(error) => {
                warn!(%error, "pipeline failed to initialize; serving in unhealthy mode");
                PipelineState::Failed(error.to_string().into())
            }
        };
        Self { pipeline, timeout }
    }

    fn ready(&self) -> Result<&Pipeline, ApiError> {
        match &self.pipeline {
            PipelineState::Ready(pipeline) => Ok(pipeline),
            PipelineState::Failed(reason) => Err(ApiError::Unavailable(reason.to_string())),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct QuestionRequest {
    pub question: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AnswerResponse {
    pub answer: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct FlashcardsResponse {
    pub cards: Vec<Flashcard>,
}

#[derive(Debug)]
pub enum ApiError {
    Pipeline(RagError),
    Unavailable(String),
    Rejected { status: StatusCode, detail: String },
}

impl From<RagError> for ApiError {
    fn from(error: RagError) -> Self {
        Self::Pipeline(error)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::Rejected {
            status: rejection.status(),
            detail: rejection.body_text(),
        }
    }
}

/// `Json` whose rejections use the same `{detail}` body as every other failure.
pub struct ApiJson<T>(pub T);

impl<S, T> FromRequest<S> for ApiJson<T>
where
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(request: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(request, state).await?;
        Ok(Self(value))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, detail) = match &self {
            Self::Rejected { status, detail } => {
                warn!(status = status.as_u16(), %detail, "request rejected");
                return (*status, Json(json!({ "detail": detail }))).into_response();
            }
            Self::Unavailable(reason) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("RAG engine is not available: {reason}"),
            ),
            Self::Pipeline(error) => match error.kind() {
                ErrorKind::Timeout => (StatusCode::GATEWAY_TIMEOUT, TIMEOUT_DETAIL.to_string()),
                ErrorKind::Parse | ErrorKind::Configuration | ErrorKind::Upstream => {
                    (StatusCode::INTERNAL_SERVER_ERROR, error.to_string())
                }
            },
        };

        if let Self::Pipeline(RagError::Parse { raw, .. }) = &self {
            error!(status = status.as_u16(), %detail, raw_output = %raw, "request failed");
        } else {
            error!(status = status.as_u16(), %detail, "request failed");
        }

        (status, Json(json!({ "detail": detail }))).into_response()
    }
}

async fn root() -> Json<Value> {
    Json(json!({ "message": "Second Brain API is running" }))
}

async fn ask(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<QuestionRequest>,
) -> Result<Json<AnswerResponse>, ApiError> {
    let pipeline = state.ready()?;
    let answer = pipeline.ask_within(&request.question, state.timeout).await?;
    Ok(Json(AnswerResponse { answer }))
}

async fn flashcards(State(state): State<AppState>) -> Result<Json<FlashcardsResponse>, ApiError> {
    let pipeline = state.ready()?;
    let extraction = pipeline.flashcards_within(state.timeout).await?;
    Ok(Json(FlashcardsResponse {
        cards: extraction.into_cards(),
    }))
}

async fn health(State(state): State<AppState>) -> Json<Value> {
    match &state.pipeline {
        PipelineState::Ready(pipeline) => Json(json!({
            "status": "healthy",
            "rag_engine": "loaded",
            "chunks": pipeline.index().len(),
        })),
        PipelineState::Failed(reason) => Json(json!({
            "status": "unhealthy",
            "error": reason.as_ref(),
            "message": "RAG engine failed to load. Check that the embedding service is running and the configuration is set.",
        })),
    }
}

pub fn build_router(state: AppState, allowed_origins: Vec<HeaderValue>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed_origins))
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(root))
        .route("/ask", post(ask))
        .route("/flashcards", post(flashcards))
        .route("/health", get(health))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn serve(
    state: AppState,
    bind: SocketAddr,
    allowed_origins: Vec<HeaderValue>,
) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(bind).await?;
    info!(%bind, "second-brain api listening");

    axum::serve(listener, build_router(state, allowed_origins))
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        warn!(%error, "failed to listen for shutdown signal");
    }
    info!("shutting down");
}
