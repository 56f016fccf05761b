//! HTTP API Facade
//!
//! Exposes the orchestration engine through an OpenAI-compatible REST API:
//!
//! - `POST /v1/chat/completions` — run one task through the workflow
//! - `GET /v1/models` — list the backend catalog
//! - `POST /v1/feedback` — record a rating for a backend
//! - `GET /v1/feedback/summary` — per-backend feedback aggregates
//! - `GET /` — liveness probe
//!
//! Each chat completion maps 1:1 to one orchestrator run; the response
//! carries the intermediate stage outputs and routing decisions alongside
//! the final result.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::CorsLayer;
use tracing::info;

use crate::backend::router::{BackendRouter, SelectionDecision};
use crate::backend::BackendSet;
use crate::catalog::BackendCatalog;
use crate::config::Config;
use crate::db::Database;
use crate::error::EngineError;
use crate::feedback::FeedbackStore;
use crate::memory::MemoryPort;
use crate::workflow::types::{RunState, StageFailure, Task};
use crate::workflow::Orchestrator;

/// Pseudo-model id representing the full pipeline in the models list
const ORCHESTRATED_MODEL: &str = "orchestrated";

/// Shared state for all handlers
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<Orchestrator>,
    pub catalog: Arc<BackendCatalog>,
    pub feedback: Arc<FeedbackStore>,
}

/// Assemble the engine components from configuration.
///
/// The catalog is rebuilt from configuration on every start; the feedback
/// log and memory database are reopened from disk.
pub async fn build_state(config: &Config) -> anyhow::Result<AppState> {
    let catalog = Arc::new(BackendCatalog::from_config(&config.backends)?);
    let feedback = Arc::new(FeedbackStore::open(&config.feedback_log_path())?);

    let database = Database::new(&config.memory_db_path()).await?;
    let memory: Arc<dyn MemoryPort> = Arc::new(database.memory());

    let backends = Arc::new(BackendSet::from_catalog(&catalog, &config.backends));
    let router = Arc::new(BackendRouter::new(
        catalog.clone(),
        feedback.clone(),
        config.routing.clone(),
    ));

    let orchestrator = Arc::new(Orchestrator::new(
        router,
        backends,
        memory,
        Duration::from_secs(config.routing.stage_timeout_secs),
        config.memory.retrieve_k,
    ));

    Ok(AppState {
        orchestrator,
        catalog,
        feedback,
    })
}

/// Build the axum router over the given state
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/v1/models", get(list_models))
        .route("/v1/chat/completions", post(chat_completions))
        .route("/v1/feedback", post(submit_feedback))
        .route("/v1/feedback/summary", get(feedback_summary))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Run the HTTP server until ctrl-c
pub async fn serve(config: &Config) -> anyhow::Result<()> {
    let state = build_state(config).await?;
    let app = build_router(state);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    info!("API server listening on http://{}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c().await.ok();
    info!("API server shutting down gracefully");
}

/// Error envelope returned by every endpoint
struct ApiError {
    status: StatusCode,
    message: String,
    stage: Option<&'static str>,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
            stage: None,
        }
    }
}

impl From<EngineError> for ApiError {
    fn from(err: EngineError) -> Self {
        let status = match err {
            EngineError::Validation(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self {
            status,
            stage: err.stage().map(|s| s.as_str()),
            message: err.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = json!({
            "error": {
                "message": self.message,
                "stage": self.stage,
            }
        });
        (self.status, Json(body)).into_response()
    }
}

// ---- Request / response shapes ----

#[derive(Debug, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Deserialize)]
pub struct ChatCompletionRequest {
    #[serde(default = "default_model")]
    pub model: String,
    pub messages: Vec<ChatMessage>,
    #[serde(default)]
    pub temperature: Option<f32>,
    #[serde(default)]
    pub max_tokens: Option<u32>,
    #[serde(default)]
    pub stream: bool,
}

fn default_model() -> String {
    ORCHESTRATED_MODEL.to_string()
}

#[derive(Debug, Serialize)]
struct ResponseMessage {
    role: String,
    content: String,
}

#[derive(Debug, Serialize)]
struct Choice {
    index: u32,
    message: ResponseMessage,
    finish_reason: String,
}

#[derive(Debug, Serialize)]
struct Usage {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: u32,
}

/// Intermediate workflow fields exposed for observability
#[derive(Debug, Serialize)]
struct WorkflowDetail {
    status: String,
    plan: Option<String>,
    research: Option<String>,
    execution_result: Option<String>,
    review: Option<String>,
    decisions: Vec<SelectionDecision>,
    #[serde(skip_serializing_if = "Option::is_none")]
    failure: Option<StageFailure>,
}

#[derive(Debug, Serialize)]
struct ChatCompletionResponse {
    id: String,
    object: String,
    created: i64,
    model: String,
    choices: Vec<Choice>,
    usage: Usage,
    workflow: WorkflowDetail,
}

#[derive(Debug, Deserialize)]
pub struct FeedbackRequest {
    pub task: String,
    pub selected_model: String,
    pub rating: i64,
    #[serde(default)]
    pub comments: Option<String>,
}

// ---- Handlers ----

/// Liveness probe; touches no engine state
async fn root() -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "service": "maestro",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn list_models(State(state): State<AppState>) -> Json<serde_json::Value> {
    let created = chrono::Utc::now().timestamp();

    let mut data = vec![json!({
        "id": ORCHESTRATED_MODEL,
        "object": "model",
        "created": created,
        "owned_by": "maestro",
        "capabilities": [],
    })];

    for profile in state.catalog.profiles() {
        data.push(json!({
            "id": profile.name,
            "object": "model",
            "created": created,
            "owned_by": "maestro",
            "capabilities": profile
                .capability_tags
                .iter()
                .map(|c| c.as_str())
                .collect::<Vec<_>>(),
        }));
    }

    Json(json!({ "object": "list", "data": data }))
}

async fn chat_completions(
    State(state): State<AppState>,
    Json(request): Json<ChatCompletionRequest>,
) -> Result<Json<ChatCompletionResponse>, ApiError> {
    let task_text = latest_user_message(&request.messages)
        .ok_or_else(|| ApiError::bad_request("no user messages found"))?
        .to_string();

    if task_text.trim().is_empty() {
        return Err(ApiError::bad_request("task cannot be empty"));
    }

    let task = Task::new(task_text.clone());
    let run = state.orchestrator.run(task).await;

    if run.state == RunState::Error {
        let err = match &run.failure {
            Some(failure) => EngineError::AgentExecution {
                stage: failure.stage,
                cause: failure.message.clone(),
            },
            None => EngineError::Workflow("workflow aborted without a recorded cause".to_string()),
        };
        return Err(err.into());
    }

    let content = run
        .final_result()
        .unwrap_or("Task completed.")
        .to_string();

    let prompt_tokens = estimate_tokens(&task_text);
    let completion_tokens = estimate_tokens(&content);

    Ok(Json(ChatCompletionResponse {
        id: format!("chatcmpl-{}", uuid::Uuid::new_v4()),
        object: "chat.completion".to_string(),
        created: chrono::Utc::now().timestamp(),
        model: request.model,
        choices: vec![Choice {
            index: 0,
            message: ResponseMessage {
                role: "assistant".to_string(),
                content,
            },
            finish_reason: "stop".to_string(),
        }],
        usage: Usage {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens + completion_tokens,
        },
        workflow: WorkflowDetail {
            status: run.state.as_str().to_string(),
            plan: run.plan,
            research: run.research,
            execution_result: run.execution_result,
            review: run.review,
            decisions: run.decisions,
            failure: run.failure,
        },
    }))
}

async fn submit_feedback(
    State(state): State<AppState>,
    Json(request): Json<FeedbackRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    state.feedback.record(
        &request.task,
        &request.selected_model,
        request.rating,
        request.comments,
    )?;

    Ok(Json(json!({
        "status": "success",
        "message": "feedback recorded",
    })))
}

async fn feedback_summary(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({
        "total_feedback_entries": state.feedback.total_entries(),
        "backends": state.feedback.summary(),
    }))
}

/// The latest user message is the task
fn latest_user_message(messages: &[ChatMessage]) -> Option<&str> {
    messages
        .iter()
        .rev()
        .find(|m| m.role == "user")
        .map(|m| m.content.as_str())
}

/// Rough token estimate: word count scaled by 1.3
fn estimate_tokens(text: &str) -> u32 {
    (text.split_whitespace().count() as f64 * 1.3) as u32
}
