//! HTTP API server for integration with other systems.
//!
//! Exposes the agent over REST with per-session conversation history.

use super::load_app;
use crate::agent::{Agent, ChatSession};
use crate::app::App;
use crate::cli::Output;
use crate::config::Settings;
use crate::error::{Result, SpendscopeError};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tower_http::cors::{Any, CorsLayer};
use tracing::{debug, info};
use uuid::Uuid;

struct SessionEntry {
    session: Arc<Mutex<ChatSession>>,
    last_used: Instant,
}

/// Conversations keyed by session id.
///
/// Idle sessions are dropped on access, and the least recently used one is
/// dropped when the store is full.
pub(crate) struct SessionStore {
    agent: Arc<Agent>,
    idle_timeout: Duration,
    max_sessions: usize,
    sessions: Mutex<HashMap<Uuid, SessionEntry>>,
}

impl SessionStore {
    pub(crate) fn new(agent: Arc<Agent>, idle_timeout: Duration, max_sessions: usize) -> Self {
        Self {
            agent,
            idle_timeout,
            max_sessions: max_sessions.max(1),
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// Look up a session, or start one when no id is given.
    pub(crate) async fn get_or_create(&self, id: Option<Uuid>) -> Result<(Uuid, Arc<Mutex<ChatSession>>)> {
        let now = Instant::now();
        let mut sessions = self.sessions.lock().await;

        let before = sessions.len();
        sessions.retain(|_, entry| now.duration_since(entry.last_used) < self.idle_timeout);
        if sessions.len() < before {
            debug!("Evicted {} idle sessions", before - sessions.len());
        }

        match id {
            Some(id) => {
                let entry = sessions
                    .get_mut(&id)
                    .ok_or_else(|| SpendscopeError::InvalidInput(format!("Unknown session: {}", id)))?;
                entry.last_used = now;
                Ok((id, Arc::clone(&entry.session)))
            }
            None => {
                while sessions.len() >= self.max_sessions {
                    let Some(oldest) = sessions
                        .iter()
                        .min_by_key(|(_, entry)| entry.last_used)
                        .map(|(id, _)| *id)
                    else {
                        break;
                    };
                    sessions.remove(&oldest);
                    debug!("Evicted session {} to stay within {} sessions", oldest, self.max_sessions);
                }

                let id = Uuid::new_v4();
                let session = Arc::new(Mutex::new(ChatSession::new(Arc::clone(&self.agent))?));
                sessions.insert(
                    id,
                    SessionEntry {
                        session: Arc::clone(&session),
                        last_used: now,
                    },
                );
                info!("Started session {} ({} live)", id, sessions.len());
                Ok((id, session))
            }
        }
    }

    pub(crate) async fn remove(&self, id: &Uuid) -> bool {
        self.sessions.lock().await.remove(id).is_some()
    }
}

/// Shared application state.
struct AppState {
    app: App,
    sessions: SessionStore,
}

/// Run the HTTP API server.
pub async fn run_serve(host: &str, port: u16, settings: Settings) -> anyhow::Result<()> {
    let app = load_app(&settings).await?;
    let sessions = SessionStore::new(
        app.agent.clone(),
        Duration::from_secs(settings.server.session_idle_secs),
        settings.server.max_sessions,
    );
    let state = Arc::new(AppState { app, sessions });

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let router = Router::new()
        .route("/health", get(health))
        .route("/agent", get(agent_info))
        .route("/ask", post(ask))
        .route("/sessions/{session_id}", delete(end_session))
        .layer(cors)
        .with_state(state);

    let addr = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    Output::header("Spendscope API Server");
    println!();
    Output::success(&format!("Listening on http://{}", addr));
    println!();
    println!("Endpoints:");
    Output::kv("Health", "GET    /health");
    Output::kv("Agent", "GET    /agent");
    Output::kv("Ask", "POST   /ask");
    Output::kv("End session", "DELETE /sessions/:session_id");
    println!();
    Output::info("Press Ctrl+C to stop the server.");

    axum::serve(listener, router).await?;

    Ok(())
}

// === Request/Response Types ===

#[derive(Deserialize)]
struct AskRequest {
    question: String,
    #[serde(default)]
    session_id: Option<Uuid>,
}

#[derive(Serialize)]
struct AskResponse {
    answer: String,
    session_id: Uuid,
    tool_calls: Vec<ToolCallInfo>,
    iterations: usize,
}

#[derive(Serialize)]
struct ToolCallInfo {
    name: String,
    arguments: String,
}

#[derive(Serialize)]
struct AgentInfo {
    name: String,
    model: String,
    project_id: String,
    dataset_id: Option<String>,
    table_id: Option<String>,
    datastore: Option<String>,
    tools: Vec<String>,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

fn error_response(status: StatusCode, error: impl ToString) -> axum::response::Response {
    (
        status,
        Json(ErrorResponse {
            error: error.to_string(),
        }),
    )
        .into_response()
}

// === Handlers ===

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn agent_info(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let deployment = &state.app.deployment;
    Json(AgentInfo {
        name: state.app.name.clone(),
        model: state.app.agent.model_id().to_string(),
        project_id: deployment.project_id.clone(),
        dataset_id: deployment.dataset_id.clone(),
        table_id: deployment.table_id.clone(),
        datastore: deployment.datastore_path.clone(),
        tools: crate::agent::tool_definitions()
            .into_iter()
            .map(|t| t.function.name)
            .collect(),
    })
}

async fn ask(State(state): State<Arc<AppState>>, Json(req): Json<AskRequest>) -> impl IntoResponse {
    if req.question.trim().is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "question must not be empty");
    }

    let (session_id, session) = match state.sessions.get_or_create(req.session_id).await {
        Ok(found) => found,
        Err(e @ SpendscopeError::InvalidInput(_)) => return error_response(StatusCode::NOT_FOUND, e),
        Err(e) => return error_response(StatusCode::INTERNAL_SERVER_ERROR, e),
    };

    // One turn at a time per session.
    let mut session = session.lock().await;
    match session.send(&req.question).await {
        Ok(response) => Json(AskResponse {
            answer: response.content,
            session_id,
            tool_calls: response
                .tool_calls
                .into_iter()
                .map(|r| ToolCallInfo {
                    name: r.name,
                    arguments: r.arguments,
                })
                .collect(),
            iterations: response.iterations,
        })
        .into_response(),
        Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, e),
    }
}

async fn end_session(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<Uuid>,
) -> impl IntoResponse {
    if state.sessions.remove(&session_id).await {
        StatusCode::NO_CONTENT.into_response()
    } else {
        error_response(StatusCode::NOT_FOUND, format!("Unknown session: {}", session_id))
    }
}
