//! Command and status HTTP API.
//!
//! Exposes three routes:
//! - `POST /api/commands`: run a chat command such as `track <id>...`
//! - `GET /api/tracked`: list tracked players and their dedup state
//! - `GET /api/status`: poll loop status

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

use crate::commands::{CommandError, CommandHandler};
use crate::poller::PollerStatus;
use crate::tracker::{EntityTracker, TrackedSummary};


/// Shared state for the API handlers.
#[derive(Clone)]
pub struct ApiState {
    pub handler: Arc<CommandHandler>,
    pub tracker: Arc<EntityTracker>,
    pub poller_status: Arc<tokio::sync::Mutex<PollerStatus>>,
    /// Reply channel used when a request names none
    pub default_channel: String,
}

/// Request body for `POST /api/commands`.
#[derive(Deserialize)]
pub struct CommandRequest {
    pub command: String,
    /// Channel that receives the reply and any baseline images
    pub channel_id: Option<String>,
}

/// Response for `POST /api/commands`.
#[derive(Serialize)]
pub struct CommandResponse {
    pub reply: String,
    pub newly_tracked: Vec<String>,
}

/// Response for `GET /api/tracked`.
#[derive(Serialize)]
pub struct TrackedResponse {
    pub players: Vec<TrackedSummary>,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

/// Create the command API router
pub fn create_router(state: ApiState) -> Router {
    Router::new()
        .route("/api/commands", post(run_command))
        .route("/api/tracked", get(list_tracked))
        .route("/api/status", get(poller_status))
        .with_state(Arc::new(state))
}

/// POST /api/commands - Execute a chat command
async fn run_command(
    State(state): State<Arc<ApiState>>,
    Json(req): Json<CommandRequest>,
) -> Result<Json<CommandResponse>, AppError> {
    let channel = req
        .channel_id
        .filter(|c| !c.trim().is_empty())
        .unwrap_or_else(|| state.default_channel.clone());

    info!(command = %req.command, channel_id = %channel, "Command received");

    let reply = state.handler.handle(&req.command, &channel).await?;

    Ok(Json(CommandResponse {
        reply: reply.message,
        newly_tracked: reply.newly_tracked,
    }))
}

/// GET /api/tracked - List tracked players
async fn list_tracked(State(state): State<Arc<ApiState>>) -> Json<TrackedResponse> {
    let players = state.tracker.summaries();
    debug!(count = players.len(), "Listing tracked players");
    Json(TrackedResponse { players })
}

/// GET /api/status - Poll loop status
async fn poller_status(State(state): State<Arc<ApiState>>) -> Json<PollerStatus> {
    let status = state.poller_status.lock().await.clone();
    Json(status)
}

/// Application error type
#[derive(Debug)]
enum AppError {
    BadRequest(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
        };

        let body = Json(ErrorResponse {
            error: error_message,
        });

        (status, body).into_response()
    }
}

impl From<CommandError> for AppError {
    fn from(e: CommandError) -> Self {
        AppError::BadRequest(e.to_string())
    }
}
