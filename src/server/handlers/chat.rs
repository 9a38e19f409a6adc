use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::agent::{self, ToolUsage};
use crate::errors::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ChatBody {
    pub message: String,
    #[serde(default)]
    pub session_id: Option<String>,
}

/// Older clients post questions to `/ask`; the payload differs only in the
/// field name.
#[derive(Debug, Deserialize)]
pub struct AskBody {
    pub question: String,
    #[serde(default)]
    pub session_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub response: String,
    pub session_id: String,
    pub tools_used: Vec<ToolUsage>,
}

pub async fn chat(
    State(state): State<Arc<AppState>>,
    Json(body): Json<ChatBody>,
) -> Result<Json<ChatResponse>, ApiError> {
    run(state, body.session_id, body.message).await
}

pub async fn ask(
    State(state): State<Arc<AppState>>,
    Json(body): Json<AskBody>,
) -> Result<Json<ChatResponse>, ApiError> {
    run(state, body.session_id, body.question).await
}

async fn run(
    state: Arc<AppState>,
    session_id: Option<String>,
    message: String,
) -> Result<Json<ChatResponse>, ApiError> {
    let message = message.trim().to_string();
    if message.is_empty() {
        return Err(ApiError::BadRequest("Message cannot be empty".to_string()));
    }

    let session_id = session_id
        .filter(|id| !id.trim().is_empty())
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    let outcome = agent::run_turn(&state, &session_id, &message).await;
    Ok(Json(ChatResponse {
        response: outcome.response,
        session_id,
        tools_used: outcome.tools_used,
    }))
}
