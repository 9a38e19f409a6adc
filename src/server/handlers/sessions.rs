use std::sync::Arc;

use axum::extract::{Path, State};
use axum::Json;
use serde::Serialize;

use crate::errors::ApiError;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct ClearResponse {
    pub message: &'static str,
}

pub async fn clear_session(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Result<Json<ClearResponse>, ApiError> {
    if !state.sessions.clear(&session_id).await {
        return Err(ApiError::NotFound("Session not found".to_string()));
    }
    tracing::info!("Cleared session: {}", session_id);
    Ok(Json(ClearResponse {
        message: "Session cleared successfully",
    }))
}
