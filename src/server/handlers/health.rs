use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use chrono::Utc;
use serde::Serialize;

use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub environment: String,
    pub active_sessions: usize,
    pub uptime_seconds: i64,
}

pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        environment: state.config.environment.clone(),
        active_sessions: state.sessions.active_count().await,
        uptime_seconds: (Utc::now() - state.started_at).num_seconds(),
    })
}
