use std::sync::Arc;

use axum::http::HeaderValue;
use axum::routing::{delete, get, post};
use axum::Router;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

use super::handlers;

pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = cors_layer(&state.config.server.cors_origins);

    Router::new()
        .route("/chat", post(handlers::chat::chat))
        .route("/ask", post(handlers::chat::ask))
        .route("/health", get(handlers::health::health))
        .route(
            "/sessions/:session_id",
            delete(handlers::sessions::clear_session),
        )
        .route("/api/tools", get(handlers::tools::list_tools))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Origins that fail to parse are dropped with a warning; an empty list
/// falls back to allowing any origin so a misconfigured deployment stays
/// reachable.
fn cors_layer(origins: &[String]) -> CorsLayer {
    let mut parsed: Vec<HeaderValue> = Vec::new();
    for origin in origins {
        match origin.parse::<HeaderValue>() {
            Ok(value) => parsed.push(value),
            Err(_) => tracing::warn!("Ignoring invalid CORS origin: {}", origin),
        }
    }

    if parsed.is_empty() {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        CorsLayer::new()
            .allow_origin(AllowOrigin::list(parsed))
            .allow_methods(Any)
            .allow_headers(Any)
    }
}
