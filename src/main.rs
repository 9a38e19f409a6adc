use std::sync::Arc;

use anyhow::Context;
use tokio::net::TcpListener;

use wikichat_backend::config::{AppConfig, AppPaths};
use wikichat_backend::logging;
use wikichat_backend::rag::index::check_and_index;
use wikichat_backend::server::build_router;
use wikichat_backend::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let paths = Arc::new(AppPaths::new());
    let config = AppConfig::load(&paths).context("loading configuration")?;
    logging::init(&paths, &config);

    let state = AppState::initialize(config, paths);

    // An unreachable vector store or missing corpus should not keep the
    // server from answering; the search tool degrades instead.
    match check_and_index(&state.config, state.store.clone(), state.llm.clone()).await {
        Ok(indexed) if indexed > 0 => tracing::info!("Indexed {} chunks at startup", indexed),
        Ok(_) => {}
        Err(err) => tracing::warn!("Startup indexing failed, continuing without it: {}", err),
    }

    let addr = format!("0.0.0.0:{}", state.config.server.port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {}", addr))?;
    tracing::info!("Listening on {}", addr);

    axum::serve(listener, build_router(state))
        .await
        .context("server error")?;
    Ok(())
}
