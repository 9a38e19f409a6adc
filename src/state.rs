//! Shared application state, built once at startup and handed to every
//! request handler behind an `Arc`.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::agent::SessionStore;
use crate::config::{AppConfig, AppPaths};
use crate::llm::{LlmProvider, OpenAiProvider};
use crate::rag::{ChromaStore, RagChain, Retriever, VectorStore};
use crate::tools::weather::WeatherClient;

pub struct AppState {
    pub config: AppConfig,
    pub paths: Arc<AppPaths>,
    pub weather: WeatherClient,
    pub llm: Arc<dyn LlmProvider>,
    pub store: Arc<dyn VectorStore>,
    pub retriever: Arc<dyn Retriever>,
    pub sessions: SessionStore,
    pub started_at: DateTime<Utc>,
}

impl AppState {
    /// Wires the provider, vector store and retrieval chain together.
    /// Nothing here touches the network; unreachable backends surface as
    /// errors on first use, not at startup.
    pub fn initialize(config: AppConfig, paths: Arc<AppPaths>) -> Arc<Self> {
        let llm: Arc<dyn LlmProvider> = Arc::new(OpenAiProvider::new(config.llm.clone()));
        let store: Arc<dyn VectorStore> = Arc::new(ChromaStore::new(&config.chroma));
        let retriever: Arc<dyn Retriever> = Arc::new(RagChain::new(
            store.clone(),
            llm.clone(),
            config.retrieval_k,
        ));
        let weather = WeatherClient::new(config.weather.clone());

        tracing::info!(
            "Application state initialized (provider={}, collection={})",
            llm.name(),
            config.chroma.collection
        );

        Arc::new(AppState {
            config,
            paths,
            weather,
            llm,
            store,
            retriever,
            sessions: SessionStore::new(),
            started_at: Utc::now(),
        })
    }
}
