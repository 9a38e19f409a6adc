use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::errors::ApiError;

/// Filesystem locations used by the backend (log directory, config file).
#[derive(Debug, Clone)]
pub struct AppPaths {
    pub project_root: PathBuf,
    pub data_dir: PathBuf,
    pub log_dir: PathBuf,
}

impl AppPaths {
    pub fn new() -> Self {
        let project_root = discover_project_root();
        let data_dir = discover_data_dir(&project_root);
        let log_dir = data_dir.join("logs");

        let _ = fs::create_dir_all(&log_dir);

        AppPaths {
            project_root,
            data_dir,
            log_dir,
        }
    }

    pub fn config_path(&self) -> PathBuf {
        if let Ok(path) = env::var("WIKICHAT_CONFIG_PATH") {
            return PathBuf::from(path);
        }

        let user_config = self.data_dir.join("config.yml");
        if user_config.exists() {
            return user_config;
        }

        self.project_root.join("config.yml")
    }
}

impl Default for AppPaths {
    fn default() -> Self {
        Self::new()
    }
}

fn discover_project_root() -> PathBuf {
    if let Ok(root) = env::var("WIKICHAT_ROOT") {
        return PathBuf::from(root);
    }

    let manifest_dir = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    if manifest_dir.join("config.yml").exists() {
        return manifest_dir;
    }

    env::current_dir().unwrap_or(manifest_dir)
}

fn discover_data_dir(project_root: &Path) -> PathBuf {
    if let Ok(dir) = env::var("WIKICHAT_DATA_DIR") {
        return PathBuf::from(dir);
    }

    if cfg!(debug_assertions) {
        return project_root.to_path_buf();
    }

    let xdg = env::var("XDG_DATA_HOME").unwrap_or_else(|_| {
        home_dir()
            .join(".local/share")
            .to_string_lossy()
            .to_string()
    });
    PathBuf::from(xdg).join("wikichat")
}

fn home_dir() -> PathBuf {
    env::var("HOME")
        .or_else(|_| env::var("USERPROFILE"))
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("."))
}

/// Application configuration.
///
/// Loaded from an optional `config.yml`, then overridden by the environment
/// variables the deployment already uses (AZURE_OPENAI_*, CHROMA_*,
/// OPENWEATHER_API_KEY, ...). Every field has a default so a bare process
/// still starts.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub llm: LlmConfig,
    pub chroma: ChromaConfig,
    pub indexing: IndexingConfig,
    pub retrieval_k: usize,
    pub weather: WeatherConfig,
    pub agent: AgentConfig,
    pub environment: String,
    pub debug: bool,
    pub log_level: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub port: u16,
    pub cors_origins: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub api_base: String,
    pub api_key: String,
    /// Deployment name for Azure-style endpoints, model id otherwise.
    pub deployment: String,
    pub api_version: String,
    pub embedding_model: String,
    pub temperature: f64,
    pub max_tokens: u32,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ChromaConfig {
    pub host: String,
    pub port: u16,
    pub collection: String,
}

impl ChromaConfig {
    pub fn base_url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct IndexingConfig {
    pub corpus_dir: PathBuf,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub batch_size: usize,
    pub max_documents: usize,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WeatherConfig {
    pub api_key: String,
    pub base_url: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    pub max_iterations: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            server: ServerConfig::default(),
            llm: LlmConfig::default(),
            chroma: ChromaConfig::default(),
            indexing: IndexingConfig::default(),
            retrieval_k: 5,
            weather: WeatherConfig::default(),
            agent: AgentConfig::default(),
            environment: "development".to_string(),
            debug: false,
            log_level: "info".to_string(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            port: 8000,
            cors_origins: vec![
                "http://localhost:8501".to_string(),
                "http://frontend:8501".to_string(),
            ],
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        LlmConfig {
            api_base: String::new(),
            api_key: String::new(),
            deployment: "gpt-4o".to_string(),
            api_version: "2024-02-01".to_string(),
            embedding_model: "text-embedding-3-small".to_string(),
            temperature: 0.0,
            max_tokens: 1024,
        }
    }
}

impl Default for ChromaConfig {
    fn default() -> Self {
        ChromaConfig {
            host: "localhost".to_string(),
            port: 8001,
            collection: "wiki_collection".to_string(),
        }
    }
}

impl Default for IndexingConfig {
    fn default() -> Self {
        IndexingConfig {
            corpus_dir: PathBuf::from("corpus"),
            chunk_size: 1000,
            chunk_overlap: 200,
            batch_size: 5,
            max_documents: 5,
        }
    }
}

impl Default for WeatherConfig {
    fn default() -> Self {
        WeatherConfig {
            api_key: String::new(),
            base_url: "http://api.openweathermap.org/data/2.5".to_string(),
        }
    }
}

impl Default for AgentConfig {
    fn default() -> Self {
        AgentConfig { max_iterations: 3 }
    }
}

impl AppConfig {
    pub fn load(paths: &AppPaths) -> Result<Self, ApiError> {
        let mut config = load_yaml_file(&paths.config_path())?;
        config.apply_env_overrides();
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Some(port) = env_parse::<u16>("PORT") {
            self.server.port = port;
        }
        if let Ok(origins) = env::var("CORS_ORIGINS") {
            let parsed: Vec<String> = origins
                .split(',')
                .map(str::trim)
                .filter(|item| !item.is_empty())
                .map(|item| item.to_string())
                .collect();
            if !parsed.is_empty() {
                self.server.cors_origins = parsed;
            }
        }

        override_string(&mut self.environment, "ENVIRONMENT");
        override_string(&mut self.log_level, "LOG_LEVEL");
        if let Ok(debug) = env::var("DEBUG") {
            self.debug = debug.eq_ignore_ascii_case("true");
        }

        override_string(&mut self.llm.api_base, "AZURE_OPENAI_ENDPOINT");
        override_string(&mut self.llm.api_base, "OPENAI_API_BASE");
        override_string(&mut self.llm.api_key, "AZURE_OPENAI_API_KEY");
        override_string(&mut self.llm.api_key, "OPENAI_API_KEY");
        override_string(&mut self.llm.deployment, "AZURE_DEPLOYMENT");
        override_string(&mut self.llm.api_version, "OPENAI_API_VERSION");
        override_string(&mut self.llm.embedding_model, "EMBEDDING_MODEL");
        if let Some(temperature) = env_parse::<f64>("OPENAI_TEMPERATURE") {
            self.llm.temperature = temperature;
        }
        if let Some(max_tokens) = env_parse::<u32>("OPENAI_MAX_TOKENS") {
            self.llm.max_tokens = max_tokens;
        }

        override_string(&mut self.chroma.host, "CHROMA_HOST");
        if let Some(port) = env_parse::<u16>("CHROMA_PORT") {
            self.chroma.port = port;
        }
        override_string(&mut self.chroma.collection, "CHROMA_COLLECTION_NAME");

        if let Some(k) = env_parse::<usize>("RETRIEVAL_K") {
            self.retrieval_k = k;
        }
        if let Ok(dir) = env::var("CORPUS_DIR") {
            if !dir.trim().is_empty() {
                self.indexing.corpus_dir = PathBuf::from(dir);
            }
        }
        if let Some(size) = env_parse::<usize>("CHUNK_SIZE") {
            self.indexing.chunk_size = size;
        }
        if let Some(overlap) = env_parse::<usize>("CHUNK_OVERLAP") {
            self.indexing.chunk_overlap = overlap;
        }
        if let Some(batch) = env_parse::<usize>("BATCH_SIZE") {
            self.indexing.batch_size = batch;
        }
        if let Some(max) = env_parse::<usize>("MAX_DOCUMENTS") {
            self.indexing.max_documents = max;
        }

        override_string(&mut self.weather.api_key, "OPENWEATHER_API_KEY");
        override_string(&mut self.weather.base_url, "OPENWEATHER_BASE_URL");

        if let Some(iterations) = env_parse::<usize>("AGENT_MAX_ITERATIONS") {
            self.agent.max_iterations = iterations;
        }
    }
}

fn load_yaml_file(path: &Path) -> Result<AppConfig, ApiError> {
    if !path.exists() {
        return Ok(AppConfig::default());
    }

    let raw = fs::read_to_string(path).map_err(ApiError::internal)?;
    serde_yaml::from_str(&raw)
        .map_err(|err| ApiError::Internal(format!("invalid config {}: {}", path.display(), err)))
}

fn override_string(target: &mut String, key: &str) {
    if let Ok(value) = env::var(key) {
        if !value.trim().is_empty() {
            *target = value;
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|value| value.parse::<T>().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_configuration_values() {
        let config = AppConfig::default();
        assert_eq!(config.server.port, 8000);
        assert_eq!(config.chroma.collection, "wiki_collection");
        assert_eq!(config.retrieval_k, 5);
        assert_eq!(config.indexing.chunk_size, 1000);
        assert_eq!(config.indexing.chunk_overlap, 200);
        assert_eq!(config.agent.max_iterations, 3);
    }

    #[test]
    fn yaml_overrides_defaults() {
        let raw = "server:\n  port: 9001\nchroma:\n  collection: test_collection\n";
        let config: AppConfig = serde_yaml::from_str(raw).expect("valid yaml");
        assert_eq!(config.server.port, 9001);
        assert_eq!(config.chroma.collection, "test_collection");
        // untouched sections keep their defaults
        assert_eq!(config.chroma.host, "localhost");
        assert_eq!(config.retrieval_k, 5);
    }
}
