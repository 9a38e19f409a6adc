//! OpenAI-compatible chat + embeddings client.
//!
//! Supports both Azure-style endpoints (`/openai/deployments/<name>/...`
//! with an `api-key` header and `api-version` query parameter) and the
//! plain `/v1/...` layout with bearer auth. Which one is used follows from
//! the configured endpoint.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::config::LlmConfig;
use crate::errors::ApiError;

use super::provider::LlmProvider;
use super::types::{ChatRequest, LlmReply, ToolCallPayload, ToolDefinition};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Clone)]
pub struct OpenAiProvider {
    client: reqwest::Client,
    config: LlmConfig,
}

#[derive(Debug, Deserialize)]
struct ChatCompletion {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: AssistantMessage,
}

#[derive(Debug, Deserialize)]
struct AssistantMessage {
    content: Option<String>,
    tool_calls: Option<Vec<ToolCallPayload>>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingItem>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingItem {
    embedding: Vec<f32>,
}

#[derive(Debug, Serialize)]
struct WireTool<'a> {
    #[serde(rename = "type")]
    tool_type: &'static str,
    function: &'a ToolDefinition,
}

impl OpenAiProvider {
    pub fn new(config: LlmConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_default();
        OpenAiProvider { client, config }
    }

    fn is_azure(&self) -> bool {
        self.config.api_base.contains(".openai.azure.com")
            || self.config.api_base.contains("/openai")
    }

    fn chat_url(&self) -> String {
        let base = self.config.api_base.trim_end_matches('/');
        if self.is_azure() {
            format!(
                "{}/openai/deployments/{}/chat/completions?api-version={}",
                base, self.config.deployment, self.config.api_version
            )
        } else {
            format!("{}/v1/chat/completions", base)
        }
    }

    fn embeddings_url(&self) -> String {
        let base = self.config.api_base.trim_end_matches('/');
        if self.is_azure() {
            format!(
                "{}/openai/deployments/{}/embeddings?api-version={}",
                base, self.config.embedding_model, self.config.api_version
            )
        } else {
            format!("{}/v1/embeddings", base)
        }
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        if self.is_azure() {
            request.header("api-key", &self.config.api_key)
        } else {
            request.bearer_auth(&self.config.api_key)
        }
    }

    async fn post_json(&self, url: &str, body: &Value) -> Result<Value, ApiError> {
        let response = self
            .authorize(self.client.post(url).json(body))
            .send()
            .await
            .map_err(|err| ApiError::ServiceUnavailable(format!("LLM request failed: {}", err)))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            tracing::error!("LLM endpoint returned {}: {}", status, detail);
            return Err(ApiError::ServiceUnavailable(format!(
                "LLM endpoint returned {}",
                status
            )));
        }

        response.json::<Value>().await.map_err(ApiError::internal)
    }
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
    fn name(&self) -> &str {
        if self.is_azure() {
            "azure-openai"
        } else {
            "openai"
        }
    }

    async fn chat(&self, request: ChatRequest) -> Result<LlmReply, ApiError> {
        let mut body = json!({
            "model": self.config.deployment,
            "messages": request.messages,
            "temperature": request.temperature.unwrap_or(self.config.temperature),
            "max_tokens": request.max_tokens.unwrap_or(self.config.max_tokens),
        });
        if !request.tools.is_empty() {
            let tools: Vec<WireTool> = request
                .tools
                .iter()
                .map(|tool| WireTool {
                    tool_type: "function",
                    function: tool,
                })
                .collect();
            body["tools"] = serde_json::to_value(tools).map_err(ApiError::internal)?;
        }

        let raw = self.post_json(&self.chat_url(), &body).await?;
        let completion: ChatCompletion =
            serde_json::from_value(raw).map_err(ApiError::internal)?;
        let choice = completion
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| ApiError::Internal("LLM returned no choices".to_string()))?;

        Ok(LlmReply {
            content: choice.message.content,
            tool_calls: choice.message.tool_calls.unwrap_or_default(),
        })
    }

    async fn embed(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, ApiError> {
        let body = json!({
            "model": self.config.embedding_model,
            "input": inputs,
        });

        let raw = self.post_json(&self.embeddings_url(), &body).await?;
        let parsed: EmbeddingResponse =
            serde_json::from_value(raw).map_err(ApiError::internal)?;
        Ok(parsed.data.into_iter().map(|item| item.embedding).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider(api_base: &str) -> OpenAiProvider {
        OpenAiProvider::new(LlmConfig {
            api_base: api_base.to_string(),
            deployment: "gpt-4o".to_string(),
            api_version: "2024-02-01".to_string(),
            embedding_model: "text-embedding-3-small".to_string(),
            ..LlmConfig::default()
        })
    }

    #[test]
    fn azure_endpoints_use_deployment_paths() {
        let provider = provider("https://unit.openai.azure.com");
        assert_eq!(
            provider.chat_url(),
            "https://unit.openai.azure.com/openai/deployments/gpt-4o/chat/completions?api-version=2024-02-01"
        );
        assert!(provider.embeddings_url().contains("text-embedding-3-small"));
    }

    #[test]
    fn plain_endpoints_use_v1_paths() {
        let provider = provider("https://api.openai.com");
        assert_eq!(provider.chat_url(), "https://api.openai.com/v1/chat/completions");
        assert_eq!(provider.name(), "openai");
    }
}
