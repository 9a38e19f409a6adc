use async_trait::async_trait;

use crate::errors::ApiError;

use super::types::{ChatRequest, LlmReply};

/// Boundary to the hosted language model. The rest of the application only
/// depends on this trait, so the concrete provider (Azure, OpenAI, a local
/// server speaking the same protocol) is a configuration detail.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// provider name for logs (e.g. "azure-openai")
    fn name(&self) -> &str;

    /// chat completion, optionally offering tools for the model to call
    async fn chat(&self, request: ChatRequest) -> Result<LlmReply, ApiError>;

    /// embed a batch of texts
    async fn embed(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, ApiError>;
}
