use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One turn in a conversation, in OpenAI chat-completions shape. Tool
/// round-trips need the optional fields: the assistant's request carries
/// `tool_calls`, and the tool result answers with the matching
/// `tool_call_id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCallPayload>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self::plain("system", content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::plain("user", content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::plain("assistant", content)
    }

    pub fn assistant_tool_calls(calls: Vec<ToolCallPayload>) -> Self {
        ChatMessage {
            role: "assistant".to_string(),
            content: None,
            tool_calls: Some(calls),
            tool_call_id: None,
        }
    }

    pub fn tool_result(call_id: impl Into<String>, content: impl Into<String>) -> Self {
        ChatMessage {
            role: "tool".to_string(),
            content: Some(content.into()),
            tool_calls: None,
            tool_call_id: Some(call_id.into()),
        }
    }

    fn plain(role: &str, content: impl Into<String>) -> Self {
        ChatMessage {
            role: role.to_string(),
            content: Some(content.into()),
            tool_calls: None,
            tool_call_id: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCallPayload {
    pub id: String,
    #[serde(rename = "type")]
    pub call_type: String,
    pub function: FunctionCall,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionCall {
    pub name: String,
    /// JSON-encoded arguments, as the API ships them.
    pub arguments: String,
}

/// A tool advertised to the model.
#[derive(Debug, Clone, Serialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub messages: Vec<ChatMessage>,
    pub temperature: Option<f64>,
    pub max_tokens: Option<u32>,
    pub tools: Vec<ToolDefinition>,
}

impl ChatRequest {
    pub fn new(messages: Vec<ChatMessage>) -> Self {
        ChatRequest {
            messages,
            temperature: None,
            max_tokens: None,
            tools: Vec::new(),
        }
    }

    pub fn with_tools(mut self, tools: Vec<ToolDefinition>) -> Self {
        self.tools = tools;
        self
    }
}

/// The model's answer: free text, tool-call requests, or both.
#[derive(Debug, Clone, Default)]
pub struct LlmReply {
    pub content: Option<String>,
    pub tool_calls: Vec<ToolCallPayload>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_messages_skip_tool_fields() {
        let serialized = serde_json::to_value(ChatMessage::user("hi")).expect("serializes");
        assert_eq!(
            serialized,
            serde_json::json!({"role": "user", "content": "hi"})
        );
    }

    #[test]
    fn tool_result_carries_call_id() {
        let serialized =
            serde_json::to_value(ChatMessage::tool_result("call_1", "42")).expect("serializes");
        assert_eq!(serialized["role"], "tool");
        assert_eq!(serialized["tool_call_id"], "call_1");
    }
}
