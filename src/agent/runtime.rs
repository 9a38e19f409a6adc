//! Agent loop: alternate model calls and tool executions until the model
//! produces a plain answer or the iteration budget runs out.

use serde::Serialize;

use crate::llm::{ChatMessage, ChatRequest};
use crate::state::AppState;
use crate::tools;

const SYSTEM_PROMPT: &str = "You are a helpful AI assistant with access to tools: a Wikipedia \
knowledge base, current weather and forecasts, and a calculator. Use a tool whenever it would \
make your answer more accurate, and answer directly when none applies. If a tool returns an \
error, relay it honestly instead of guessing. Be concise.";

const PROVIDER_ERROR_MESSAGE: &str =
    "I apologize, but I encountered an error processing your request.";
const ITERATION_LIMIT_MESSAGE: &str = "Agent stopped due to iteration limit.";

/// Tool inputs echoed back to clients are clipped to this many characters.
const TOOL_INPUT_PREVIEW_CHARS: usize = 100;

#[derive(Debug, Clone, Serialize)]
pub struct ToolUsage {
    pub name: String,
    pub input: String,
}

pub struct TurnOutcome {
    pub response: String,
    pub tools_used: Vec<ToolUsage>,
}

/// Runs one user turn against a session. The history is loaded (or seeded
/// with the system prompt for a new session), the model is consulted up to
/// `max_iterations` times with tool results fed back in between, and the
/// updated history is stored before returning.
pub async fn run_turn(state: &AppState, session_id: &str, user_message: &str) -> TurnOutcome {
    let mut messages = match state.sessions.history(session_id).await {
        Some(history) => history,
        None => {
            tracing::info!("Created new agent for session: {}", session_id);
            vec![ChatMessage::system(SYSTEM_PROMPT)]
        }
    };
    messages.push(ChatMessage::user(user_message));

    let mut tools_used: Vec<ToolUsage> = Vec::new();
    let mut response: Option<String> = None;

    for _ in 0..state.config.agent.max_iterations.max(1) {
        let request =
            ChatRequest::new(messages.clone()).with_tools(tools::tool_definitions());
        let reply = match state.llm.chat(request).await {
            Ok(reply) => reply,
            Err(err) => {
                tracing::error!("Error during agent execution: {}", err);
                response = Some(PROVIDER_ERROR_MESSAGE.to_string());
                break;
            }
        };

        if reply.tool_calls.is_empty() {
            let content = reply
                .content
                .unwrap_or_else(|| "No response generated".to_string());
            messages.push(ChatMessage::assistant(content.clone()));
            response = Some(content);
            break;
        }

        messages.push(ChatMessage::assistant_tool_calls(reply.tool_calls.clone()));
        for call in reply.tool_calls {
            let input = parse_tool_input(&call.function.arguments);
            tracing::info!("Tool used: {} with input: {}", call.function.name, input);
            tools_used.push(ToolUsage {
                name: call.function.name.clone(),
                input: preview(&input),
            });

            let output = match tools::execute_tool(state, &call.function.name, &input).await {
                Ok(output) => output,
                Err(err) => format!("Tool error: {}", err),
            };
            messages.push(ChatMessage::tool_result(call.id, output));
        }
    }

    let response = response.unwrap_or_else(|| ITERATION_LIMIT_MESSAGE.to_string());
    state.sessions.replace(session_id, messages).await;
    TurnOutcome {
        response,
        tools_used,
    }
}

/// Tool arguments arrive as a JSON document, normally `{"input": "..."}`.
/// Anything else is passed through verbatim so a confused model still
/// reaches the tool.
fn parse_tool_input(arguments: &str) -> String {
    match serde_json::from_str::<serde_json::Value>(arguments) {
        Ok(serde_json::Value::Object(map)) => match map.get("input") {
            Some(serde_json::Value::String(input)) => input.clone(),
            Some(other) => other.to_string(),
            None => arguments.trim().to_string(),
        },
        Ok(serde_json::Value::String(input)) => input,
        _ => arguments.trim().to_string(),
    }
}

fn preview(input: &str) -> String {
    if input.chars().count() <= TOOL_INPUT_PREVIEW_CHARS {
        return input.to_string();
    }
    let clipped: String = input.chars().take(TOOL_INPUT_PREVIEW_CHARS).collect();
    format!("{}...", clipped)
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::path::PathBuf;
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use chrono::Utc;

    use super::*;
    use crate::agent::SessionStore;
    use crate::config::{AppConfig, AppPaths};
    use crate::errors::ApiError;
    use crate::llm::{FunctionCall, LlmProvider, LlmReply, ToolCallPayload};
    use crate::rag::{ChromaStore, Retriever};
    use crate::tools::weather::WeatherClient;

    struct ScriptedLlm {
        replies: Mutex<VecDeque<Result<LlmReply, ApiError>>>,
    }

    impl ScriptedLlm {
        fn new(replies: Vec<Result<LlmReply, ApiError>>) -> Arc<Self> {
            Arc::new(ScriptedLlm {
                replies: Mutex::new(replies.into()),
            })
        }
    }

    #[async_trait]
    impl LlmProvider for ScriptedLlm {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn chat(&self, _request: ChatRequest) -> Result<LlmReply, ApiError> {
            self.replies
                .lock()
                .expect("lock")
                .pop_front()
                .unwrap_or_else(|| Err(ApiError::Internal("script exhausted".to_string())))
        }

        async fn embed(&self, _inputs: &[String]) -> Result<Vec<Vec<f32>>, ApiError> {
            Ok(Vec::new())
        }
    }

    struct StaticRetriever;

    #[async_trait]
    impl Retriever for StaticRetriever {
        async fn invoke(&self, _query: &str) -> Result<String, ApiError> {
            Ok("Alan Turing was born in 1912.".to_string())
        }
    }

    fn text_reply(content: &str) -> Result<LlmReply, ApiError> {
        Ok(LlmReply {
            content: Some(content.to_string()),
            tool_calls: Vec::new(),
        })
    }

    fn tool_reply(id: &str, name: &str, arguments: &str) -> Result<LlmReply, ApiError> {
        Ok(LlmReply {
            content: None,
            tool_calls: vec![ToolCallPayload {
                id: id.to_string(),
                call_type: "function".to_string(),
                function: FunctionCall {
                    name: name.to_string(),
                    arguments: arguments.to_string(),
                },
            }],
        })
    }

    fn test_state(llm: Arc<dyn LlmProvider>) -> AppState {
        let config = AppConfig::default();
        let paths = Arc::new(AppPaths {
            project_root: PathBuf::from("."),
            data_dir: PathBuf::from("."),
            log_dir: PathBuf::from("."),
        });
        AppState {
            weather: WeatherClient::new(config.weather.clone()),
            store: Arc::new(ChromaStore::new(&config.chroma)),
            retriever: Arc::new(StaticRetriever),
            sessions: SessionStore::new(),
            started_at: Utc::now(),
            config,
            paths,
            llm,
        }
    }

    #[tokio::test]
    async fn plain_answer_is_stored_in_history() {
        let state = test_state(ScriptedLlm::new(vec![text_reply("Hello there")]));
        let outcome = run_turn(&state, "s1", "hi").await;

        assert_eq!(outcome.response, "Hello there");
        assert!(outcome.tools_used.is_empty());

        let history = state.sessions.history("s1").await.expect("history");
        assert_eq!(history.len(), 3);
        assert_eq!(history[0].role, "system");
        assert_eq!(history[1].role, "user");
        assert_eq!(history[2].role, "assistant");
    }

    #[tokio::test]
    async fn tool_call_round_trip_feeds_result_back() {
        let state = test_state(ScriptedLlm::new(vec![
            tool_reply("call_1", "calculator", r#"{"input": "2+2"}"#),
            text_reply("The answer is 4."),
        ]));
        let outcome = run_turn(&state, "s1", "what is 2+2?").await;

        assert_eq!(outcome.response, "The answer is 4.");
        assert_eq!(outcome.tools_used.len(), 1);
        assert_eq!(outcome.tools_used[0].name, "calculator");
        assert_eq!(outcome.tools_used[0].input, "2+2");

        let history = state.sessions.history("s1").await.expect("history");
        let tool_message = history
            .iter()
            .find(|message| message.role == "tool")
            .expect("tool result recorded");
        assert_eq!(tool_message.tool_call_id.as_deref(), Some("call_1"));
        assert_eq!(tool_message.content.as_deref(), Some("Calculation: 2+2 = 4"));
    }

    #[tokio::test]
    async fn knowledge_base_tool_uses_retriever() {
        let state = test_state(ScriptedLlm::new(vec![
            tool_reply("call_1", "wikipedia_search", r#"{"input": "Alan Turing"}"#),
            text_reply("He was born in 1912."),
        ]));
        let outcome = run_turn(&state, "s1", "when was Turing born?").await;

        assert_eq!(outcome.response, "He was born in 1912.");
        let history = state.sessions.history("s1").await.expect("history");
        let tool_message = history
            .iter()
            .find(|message| message.role == "tool")
            .expect("tool result recorded");
        assert_eq!(
            tool_message.content.as_deref(),
            Some("Alan Turing was born in 1912.")
        );
    }

    #[tokio::test]
    async fn iteration_limit_stops_a_tool_loop() {
        let state = test_state(ScriptedLlm::new(vec![
            tool_reply("call_1", "calculator", r#"{"input": "1+1"}"#),
            tool_reply("call_2", "calculator", r#"{"input": "2+2"}"#),
            tool_reply("call_3", "calculator", r#"{"input": "3+3"}"#),
        ]));
        let outcome = run_turn(&state, "s1", "loop forever").await;

        assert_eq!(outcome.response, ITERATION_LIMIT_MESSAGE);
        assert_eq!(outcome.tools_used.len(), 3);
    }

    #[tokio::test]
    async fn provider_failure_yields_apology() {
        let state = test_state(ScriptedLlm::new(vec![Err(ApiError::ServiceUnavailable(
            "upstream down".to_string(),
        ))]));
        let outcome = run_turn(&state, "s1", "hi").await;
        assert_eq!(outcome.response, PROVIDER_ERROR_MESSAGE);
    }

    #[tokio::test]
    async fn history_carries_across_turns() {
        let state = test_state(ScriptedLlm::new(vec![
            text_reply("First answer"),
            text_reply("Second answer"),
        ]));
        run_turn(&state, "s1", "first").await;
        run_turn(&state, "s1", "second").await;

        let history = state.sessions.history("s1").await.expect("history");
        // system + 2 * (user + assistant)
        assert_eq!(history.len(), 5);
    }

    #[test]
    fn tool_input_parsing_handles_malformed_arguments() {
        assert_eq!(parse_tool_input(r#"{"input": "sqrt(16)"}"#), "sqrt(16)");
        assert_eq!(parse_tool_input(r#""London""#), "London");
        assert_eq!(parse_tool_input("2+2"), "2+2");
        assert_eq!(parse_tool_input(r#"{"query": "x"}"#), r#"{"query": "x"}"#);
    }

    #[test]
    fn long_tool_inputs_are_clipped_for_the_response() {
        let long = "9".repeat(150);
        let clipped = preview(&long);
        assert_eq!(clipped.chars().count(), 103);
        assert!(clipped.ends_with("..."));
        assert_eq!(preview("2+2"), "2+2");
    }
}
