//! Tool registry and dispatch.
//!
//! Every tool shares the same contract: one string in, one string out.
//! Errors are embedded in the returned text so the agent can relay them;
//! only an unknown tool name is a dispatch error.

pub mod calculator;
pub mod weather;

use serde_json::json;

use crate::errors::ApiError;
use crate::llm::ToolDefinition;
use crate::state::AppState;

pub const WIKIPEDIA_SEARCH: &str = "wikipedia_search";
pub const WEATHER_CURRENT: &str = "weather_current";
pub const WEATHER_FORECAST: &str = "weather_forecast";
pub const CALCULATOR: &str = "calculator";

pub struct ToolSpec {
    pub name: &'static str,
    pub description: &'static str,
}

pub fn tool_specs() -> Vec<ToolSpec> {
    vec![
        ToolSpec {
            name: WIKIPEDIA_SEARCH,
            description: "Search the Wikipedia knowledge base for information about any topic. \
                Use this when you need factual information, historical data, or general \
                knowledge about people, places, events, concepts, etc.",
        },
        ToolSpec {
            name: WEATHER_CURRENT,
            description: "Get current weather information for any city or location. Input \
                should be just the city name (e.g., 'London', 'New York', 'Tokyo').",
        },
        ToolSpec {
            name: WEATHER_FORECAST,
            description: "Get the weather forecast for any city. Input format: 'location' for \
                a 3-day forecast or 'location, days' for a specific number of days (1-5). \
                Example: 'London, 5' for a 5-day forecast.",
        },
        ToolSpec {
            name: CALCULATOR,
            description: "Perform basic mathematical calculations. Supports: addition (+), \
                subtraction (-), multiplication (*), division (/), power (**), modulo (%), \
                sqrt(), abs(), round(), pow(), and the constants pi and e. Use for simple \
                arithmetic like '2+2', 'sqrt(16)', '10*5-3'.",
        },
    ]
}

/// Tool definitions in the shape the chat-completions API expects. Every
/// tool takes a single free-form string.
pub fn tool_definitions() -> Vec<ToolDefinition> {
    tool_specs()
        .into_iter()
        .map(|spec| ToolDefinition {
            name: spec.name.to_string(),
            description: spec.description.to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "input": { "type": "string" }
                },
                "required": ["input"]
            }),
        })
        .collect()
}

pub async fn execute_tool(
    state: &AppState,
    tool_name: &str,
    input: &str,
) -> Result<String, ApiError> {
    match tool_name {
        CALCULATOR => Ok(calculator::calculate(input)),
        WEATHER_CURRENT => Ok(state.weather.get_weather(input.trim()).await),
        WEATHER_FORECAST => {
            let (location, days) = weather::parse_forecast_input(input);
            Ok(state.weather.get_forecast(&location, days).await)
        }
        WIKIPEDIA_SEARCH => match state.retriever.invoke(input).await {
            Ok(answer) => Ok(answer),
            Err(err) => {
                tracing::error!("Knowledge base search failed: {}", err);
                Ok("Sorry, I couldn't search the knowledge base right now.".to_string())
            }
        },
        _ => Err(ApiError::BadRequest(format!("Unknown tool: {}", tool_name))),
    }
}
