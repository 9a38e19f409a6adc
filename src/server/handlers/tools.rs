use axum::Json;
use serde::Serialize;

use crate::tools;

#[derive(Debug, Serialize)]
pub struct ToolInfo {
    pub name: &'static str,
    pub description: &'static str,
}

#[derive(Debug, Serialize)]
pub struct ToolListResponse {
    pub tools: Vec<ToolInfo>,
}

pub async fn list_tools() -> Json<ToolListResponse> {
    let tools = tools::tool_specs()
        .into_iter()
        .map(|spec| ToolInfo {
            name: spec.name,
            description: spec.description,
        })
        .collect();
    Json(ToolListResponse { tools })
}
