use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::events::TokenUsage;
use crate::host::{HostMessage, ToolDefinition, ToolMode};

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, ToSchema)]
pub struct ChatRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    pub model: String,
    pub messages: Vec<HostMessage>,
    #[serde(default)]
    pub tools: Vec<ToolDefinition>,
    #[serde(default)]
    pub tool_mode: ToolMode,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq, ToSchema)]
pub struct TurnSummary {
    pub session_id: String,
    pub model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop_reason: Option<String>,
    pub parts_emitted: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<TokenUsage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
    pub reasoning_captured: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, ToSchema)]
pub struct TokenCountRequest {
    pub model: String,
    pub messages: Vec<HostMessage>,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq, ToSchema)]
pub struct TokenCountResponse {
    pub input_tokens: u32,
    pub estimated: bool,
}
