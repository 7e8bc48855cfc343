use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;

/// Mime type of a data part that carries a serialized [`ReasoningBlock`].
pub const REASONING_MIME_TYPE: &str = "application/vnd.xconverse.reasoning+json";

#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, ToSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ToolResultItem {
    Text { text: String },
    Json { value: Value },
}

impl ToolResultItem {
    pub fn to_text(&self) -> String {
        match self {
            Self::Text { text } => text.clone(),
            Self::Json { value: Value::String(text) } => text.clone(),
            Self::Json { value } => value.to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, ToSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum HostPart {
    Text {
        text: String,
    },
    ToolCall {
        call_id: String,
        name: String,
        #[serde(default)]
        input: Value,
    },
    ToolResult {
        call_id: String,
        #[serde(default)]
        content: Vec<ToolResultItem>,
    },
    Data {
        mime_type: String,
        data: Value,
    },
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, ToSchema)]
pub struct HostMessage {
    pub role: ChatRole,
    #[serde(default)]
    pub parts: Vec<HostPart>,
}

impl HostMessage {
    pub fn new(role: ChatRole, parts: Vec<HostPart>) -> Self {
        Self { role, parts }
    }

    pub fn text(role: ChatRole, text: impl Into<String>) -> Self {
        Self { role, parts: vec![HostPart::Text { text: text.into() }] }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self::text(ChatRole::User, text)
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self::text(ChatRole::Assistant, text)
    }

    pub fn system(text: impl Into<String>) -> Self {
        Self::text(ChatRole::System, text)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, ToSchema)]
pub struct ToolDefinition {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub input_schema: Value,
}

#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ToolMode {
    #[default]
    Auto,
    Required,
    None,
}

/// A part surfaced to the host while a response streams in.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, ToSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProgressPart {
    Text { text: String },
    ToolCall { call_id: String, name: String, input: Value },
    Reasoning { text: String },
    Data { mime_type: String, data: Value },
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq, ToSchema)]
pub struct ReasoningBlock {
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
}

impl ReasoningBlock {
    pub fn is_empty(&self) -> bool {
        self.text.is_empty() && self.signature.is_none()
    }

    /// Only signed blocks may be sent back to the backend.
    pub fn is_replayable(&self) -> bool {
        self.signature.as_deref().is_some_and(|signature| !signature.trim().is_empty())
    }
}
