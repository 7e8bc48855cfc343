use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use utoipa::ToSchema;

use crate::wire::{ReasoningText, WireRole};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    EndTurn,
    ToolUse,
    MaxTokens,
    StopSequence,
    GuardrailIntervened,
    ContentFiltered,
    ModelContextWindowExceeded,
    Other(String),
}

impl StopReason {
    pub fn parse(raw: &str) -> Self {
        match raw {
            "end_turn" => Self::EndTurn,
            "tool_use" => Self::ToolUse,
            "max_tokens" => Self::MaxTokens,
            "stop_sequence" => Self::StopSequence,
            "guardrail_intervened" => Self::GuardrailIntervened,
            "content_filtered" => Self::ContentFiltered,
            "model_context_window_exceeded" => Self::ModelContextWindowExceeded,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::EndTurn => "end_turn",
            Self::ToolUse => "tool_use",
            Self::MaxTokens => "max_tokens",
            Self::StopSequence => "stop_sequence",
            Self::GuardrailIntervened => "guardrail_intervened",
            Self::ContentFiltered => "content_filtered",
            Self::ModelContextWindowExceeded => "model_context_window_exceeded",
            Self::Other(raw) => raw,
        }
    }
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TokenUsage {
    #[serde(default)]
    pub input_tokens: u32,
    #[serde(default)]
    pub output_tokens: u32,
    #[serde(default)]
    pub total_tokens: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_read_input_tokens: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_write_input_tokens: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReasoningSegment {
    pub text: String,
    pub signature: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamMetadata {
    pub usage: Option<TokenUsage>,
    pub latency_ms: Option<u64>,
    pub reasoning: Vec<ReasoningSegment>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockStart {
    Text,
    ToolUse { tool_use_id: String, name: String },
    Reasoning { signature: Option<String> },
    Unknown { shape: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockDelta {
    Text(String),
    ToolUse { input: String },
    Thinking { text: Option<String>, signature: Option<String> },
    ReasoningContent { text: Option<String>, signature: Option<String>, redacted: bool },
    Unknown { shape: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    MessageStart { role: WireRole },
    ContentBlockStart { index: u32, start: BlockStart },
    ContentBlockDelta { index: u32, delta: BlockDelta },
    ContentBlockStop { index: u32 },
    MessageStop { stop_reason: StopReason },
    Metadata(StreamMetadata),
    Unknown { event_type: String },
}

impl StreamEvent {
    pub fn event_type(&self) -> &str {
        match self {
            Self::MessageStart { .. } => "messageStart",
            Self::ContentBlockStart { .. } => "contentBlockStart",
            Self::ContentBlockDelta { .. } => "contentBlockDelta",
            Self::ContentBlockStop { .. } => "contentBlockStop",
            Self::MessageStop { .. } => "messageStop",
            Self::Metadata(_) => "metadata",
            Self::Unknown { event_type } => event_type,
        }
    }

    /// Decodes one event from its `:event-type` header and JSON payload.
    pub fn from_frame(event_type: &str, payload: &[u8]) -> Result<Self, serde_json::Error> {
        let event = match event_type {
            "messageStart" => {
                let raw: RawMessageStart = serde_json::from_slice(payload)?;
                let role = if raw.role.as_deref() == Some("user") {
                    WireRole::User
                } else {
                    WireRole::Assistant
                };
                Self::MessageStart { role }
            }
            "contentBlockStart" => {
                let raw: RawBlockStart = serde_json::from_slice(payload)?;
                Self::ContentBlockStart {
                    index: raw.content_block_index,
                    start: raw.start.map(RawStart::into_start).unwrap_or(BlockStart::Text),
                }
            }
            "contentBlockDelta" => {
                let raw: RawBlockDelta = serde_json::from_slice(payload)?;
                let delta = match raw.delta {
                    Some(delta) => delta.into_delta(),
                    None => BlockDelta::Unknown { shape: "missing".to_string() },
                };
                Self::ContentBlockDelta { index: raw.content_block_index, delta }
            }
            "contentBlockStop" => {
                let raw: RawBlockStop = serde_json::from_slice(payload)?;
                Self::ContentBlockStop { index: raw.content_block_index }
            }
            "messageStop" => {
                let raw: RawMessageStop = serde_json::from_slice(payload)?;
                Self::MessageStop { stop_reason: StopReason::parse(&raw.stop_reason) }
            }
            "metadata" => {
                let raw: RawMetadata = serde_json::from_slice(payload)?;
                Self::Metadata(raw.into_metadata())
            }
            other => Self::Unknown { event_type: other.to_string() },
        };
        Ok(event)
    }
}

#[derive(Deserialize)]
struct RawMessageStart {
    #[serde(default)]
    role: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawBlockStart {
    #[serde(default)]
    content_block_index: u32,
    #[serde(default)]
    start: Option<RawStart>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawStart {
    #[serde(default)]
    tool_use: Option<RawToolUseStart>,
    #[serde(default)]
    reasoning_content: Option<RawReasoningStart>,
    #[serde(flatten)]
    other: Map<String, Value>,
}

impl RawStart {
    fn into_start(self) -> BlockStart {
        if let Some(tool_use) = self.tool_use {
            return BlockStart::ToolUse { tool_use_id: tool_use.tool_use_id, name: tool_use.name };
        }
        if let Some(reasoning) = self.reasoning_content {
            return BlockStart::Reasoning { signature: reasoning.signature };
        }
        match self.other.keys().next() {
            Some(shape) => BlockStart::Unknown { shape: shape.clone() },
            None => BlockStart::Text,
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawToolUseStart {
    tool_use_id: String,
    name: String,
}

#[derive(Deserialize)]
struct RawReasoningStart {
    #[serde(default)]
    signature: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawBlockDelta {
    #[serde(default)]
    content_block_index: u32,
    #[serde(default)]
    delta: Option<RawDelta>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawDelta {
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    tool_use: Option<RawToolUseDelta>,
    #[serde(default)]
    thinking: Option<RawThinking>,
    #[serde(default)]
    signature: Option<String>,
    #[serde(default)]
    reasoning_content: Option<RawReasoningDelta>,
    #[serde(flatten)]
    other: Map<String, Value>,
}

impl RawDelta {
    fn into_delta(self) -> BlockDelta {
        if let Some(text) = self.text {
            return BlockDelta::Text(text);
        }
        if let Some(tool_use) = self.tool_use {
            return BlockDelta::ToolUse { input: tool_use.input };
        }
        if let Some(thinking) = self.thinking {
            return match thinking {
                RawThinking::Text(text) => {
                    BlockDelta::Thinking { text: Some(text), signature: self.signature }
                }
                RawThinking::Fields { text, signature } => {
                    BlockDelta::Thinking { text, signature: signature.or(self.signature) }
                }
            };
        }
        if let Some(reasoning) = self.reasoning_content {
            return BlockDelta::ReasoningContent {
                text: reasoning.text,
                signature: reasoning.signature,
                redacted: reasoning.redacted_content.is_some(),
            };
        }
        if self.signature.is_some() {
            return BlockDelta::Thinking { text: None, signature: self.signature };
        }
        let shape = self.other.keys().next().cloned().unwrap_or_else(|| "empty".to_string());
        BlockDelta::Unknown { shape }
    }
}

#[derive(Deserialize)]
struct RawToolUseDelta {
    #[serde(default)]
    input: String,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawThinking {
    Text(String),
    Fields {
        #[serde(default, alias = "thinking")]
        text: Option<String>,
        #[serde(default)]
        signature: Option<String>,
    },
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawReasoningDelta {
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    signature: Option<String>,
    #[serde(default)]
    redacted_content: Option<Value>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawBlockStop {
    #[serde(default)]
    content_block_index: u32,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawMessageStop {
    #[serde(default)]
    stop_reason: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawMetadata {
    #[serde(default)]
    usage: Option<TokenUsage>,
    #[serde(default)]
    metrics: Option<RawMetrics>,
    #[serde(default)]
    reasoning_content: Vec<RawReasoningSegment>,
}

impl RawMetadata {
    fn into_metadata(self) -> StreamMetadata {
        let reasoning = self
            .reasoning_content
            .into_iter()
            .map(|segment| match segment.reasoning_text {
                Some(ReasoningText { text, signature }) => {
                    ReasoningSegment { text, signature: signature.or(segment.signature) }
                }
                None => ReasoningSegment {
                    text: segment.text.unwrap_or_default(),
                    signature: segment.signature,
                },
            })
            .collect();
        StreamMetadata {
            usage: self.usage,
            latency_ms: self.metrics.and_then(|metrics| metrics.latency_ms),
            reasoning,
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawMetrics {
    #[serde(default)]
    latency_ms: Option<u64>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawReasoningSegment {
    #[serde(default)]
    reasoning_text: Option<ReasoningText>,
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    signature: Option<String>,
}
