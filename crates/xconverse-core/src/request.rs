use serde_json::{Map, Value, json};
use xconverse_contracts::{
    ContentBlock, ConverseStreamRequest, InferenceConfiguration, SystemBlock, ToolConfiguration,
    ToolEntry, ToolResultContent,
};

use crate::convert::ConvertedConversation;
use crate::limits::TokenLimits;
use crate::profile::CapabilityProfile;

pub const MIN_REASONING_BUDGET: u32 = 1_024;
pub const DEFAULT_REASONING_BUDGET: u32 = 4_096;
pub const INTERLEAVED_THINKING_BETA: &str = "interleaved-thinking-2025-05-14";
pub const CONTEXT_1M_BETA: &str = "context-1m-2025-08-07";

// Output tokens kept for the visible answer once reasoning takes its budget.
const ANSWER_HEADROOM: u32 = 1_024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeatureToggles {
    pub prompt_caching: bool,
    pub context_1m: bool,
    pub reasoning_enabled: bool,
    pub reasoning_budget_tokens: u32,
    pub max_output_tokens: Option<u32>,
}

impl Default for FeatureToggles {
    fn default() -> Self {
        Self {
            prompt_caching: true,
            context_1m: false,
            reasoning_enabled: false,
            reasoning_budget_tokens: DEFAULT_REASONING_BUDGET,
            max_output_tokens: None,
        }
    }
}

impl FeatureToggles {
    pub fn reasoning_active(&self, profile: &CapabilityProfile) -> bool {
        self.reasoning_enabled && profile.supports_reasoning
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputBudget {
    pub max_tokens: u32,
    pub reasoning_budget: Option<u32>,
}

pub fn output_budget(
    limits: TokenLimits,
    profile: &CapabilityProfile,
    toggles: &FeatureToggles,
) -> OutputBudget {
    let model_max = limits.max_output_tokens.max(1);
    let capped = toggles.max_output_tokens.map_or(model_max, |cap| cap.clamp(1, model_max));
    if !toggles.reasoning_active(profile) {
        return OutputBudget { max_tokens: capped, reasoning_budget: None };
    }

    let ceiling = model_max.saturating_sub(ANSWER_HEADROOM).max(MIN_REASONING_BUDGET);
    let budget = toggles.reasoning_budget_tokens.max(MIN_REASONING_BUDGET).min(ceiling);
    OutputBudget {
        max_tokens: capped.max(budget + ANSWER_HEADROOM),
        reasoning_budget: Some(budget),
    }
}

pub fn build_request(
    conversation: ConvertedConversation,
    tool_config: Option<ToolConfiguration>,
    limits: TokenLimits,
    profile: &CapabilityProfile,
    toggles: &FeatureToggles,
) -> ConverseStreamRequest {
    let budget = output_budget(limits, profile, toggles);

    let mut fields = Map::new();
    if let Some(budget_tokens) = budget.reasoning_budget {
        fields.insert(
            "thinking".to_string(),
            json!({"type": "enabled", "budget_tokens": budget_tokens}),
        );
    }
    let mut betas = Vec::new();
    if budget.reasoning_budget.is_some() && profile.requires_continuity_header {
        betas.push(Value::String(INTERLEAVED_THINKING_BETA.to_string()));
    }
    if toggles.context_1m && profile.supports_1m_context {
        betas.push(Value::String(CONTEXT_1M_BETA.to_string()));
    }
    if !betas.is_empty() {
        fields.insert("anthropic_beta".to_string(), Value::Array(betas));
    }

    ConverseStreamRequest {
        messages: conversation.messages,
        system: conversation.system,
        inference_config: Some(InferenceConfiguration {
            max_tokens: budget.max_tokens,
            temperature: None,
            stop_sequences: Vec::new(),
        }),
        tool_config,
        additional_model_request_fields: (!fields.is_empty()).then_some(Value::Object(fields)),
    }
}

/// Rough input size used when the backend cannot count tokens: four characters per token.
pub fn estimate_input_tokens(request: &ConverseStreamRequest) -> u32 {
    let mut chars = 0usize;
    for block in &request.system {
        if let SystemBlock::Text(text) = block {
            chars += text.chars().count();
        }
    }
    for message in &request.messages {
        for block in &message.content {
            chars += match block {
                ContentBlock::Text(text) => text.chars().count(),
                ContentBlock::ToolUse(tool) => tool.name.len() + tool.input.to_string().len(),
                ContentBlock::ToolResult(result) => result
                    .content
                    .iter()
                    .map(|content| match content {
                        ToolResultContent::Text(text) => text.chars().count(),
                        ToolResultContent::Json(value) => value.to_string().len(),
                    })
                    .sum(),
                ContentBlock::ReasoningContent(reasoning) => {
                    reasoning.reasoning_text.text.chars().count()
                }
                ContentBlock::Image(_) | ContentBlock::CachePoint(_) => 0,
            };
        }
    }
    if let Some(config) = &request.tool_config {
        for tool in &config.tools {
            if let ToolEntry::ToolSpec(spec) = tool {
                chars += spec.name.len()
                    + spec.description.as_deref().map_or(0, str::len)
                    + spec.input_schema.json.to_string().len();
            }
        }
    }
    u32::try_from(chars.div_ceil(4)).unwrap_or(u32::MAX)
}
