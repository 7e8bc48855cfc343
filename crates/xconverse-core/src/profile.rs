#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolResultFormat {
    Text,
    Json,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CapabilityProfile {
    pub supports_prompt_caching: bool,
    pub supports_tool_choice: bool,
    pub supports_caching_with_tool_results: bool,
    pub supports_tool_result_status: bool,
    pub supports_reasoning: bool,
    pub requires_continuity_header: bool,
    pub supports_1m_context: bool,
    pub tool_result_format: ToolResultFormat,
}

impl CapabilityProfile {
    pub const CONSERVATIVE: Self = Self {
        supports_prompt_caching: false,
        supports_tool_choice: false,
        supports_caching_with_tool_results: false,
        supports_tool_result_status: false,
        supports_reasoning: false,
        requires_continuity_header: false,
        supports_1m_context: false,
        tool_result_format: ToolResultFormat::Text,
    };
}

impl Default for CapabilityProfile {
    fn default() -> Self {
        Self::CONSERVATIVE
    }
}

const ANTHROPIC: CapabilityProfile = CapabilityProfile {
    supports_prompt_caching: true,
    supports_tool_choice: true,
    supports_caching_with_tool_results: true,
    supports_tool_result_status: true,
    supports_reasoning: true,
    requires_continuity_header: true,
    supports_1m_context: false,
    tool_result_format: ToolResultFormat::Text,
};

const ANTHROPIC_LONG_CONTEXT: CapabilityProfile =
    CapabilityProfile { supports_1m_context: true, ..ANTHROPIC };

const NOVA: CapabilityProfile = CapabilityProfile {
    supports_prompt_caching: true,
    supports_tool_choice: true,
    ..CapabilityProfile::CONSERVATIVE
};

const MISTRAL: CapabilityProfile = CapabilityProfile {
    tool_result_format: ToolResultFormat::Json,
    ..CapabilityProfile::CONSERVATIVE
};

struct ProfileRule {
    provider: &'static str,
    model_prefix: Option<&'static str>,
    profile: CapabilityProfile,
}

// First match wins, so narrower rules come first.
const RULES: &[ProfileRule] = &[
    ProfileRule {
        provider: "anthropic",
        model_prefix: Some("claude-sonnet-4"),
        profile: ANTHROPIC_LONG_CONTEXT,
    },
    ProfileRule { provider: "anthropic", model_prefix: None, profile: ANTHROPIC },
    ProfileRule { provider: "amazon", model_prefix: Some("nova"), profile: NOVA },
    ProfileRule { provider: "mistral", model_prefix: None, profile: MISTRAL },
];

const ROUTING_TOKENS: &[&str] = &["global", "apac", "us-gov"];

/// Splits `us.anthropic.claude-3-haiku` into `(Some("us"), "anthropic.claude-3-haiku")`.
/// Ids with fewer than three dot-separated parts never carry a routing prefix.
pub fn split_routing_prefix(model_id: &str) -> (Option<&str>, &str) {
    if model_id.split('.').count() >= 3
        && let Some((first, rest)) = model_id.split_once('.')
        && is_routing_segment(first)
    {
        return (Some(first), rest);
    }
    (None, model_id)
}

fn is_routing_segment(segment: &str) -> bool {
    let is_region_code = segment.len() == 2 && segment.chars().all(|c| c.is_ascii_alphabetic());
    is_region_code || ROUTING_TOKENS.iter().any(|token| segment.eq_ignore_ascii_case(token))
}

pub fn base_model_id(model_id: &str) -> &str {
    split_routing_prefix(model_id).1
}

pub fn resolve(model_id: &str) -> CapabilityProfile {
    let base = base_model_id(model_id).to_ascii_lowercase();
    let Some((provider, model_name)) = base.split_once('.') else {
        return CapabilityProfile::CONSERVATIVE;
    };
    RULES
        .iter()
        .find(|rule| {
            rule.provider == provider
                && rule.model_prefix.is_none_or(|prefix| model_name.starts_with(prefix))
        })
        .map(|rule| rule.profile)
        .unwrap_or(CapabilityProfile::CONSERVATIVE)
}
