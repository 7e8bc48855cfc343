use crate::profile::{CapabilityProfile, base_model_id};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenLimits {
    pub max_input_tokens: u32,
    pub max_output_tokens: u32,
}

pub const DEFAULT_LIMITS: TokenLimits =
    TokenLimits { max_input_tokens: 128_000, max_output_tokens: 4_096 };

pub const EXTENDED_CONTEXT_TOKENS: u32 = 1_000_000;

const fn limits(max_input_tokens: u32, max_output_tokens: u32) -> TokenLimits {
    TokenLimits { max_input_tokens, max_output_tokens }
}

// Prefix match on the base id; first match wins.
const LIMIT_RULES: &[(&str, TokenLimits)] = &[
    ("anthropic.claude-sonnet-4", limits(200_000, 64_000)),
    ("anthropic.claude-opus-4", limits(200_000, 32_000)),
    ("anthropic.claude-3-7-sonnet", limits(200_000, 64_000)),
    ("anthropic.claude-3-5-sonnet", limits(200_000, 8_192)),
    ("anthropic.claude-3-5-haiku", limits(200_000, 8_192)),
    ("anthropic.claude-3", limits(200_000, 4_096)),
    ("anthropic.claude", limits(100_000, 4_096)),
    ("amazon.nova-premier", limits(1_000_000, 32_000)),
    ("amazon.nova-pro", limits(300_000, 10_000)),
    ("amazon.nova-lite", limits(300_000, 10_000)),
    ("amazon.nova-micro", limits(128_000, 10_000)),
    ("meta.llama4", limits(1_000_000, 8_192)),
    ("meta.llama3", limits(128_000, 2_048)),
    ("mistral.mistral-large", limits(128_000, 8_192)),
    ("mistral.pixtral", limits(128_000, 8_192)),
    ("mistral.", limits(32_000, 8_192)),
    ("deepseek.", limits(128_000, 32_768)),
    ("cohere.command-r", limits(128_000, 4_096)),
    ("ai21.jamba", limits(256_000, 4_096)),
    ("writer.palmyra", limits(128_000, 8_192)),
];

pub fn limits_for(model_id: &str) -> TokenLimits {
    let base = base_model_id(model_id).to_ascii_lowercase();
    LIMIT_RULES
        .iter()
        .find(|(prefix, _)| base.starts_with(prefix))
        .map(|(_, limits)| *limits)
        .unwrap_or(DEFAULT_LIMITS)
}

pub fn effective_input_limit(
    limits: TokenLimits,
    profile: &CapabilityProfile,
    context_1m_enabled: bool,
) -> u32 {
    if context_1m_enabled && profile.supports_1m_context {
        EXTENDED_CONTEXT_TOKENS.max(limits.max_input_tokens)
    } else {
        limits.max_input_tokens
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::resolve;

    #[test]
    fn limits_ignore_routing_prefix() {
        assert_eq!(
            limits_for("us.anthropic.claude-3-5-haiku-20241022-v1:0"),
            limits_for("anthropic.claude-3-5-haiku-20241022-v1:0")
        );
        assert_eq!(
            limits_for("global.anthropic.claude-sonnet-4-20250514-v1:0").max_output_tokens,
            64_000
        );
    }

    #[test]
    fn unknown_model_gets_default_limits() {
        assert_eq!(limits_for("acme.unknown-v1"), DEFAULT_LIMITS);
    }

    #[test]
    fn extended_context_requires_profile_and_toggle() {
        let sonnet = "anthropic.claude-sonnet-4-20250514-v1:0";
        let haiku = "anthropic.claude-3-5-haiku-20241022-v1:0";

        let limit = |model: &str, enabled: bool| {
            effective_input_limit(limits_for(model), &resolve(model), enabled)
        };
        assert_eq!(limit(sonnet, true), EXTENDED_CONTEXT_TOKENS);
        assert_eq!(limit(sonnet, false), 200_000);
        assert_eq!(limit(haiku, true), 200_000);
    }
}
