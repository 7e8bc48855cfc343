use std::env;

use xconverse_core::{FeatureToggles, MIN_REASONING_BUDGET};

const DEFAULT_REGION: &str = "us-east-1";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    Bedrock,
    Mock,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub backend: BackendKind,
    pub region: String,
    pub api_key: Option<String>,
    pub control_base_url: Option<String>,
    pub runtime_base_url: Option<String>,
    pub provider_timeout_seconds: u64,
    pub toggles: FeatureToggles,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid XC_PORT value: {0}")]
    InvalidPort(String),
    #[error("invalid XC_BACKEND value: {0} (expected bedrock or mock)")]
    InvalidBackend(String),
    #[error("invalid {name} value: {value}")]
    InvalidBool { name: &'static str, value: String },
    #[error("invalid XC_PROVIDER_TIMEOUT value: {0}")]
    InvalidProviderTimeout(String),
    #[error("invalid XC_REASONING_BUDGET value: {0} (minimum {MIN_REASONING_BUDGET})")]
    InvalidReasoningBudget(String),
    #[error("invalid XC_MAX_OUTPUT_TOKENS value: {0}")]
    InvalidMaxOutputTokens(String),
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let value =
            |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let flag = |name: &'static str, default: bool| match value(name) {
            Some(raw) => parse_bool(&raw).ok_or(ConfigError::InvalidBool { name, value: raw }),
            None => Ok(default),
        };

        let host = value("XC_HOST").unwrap_or_else(|| "127.0.0.1".to_string());

        let port_raw = value("XC_PORT").unwrap_or_else(|| "3000".to_string());
        let port = port_raw.parse::<u16>().map_err(|_| ConfigError::InvalidPort(port_raw.clone()))?;

        let backend_raw = value("XC_BACKEND").unwrap_or_else(|| "bedrock".to_string());
        let backend = match backend_raw.to_ascii_lowercase().as_str() {
            "bedrock" => BackendKind::Bedrock,
            "mock" => BackendKind::Mock,
            _ => return Err(ConfigError::InvalidBackend(backend_raw)),
        };

        let timeout_raw = value("XC_PROVIDER_TIMEOUT").unwrap_or_else(|| "120".to_string());
        let provider_timeout_seconds = parse_positive_u64(&timeout_raw)
            .ok_or_else(|| ConfigError::InvalidProviderTimeout(timeout_raw.clone()))?;

        let defaults = FeatureToggles::default();
        let reasoning_budget_tokens = match value("XC_REASONING_BUDGET") {
            Some(raw) => raw
                .parse::<u32>()
                .ok()
                .filter(|budget| *budget >= MIN_REASONING_BUDGET)
                .ok_or(ConfigError::InvalidReasoningBudget(raw))?,
            None => defaults.reasoning_budget_tokens,
        };
        let max_output_tokens = match value("XC_MAX_OUTPUT_TOKENS") {
            Some(raw) => Some(
                raw.parse::<u32>()
                    .ok()
                    .filter(|tokens| *tokens > 0)
                    .ok_or(ConfigError::InvalidMaxOutputTokens(raw))?,
            ),
            None => None,
        };

        let toggles = FeatureToggles {
            prompt_caching: flag("XC_PROMPT_CACHING", defaults.prompt_caching)?,
            context_1m: flag("XC_CONTEXT_1M", defaults.context_1m)?,
            reasoning_enabled: flag("XC_REASONING_ENABLED", defaults.reasoning_enabled)?,
            reasoning_budget_tokens,
            max_output_tokens,
        };

        Ok(Self {
            host,
            port,
            backend,
            region: value("XC_REGION").unwrap_or_else(|| DEFAULT_REGION.to_string()),
            api_key: value("XC_API_KEY").or_else(|| value("AWS_BEARER_TOKEN_BEDROCK")),
            control_base_url: value("XC_CONTROL_BASE_URL"),
            runtime_base_url: value("XC_RUNTIME_BASE_URL"),
            provider_timeout_seconds,
            toggles,
        })
    }

    pub fn for_tests() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
            backend: BackendKind::Mock,
            region: DEFAULT_REGION.to_string(),
            api_key: None,
            control_base_url: None,
            runtime_base_url: None,
            provider_timeout_seconds: 15,
            toggles: FeatureToggles::default(),
        }
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn parse_positive_u64(value: &str) -> Option<u64> {
    let parsed = value.trim().parse::<u64>().ok()?;
    if parsed == 0 { None } else { Some(parsed) }
}
