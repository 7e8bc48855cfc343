#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum CoreError {
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("backend error: {0}")]
    Backend(String),
    #[error("model catalog unavailable: {0}")]
    Catalog(String),
    #[error("context window exceeded: {0}")]
    ContextOverflow(String),
    #[error("reasoning used the whole output budget before any answer was produced")]
    ReasoningBudgetExhausted,
    #[error("response was blocked by content filtering")]
    ContentFiltered,
    #[error(
        "backend returned an empty response (stop reason: {})",
        .stop_reason.as_deref().unwrap_or("none")
    )]
    EmptyResponse { stop_reason: Option<String> },
    #[error("request cancelled")]
    Cancelled,
}

const CONTEXT_OVERFLOW_PHRASES: &[&str] = &[
    "input is too long",
    "too many input tokens",
    "prompt is too long",
    "exceeds the maximum context",
    "context length",
    "model_context_window_exceeded",
];

pub fn is_context_overflow_message(message: &str) -> bool {
    let lowered = message.to_ascii_lowercase();
    CONTEXT_OVERFLOW_PHRASES.iter().any(|phrase| lowered.contains(phrase))
}

impl CoreError {
    /// Maps raw backend error text to `ContextOverflow` or `Backend`.
    pub fn classify_backend(message: impl Into<String>) -> Self {
        let message = message.into();
        if is_context_overflow_message(&message) {
            Self::ContextOverflow(message)
        } else {
            Self::Backend(message)
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "Validation",
            Self::Backend(_) => "Backend",
            Self::Catalog(_) => "Catalog",
            Self::ContextOverflow(_) => "ContextOverflow",
            Self::ReasoningBudgetExhausted => "ReasoningBudgetExhausted",
            Self::ContentFiltered => "ContentFiltered",
            Self::EmptyResponse { .. } => "EmptyResponse",
            Self::Cancelled => "Cancelled",
        }
    }

    pub fn is_empty_response(&self) -> bool {
        matches!(
            self,
            Self::ReasoningBudgetExhausted | Self::ContentFiltered | Self::EmptyResponse { .. }
        )
    }
}
