use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Mutex, RwLock, mpsc};
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, info, info_span, warn};
use uuid::Uuid;
use xconverse_contracts::{
    ConverseStreamRequest, HostMessage, ModelEntry, ProgressPart, ReasoningBlock,
    TokenCountResponse, ToolDefinition, ToolMode, TurnSummary,
};

use crate::backend::{BackendClient, ProgressSink};
use crate::convert::{ConvertOptions, convert, convert_tools};
use crate::error::CoreError;
use crate::limits::{TokenLimits, limits_for};
use crate::profile::{CapabilityProfile, base_model_id, resolve};
use crate::request::{FeatureToggles, build_request, estimate_input_tokens};
use crate::stream::StreamProcessor;

#[derive(Debug, Clone, PartialEq)]
pub struct TurnInput {
    pub model: String,
    pub messages: Vec<HostMessage>,
    pub tools: Vec<ToolDefinition>,
    pub tool_mode: ToolMode,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    Part(ProgressPart),
    Done(TurnSummary),
    Failed(CoreError),
}

struct TurnTarget {
    profile_model_id: String,
    profile: CapabilityProfile,
    limits: TokenLimits,
}

pub struct ChatSession {
    id: String,
    backend: Arc<dyn BackendClient>,
    toggles: FeatureToggles,
    models: RwLock<Vec<ModelEntry>>,
    last_reasoning: Mutex<Option<ReasoningBlock>>,
}

impl ChatSession {
    pub fn new(
        id: impl Into<String>,
        backend: Arc<dyn BackendClient>,
        toggles: FeatureToggles,
    ) -> Self {
        Self {
            id: id.into(),
            backend,
            toggles,
            models: RwLock::new(Vec::new()),
            last_reasoning: Mutex::new(None),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn toggles(&self) -> &FeatureToggles {
        &self.toggles
    }

    pub async fn models(&self) -> Vec<ModelEntry> {
        self.models.read().await.clone()
    }

    pub async fn last_reasoning(&self) -> Option<ReasoningBlock> {
        self.last_reasoning.lock().await.clone()
    }

    /// Installs an already resolved model list, e.g. one shared across sessions.
    pub async fn set_models(&self, models: Vec<ModelEntry>) {
        *self.models.write().await = models;
    }

    async fn target(&self, model: &str) -> TurnTarget {
        let models = self.models.read().await;
        match models.iter().find(|entry| entry.id == model) {
            Some(entry) => TurnTarget {
                profile_model_id: entry.base_model_id.clone(),
                profile: resolve(&entry.base_model_id),
                limits: TokenLimits {
                    max_input_tokens: entry.max_input_tokens,
                    max_output_tokens: entry.max_output_tokens,
                },
            },
            None => TurnTarget {
                profile_model_id: base_model_id(model).to_string(),
                profile: resolve(model),
                limits: limits_for(model),
            },
        }
    }

    async fn build(
        &self,
        turn: &TurnInput,
        prior: Option<&ReasoningBlock>,
    ) -> ConverseStreamRequest {
        let target = self.target(&turn.model).await;
        let options = ConvertOptions {
            reasoning_enabled: self.toggles.reasoning_active(&target.profile),
            prior_reasoning: prior,
            caching_enabled: self.toggles.prompt_caching,
        };
        let conversation = convert(&turn.messages, &target.profile_model_id, &options);
        let tool_config = convert_tools(
            &turn.tools,
            turn.tool_mode,
            &target.profile,
            self.toggles.prompt_caching,
        );
        build_request(conversation, tool_config, target.limits, &target.profile, &self.toggles)
    }

    pub async fn respond(
        &self,
        turn: TurnInput,
        sink: &mut dyn ProgressSink,
        cancel: CancellationToken,
    ) -> Result<TurnSummary, CoreError> {
        turn.validate()?;
        let span = info_span!(
            "chat_turn",
            session_id = %self.id,
            turn_id = %Uuid::new_v4(),
            model = %turn.model,
            tools = turn.tools.len()
        );

        async move {
            let prior = self.last_reasoning.lock().await.clone();
            let request = self.build(&turn, prior.as_ref()).await;
            debug!(
                event = "session.request.built",
                messages = request.messages.len(),
                cache_points = request.cache_point_count(),
                replayed_reasoning = prior.as_ref().is_some_and(ReasoningBlock::is_replayable)
            );

            let events = match self.backend.open_stream(&turn.model, &request, &cancel).await {
                Ok(events) => events,
                Err(CoreError::Cancelled) => {
                    debug!(event = "session.turn.cancelled", stage = "open");
                    return Ok(self.summary(&turn.model, None, 0, None));
                }
                Err(error) => {
                    *self.last_reasoning.lock().await = None;
                    let error = match error {
                        CoreError::Backend(message) => CoreError::classify_backend(message),
                        other => other,
                    };
                    warn!(
                        event = "session.turn.failed",
                        stage = "open",
                        error_kind = error.kind(),
                        error = %error
                    );
                    return Err(error);
                }
            };

            match StreamProcessor::new(sink, cancel).run(events).await {
                Ok(report) => {
                    let reasoning = report.reasoning.filter(ReasoningBlock::is_replayable);
                    let captured = reasoning.is_some();
                    *self.last_reasoning.lock().await = reasoning;
                    let stop_reason = report.stop_reason.map(|reason| reason.to_string());
                    let base = self.summary(
                        &turn.model,
                        stop_reason,
                        report.parts_emitted,
                        report.latency_ms,
                    );
                    let summary =
                        TurnSummary { usage: report.usage, reasoning_captured: captured, ..base };
                    info!(
                        event = "session.turn.completed",
                        stop_reason = summary.stop_reason.as_deref().unwrap_or("none"),
                        parts = summary.parts_emitted,
                        cancelled = report.cancelled,
                        reasoning_captured = captured
                    );
                    Ok(summary)
                }
                Err(failure) => {
                    *self.last_reasoning.lock().await =
                        failure.reasoning.filter(ReasoningBlock::is_replayable);
                    warn!(
                        event = "session.turn.failed",
                        stage = "stream",
                        error_kind = failure.error.kind(),
                        error = %failure.error
                    );
                    Err(failure.error)
                }
            }
        }
        .instrument(span)
        .await
    }

    fn summary(
        &self,
        model: &str,
        stop_reason: Option<String>,
        parts_emitted: usize,
        latency_ms: Option<u64>,
    ) -> TurnSummary {
        TurnSummary {
            session_id: self.id.clone(),
            model: model.to_string(),
            stop_reason,
            parts_emitted,
            usage: None,
            latency_ms,
            reasoning_captured: false,
        }
    }

    /// Runs a turn on a background task and streams its parts followed by one terminal event.
    pub fn respond_stream(
        self: Arc<Self>,
        turn: TurnInput,
        cancel: CancellationToken,
    ) -> ReceiverStream<SessionEvent> {
        let (tx, rx) = mpsc::channel(32);
        tokio::spawn(async move {
            let mut sink = EventSink(tx.clone());
            let terminal = match self.respond(turn, &mut sink, cancel).await {
                Ok(summary) => SessionEvent::Done(summary),
                Err(error) => SessionEvent::Failed(error),
            };
            let _ = tx.send(terminal).await;
        });
        ReceiverStream::new(rx)
    }

    pub async fn count_tokens(
        &self,
        model: &str,
        messages: Vec<HostMessage>,
        cancel: &CancellationToken,
    ) -> Result<TokenCountResponse, CoreError> {
        let turn = TurnInput {
            model: model.to_string(),
            messages,
            tools: Vec::new(),
            tool_mode: ToolMode::Auto,
        };
        turn.validate()?;
        let request = self.build(&turn, None).await;
        let estimated = || TokenCountResponse {
            input_tokens: estimate_input_tokens(&request),
            estimated: true,
        };
        match self.backend.count_tokens(model, &request, cancel).await {
            Ok(Some(input_tokens)) => Ok(TokenCountResponse { input_tokens, estimated: false }),
            Ok(None) => Ok(estimated()),
            Err(CoreError::Cancelled) => Err(CoreError::Cancelled),
            Err(error) => {
                debug!(event = "session.tokens.estimated", model = %model, error = %error);
                Ok(estimated())
            }
        }
    }
}

impl TurnInput {
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.model.trim().is_empty() {
            return Err(CoreError::Validation("model must not be empty".to_string()));
        }
        if self.messages.is_empty() {
            return Err(CoreError::Validation("messages must not be empty".to_string()));
        }
        if self.tools.iter().any(|tool| tool.name.trim().is_empty()) {
            return Err(CoreError::Validation("tool name must not be empty".to_string()));
        }
        Ok(())
    }
}

struct EventSink(mpsc::Sender<SessionEvent>);

#[async_trait]
impl ProgressSink for EventSink {
    async fn report(&mut self, part: ProgressPart) -> bool {
        self.0.send(SessionEvent::Part(part)).await.is_ok()
    }
}
