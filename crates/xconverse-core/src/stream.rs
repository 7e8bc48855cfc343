use futures::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};
use xconverse_contracts::{
    BlockDelta, BlockStart, ProgressPart, ReasoningBlock, StopReason, StreamEvent, StreamMetadata,
    TokenUsage,
};

use crate::backend::{EventStream, ProgressSink};
use crate::error::CoreError;
use crate::tool_buffer::{ToolCall, ToolCallBuffer};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamReport {
    pub stop_reason: Option<StopReason>,
    /// Text and tool-call parts; reasoning parts are not counted.
    pub parts_emitted: usize,
    pub usage: Option<TokenUsage>,
    pub latency_ms: Option<u64>,
    pub reasoning: Option<ReasoningBlock>,
    pub cancelled: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamFailure {
    pub error: CoreError,
    pub reasoning: Option<ReasoningBlock>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BlockState {
    Idle,
    Open(u32),
    Closed(u32),
}

#[derive(Debug, Default)]
struct ReasoningAccumulator {
    text: String,
    signature: Option<String>,
}

impl ReasoningAccumulator {
    fn push_text(&mut self, text: &str) {
        self.text.push_str(text);
    }

    fn offer_signature(&mut self, signature: Option<String>) {
        if self.signature.is_none()
            && let Some(signature) = signature.filter(|value| !value.trim().is_empty())
        {
            self.signature = Some(signature);
        }
    }

    fn snapshot(&self) -> Option<ReasoningBlock> {
        if self.text.is_empty() && self.signature.is_none() {
            return None;
        }
        Some(ReasoningBlock { text: self.text.clone(), signature: self.signature.clone() })
    }
}

pub struct StreamProcessor<'a> {
    sink: &'a mut dyn ProgressSink,
    cancel: CancellationToken,
    tools: ToolCallBuffer,
    reasoning: ReasoningAccumulator,
    state: BlockState,
    stop_reason: Option<StopReason>,
    usage: Option<TokenUsage>,
    latency_ms: Option<u64>,
    answer_parts: usize,
    reasoning_parts: usize,
    consumer_gone: bool,
}

impl<'a> StreamProcessor<'a> {
    pub fn new(sink: &'a mut dyn ProgressSink, cancel: CancellationToken) -> Self {
        Self {
            sink,
            cancel,
            tools: ToolCallBuffer::new(),
            reasoning: ReasoningAccumulator::default(),
            state: BlockState::Idle,
            stop_reason: None,
            usage: None,
            latency_ms: None,
            answer_parts: 0,
            reasoning_parts: 0,
            consumer_gone: false,
        }
    }

    pub async fn run(mut self, mut events: EventStream) -> Result<StreamReport, StreamFailure> {
        let cancel = self.cancel.clone();
        let mut cancelled = false;
        loop {
            if cancel.is_cancelled() {
                cancelled = true;
                break;
            }
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    cancelled = true;
                    break;
                }
                next = events.next() => next,
            };
            match next {
                None => break,
                Some(Ok(event)) => self.handle(event).await,
                Some(Err(CoreError::Cancelled)) => {
                    cancelled = true;
                    break;
                }
                Some(Err(error)) => {
                    let error = match error {
                        CoreError::Backend(message) => CoreError::classify_backend(message),
                        other => other,
                    };
                    warn!(
                        event = "stream.transport.failed",
                        error_kind = error.kind(),
                        error = %error
                    );
                    return Err(StreamFailure { error, reasoning: self.reasoning.snapshot() });
                }
            }
        }

        if !cancelled {
            self.flush_open_tool_calls().await;
        }
        self.finish(cancelled)
    }

    async fn handle(&mut self, event: StreamEvent) {
        trace!(event = "stream.event.received", event_type = event.event_type());
        match event {
            StreamEvent::MessageStart { role } => {
                debug!(event = "stream.message.started", role = ?role)
            }
            StreamEvent::ContentBlockStart { index, start } => {
                self.state = BlockState::Open(index);
                match start {
                    BlockStart::Text => {}
                    BlockStart::ToolUse { tool_use_id, name } => {
                        self.tools.start(index, tool_use_id, name)
                    }
                    BlockStart::Reasoning { signature } => {
                        self.reasoning.offer_signature(signature)
                    }
                    BlockStart::Unknown { shape } => {
                        debug!(event = "stream.block_start.unknown", index, shape = %shape)
                    }
                }
            }
            StreamEvent::ContentBlockDelta { index, delta } => {
                if let BlockState::Closed(closed) = self.state
                    && closed == index
                {
                    debug!(event = "stream.delta.after_stop", index);
                }
                self.state = BlockState::Open(index);
                self.handle_delta(index, delta).await;
            }
            StreamEvent::ContentBlockStop { index } => {
                if let BlockState::Open(open) = self.state
                    && open != index
                {
                    debug!(event = "stream.block.interleaved", open, index);
                }
                self.close_tool_call(index).await;
                self.state = BlockState::Closed(index);
            }
            StreamEvent::MessageStop { stop_reason } => {
                debug!(
                    event = "stream.message.stopped",
                    stop_reason = %stop_reason,
                    block_state = ?self.state
                );
                self.stop_reason = Some(stop_reason);
            }
            StreamEvent::Metadata(metadata) => self.record_metadata(metadata),
            StreamEvent::Unknown { event_type } => {
                debug!(event = "stream.event.unknown", event_type = %event_type)
            }
        }
    }

    async fn handle_delta(&mut self, index: u32, delta: BlockDelta) {
        match delta {
            BlockDelta::Text(text) => {
                if !text.is_empty() {
                    self.emit(ProgressPart::Text { text }).await;
                }
            }
            BlockDelta::ToolUse { input } => {
                if !self.tools.is_tracking(index) {
                    warn!(event = "stream.tool_delta.orphaned", index);
                    return;
                }
                self.tools.append(index, &input);
                if !self.tools.is_emitted(index)
                    && let Some(call) = self.tools.try_validate(index)
                {
                    self.tools.mark_emitted(index);
                    self.emit_tool_call(call).await;
                }
            }
            BlockDelta::Thinking { text, signature } => self.push_reasoning(text, signature).await,
            BlockDelta::ReasoningContent { text, signature, redacted } => {
                if redacted {
                    debug!(event = "stream.reasoning.redacted", index);
                }
                self.push_reasoning(text, signature).await;
            }
            BlockDelta::Unknown { shape } => {
                debug!(event = "stream.delta.unknown", index, shape = %shape)
            }
        }
    }

    async fn push_reasoning(&mut self, text: Option<String>, signature: Option<String>) {
        self.reasoning.offer_signature(signature);
        if let Some(text) = text.filter(|text| !text.is_empty()) {
            self.reasoning.push_text(&text);
            self.reasoning_parts += 1;
            self.report(ProgressPart::Reasoning { text }).await;
        }
    }

    async fn close_tool_call(&mut self, index: u32) {
        let emitted = self.tools.is_emitted(index);
        if let Some(call) = self.tools.finalize(index)
            && !emitted
        {
            self.emit_tool_call(call).await;
        }
    }

    async fn flush_open_tool_calls(&mut self) {
        while let Some(index) = self.tools.first_index() {
            debug!(event = "stream.tool_call.unterminated", index);
            self.close_tool_call(index).await;
        }
    }

    fn record_metadata(&mut self, metadata: StreamMetadata) {
        if let Some(usage) = &metadata.usage {
            info!(
                event = "stream.usage",
                input_tokens = usage.input_tokens,
                output_tokens = usage.output_tokens,
                cache_read_input_tokens = usage.cache_read_input_tokens.unwrap_or(0),
                cache_write_input_tokens = usage.cache_write_input_tokens.unwrap_or(0),
                latency_ms = metadata.latency_ms.unwrap_or(0)
            );
        }
        self.usage = metadata.usage.or(self.usage.take());
        self.latency_ms = metadata.latency_ms.or(self.latency_ms);
        for segment in metadata.reasoning {
            self.reasoning.push_text(&segment.text);
            self.reasoning.offer_signature(segment.signature);
        }
    }

    async fn emit_tool_call(&mut self, call: ToolCall) {
        self.emit(ProgressPart::ToolCall { call_id: call.id, name: call.name, input: call.input })
            .await;
    }

    async fn emit(&mut self, part: ProgressPart) {
        self.answer_parts += 1;
        self.report(part).await;
    }

    async fn report(&mut self, part: ProgressPart) {
        if !self.sink.report(part).await && !self.consumer_gone {
            self.consumer_gone = true;
            debug!(event = "stream.consumer.gone");
        }
    }

    fn finish(self, cancelled: bool) -> Result<StreamReport, StreamFailure> {
        let reasoning = self.reasoning.snapshot();
        // Visible reasoning counts as output; metadata-only reasoning does not.
        if self.answer_parts == 0 && self.reasoning_parts == 0 && !cancelled {
            let error = match &self.stop_reason {
                Some(StopReason::MaxTokens) => CoreError::ReasoningBudgetExhausted,
                Some(StopReason::ContentFiltered | StopReason::GuardrailIntervened) => {
                    CoreError::ContentFiltered
                }
                Some(StopReason::ModelContextWindowExceeded) => {
                    CoreError::ContextOverflow("model context window exceeded".to_string())
                }
                other => CoreError::EmptyResponse {
                    stop_reason: other.as_ref().map(ToString::to_string),
                },
            };
            warn!(
                event = "stream.response.empty",
                error_kind = error.kind(),
                reasoning_captured = reasoning.is_some()
            );
            return Err(StreamFailure { error, reasoning });
        }

        Ok(StreamReport {
            stop_reason: self.stop_reason,
            parts_emitted: self.answer_parts,
            usage: self.usage,
            latency_ms: self.latency_ms,
            reasoning,
            cancelled,
        })
    }
}
