use async_trait::async_trait;
use futures::stream;
use serde_json::json;
use tokio_util::sync::CancellationToken;
use xconverse_contracts::{
    BlockDelta, BlockStart, ContentBlock, ConverseStreamRequest, FoundationModelSummary,
    InferenceProfileSummary, StopReason, StreamEvent, StreamMetadata, TokenUsage, ToolEntry,
    WireRole,
};
use xconverse_core::{BackendClient, CoreError, EventStream, ProfileKind};

const CATALOG: &[(&str, &str, &str, &[&str])] = &[
    (
        "anthropic.claude-sonnet-4-20250514-v1:0",
        "Claude Sonnet 4",
        "Anthropic",
        &["INFERENCE_PROFILE"],
    ),
    ("amazon.nova-lite-v1:0", "Nova Lite", "Amazon", &["ON_DEMAND", "INFERENCE_PROFILE"]),
];

/// Offline backend: fixed catalog, echoes the last user text back word by word.
pub struct MockBackendClient {
    region: String,
}

impl MockBackendClient {
    pub fn new(region: String) -> Self {
        Self { region }
    }
}

#[async_trait]
impl BackendClient for MockBackendClient {
    fn region(&self) -> &str {
        &self.region
    }

    async fn list_foundation_models(
        &self,
        _cancel: &CancellationToken,
    ) -> Result<Vec<FoundationModelSummary>, CoreError> {
        Ok(CATALOG
            .iter()
            .map(|(model_id, model_name, provider_name, inference_types)| FoundationModelSummary {
                model_id: model_id.to_string(),
                model_name: model_name.to_string(),
                provider_name: provider_name.to_string(),
                input_modalities: vec!["TEXT".to_string(), "IMAGE".to_string()],
                output_modalities: vec!["TEXT".to_string()],
                response_streaming_supported: Some(true),
                inference_types_supported: inference_types
                    .iter()
                    .map(|kind| kind.to_string())
                    .collect(),
                model_lifecycle: None,
            })
            .collect())
    }

    async fn list_inference_profiles(
        &self,
        kind: ProfileKind,
        _cancel: &CancellationToken,
    ) -> Result<Vec<InferenceProfileSummary>, CoreError> {
        if kind == ProfileKind::Application {
            return Ok(Vec::new());
        }
        Ok(CATALOG
            .iter()
            .map(|(model_id, model_name, _, _)| InferenceProfileSummary {
                inference_profile_id: format!("global.{model_id}"),
                inference_profile_name: format!("Global {model_name}"),
                profile_type: "SYSTEM_DEFINED".to_string(),
                status: "ACTIVE".to_string(),
                ..InferenceProfileSummary::default()
            })
            .collect())
    }

    async fn check_access(
        &self,
        _model_id: &str,
        _cancel: &CancellationToken,
    ) -> Result<bool, CoreError> {
        Ok(true)
    }

    async fn open_stream(
        &self,
        _model_id: &str,
        request: &ConverseStreamRequest,
        cancel: &CancellationToken,
    ) -> Result<EventStream, CoreError> {
        if cancel.is_cancelled() {
            return Err(CoreError::Cancelled);
        }
        let events = scripted_reply(request).into_iter().map(Ok).collect::<Vec<_>>();
        Ok(Box::pin(stream::iter(events)))
    }
}

fn last_user_text(request: &ConverseStreamRequest) -> String {
    request
        .messages
        .iter()
        .rev()
        .find(|message| message.role == WireRole::User)
        .map(|message| {
            message
                .content
                .iter()
                .filter_map(|block| match block {
                    ContentBlock::Text(text) => Some(text.as_str()),
                    _ => None,
                })
                .collect::<Vec<_>>()
                .join(" ")
        })
        .unwrap_or_default()
}

/// `use <tool>` as the last user text triggers a call to that tool when it was offered.
fn requested_tool(request: &ConverseStreamRequest, text: &str) -> Option<String> {
    let name = text.trim().strip_prefix("use ")?.trim();
    request.tool_config.as_ref()?.tools.iter().find_map(|tool| match tool {
        ToolEntry::ToolSpec(spec) if spec.name == name => Some(spec.name.clone()),
        _ => None,
    })
}

fn scripted_reply(request: &ConverseStreamRequest) -> Vec<StreamEvent> {
    let text = last_user_text(request);
    let mut events = vec![StreamEvent::MessageStart { role: WireRole::Assistant }];
    let mut output_tokens = 0u32;

    let stop_reason = if let Some(tool) = requested_tool(request, &text) {
        let input = json!({ "text": text }).to_string();
        events.push(StreamEvent::ContentBlockStart {
            index: 0,
            start: BlockStart::ToolUse { tool_use_id: "mock_tool_0".to_string(), name: tool },
        });
        events.push(StreamEvent::ContentBlockDelta {
            index: 0,
            delta: BlockDelta::ToolUse { input },
        });
        events.push(StreamEvent::ContentBlockStop { index: 0 });
        output_tokens = 1;
        StopReason::ToolUse
    } else {
        for word in text.split_whitespace() {
            output_tokens = output_tokens.saturating_add(1);
            events.push(StreamEvent::ContentBlockDelta {
                index: 0,
                delta: BlockDelta::Text(format!("{word} ")),
            });
        }
        if output_tokens > 0 {
            events.push(StreamEvent::ContentBlockStop { index: 0 });
        }
        StopReason::EndTurn
    };

    let input_tokens = u32::try_from(text.split_whitespace().count()).unwrap_or(u32::MAX);
    events.push(StreamEvent::MessageStop { stop_reason });
    events.push(StreamEvent::Metadata(StreamMetadata {
        usage: Some(TokenUsage {
            input_tokens,
            output_tokens,
            total_tokens: input_tokens.saturating_add(output_tokens),
            ..TokenUsage::default()
        }),
        latency_ms: Some(1),
        reasoning: Vec::new(),
    }));
    events
}
