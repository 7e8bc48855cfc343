use serde_json::{Value, json};
use tracing::debug;
use xconverse_contracts::{
    CachePointBlock, ChatRole, ContentBlock, EmptyChoice, HostMessage, HostPart, ImageBlock,
    ImageSource, REASONING_MIME_TYPE, ReasoningBlock, ReasoningContentBlock, ReasoningText,
    SystemBlock, ToolChoice, ToolConfiguration, ToolDefinition, ToolEntry, ToolInputSchema,
    ToolMode, ToolResultBlock, ToolResultContent, ToolResultItem, ToolResultStatus,
    ToolSpecification, ToolUseBlock, WireMessage, WireRole,
};

use crate::profile::{CapabilityProfile, ToolResultFormat, resolve};

pub const PLACEHOLDER_USER_TEXT: &str = "Continue.";

const MESSAGE_CACHE_POINTS: usize = 2;

const SUPPORTED_IMAGE_FORMATS: &[&str] = &["png", "jpeg", "gif", "webp"];

const TOOL_FAILURE_PHRASES: &[&str] = &[
    "error while calling tool:",
    "tool execution failed",
    "command failed with exit code",
    "permission denied",
    "no such file or directory",
];

#[derive(Debug, Clone, Copy, Default)]
pub struct ConvertOptions<'a> {
    pub reasoning_enabled: bool,
    pub prior_reasoning: Option<&'a ReasoningBlock>,
    pub caching_enabled: bool,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConvertedConversation {
    pub messages: Vec<WireMessage>,
    pub system: Vec<SystemBlock>,
}

/// Case-insensitive check used to flag tool results as failed.
pub fn looks_like_tool_error(content: &str) -> bool {
    let lowered = content.trim_start().to_lowercase();
    lowered.starts_with("error")
        || TOOL_FAILURE_PHRASES.iter().any(|phrase| lowered.contains(phrase))
}

pub fn is_deepseek_model(model_id: &str) -> bool {
    model_id.to_ascii_lowercase().contains("deepseek")
}

pub fn convert(
    history: &[HostMessage],
    model_id: &str,
    options: &ConvertOptions<'_>,
) -> ConvertedConversation {
    let profile = resolve(model_id);
    let mut system = Vec::new();
    let mut messages = Vec::with_capacity(history.len());

    for message in history {
        match message.role {
            ChatRole::System => system.extend(system_blocks(message)),
            ChatRole::User => {
                let blocks = user_blocks(message, &profile, options);
                messages.push(WireMessage::new(WireRole::User, blocks));
            }
            ChatRole::Assistant => {
                let blocks = assistant_blocks(message, options);
                messages.push(WireMessage::new(WireRole::Assistant, blocks));
            }
        }
    }

    let mut messages = merge_consecutive(messages);
    for message in messages.iter_mut().filter(|message| message.role == WireRole::Assistant) {
        move_reasoning_first(message);
    }

    if options.reasoning_enabled {
        match options.prior_reasoning {
            Some(prior) if prior.is_replayable() => inject_reasoning(&mut messages, prior),
            Some(_) => debug!(event = "convert.reasoning.unsigned_dropped", model = %model_id),
            None => {}
        }
    }

    if is_deepseek_model(model_id) {
        for message in &mut messages {
            message.content.retain(|block| !matches!(block, ContentBlock::ReasoningContent(_)));
        }
        messages = merge_consecutive(messages);
    }

    if messages.first().is_some_and(|message| message.role == WireRole::Assistant) {
        let placeholder = ContentBlock::Text(PLACEHOLDER_USER_TEXT.to_string());
        messages.insert(0, WireMessage::new(WireRole::User, vec![placeholder]));
    }

    if options.caching_enabled && profile.supports_prompt_caching {
        if !system.is_empty() {
            system.push(SystemBlock::CachePoint(CachePointBlock::default()));
        }
        add_message_cache_points(&mut messages, &profile);
    }

    ConvertedConversation { messages, system }
}

pub fn convert_tools(
    tools: &[ToolDefinition],
    mode: ToolMode,
    profile: &CapabilityProfile,
    caching_enabled: bool,
) -> Option<ToolConfiguration> {
    if tools.is_empty() {
        return None;
    }

    let mut entries = tools
        .iter()
        .map(|tool| {
            ToolEntry::ToolSpec(ToolSpecification {
                name: tool.name.clone(),
                description: Some(tool.description.trim())
                    .filter(|text| !text.is_empty())
                    .map(str::to_string),
                input_schema: ToolInputSchema { json: normalize_schema(&tool.input_schema) },
            })
        })
        .collect::<Vec<_>>();
    if caching_enabled && profile.supports_prompt_caching {
        entries.push(ToolEntry::CachePoint(CachePointBlock::default()));
    }

    let tool_choice = match mode {
        ToolMode::None => None,
        _ if !profile.supports_tool_choice => None,
        ToolMode::Auto => Some(ToolChoice::Auto(EmptyChoice::default())),
        ToolMode::Required => Some(ToolChoice::Any(EmptyChoice::default())),
    };

    Some(ToolConfiguration { tools: entries, tool_choice })
}

fn normalize_schema(schema: &Value) -> Value {
    if schema.is_object() { schema.clone() } else { json!({"type": "object", "properties": {}}) }
}

fn system_blocks(message: &HostMessage) -> impl Iterator<Item = SystemBlock> + '_ {
    message.parts.iter().filter_map(|part| match part {
        HostPart::Text { text } if !text.trim().is_empty() => Some(SystemBlock::Text(text.clone())),
        _ => None,
    })
}

fn user_blocks(
    message: &HostMessage,
    profile: &CapabilityProfile,
    options: &ConvertOptions<'_>,
) -> Vec<ContentBlock> {
    let mut blocks = Vec::with_capacity(message.parts.len());
    for part in &message.parts {
        match part {
            HostPart::Text { text } if !text.trim().is_empty() => {
                blocks.push(ContentBlock::Text(text.clone()))
            }
            HostPart::Text { .. } => {}
            HostPart::ToolResult { call_id, content } => {
                blocks.push(tool_result_block(call_id, content, profile))
            }
            HostPart::Data { mime_type, data } => {
                if let Some(block) = data_block(mime_type, data, options) {
                    blocks.push(block);
                }
            }
            HostPart::ToolCall { name, .. } => {
                debug!(
                    event = "convert.part.skipped",
                    role = "user",
                    part = "tool_call",
                    tool = %name
                );
            }
        }
    }
    blocks
}

fn assistant_blocks(message: &HostMessage, options: &ConvertOptions<'_>) -> Vec<ContentBlock> {
    let mut blocks = Vec::with_capacity(message.parts.len());
    for part in &message.parts {
        match part {
            HostPart::Text { text } if !text.trim().is_empty() => {
                blocks.push(ContentBlock::Text(text.clone()))
            }
            HostPart::Text { .. } => {}
            HostPart::ToolCall { call_id, name, input } => {
                blocks.push(ContentBlock::ToolUse(ToolUseBlock {
                    tool_use_id: call_id.clone(),
                    name: name.clone(),
                    input: if input.is_object() { input.clone() } else { json!({}) },
                }))
            }
            HostPart::Data { mime_type, data } if mime_type == REASONING_MIME_TYPE => {
                if let Some(block) = data_block(mime_type, data, options) {
                    blocks.push(block);
                }
            }
            HostPart::Data { mime_type, .. } => {
                debug!(
                    event = "convert.part.skipped",
                    role = "assistant",
                    part = "data",
                    mime_type = %mime_type
                );
            }
            HostPart::ToolResult { call_id, .. } => {
                debug!(
                    event = "convert.part.skipped",
                    role = "assistant",
                    part = "tool_result",
                    call_id = %call_id
                );
            }
        }
    }
    blocks
}

fn data_block(
    mime_type: &str,
    data: &Value,
    options: &ConvertOptions<'_>,
) -> Option<ContentBlock> {
    if mime_type == REASONING_MIME_TYPE {
        if !options.reasoning_enabled {
            return None;
        }
        let block = serde_json::from_value::<ReasoningBlock>(data.clone()).ok()?;
        return block.is_replayable().then(|| reasoning_content(&block));
    }

    let format = mime_type.strip_prefix("image/")?;
    let format = if format == "jpg" { "jpeg" } else { format };
    let Some(bytes) = data.as_str().filter(|_| SUPPORTED_IMAGE_FORMATS.contains(&format)) else {
        debug!(event = "convert.image.unsupported", mime_type = %mime_type);
        return None;
    };
    let source = ImageSource { bytes: bytes.to_string() };
    Some(ContentBlock::Image(ImageBlock { format: format.to_string(), source }))
}

fn tool_result_block(
    call_id: &str,
    content: &[ToolResultItem],
    profile: &CapabilityProfile,
) -> ContentBlock {
    let wants_json = profile.tool_result_format == ToolResultFormat::Json;
    let mut blocks = content
        .iter()
        .map(|item| match item {
            ToolResultItem::Json { value } if wants_json && value.is_object() => {
                ToolResultContent::Json(value.clone())
            }
            ToolResultItem::Text { text } if wants_json => {
                match serde_json::from_str::<Value>(text) {
                    Ok(value @ Value::Object(_)) => ToolResultContent::Json(value),
                    _ => ToolResultContent::Text(text.clone()),
                }
            }
            other => ToolResultContent::Text(other.to_text()),
        })
        .collect::<Vec<_>>();
    if blocks.is_empty() {
        blocks.push(ToolResultContent::Text(String::new()));
    }

    let status = if profile.supports_tool_result_status {
        let stringified =
            content.iter().map(ToolResultItem::to_text).collect::<Vec<_>>().join("\n");
        looks_like_tool_error(&stringified).then_some(ToolResultStatus::Error)
    } else {
        None
    };

    ContentBlock::ToolResult(ToolResultBlock {
        tool_use_id: call_id.to_string(),
        content: blocks,
        status,
    })
}

fn reasoning_content(block: &ReasoningBlock) -> ContentBlock {
    ContentBlock::ReasoningContent(ReasoningContentBlock {
        reasoning_text: ReasoningText {
            text: block.text.clone(),
            signature: block.signature.clone(),
        },
    })
}

fn merge_consecutive(messages: Vec<WireMessage>) -> Vec<WireMessage> {
    let mut merged: Vec<WireMessage> = Vec::with_capacity(messages.len());
    for message in messages {
        if message.is_empty() {
            continue;
        }
        match merged.last_mut() {
            Some(last) if last.role == message.role => last.content.extend(message.content),
            _ => merged.push(message),
        }
    }
    merged
}

fn move_reasoning_first(message: &mut WireMessage) {
    if !message.has_reasoning() || message.starts_with_reasoning() {
        return;
    }
    let (mut reasoning, rest): (Vec<_>, Vec<_>) = std::mem::take(&mut message.content)
        .into_iter()
        .partition(|block| matches!(block, ContentBlock::ReasoningContent(_)));
    reasoning.extend(rest);
    message.content = reasoning;
}

fn inject_reasoning(messages: &mut [WireMessage], prior: &ReasoningBlock) {
    for message in messages.iter_mut().filter(|message| message.role == WireRole::Assistant) {
        if !message.has_reasoning() {
            message.content.insert(0, reasoning_content(prior));
        }
    }
}

/// Marks the last user turns of the shape the profile caches best: tool-result turns when
/// tool results are cacheable, plain turns otherwise. The other shape is used only when the
/// preferred one has no turns at all.
fn add_message_cache_points(messages: &mut [WireMessage], profile: &CapabilityProfile) {
    let (with_results, plain): (Vec<usize>, Vec<usize>) = messages
        .iter()
        .enumerate()
        .rev()
        .filter(|(_, message)| message.role == WireRole::User)
        .map(|(index, _)| index)
        .partition(|index| messages[*index].has_tool_results());
    let (preferred, fallback) = if profile.supports_caching_with_tool_results {
        (with_results, plain)
    } else {
        (plain, with_results)
    };
    let targets = if preferred.is_empty() { fallback } else { preferred };
    for index in targets.into_iter().take(MESSAGE_CACHE_POINTS) {
        messages[index]
            .content
            .push(ContentBlock::CachePoint(CachePointBlock::default()));
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use xconverse_contracts::ConverseStreamRequest;

    use super::*;

    const CLAUDE: &str = "us.anthropic.claude-3-5-haiku-20241022-v1:0";
    const NOVA: &str = "amazon.nova-pro-v1:0";
    const MISTRAL: &str = "mistral.mistral-large-2407-v1:0";
    const DEEPSEEK: &str = "us.deepseek.r1-v1:0";

    fn assert_snapshot(name: &str, actual: &str, expected: &str) {
        let actual = actual.trim();
        let expected = expected.trim();
        assert_eq!(
            actual, expected,
            "snapshot mismatch for `{name}`\n\nactual:\n{actual}\n\nexpected:\n{expected}"
        );
    }

    fn render_block(block: &ContentBlock) -> String {
        match block {
            ContentBlock::Text(text) => format!("text({text})"),
            ContentBlock::Image(image) => format!("image({})", image.format),
            ContentBlock::ToolUse(tool) => format!("tool_use({}:{})", tool.tool_use_id, tool.name),
            ContentBlock::ToolResult(result) => {
                let kind = match result.content.first() {
                    Some(ToolResultContent::Json(_)) => "json",
                    _ => "text",
                };
                let status = match result.status {
                    Some(ToolResultStatus::Error) => ",error",
                    Some(ToolResultStatus::Success) => ",success",
                    None => "",
                };
                format!("tool_result({}:{kind}{status})", result.tool_use_id)
            }
            ContentBlock::ReasoningContent(reasoning) => {
                let signature = reasoning.reasoning_text.signature.as_deref();
                format!("reasoning({})", signature.unwrap_or("-"))
            }
            ContentBlock::CachePoint(_) => "cache".to_string(),
        }
    }

    fn render(conversation: &ConvertedConversation) -> String {
        let mut lines = Vec::new();
        if !conversation.system.is_empty() {
            let system = conversation
                .system
                .iter()
                .map(|block| match block {
                    SystemBlock::Text(text) => format!("text({text})"),
                    SystemBlock::CachePoint(_) => "cache".to_string(),
                })
                .collect::<Vec<_>>();
            lines.push(format!("system: {}", system.join(" ")));
        }
        for message in &conversation.messages {
            let role = match message.role {
                WireRole::User => "user",
                WireRole::Assistant => "assistant",
            };
            let blocks = message.content.iter().map(render_block).collect::<Vec<_>>();
            lines.push(format!("{role}: {}", blocks.join(" ")));
        }
        lines.join("\n")
    }

    fn tool_result(call_id: &str, text: &str) -> HostPart {
        let content = vec![ToolResultItem::Text { text: text.to_string() }];
        HostPart::ToolResult { call_id: call_id.to_string(), content }
    }

    fn tool_call(call_id: &str, name: &str) -> HostPart {
        let input = json!({"path": "a.rs"});
        HostPart::ToolCall { call_id: call_id.to_string(), name: name.to_string(), input }
    }

    fn caching() -> ConvertOptions<'static> {
        ConvertOptions { caching_enabled: true, ..ConvertOptions::default() }
    }

    fn replaying(prior: &ReasoningBlock) -> ConvertOptions<'_> {
        ConvertOptions {
            reasoning_enabled: true,
            prior_reasoning: Some(prior),
            caching_enabled: false,
        }
    }

    fn read_tool(description: &str, input_schema: Value) -> [ToolDefinition; 1] {
        [ToolDefinition { name: "read".into(), description: description.into(), input_schema }]
    }

    fn rendered_blocks(message: &WireMessage) -> Vec<String> {
        message.content.iter().map(render_block).collect()
    }

    fn assert_well_formed(conversation: &ConvertedConversation) {
        let first = conversation.messages.first().expect("conversation must not be empty");
        assert_eq!(first.role, WireRole::User);
        for pair in conversation.messages.windows(2) {
            assert_ne!(pair[0].role, pair[1].role, "adjacent messages share a role");
        }
        assert!(conversation.messages.iter().all(|message| !message.is_empty()));
    }

    #[test]
    fn consecutive_user_messages_merge() {
        let history = [HostMessage::user("first"), HostMessage::user("second")];
        let conversation = convert(&history, CLAUDE, &ConvertOptions::default());

        assert_snapshot("merge", &render(&conversation), "user: text(first) text(second)");
    }

    #[test]
    fn blank_parts_and_empty_messages_disappear() {
        let history = [
            HostMessage::system("  "),
            HostMessage::user("question"),
            HostMessage::assistant("   "),
            HostMessage::user("again"),
            HostMessage::new(ChatRole::Assistant, vec![]),
            HostMessage::assistant("answer"),
        ];
        let conversation = convert(&history, NOVA, &ConvertOptions::default());

        assert_well_formed(&conversation);
        assert_snapshot(
            "blank",
            &render(&conversation),
            "user: text(question) text(again)\nassistant: text(answer)",
        );
    }

    #[test]
    fn leading_assistant_turn_gets_placeholder_user() {
        let history = [HostMessage::assistant("hello there"), HostMessage::user("hi")];
        let conversation = convert(&history, CLAUDE, &ConvertOptions::default());

        assert_well_formed(&conversation);
        assert_snapshot(
            "placeholder",
            &render(&conversation),
            "user: text(Continue.)\nassistant: text(hello there)\nuser: text(hi)",
        );
    }

    #[test]
    fn tool_calls_and_results_keep_encounter_order() {
        let history = [
            HostMessage::system("be terse"),
            HostMessage::user("read it"),
            HostMessage::new(
                ChatRole::Assistant,
                vec![HostPart::Text { text: "reading".into() }, tool_call("t1", "read")],
            ),
            HostMessage::new(ChatRole::User, vec![tool_result("t1", "Error: file missing")]),
        ];
        let conversation = convert(&history, CLAUDE, &ConvertOptions::default());

        assert_snapshot(
            "tools",
            &render(&conversation),
            r#"
system: text(be terse)
user: text(read it)
assistant: text(reading) tool_use(t1:read)
user: tool_result(t1:text,error)
"#,
        );
    }

    #[test]
    fn tool_result_status_requires_profile_support() {
        let history = [
            HostMessage::user("go"),
            HostMessage::new(ChatRole::Assistant, vec![tool_call("t1", "run")]),
            HostMessage::new(
                ChatRole::User,
                vec![tool_result("t1", "error while calling tool: boom")],
            ),
        ];
        let conversation = convert(&history, NOVA, &ConvertOptions::default());

        assert_snapshot(
            "nova_status",
            &render(&conversation),
            "user: text(go)\nassistant: tool_use(t1:run)\nuser: tool_result(t1:text)",
        );
    }

    #[test]
    fn json_tool_results_only_for_json_profiles_and_objects() {
        let content = vec![ToolResultItem::Json { value: json!({"rows": 3}) }];
        let history = [
            HostMessage::user("go"),
            HostMessage::new(
                ChatRole::Assistant,
                vec![tool_call("t1", "query"), tool_call("t2", "list")],
            ),
            HostMessage::new(
                ChatRole::User,
                vec![
                    HostPart::ToolResult { call_id: "t1".into(), content },
                    HostPart::ToolResult {
                        call_id: "t2".into(),
                        content: vec![ToolResultItem::Json { value: json!([1, 2]) }],
                    },
                ],
            ),
        ];

        let mistral = convert(&history, MISTRAL, &ConvertOptions::default());
        let claude = convert(&history, CLAUDE, &ConvertOptions::default());

        assert_eq!(rendered_blocks(&mistral.messages[2]), vec![
            "tool_result(t1:json)",
            "tool_result(t2:text)"
        ]);
        assert_eq!(rendered_blocks(&claude.messages[2]), vec![
            "tool_result(t1:text)",
            "tool_result(t2:text)"
        ]);
    }

    #[test]
    fn error_predicate_matches_known_shapes() {
        assert!(looks_like_tool_error("ERROR: disk full"));
        assert!(looks_like_tool_error("  error"));
        assert!(looks_like_tool_error("Result: Error while calling tool: timeout"));
        assert!(looks_like_tool_error("bash: permission denied"));
        assert!(!looks_like_tool_error("no errors found"));
        assert!(!looks_like_tool_error("42 files"));
    }

    #[test]
    fn caching_disabled_produces_no_cache_points() {
        let history = [
            HostMessage::system("rules"),
            HostMessage::user("one"),
            HostMessage::assistant("two"),
            HostMessage::user("three"),
        ];
        let tools = read_tool("", json!({}));

        for model in [CLAUDE, NOVA, MISTRAL] {
            let profile = resolve(model);
            let conversation = convert(&history, model, &ConvertOptions::default());
            let request = ConverseStreamRequest {
                messages: conversation.messages,
                system: conversation.system,
                inference_config: None,
                tool_config: convert_tools(&tools, ToolMode::Auto, &profile, false),
                additional_model_request_fields: None,
            };
            assert_eq!(request.cache_point_count(), 0, "cache points for {model}");
        }
    }

    #[test]
    fn cache_points_cover_system_tools_and_last_two_plain_users() {
        let history = [
            HostMessage::system("rules"),
            HostMessage::user("one"),
            HostMessage::assistant("a"),
            HostMessage::user("two"),
            HostMessage::assistant("b"),
            HostMessage::user("three"),
        ];
        let tools = read_tool("Read", json!({}));
        let profile = resolve(CLAUDE);
        let conversation = convert(&history, CLAUDE, &caching());
        let tool_config = convert_tools(&tools, ToolMode::Auto, &profile, true);

        assert_snapshot(
            "cache",
            &render(&conversation),
            r#"
system: text(rules) cache
user: text(one)
assistant: text(a)
user: text(two) cache
assistant: text(b)
user: text(three) cache
"#,
        );
        let request = ConverseStreamRequest {
            messages: conversation.messages,
            system: conversation.system,
            inference_config: None,
            tool_config,
            additional_model_request_fields: None,
        };
        assert_eq!(request.cache_point_count(), 4);
    }

    #[test]
    fn profiles_without_tool_result_caching_skip_tool_result_turns() {
        let history = [
            HostMessage::user("one"),
            HostMessage::new(ChatRole::Assistant, vec![tool_call("t1", "read")]),
            HostMessage::new(ChatRole::User, vec![tool_result("t1", "ok")]),
            HostMessage::assistant("done"),
            HostMessage::user("two"),
        ];
        let conversation = convert(&history, NOVA, &caching());

        assert_snapshot(
            "nova_cache",
            &render(&conversation),
            r#"
user: text(one) cache
assistant: tool_use(t1:read)
user: tool_result(t1:text)
assistant: text(done)
user: text(two) cache
"#,
        );
    }

    #[test]
    fn tool_result_caching_profiles_prefer_tool_result_turns() {
        let history = [
            HostMessage::user("start"),
            HostMessage::new(ChatRole::Assistant, vec![tool_call("t1", "read")]),
            HostMessage::new(ChatRole::User, vec![tool_result("t1", "ok")]),
            HostMessage::new(ChatRole::Assistant, vec![tool_call("t2", "read")]),
            HostMessage::new(ChatRole::User, vec![tool_result("t2", "ok")]),
            HostMessage::assistant("done"),
            HostMessage::user("next question"),
        ];
        let conversation = convert(&history, CLAUDE, &caching());

        assert_snapshot(
            "claude_tool_result_cache",
            &render(&conversation),
            r#"
user: text(start)
assistant: tool_use(t1:read)
user: tool_result(t1:text) cache
assistant: tool_use(t2:read)
user: tool_result(t2:text) cache
assistant: text(done)
user: text(next question)
"#,
        );
    }

    #[test]
    fn signed_prior_reasoning_is_injected_into_every_assistant_turn() {
        let prior = ReasoningBlock { text: "plan".into(), signature: Some("sig-1".into()) };
        let history = [
            HostMessage::user("q1"),
            HostMessage::assistant("a1"),
            HostMessage::user("q2"),
            HostMessage::assistant("a2"),
            HostMessage::user("q3"),
        ];
        let conversation = convert(&history, CLAUDE, &replaying(&prior));

        assert_snapshot(
            "reasoning",
            &render(&conversation),
            r#"
user: text(q1)
assistant: reasoning(sig-1) text(a1)
user: text(q2)
assistant: reasoning(sig-1) text(a2)
user: text(q3)
"#,
        );
    }

    #[test]
    fn unsigned_prior_reasoning_is_dropped() {
        let prior = ReasoningBlock { text: "plan".into(), signature: None };
        let history =
            [HostMessage::user("q1"), HostMessage::assistant("a1"), HostMessage::user("q2")];
        let conversation = convert(&history, CLAUDE, &replaying(&prior));

        assert!(conversation.messages.iter().all(|message| !message.has_reasoning()));
    }

    #[test]
    fn reasoning_data_parts_lead_their_assistant_turn() {
        let stored = json!({"text": "earlier", "signature": "sig-0"});
        let history = [
            HostMessage::user("q1"),
            HostMessage::new(
                ChatRole::Assistant,
                vec![
                    HostPart::Text { text: "a1".into() },
                    HostPart::Data { mime_type: REASONING_MIME_TYPE.into(), data: stored },
                ],
            ),
            HostMessage::user("q2"),
        ];
        let enabled = ConvertOptions { reasoning_enabled: true, ..ConvertOptions::default() };

        let with_reasoning = convert(&history, CLAUDE, &enabled);
        let without = convert(&history, CLAUDE, &ConvertOptions::default());

        assert_eq!(render_block(&with_reasoning.messages[1].content[0]), "reasoning(sig-0)");
        assert_eq!(rendered_blocks(&without.messages[1]), vec!["text(a1)"]);
    }

    #[test]
    fn deepseek_strips_reasoning_and_remerges() {
        let prior = ReasoningBlock { text: "plan".into(), signature: Some("sig".into()) };
        let stored = json!({"text": "only thought", "signature": "sig-0"});
        let history = [
            HostMessage::user("q1"),
            HostMessage::new(
                ChatRole::Assistant,
                vec![HostPart::Data { mime_type: REASONING_MIME_TYPE.into(), data: stored }],
            ),
            HostMessage::user("q2"),
            HostMessage::assistant("a2"),
        ];
        let conversation = convert(&history, DEEPSEEK, &replaying(&prior));

        assert_well_formed(&conversation);
        assert_snapshot(
            "deepseek",
            &render(&conversation),
            "user: text(q1) text(q2)\nassistant: text(a2)",
        );
    }

    #[test]
    fn image_parts_become_image_blocks_for_users() {
        let history = [HostMessage::new(
            ChatRole::User,
            vec![
                HostPart::Text { text: "what is this".into() },
                HostPart::Data { mime_type: "image/png".into(), data: json!("aGVsbG8=") },
                HostPart::Data { mime_type: "image/tiff".into(), data: json!("aGVsbG8=") },
                HostPart::Data { mime_type: "image/jpg".into(), data: json!("aGVsbG8=") },
            ],
        )];
        let conversation = convert(&history, CLAUDE, &ConvertOptions::default());

        assert_snapshot(
            "images",
            &render(&conversation),
            "user: text(what is this) image(png) image(jpeg)",
        );
    }

    #[test]
    fn conversions_never_produce_adjacent_roles() {
        let roles = [ChatRole::User, ChatRole::Assistant, ChatRole::System];
        for seed in 0u32..64 {
            let history = (0..6)
                .map(|step| {
                    let role = roles[((seed >> (step % 5)) as usize + step) % roles.len()];
                    let blank = (seed + step as u32) % 4 == 0;
                    let text = if blank { " ".to_string() } else { format!("m{step}") };
                    HostMessage::text(role, text)
                })
                .collect::<Vec<_>>();
            let conversation = convert(&history, CLAUDE, &caching());
            if conversation.messages.is_empty() {
                continue;
            }
            assert_well_formed(&conversation);
        }
    }

    #[test]
    fn tool_choice_follows_mode_and_profile() {
        let tools = read_tool(" ", Value::Null);
        let claude = resolve(CLAUDE);
        let mistral = resolve(MISTRAL);
        let configure = |mode: ToolMode, profile: &CapabilityProfile, caching: bool| {
            convert_tools(&tools, mode, profile, caching).expect("tools must convert")
        };

        let auto = configure(ToolMode::Auto, &claude, false);
        let required = configure(ToolMode::Required, &claude, false);
        let none = configure(ToolMode::None, &claude, false);
        let unsupported = configure(ToolMode::Required, &mistral, true);

        assert_eq!(auto.tool_choice, Some(ToolChoice::Auto(EmptyChoice::default())));
        assert_eq!(required.tool_choice, Some(ToolChoice::Any(EmptyChoice::default())));
        assert_eq!(none.tool_choice, None);
        assert_eq!(unsupported.tool_choice, None);
        assert_eq!(unsupported.cache_point_count(), 0);
        assert_eq!(
            serde_json::to_value(&auto.tools[0]).expect("tool must serialize"),
            json!({"toolSpec": {
                "name": "read",
                "inputSchema": {"json": {"type": "object", "properties": {}}}
            }})
        );
        assert_eq!(convert_tools(&[], ToolMode::Auto, &claude, true), None);
    }
}
