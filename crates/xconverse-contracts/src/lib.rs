mod api;
mod catalog;
mod events;
mod host;
mod wire;

pub use api::{ChatRequest, TokenCountRequest, TokenCountResponse, TurnSummary};
pub use catalog::{
    CustomDeployment, FoundationModelSummary, InferenceProfileSummary, ModelEntry, ModelLifecycle,
    ModelList, ProfileModel, RouteKind,
};
pub use events::{
    BlockDelta, BlockStart, ReasoningSegment, StopReason, StreamEvent, StreamMetadata, TokenUsage,
};
pub use host::{
    ChatRole, HostMessage, HostPart, ProgressPart, REASONING_MIME_TYPE, ReasoningBlock,
    ToolDefinition, ToolMode, ToolResultItem,
};
pub use wire::{
    CachePointBlock, CachePointType, ContentBlock, ConverseStreamRequest, EmptyChoice, ImageBlock,
    ImageSource, InferenceConfiguration, ReasoningContentBlock, ReasoningText,
    SystemBlock, ToolChoice, ToolConfiguration, ToolEntry, ToolInputSchema, ToolResultBlock,
    ToolResultContent, ToolResultStatus, ToolSpecification, ToolUseBlock, WireMessage, WireRole,
};
