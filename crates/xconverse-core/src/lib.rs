pub mod backend;
pub mod convert;
pub mod error;
pub mod limits;
pub mod profile;
pub mod request;
pub mod routing;
pub mod session;
pub mod stream;
pub mod tool_buffer;

pub use backend::{BackendClient, EventStream, ProfileKind, ProgressSink};
pub use convert::{ConvertOptions, ConvertedConversation, convert, convert_tools};
pub use error::CoreError;
pub use limits::{TokenLimits, effective_input_limit, limits_for};
pub use profile::{CapabilityProfile, ToolResultFormat, base_model_id, resolve as resolve_profile};
pub use request::{
    FeatureToggles, MIN_REASONING_BUDGET, OutputBudget, build_request, estimate_input_tokens,
};
pub use routing::{ModelResolver, RegionRouting, region_routing};
pub use session::{ChatSession, SessionEvent, TurnInput};
pub use stream::{StreamFailure, StreamProcessor, StreamReport};
pub use tool_buffer::{ToolCall, ToolCallBuffer};
