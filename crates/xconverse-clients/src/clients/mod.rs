pub(crate) mod bedrock;
pub(crate) mod mock;

pub use bedrock::BedrockHttpClient;
pub use mock::MockBackendClient;
