mod clients;
mod eventstream;

pub use clients::{BedrockHttpClient, MockBackendClient};
