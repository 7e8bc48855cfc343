use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use xconverse_contracts::{
    ConverseStreamRequest, CustomDeployment, FoundationModelSummary, InferenceProfileSummary,
    ProgressPart, StreamEvent,
};

use crate::error::CoreError;

pub type EventStream = Pin<Box<dyn Stream<Item = Result<StreamEvent, CoreError>> + Send>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProfileKind {
    SystemDefined,
    Application,
}

impl ProfileKind {
    pub fn as_query_value(self) -> &'static str {
        match self {
            Self::SystemDefined => "SYSTEM_DEFINED",
            Self::Application => "APPLICATION",
        }
    }
}

#[async_trait]
pub trait BackendClient: Send + Sync {
    fn region(&self) -> &str;

    async fn list_foundation_models(
        &self,
        cancel: &CancellationToken,
    ) -> Result<Vec<FoundationModelSummary>, CoreError>;

    async fn list_inference_profiles(
        &self,
        kind: ProfileKind,
        cancel: &CancellationToken,
    ) -> Result<Vec<InferenceProfileSummary>, CoreError>;

    /// Custom deployments offered alongside catalog models.
    async fn list_custom_deployments(
        &self,
        cancel: &CancellationToken,
    ) -> Result<Vec<CustomDeployment>, CoreError> {
        let profiles = self.list_inference_profiles(ProfileKind::Application, cancel).await?;
        Ok(profiles
            .iter()
            .filter(|profile| profile.is_active())
            .map(CustomDeployment::from)
            .collect())
    }

    /// `Ok(false)` means the caller may not invoke `model_id`.
    async fn check_access(
        &self,
        model_id: &str,
        cancel: &CancellationToken,
    ) -> Result<bool, CoreError>;

    async fn open_stream(
        &self,
        model_id: &str,
        request: &ConverseStreamRequest,
        cancel: &CancellationToken,
    ) -> Result<EventStream, CoreError>;

    async fn count_tokens(
        &self,
        _model_id: &str,
        _request: &ConverseStreamRequest,
        _cancel: &CancellationToken,
    ) -> Result<Option<u32>, CoreError> {
        Ok(None)
    }
}

#[async_trait]
pub trait ProgressSink: Send {
    /// Returns `false` once the consumer is gone.
    async fn report(&mut self, part: ProgressPart) -> bool;
}

#[async_trait]
impl ProgressSink for mpsc::Sender<ProgressPart> {
    async fn report(&mut self, part: ProgressPart) -> bool {
        self.send(part).await.is_ok()
    }
}

#[async_trait]
impl ProgressSink for Vec<ProgressPart> {
    async fn report(&mut self, part: ProgressPart) -> bool {
        self.push(part);
        true
    }
}
