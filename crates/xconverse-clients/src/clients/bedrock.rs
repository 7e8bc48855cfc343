use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode, Url};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value, json};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use xconverse_contracts::{ConverseStreamRequest, FoundationModelSummary, InferenceProfileSummary};
use xconverse_core::{
    BackendClient, CoreError, EventStream, ProfileKind, profile::split_routing_prefix,
};

use crate::eventstream::decode_events;

const EVENTSTREAM_CONTENT_TYPE: &str = "application/vnd.amazon.eventstream";

pub struct BedrockHttpClient {
    region: String,
    control_base_url: String,
    runtime_base_url: String,
    api_key: Option<String>,
    http_client: Option<Client>,
}

impl BedrockHttpClient {
    pub fn build_http_client(timeout_seconds: u64) -> Option<Client> {
        Client::builder().timeout(Duration::from_secs(timeout_seconds)).build().ok()
    }

    pub fn default_control_base_url(region: &str) -> String {
        format!("https://bedrock.{region}.amazonaws.com")
    }

    pub fn default_runtime_base_url(region: &str) -> String {
        format!("https://bedrock-runtime.{region}.amazonaws.com")
    }

    pub fn new(
        region: String,
        control_base_url: Option<String>,
        runtime_base_url: Option<String>,
        api_key: Option<String>,
        http_client: Option<Client>,
    ) -> Self {
        let control_base_url = control_base_url
            .filter(|url| !url.trim().is_empty())
            .unwrap_or_else(|| Self::default_control_base_url(&region));
        let runtime_base_url = runtime_base_url
            .filter(|url| !url.trim().is_empty())
            .unwrap_or_else(|| Self::default_runtime_base_url(&region));
        Self { region, control_base_url, runtime_base_url, api_key, http_client }
    }

    fn client(&self) -> Result<&Client, CoreError> {
        self.http_client
            .as_ref()
            .ok_or_else(|| CoreError::Backend("backend client init failed".to_string()))
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match self.api_key.as_deref().filter(|key| !key.trim().is_empty()) {
            Some(api_key) => request.bearer_auth(api_key),
            None => request,
        }
    }

    async fn send(
        &self,
        request: RequestBuilder,
        cancel: &CancellationToken,
    ) -> Result<Response, CoreError> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(CoreError::Cancelled),
            response = self.authorize(request).send() => {
                response.map_err(|err| CoreError::Backend(format!("backend request failed: {err}")))
            }
        }
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        url: Url,
        cancel: &CancellationToken,
    ) -> Result<T, CoreError> {
        let response = self.send(self.client()?.get(url), cancel).await?;
        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }
        response.json::<T>().await.map_err(parse_failed)
    }

    async fn profile_access(
        &self,
        model_id: &str,
        cancel: &CancellationToken,
    ) -> Result<bool, CoreError> {
        let url = endpoint(&self.control_base_url, &["inference-profiles", model_id])?;
        let response = self.send(self.client()?.get(url), cancel).await?;
        if is_denied(response.status()) {
            return Ok(false);
        }
        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }
        let profile = response.json::<InferenceProfileSummary>().await.map_err(parse_failed)?;
        Ok(profile.is_active())
    }

    async fn model_access(
        &self,
        model_id: &str,
        cancel: &CancellationToken,
    ) -> Result<bool, CoreError> {
        let url = endpoint(&self.control_base_url, &["foundation-model-availability", model_id])?;
        let response = self.send(self.client()?.get(url), cancel).await?;
        if is_denied(response.status()) {
            return Ok(false);
        }
        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }
        let availability = response.json::<ModelAvailability>().await.map_err(parse_failed)?;
        Ok(availability.is_available())
    }
}

#[async_trait]
impl BackendClient for BedrockHttpClient {
    fn region(&self) -> &str {
        &self.region
    }

    async fn list_foundation_models(
        &self,
        cancel: &CancellationToken,
    ) -> Result<Vec<FoundationModelSummary>, CoreError> {
        let url = endpoint(&self.control_base_url, &["foundation-models"])?;
        let page = self.get_json::<FoundationModelsPage>(url, cancel).await?;
        info!(
            event = "backend.catalog.listed",
            region = %self.region,
            models = page.model_summaries.len()
        );
        Ok(page.model_summaries)
    }

    async fn list_inference_profiles(
        &self,
        kind: ProfileKind,
        cancel: &CancellationToken,
    ) -> Result<Vec<InferenceProfileSummary>, CoreError> {
        let mut profiles = Vec::new();
        let mut next_token: Option<String> = None;
        loop {
            let mut url = endpoint(&self.control_base_url, &["inference-profiles"])?;
            url.query_pairs_mut().append_pair("typeEquals", kind.as_query_value());
            if let Some(token) = next_token.as_deref() {
                url.query_pairs_mut().append_pair("nextToken", token);
            }
            let page = self.get_json::<InferenceProfilesPage>(url, cancel).await?;
            profiles.extend(page.inference_profile_summaries);
            match page.next_token.filter(|token| !token.is_empty()) {
                Some(token) => next_token = Some(token),
                None => break,
            }
        }
        debug!(
            event = "backend.profiles.listed",
            kind = kind.as_query_value(),
            profiles = profiles.len()
        );
        Ok(profiles)
    }

    async fn check_access(
        &self,
        model_id: &str,
        cancel: &CancellationToken,
    ) -> Result<bool, CoreError> {
        let is_profile = model_id.starts_with("arn:") || split_routing_prefix(model_id).0.is_some();
        let allowed = if is_profile {
            self.profile_access(model_id, cancel).await?
        } else {
            self.model_access(model_id, cancel).await?
        };
        if !allowed {
            debug!(event = "backend.access.denied", model_id = %model_id);
        }
        Ok(allowed)
    }

    async fn open_stream(
        &self,
        model_id: &str,
        request: &ConverseStreamRequest,
        cancel: &CancellationToken,
    ) -> Result<EventStream, CoreError> {
        let url = endpoint(&self.runtime_base_url, &["model", model_id, "converse-stream"])?;
        let builder =
            self.client()?.post(url).header("Accept", EVENTSTREAM_CONTENT_TYPE).json(request);
        let response = self.send(builder, cancel).await?;
        if !response.status().is_success() {
            let error = error_from_response(response).await;
            warn!(event = "backend.stream.rejected", model_id = %model_id, error = %error);
            return Err(error);
        }
        info!(
            event = "backend.stream.opened",
            model_id = %model_id,
            messages = request.messages.len(),
            tools = request.tool_config.as_ref().map_or(0, |config| config.tools.len())
        );
        Ok(decode_events(response.bytes_stream()))
    }

    async fn count_tokens(
        &self,
        model_id: &str,
        request: &ConverseStreamRequest,
        cancel: &CancellationToken,
    ) -> Result<Option<u32>, CoreError> {
        let url = endpoint(&self.runtime_base_url, &["model", model_id, "count-tokens"])?;
        let builder = self.client()?.post(url).json(&count_tokens_payload(request));
        let response = self.send(builder, cancel).await?;
        if response.status().is_client_error() {
            debug!(
                event = "backend.tokens.unsupported",
                model_id = %model_id,
                status = response.status().as_u16()
            );
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }
        let counted = response.json::<CountTokensResponse>().await.map_err(parse_failed)?;
        Ok(Some(counted.input_tokens))
    }
}

/// Appends each segment percent-encoded, so ids containing `:` or `/` stay one segment.
fn endpoint(base_url: &str, segments: &[&str]) -> Result<Url, CoreError> {
    let mut url = Url::parse(base_url.trim_end_matches('/'))
        .map_err(|err| CoreError::Backend(format!("invalid backend base url {base_url}: {err}")))?;
    url.path_segments_mut()
        .map_err(|_| {
            CoreError::Backend(format!("backend base url cannot carry a path: {base_url}"))
        })?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

fn parse_failed(err: reqwest::Error) -> CoreError {
    CoreError::Backend(format!("backend response parse failed: {err}"))
}

fn is_denied(status: StatusCode) -> bool {
    status == StatusCode::FORBIDDEN || status == StatusCode::NOT_FOUND
}

async fn error_from_response(response: Response) -> CoreError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<Value>(&body)
        .ok()
        .and_then(|value| {
            value
                .get("message")
                .or_else(|| value.get("Message"))
                .and_then(Value::as_str)
                .map(str::to_string)
        })
        .unwrap_or(body);
    CoreError::classify_backend(format!("backend returned {status}: {message}"))
}

fn count_tokens_payload(request: &ConverseStreamRequest) -> Value {
    let mut converse = Map::new();
    converse.insert("messages".to_string(), json!(request.messages));
    if !request.system.is_empty() {
        converse.insert("system".to_string(), json!(request.system));
    }
    json!({ "input": { "converse": Value::Object(converse) } })
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FoundationModelsPage {
    #[serde(default)]
    model_summaries: Vec<FoundationModelSummary>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InferenceProfilesPage {
    #[serde(default)]
    inference_profile_summaries: Vec<InferenceProfileSummary>,
    #[serde(default)]
    next_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ModelAvailability {
    #[serde(default)]
    authorization_status: Option<String>,
    #[serde(default)]
    entitlement_availability: Option<String>,
    #[serde(default)]
    region_availability: Option<String>,
}

impl ModelAvailability {
    fn is_available(&self) -> bool {
        let matches = |value: &Option<String>, wanted: &str| {
            value.as_deref().is_none_or(|value| value.eq_ignore_ascii_case(wanted))
        };
        matches(&self.authorization_status, "AUTHORIZED")
            && matches(&self.entitlement_availability, "AVAILABLE")
            && matches(&self.region_availability, "AVAILABLE")
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CountTokensResponse {
    input_tokens: u32,
}
