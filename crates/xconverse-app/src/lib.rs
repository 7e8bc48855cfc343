use std::{collections::HashMap, convert::Infallible, sync::Arc};

use axum::{
    Json, Router,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response, Sse, sse::Event},
    routing::{get, post},
};
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::sync::{Mutex, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};
use utoipa::{IntoParams, OpenApi, ToSchema};
use utoipa_swagger_ui::SwaggerUi;
use xconverse_clients::{BedrockHttpClient, MockBackendClient};
use xconverse_contracts::{
    ChatRequest, ChatRole, HostMessage, HostPart, ModelEntry, ModelList, ProgressPart, RouteKind,
    TokenCountRequest, TokenCountResponse, TokenUsage, ToolDefinition, ToolMode, ToolResultItem,
    TurnSummary,
};
use xconverse_core::{
    BackendClient, ChatSession, CoreError, FeatureToggles, ModelResolver, SessionEvent, TurnInput,
};

pub mod config;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
struct HealthResponse {
    status: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
struct ErrorResponse {
    error: String,
    kind: String,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
struct ModelsQuery {
    /// Re-run model resolution instead of serving the cached list.
    #[serde(default)]
    refresh: bool,
}

#[derive(OpenApi)]
#[openapi(
    paths(get_health, get_models, post_chat, post_token_count),
    components(
        schemas(
            HealthResponse,
            ErrorResponse,
            ModelList,
            ModelEntry,
            RouteKind,
            ChatRequest,
            ChatRole,
            HostMessage,
            HostPart,
            ToolDefinition,
            ToolMode,
            ToolResultItem,
            ProgressPart,
            TurnSummary,
            TokenUsage,
            TokenCountRequest,
            TokenCountResponse
        )
    ),
    tags(
        (name = "xconverse-app", description = "xconverse chat API")
    )
)]
struct ApiDoc;

#[derive(Clone)]
pub struct AppState {
    backend: Arc<dyn BackendClient>,
    toggles: FeatureToggles,
    resolver: Arc<ModelResolver>,
    models: Arc<RwLock<Option<Vec<ModelEntry>>>>,
    /// Only sessions the caller named; anonymous turns never land here.
    sessions: Arc<Mutex<HashMap<String, Arc<ChatSession>>>>,
}

impl AppState {
    pub fn from_config(config: &config::AppConfig) -> Self {
        let backend: Arc<dyn BackendClient> = match config.backend {
            config::BackendKind::Bedrock => Arc::new(BedrockHttpClient::new(
                config.region.clone(),
                config.control_base_url.clone(),
                config.runtime_base_url.clone(),
                config.api_key.clone(),
                BedrockHttpClient::build_http_client(config.provider_timeout_seconds),
            )),
            config::BackendKind::Mock => Arc::new(MockBackendClient::new(config.region.clone())),
        };
        Self::new(backend, config.toggles)
    }

    pub fn new(backend: Arc<dyn BackendClient>, toggles: FeatureToggles) -> Self {
        let resolver =
            ModelResolver::new(Arc::clone(&backend)).with_extended_context(toggles.context_1m);
        Self {
            backend,
            toggles,
            resolver: Arc::new(resolver),
            models: Arc::new(RwLock::new(None)),
            sessions: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    async fn models(
        &self,
        refresh: bool,
        cancel: &CancellationToken,
    ) -> Result<Vec<ModelEntry>, CoreError> {
        if !refresh && let Some(models) = self.models.read().await.as_ref() {
            return Ok(models.clone());
        }
        let models = self.resolver.resolve(cancel).await?;
        *self.models.write().await = Some(models.clone());
        Ok(models)
    }

    async fn new_session(&self, id: String, cancel: &CancellationToken) -> Arc<ChatSession> {
        let session = Arc::new(ChatSession::new(id, Arc::clone(&self.backend), self.toggles));
        match self.models(false, cancel).await {
            Ok(models) => session.set_models(models).await,
            Err(error) => warn!(event = "app.models.unavailable", error = %error),
        }
        session
    }

    /// Returns the session for `id`, creating and registering it on first use. Without an id
    /// the turn gets a throwaway session.
    async fn session(&self, id: Option<&str>, cancel: &CancellationToken) -> Arc<ChatSession> {
        let Some(id) = id.map(str::trim).filter(|id| !id.is_empty()).map(str::to_string) else {
            return self.new_session(uuid::Uuid::new_v4().to_string(), cancel).await;
        };
        if let Some(session) = self.sessions.lock().await.get(&id) {
            return Arc::clone(session);
        }
        let session = self.new_session(id.clone(), cancel).await;
        let mut sessions = self.sessions.lock().await;
        Arc::clone(sessions.entry(id).or_insert(session))
    }
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(get_health))
        .route("/api/v1/models", get(get_models))
        .route("/api/v1/chat", post(post_chat))
        .route("/api/v1/tokens/count", post(post_token_count))
        .with_state(state)
        .merge(SwaggerUi::new("/docs").url("/openapi.json", ApiDoc::openapi()))
}

#[utoipa::path(
    get,
    path = "/health",
    responses((status = 200, description = "Service health", body = HealthResponse)),
    tag = "xconverse-app"
)]
async fn get_health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "healthy".to_string() })
}

#[utoipa::path(
    get,
    path = "/api/v1/models",
    params(ModelsQuery),
    responses(
        (
            status = 200,
            description = "Models the caller can invoke, one route each",
            body = ModelList
        ),
        (status = 502, description = "Model catalog unavailable", body = ErrorResponse)
    ),
    tag = "xconverse-app"
)]
#[instrument(skip(state, query), fields(refresh = query.refresh))]
async fn get_models(State(state): State<AppState>, Query(query): Query<ModelsQuery>) -> Response {
    let cancel = CancellationToken::new();
    let _guard = cancel.clone().drop_guard();
    match state.models(query.refresh, &cancel).await {
        Ok(models) => Json(ModelList { models }).into_response(),
        Err(err) => error_response(err),
    }
}

#[utoipa::path(
    post,
    path = "/api/v1/chat",
    request_body = ChatRequest,
    responses(
        (
            status = 200,
            description = "SSE stream of `part` events followed by `done` or `error`",
            content_type = "text/event-stream"
        ),
        (status = 400, description = "Validation error", body = ErrorResponse)
    ),
    tag = "xconverse-app"
)]
#[instrument(
    skip(state, request),
    fields(model = %request.model, session_id = ?request.session_id)
)]
async fn post_chat(State(state): State<AppState>, Json(request): Json<ChatRequest>) -> Response {
    let turn = TurnInput {
        model: request.model,
        messages: request.messages,
        tools: request.tools,
        tool_mode: request.tool_mode,
    };
    if let Err(err) = turn.validate() {
        return error_response(err);
    }

    let cancel = CancellationToken::new();
    let session = state.session(request.session_id.as_deref(), &cancel).await;
    info!(event = "app.chat.accepted", session_id = %session.id(), messages = turn.messages.len());

    // Dropping the response stream (client gone) cancels the turn.
    let guard = cancel.clone().drop_guard();
    let stream = session.respond_stream(turn, cancel).map(move |event| {
        let _ = &guard;
        Ok::<Event, Infallible>(match event {
            SessionEvent::Part(part) => {
                Event::default().event("part").data(json!(part).to_string())
            }
            SessionEvent::Done(summary) => {
                Event::default().event("done").data(json!(summary).to_string())
            }
            SessionEvent::Failed(error) => Event::default().event("error").data(
                json!({
                    "error": error.to_string(),
                    "kind": error.kind(),
                    "status": status_for(&error).as_u16()
                })
                .to_string(),
            ),
        })
    });
    Sse::new(stream).into_response()
}

#[utoipa::path(
    post,
    path = "/api/v1/tokens/count",
    request_body = TokenCountRequest,
    responses(
        (
            status = 200,
            description = "Input token count, exact or estimated",
            body = TokenCountResponse
        ),
        (status = 400, description = "Validation error", body = ErrorResponse)
    ),
    tag = "xconverse-app"
)]
#[instrument(skip(state, request), fields(model = %request.model))]
async fn post_token_count(
    State(state): State<AppState>,
    Json(request): Json<TokenCountRequest>,
) -> Response {
    let cancel = CancellationToken::new();
    let _guard = cancel.clone().drop_guard();
    let session = state.new_session(format!("tokens-{}", uuid::Uuid::new_v4()), &cancel).await;
    match session.count_tokens(&request.model, request.messages, &cancel).await {
        Ok(count) => Json(count).into_response(),
        Err(err) => error_response(err),
    }
}

fn status_for(err: &CoreError) -> StatusCode {
    match err {
        CoreError::Validation(_) => StatusCode::BAD_REQUEST,
        CoreError::ContextOverflow(_) => StatusCode::PAYLOAD_TOO_LARGE,
        CoreError::ReasoningBudgetExhausted
        | CoreError::ContentFiltered
        | CoreError::EmptyResponse { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        CoreError::Backend(_) | CoreError::Catalog(_) => StatusCode::BAD_GATEWAY,
        CoreError::Cancelled => StatusCode::SERVICE_UNAVAILABLE,
    }
}

fn error_response(err: CoreError) -> Response {
    let body = ErrorResponse { error: err.to_string(), kind: err.kind().to_string() };
    (status_for(&err), Json(body)).into_response()
}
