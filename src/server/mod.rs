//! HTTP surface: OpenAI-compatible proxy endpoints and shared state.
//!
//! Thin plumbing around the routing core. Inbound chat bodies are kept as
//! raw JSON and forwarded with only `model` and `stream` rewritten, so
//! unknown fields round-trip untouched.

use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    Json, Router,
    body::{Body, Bytes},
    extract::State,
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use tokio::sync::RwLock;
use tower_http::trace::TraceLayer;

use crate::api::{ChatMessage, ErrorResponse};
use crate::backend::{BackendClient, ModelListFetcher};
use crate::config::RouterConfig;
use crate::error::BackendError;
use crate::registry::{ModelRegistry, SharedRegistry, Tier};
use crate::routing::route_request;

pub const MODEL_HEADER: &str = "x-smart-router-model";
pub const TIER_HEADER: &str = "x-smart-router-tier";

/// Shared state owned by the HTTP server.
///
/// Config and backend client are replaced wholesale on reload; the
/// registry is an atomically-swapped snapshot.
pub struct AppState {
    config_path: PathBuf,
    config: RwLock<Arc<RouterConfig>>,
    backend: RwLock<Arc<BackendClient>>,
    pub registry: SharedRegistry,
}

impl AppState {
    pub fn new(config: RouterConfig, config_path: PathBuf) -> Self {
        let backend = BackendClient::new(&config.connection);
        Self {
            config_path,
            config: RwLock::new(Arc::new(config)),
            backend: RwLock::new(Arc::new(backend)),
            registry: SharedRegistry::new(),
        }
    }

    pub async fn config(&self) -> Arc<RouterConfig> {
        self.config.read().await.clone()
    }

    pub async fn backend(&self) -> Arc<BackendClient> {
        self.backend.read().await.clone()
    }

    /// Re-read the config file and swap in the result (last-write-wins,
    /// no partial merge). The backend client follows the new connection
    /// settings.
    pub async fn reload_config(&self) -> Arc<RouterConfig> {
        let config = Arc::new(RouterConfig::load(&self.config_path));
        *self.backend.write().await = Arc::new(BackendClient::new(&config.connection));
        *self.config.write().await = config.clone();
        config
    }

    /// Refresh the model registry from the backend, gated by the config
    /// TTL unless forced.
    ///
    /// The config file is re-read on every real refresh so filter and
    /// override edits apply without a restart. A failed listing keeps the
    /// previous snapshot when it has models (stale-but-available) and is
    /// an error only when there is nothing to serve.
    pub async fn refresh_registry(&self, force: bool) -> Result<Arc<ModelRegistry>, BackendError> {
        let ttl = self.config().await.routing.model_cache_ttl;
        let snapshot = self.registry.snapshot().await;
        if !force && snapshot.is_fresh(ttl) {
            return Ok(snapshot);
        }

        let _guard = self.registry.refresh_guard().await;
        let snapshot = self.registry.snapshot().await;
        if !force && snapshot.is_fresh(self.config().await.routing.model_cache_ttl) {
            return Ok(snapshot);
        }

        match self.backend().await.fetch_model_ids().await {
            Ok(ids) => {
                let config = self.reload_config().await;
                let registry = ModelRegistry::build(&ids, &config);
                tracing::info!(
                    total = registry.len(),
                    small = registry.by_tier(Tier::Small).len(),
                    medium = registry.by_tier(Tier::Medium).len(),
                    large = registry.by_tier(Tier::Large).len(),
                    "registry refreshed"
                );
                Ok(self.registry.publish(registry).await)
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to refresh models from backend");
                if snapshot.is_empty() {
                    Err(e)
                } else {
                    Ok(snapshot)
                }
            }
        }
    }
}

/// Build the axum application.
pub fn app(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/v1/models", get(models_handler))
        .route("/v1/chat/completions", post(chat_completions_handler))
        .route("/admin/reload", post(admin_reload_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

type ErrorReply = (StatusCode, Json<ErrorResponse>);

fn error_reply(status: StatusCode, message: impl Into<String>, error_type: &str) -> ErrorReply {
    (status, Json(ErrorResponse::new(message, error_type)))
}

async fn health_handler(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    let registry = state.registry.snapshot().await;
    Json(serde_json::json!({
        "status": "ok",
        "models_loaded": registry.len(),
    }))
}

/// Expose the single virtual aggregate model.
async fn models_handler(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    if let Err(e) = state.refresh_registry(false).await {
        tracing::warn!(error = %e, "model refresh failed while listing");
    }
    let config = state.config().await;
    Json(serde_json::json!({
        "object": "list",
        "data": [{
            "id": config.server.model_name,
            "object": "model",
            "created": 0,
            "owned_by": "smart-router",
        }],
    }))
}

/// Reload configuration and force-refresh the registry.
async fn admin_reload_handler(
    State(state): State<Arc<AppState>>,
) -> Result<Json<serde_json::Value>, ErrorReply> {
    let registry = state.refresh_registry(true).await.map_err(|e| {
        error_reply(
            StatusCode::SERVICE_UNAVAILABLE,
            format!("reload failed: {e}"),
            "server_error",
        )
    })?;
    let config = state.config().await;

    let models_by_tier: serde_json::Map<String, serde_json::Value> = Tier::ALL
        .iter()
        .map(|tier| {
            let ids: Vec<&str> = registry.by_tier(*tier).iter().map(|m| m.id.as_str()).collect();
            (tier.as_str().to_string(), serde_json::json!(ids))
        })
        .collect();

    Ok(Json(serde_json::json!({
        "status": "reloaded",
        "model_name": config.server.model_name,
        "active_models": registry.len(),
        "models_by_tier": models_by_tier,
    })))
}

async fn chat_completions_handler(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Response, Response> {
    let mut payload: serde_json::Value = serde_json::from_slice(&body).map_err(|e| {
        error_reply(
            StatusCode::BAD_REQUEST,
            format!("Invalid JSON body: {e}"),
            "invalid_request_error",
        )
        .into_response()
    })?;

    let messages: Vec<ChatMessage> = payload
        .get("messages")
        .cloned()
        .map(serde_json::from_value)
        .transpose()
        .map_err(|e| {
            error_reply(
                StatusCode::BAD_REQUEST,
                format!("Invalid messages: {e}"),
                "invalid_request_error",
            )
            .into_response()
        })?
        .unwrap_or_default();
    if messages.is_empty() {
        return Err(error_reply(
            StatusCode::BAD_REQUEST,
            "messages is required",
            "invalid_request_error",
        )
        .into_response());
    }

    let tools = payload.get("tools").and_then(|t| t.as_array()).cloned();
    let requested_model = payload
        .get("model")
        .and_then(|m| m.as_str())
        .map(str::to_string);
    let stream = payload
        .get("stream")
        .and_then(|s| s.as_bool())
        .unwrap_or(false);

    let registry = state.refresh_registry(false).await.map_err(|_| {
        error_reply(
            StatusCode::SERVICE_UNAVAILABLE,
            "No models available for routing",
            "server_error",
        )
        .into_response()
    })?;

    let config = state.config().await;
    let backend = state.backend().await;
    let (model, decision) = route_request(
        &messages,
        tools.as_deref(),
        requested_model.as_deref(),
        &registry,
        &backend,
        &config,
    )
    .await
    .map_err(|e| {
        error_reply(StatusCode::SERVICE_UNAVAILABLE, e.to_string(), "server_error").into_response()
    })?;

    // Forward the body unchanged apart from the fields the router owns.
    payload["model"] = serde_json::json!(model.id);
    payload["stream"] = serde_json::json!(stream);

    let model_header = HeaderValue::from_str(&model.id)
        .unwrap_or_else(|_| HeaderValue::from_static("invalid-model-id"));
    let tier_header = HeaderValue::from_str(decision.tier_header())
        .unwrap_or_else(|_| HeaderValue::from_static(""));

    if stream {
        let upstream = backend
            .stream_completion(&payload)
            .await
            .map_err(upstream_error_response)?;

        let mut response = Response::builder()
            .status(StatusCode::OK)
            .header(header::CONTENT_TYPE, "text/event-stream")
            .body(Body::from_stream(upstream.bytes_stream()))
            .map_err(|e| {
                error_reply(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    e.to_string(),
                    "server_error",
                )
                .into_response()
            })?;
        response.headers_mut().insert(MODEL_HEADER, model_header);
        response.headers_mut().insert(TIER_HEADER, tier_header);
        return Ok(response);
    }

    let mut result = backend
        .proxy_completion(&payload)
        .await
        .map_err(upstream_error_response)?;
    result["_routing"] = serde_json::to_value(&decision).unwrap_or_default();

    let mut response = (StatusCode::OK, Json(result)).into_response();
    response.headers_mut().insert(MODEL_HEADER, model_header);
    response.headers_mut().insert(TIER_HEADER, tier_header);
    Ok(response)
}

/// Map a backend failure during proxying.
///
/// Upstream HTTP errors pass through with their status and body; transport
/// failures become 502.
fn upstream_error_response(err: BackendError) -> Response {
    match err {
        BackendError::Status { status, body } => {
            let status =
                StatusCode::from_u16(status).unwrap_or(StatusCode::BAD_GATEWAY);
            Response::builder()
                .status(status)
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body))
                .unwrap_or_else(|_| status.into_response())
        }
        other => error_reply(StatusCode::BAD_GATEWAY, other.to_string(), "server_error")
            .into_response(),
    }
}
