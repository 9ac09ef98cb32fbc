use std::convert::Infallible;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{
    body::Body,
    extract::{rejection::QueryRejection, FromRequest, Query, Request, State},
    http::{
        header::{AUTHORIZATION, CACHE_CONTROL, CONTENT_TYPE},
        HeaderMap, HeaderValue,
    },
    middleware::{self, Next},
    response::Response,
    routing::{get, post},
    Json, Router,
};
use futures_util::StreamExt;
use serde::{Deserialize, Serialize};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::{
    config::GatewayConfig,
    error::GatewayError,
    models::{ChatRequest, ChatResponse, InspireRequest, InspireRole, SuggestionsResponse},
    prompts,
    registry::ProviderRegistry,
    relay::{self, RelayStream},
    telemetry,
};

/**
 * \brief 处理请求时共享的只读状态。
 */
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<GatewayConfig>,
    pub registry: Arc<ProviderRegistry>,
}

impl AppState {
    pub fn new(config: GatewayConfig, registry: ProviderRegistry) -> Self {
        Self {
            config: Arc::new(config),
            registry: Arc::new(registry),
        }
    }
}

/**
 * \brief 请求体 JSON 提取器，解析失败统一返回 400 与 detail。
 */
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(GatewayError))]
pub struct ApiJson<T>(pub T);

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: &'static str,
    pub default_provider: String,
    pub providers: Vec<&'static str>,
    /** \brief 流式转发中被丢弃的异常上游 chunk 数 */
    pub skipped_chunks: u64,
}

#[derive(Deserialize, Debug)]
struct SuggestionsQuery {
    role: String,
}

/**
 * \brief 构建全部路由；除 /health 外均经过 API Key 校验。
 */
pub fn router(state: AppState) -> Router {
    let protected = Router::new()
        .route("/v1/chat", post(chat))
        .route("/v1/chat/stream", post(chat_stream))
        .route("/v1/assistant/suggestions", get(suggestions))
        .route("/v1/assistant/inspire", post(inspire))
        .route("/v1/assistant/inspire/stream", post(inspire_stream))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_api_key));

    Router::new()
        .route("/health", get(health))
        .merge(protected)
        .with_state(state)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

/**
 * \brief 启动网关 HTTP 服务，Ctrl-C 时优雅退出。
 */
pub async fn run(config: GatewayConfig) -> Result<()> {
    let addr = config.listen_addr();
    let registry = ProviderRegistry::from_config(&config).context("build provider registry")?;
    let app = router(AppState::new(config, registry));

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("bind {}", addr))?;
    tracing::info!("Server listening on http://{}", addr);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for shutdown signal: {}", err);
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received");
}

/**
 * \brief 取出调用方提供的 Key：优先 X-API-Key，其次 `Authorization: Bearer <key>`。
 */
fn provided_api_key(headers: &HeaderMap) -> Option<&str> {
    let from_header = headers
        .get("x-api-key")
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty());
    from_header.or_else(|| {
        headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .map(str::trim)
    })
}

/**
 * \brief 校验入站 API Key；未配置时不启用鉴权，便于本地开发。
 */
pub fn authorize(expected: Option<&str>, headers: &HeaderMap) -> Result<(), GatewayError> {
    let Some(expected) = expected else {
        return Ok(());
    };
    match provided_api_key(headers) {
        Some(provided) if provided == expected => Ok(()),
        _ => Err(GatewayError::Unauthorized("无效的 API Key".to_string())),
    }
}

async fn require_api_key(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, GatewayError> {
    authorize(state.config.inbound_api_key.as_deref(), request.headers())?;
    Ok(next.run(request).await)
}

/**
 * \brief 以 text/event-stream 逐帧转发，不做缓冲。
 */
fn sse_response(frames: RelayStream) -> Response {
    let body = Body::from_stream(frames.map(Ok::<_, Infallible>));
    let mut resp = Response::new(body);
    let headers = resp.headers_mut();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("text/event-stream"));
    headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    headers.insert("x-accel-buffering", HeaderValue::from_static("no"));
    resp
}

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        default_provider: state.registry.default_name().to_string(),
        providers: state.registry.names(),
        skipped_chunks: state.registry.skipped_chunks(),
    })
}

/**
 * \brief 一次性对话：POST /v1/chat
 */
async fn chat(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<ChatRequest>,
) -> Result<Json<ChatResponse>, GatewayError> {
    req.validate()?;
    let provider = state.registry.resolve(req.provider.as_deref())?;
    telemetry::log_llm_request(
        "chat",
        provider.name(),
        req.model.as_deref(),
        &req.messages,
        state.config.debug_log_truncate,
    );
    Ok(Json(provider.chat(&req).await?))
}

/**
 * \brief 流式对话：POST /v1/chat/stream
 */
async fn chat_stream(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<ChatRequest>,
) -> Result<Response, GatewayError> {
    req.validate()?;
    let provider = state.registry.resolve(req.provider.as_deref())?;
    telemetry::log_llm_request(
        "chat.stream",
        provider.name(),
        req.model.as_deref(),
        &req.messages,
        state.config.debug_log_truncate,
    );
    Ok(sse_response(relay::establish(provider.as_ref(), &req).await))
}

async fn suggestions(
    query: Result<Query<SuggestionsQuery>, QueryRejection>,
) -> Result<Json<SuggestionsResponse>, GatewayError> {
    let Query(q) = query?;
    let role = InspireRole::parse(&q.role)
        .ok_or_else(|| GatewayError::BadRequest(format!("不支持的 role: {}", q.role)))?;
    Ok(Json(SuggestionsResponse {
        role,
        suggestions: prompts::suggestions(role)
            .iter()
            .map(|s| s.to_string())
            .collect(),
    }))
}

/**
 * \brief 灵感助手（领域模板）：POST /v1/assistant/inspire
 */
async fn inspire(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<InspireRequest>,
) -> Result<Json<ChatResponse>, GatewayError> {
    req.validate()?;
    let provider = state.registry.resolve(req.provider.as_deref())?;
    let messages = prompts::build_inspire_messages(&req, &state.config.persona)?;
    telemetry::log_llm_request(
        "inspire",
        provider.name(),
        req.model.as_deref(),
        &messages,
        state.config.debug_log_truncate,
    );
    let chat_req = req.to_chat_request(messages);
    Ok(Json(provider.chat(&chat_req).await?))
}

async fn inspire_stream(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<InspireRequest>,
) -> Result<Response, GatewayError> {
    req.validate()?;
    let provider = state.registry.resolve(req.provider.as_deref())?;
    let messages = prompts::build_inspire_messages(&req, &state.config.persona)?;
    telemetry::log_llm_request(
        "inspire.stream",
        provider.name(),
        req.model.as_deref(),
        &messages,
        state.config.debug_log_truncate,
    );
    let chat_req = req.to_chat_request(messages);
    Ok(sse_response(relay::establish(provider.as_ref(), &chat_req).await))
}
