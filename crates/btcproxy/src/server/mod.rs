mod auth;
mod error;
mod rpc;

use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::{Json, Router};
use eyre::WrapErr;
use serde_json::Value;
use tower_http::cors::{AllowOrigin, CorsLayer};

use btcproxy_core::rpc::{HttpRpcClient, LazyRpcClient, RpcMethod};
use btcproxy_core::CoreError;

/// Request bodies above this size are rejected before parsing.
const RPC_BODY_LIMIT: usize = 1024 * 1024;

// ==============================================================================
// Forwarding Seam
// ==============================================================================

/// Sends an already-validated method and its params to the node, returning
/// the raw `result`.
#[async_trait]
pub trait RpcForwarder: Send + Sync {
    async fn forward(&self, method: RpcMethod, params: Vec<Value>) -> Result<Value, CoreError>;
}

#[async_trait]
impl RpcForwarder for LazyRpcClient<HttpRpcClient> {
    async fn forward(&self, method: RpcMethod, params: Vec<Value>) -> Result<Value, CoreError> {
        self.client().await?.call(method, params).await
    }
}

// ==============================================================================
// Application State
// ==============================================================================

pub struct AppState {
    pub rpc: Arc<dyn RpcForwarder>,
    pub api_token: String,
}

type SharedState = Arc<AppState>;

// ==============================================================================
// Router
// ==============================================================================

pub fn build_router(state: AppState, origin: &str) -> eyre::Result<Router> {
    // Only reflect the allowed origin when the request's Origin header
    // actually matches. Otherwise, omit the header entirely so browsers
    // get a clean CORS rejection instead of a mismatched origin value.
    let allowed: axum::http::HeaderValue = origin
        .parse()
        .wrap_err_with(|| format!("invalid origin `{origin}`"))?;
    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::predicate({
            let allowed = allowed.clone();
            move |request_origin: &axum::http::HeaderValue, _| *request_origin == allowed
        }))
        .allow_methods([
            axum::http::Method::GET,
            axum::http::Method::POST,
            axum::http::Method::OPTIONS,
        ])
        .allow_headers([
            axum::http::header::CONTENT_TYPE,
            axum::http::header::HeaderName::from_static(auth::API_TOKEN_HEADER),
        ]);

    let shared = Arc::new(state);

    let public_api = Router::new()
        .route("/api/v1/health", get(health))
        .route("/api/v1/methods", get(methods));

    let protected_api = Router::new()
        .route("/", post(rpc::forward))
        .route("/api/v1/rpc", post(rpc::forward))
        .layer(DefaultBodyLimit::max(RPC_BODY_LIMIT));

    Ok(Router::new()
        .merge(public_api)
        .merge(protected_api)
        .fallback(not_found)
        .layer(cors)
        .with_state(shared))
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn methods() -> Json<Vec<&'static str>> {
    Json(RpcMethod::ALL.iter().map(|method| method.as_str()).collect())
}

async fn not_found() -> error::AppError {
    error::AppError::NotFound("route not found".to_string())
}
