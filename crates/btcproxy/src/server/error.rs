use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

use btcproxy_core::{CoreError, RpcError};

// ==============================================================================
// HTTP-level Errors
// ==============================================================================

/// Failures that never reach the JSON-RPC layer (bad token, unparseable
/// body, unknown route).
pub(crate) enum AppError {
    BadRequest(String),
    Unauthorized(String),
    NotFound(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            Self::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg),
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
        };

        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

// ==============================================================================
// JSON-RPC Errors
// ==============================================================================

pub(super) const METHOD_NOT_FOUND: i64 = -32601;
pub(super) const INVALID_PARAMS: i64 = -32602;
pub(super) const INTERNAL_ERROR: i64 = -32603;

/// Map a forwarding failure to a JSON-RPC `(code, message)` pair.
///
/// Errors reported by the node keep their code and message so callers see
/// exactly what `bitcoind` said.
pub(super) fn map_core_error(err: &CoreError) -> (i64, String) {
    match err {
        CoreError::Rpc(RpcError::ServerError { code, message }) => (*code, message.clone()),
        CoreError::Rpc(RpcError::Unauthorized(status)) => (
            INTERNAL_ERROR,
            format!("upstream node rejected the configured credentials (HTTP {status})"),
        ),
        CoreError::Rpc(RpcError::Transport(err)) => {
            (INTERNAL_ERROR, format!("upstream node unreachable: {err}"))
        }
        other => (INTERNAL_ERROR, other.to_string()),
    }
}
