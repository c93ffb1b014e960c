use axum::body::Bytes;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, warn};

use btcproxy_core::rpc::RpcMethod;

use super::auth::check_auth;
use super::error::{map_core_error, AppError, INVALID_PARAMS, METHOD_NOT_FOUND};
use super::SharedState;

#[derive(Deserialize)]
struct ForwardRequest {
    #[serde(default)]
    id: Value,
    method: String,
    #[serde(default)]
    params: Value,
}

fn rpc_result(id: Value, result: Value) -> Json<Value> {
    Json(json!({ "jsonrpc": "2.0", "id": id, "result": result }))
}

fn rpc_error(id: Value, code: i64, message: String) -> Json<Value> {
    Json(json!({
        "jsonrpc": "2.0",
        "id": id,
        "error": { "code": code, "message": message }
    }))
}

/// Forward one JSON-RPC request to the node.
///
/// The token is checked before the body is parsed. Only methods in
/// [`RpcMethod`] are forwarded and only positional params are accepted.
pub(super) async fn forward(
    State(state): State<SharedState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>, AppError> {
    check_auth(&state.api_token, &headers)?;

    let body: Value = serde_json::from_slice(&body)
        .map_err(|e| AppError::BadRequest(format!("invalid JSON-RPC request: {e}")))?;
    if !body.is_object() {
        return Err(AppError::BadRequest(
            "invalid JSON-RPC request: expected a single request object".to_owned(),
        ));
    }
    let request: ForwardRequest = serde_json::from_value(body)
        .map_err(|e| AppError::BadRequest(format!("invalid JSON-RPC request: {e}")))?;
    let id = request.id;

    let method = match request.method.parse::<RpcMethod>() {
        Ok(method) => method,
        Err(err) => {
            debug!(rpc.method = %request.method, "rejected method outside allowlist");
            return Ok(rpc_error(id, METHOD_NOT_FOUND, err.to_string()));
        }
    };

    let params = match request.params {
        Value::Null => Vec::new(),
        Value::Array(items) => items,
        _ => {
            return Ok(rpc_error(
                id,
                INVALID_PARAMS,
                "params must be a positional array".to_owned(),
            ));
        }
    };

    match state.rpc.forward(method, params).await {
        Ok(result) => Ok(rpc_result(id, result)),
        Err(err) => {
            warn!(rpc.method = method.as_str(), error = %err, "forwarded call failed");
            let (code, message) = map_core_error(&err);
            Ok(rpc_error(id, code, message))
        }
    }
}
