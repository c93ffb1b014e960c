//! Shared test helpers for `btcproxy-core` unit tests.
//!
//! Provides a tiny in-process JSON-RPC node (`spawn_stub_node`) so the HTTP
//! client can be exercised end to end without a real `bitcoind`, plus a few
//! builders for dummy data.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use bitcoin::hashes::Hash;
use bitcoin::Txid;
use serde_json::{json, Value};

use crate::config::RpcConfig;

// ==============================================================================
// Txid Helpers
// ==============================================================================

/// Create a deterministic `Txid` from a single distinguishing byte.
pub fn txid_from_byte(b: u8) -> Txid {
    let mut bytes = [0u8; 32];
    bytes[0] = b;
    Txid::from_byte_array(bytes)
}

// ==============================================================================
// Stub Node
// ==============================================================================

pub enum StubReply {
    Ok(Value),
    Err(i64, String),
    /// Answer the whole HTTP request with a bare status and no body, the
    /// way `bitcoind` rejects a client outside `rpcallowip`.
    Status(StatusCode),
}

type Responder = Arc<dyn Fn(&str, &[Value]) -> StubReply + Send + Sync>;

#[derive(Default)]
struct CallLog {
    calls: Vec<(String, Vec<Value>)>,
    batch_sizes: Vec<usize>,
}

#[derive(Clone)]
struct StubState {
    responder: Responder,
    expected_auth: Option<String>,
    log: Arc<Mutex<CallLog>>,
}

pub struct StubNode {
    pub addr: SocketAddr,
    log: Arc<Mutex<CallLog>>,
}

impl StubNode {
    /// Method names in the order the node saw them.
    pub fn methods(&self) -> Vec<String> {
        let log = self.log.lock().expect("stub log lock");
        log.calls.iter().map(|(method, _)| method.clone()).collect()
    }

    pub fn params(&self) -> Vec<Vec<Value>> {
        let log = self.log.lock().expect("stub log lock");
        log.calls.iter().map(|(_, params)| params.clone()).collect()
    }

    /// Sizes of the batch envelopes received, largest first.
    pub fn batch_sizes(&self) -> Vec<usize> {
        let mut sizes = self.log.lock().expect("stub log lock").batch_sizes.clone();
        // Chunks are sent concurrently; sort so assertions are deterministic.
        sizes.sort_unstable_by(|a, b| b.cmp(a));
        sizes
    }
}

/// Config pointing at `stub` with a short timeout.
pub fn config_for(stub: &StubNode) -> RpcConfig {
    RpcConfig {
        host: stub.addr.ip().to_string(),
        port: stub.addr.port(),
        timeout: Duration::from_secs(5),
        ..RpcConfig::default()
    }
}

/// Start a JSON-RPC node on an ephemeral local port.
///
/// With `auth` set, requests without matching basic-auth credentials get a
/// bare `401`, the way `bitcoind` answers. Batch replies are returned in
/// reverse order so callers must match them up by id.
pub async fn spawn_stub_node<F>(auth: Option<(&str, &str)>, responder: F) -> StubNode
where
    F: Fn(&str, &[Value]) -> StubReply + Send + Sync + 'static,
{
    let expected_auth = auth.map(|(user, pass)| basic_auth_header(user, pass));
    let log = Arc::new(Mutex::new(CallLog::default()));
    let state = StubState {
        responder: Arc::new(responder),
        expected_auth,
        log: Arc::clone(&log),
    };

    let router = Router::new().route("/", post(handle)).with_state(state);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("stub listener must bind");
    let addr = listener.local_addr().expect("stub listener must have addr");
    tokio::spawn(async move {
        let _ = axum::serve(listener, router).await;
    });

    StubNode { addr, log }
}

// Let reqwest do the base64 work so the stub checks exactly what the client
// would send.
fn basic_auth_header(user: &str, pass: &str) -> String {
    let request = reqwest::Client::new()
        .post("http://127.0.0.1/")
        .basic_auth(user, Some(pass))
        .build()
        .expect("static request must build");
    request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .expect("basic auth header must be set")
        .to_owned()
}

async fn handle(
    State(state): State<StubState>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    if let Some(expected) = &state.expected_auth {
        let got = headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok());
        if got != Some(expected.as_str()) {
            return StatusCode::UNAUTHORIZED.into_response();
        }
    }

    match body {
        Value::Array(items) => {
            state
                .log
                .lock()
                .expect("stub log lock")
                .batch_sizes
                .push(items.len());
            let replies: Result<Vec<Value>, StatusCode> =
                items.iter().rev().map(|item| reply(&state, item)).collect();
            match replies {
                Ok(replies) => Json(Value::Array(replies)).into_response(),
                Err(status) => status.into_response(),
            }
        }
        single => match reply(&state, &single) {
            Ok(reply) => Json(reply).into_response(),
            Err(status) => status.into_response(),
        },
    }
}

fn reply(state: &StubState, request: &Value) -> Result<Value, StatusCode> {
    let method = request
        .get("method")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_owned();
    let params = request
        .get("params")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();
    let id = request.get("id").cloned().unwrap_or(Value::Null);

    state
        .log
        .lock()
        .expect("stub log lock")
        .calls
        .push((method.clone(), params.clone()));

    match (state.responder)(&method, &params) {
        StubReply::Ok(result) => {
            Ok(json!({ "jsonrpc": "2.0", "id": id, "result": result, "error": null }))
        }
        StubReply::Err(code, message) => Ok(json!({
            "jsonrpc": "2.0",
            "id": id,
            "result": null,
            "error": { "code": code, "message": message }
        })),
        StubReply::Status(status) => Err(status),
    }
}
