use bitcoin::Txid;
use reqwest::StatusCode;

/// Failures talking to the daemon, kept apart from local configuration and
/// decoding errors so callers can tell "node said no" from "we sent garbage".
#[derive(Debug, thiserror::Error)]
pub enum RpcError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("server error {code}: {message}")]
    ServerError { code: i64, message: String },

    #[error("rpc endpoint rejected credentials (HTTP {0})")]
    Unauthorized(StatusCode),

    #[error("invalid JSON-RPC response: {0}")]
    InvalidResponse(String),

    #[error("batch response is missing item with id {id}")]
    MissingBatchItem { id: u64 },
}

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("RPC communication failure: {0}")]
    Rpc(#[from] RpcError),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("config parse error at line {line}: {message}")]
    ConfParse { line: usize, message: String },

    #[error("invalid rpc data: {0}")]
    InvalidData(String),

    #[error("transaction not found: {0}")]
    TxNotFound(Txid),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
