//! Typed Bitcoin Core JSON-RPC client.
//!
//! Connection parameters live in an explicit [`RpcConfig`]; the HTTP client
//! behind [`rpc::LazyRpcClient`] is only built on first use.

pub mod config;
pub mod error;
pub mod rpc;

pub use config::RpcConfig;
pub use error::{CoreError, RpcError};

#[cfg(test)]
mod test_util;
