//! Native JSON-RPC client for Bitcoin Core compatible endpoints.
//!
//! Implements [`BitcoinRpc`](super::BitcoinRpc) over JSON-RPC using
//! `reqwest`, with optional request rate limiting, single and batched calls,
//! basic auth, and an LRU block-header cache.

mod client;
mod connection;
mod parsing;
mod protocol;

pub use client::HttpRpcClient;
