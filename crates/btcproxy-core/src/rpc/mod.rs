//! Bitcoin Core RPC abstraction layer.
//!
//! Defines the [`BitcoinRpc`] trait, the enumerated method set it covers
//! ([`RpcMethod`]), an HTTP JSON-RPC implementation ([`HttpRpcClient`]), a
//! wrapper that defers building it until first use ([`LazyRpcClient`]), and a
//! test mock (`mock::MockRpc`).

mod http_adapter;
mod lazy;
mod method;
#[cfg(test)]
pub mod mock;
pub mod types;

pub use http_adapter::HttpRpcClient;
pub use lazy::LazyRpcClient;
pub use method::{RpcMethod, UnknownMethod};
pub use types::{BlockHeaderInfo, ChainInfo, MempoolInfo, NetworkInfo, TxOutInfo};

use async_trait::async_trait;
use bitcoin::address::NetworkUnchecked;
use bitcoin::{Address, BlockHash, OutPoint, Transaction, Txid};

use crate::error::CoreError;

/// Typed surface over the Bitcoin Core RPC methods in [`RpcMethod`].
///
/// Implementations are expected to handle authentication, connection
/// management, and response deserialization internally.
#[async_trait]
pub trait BitcoinRpc: Send + Sync {
    /// Fetch basic chain info (network, block count, pruning status).
    async fn get_blockchain_info(&self) -> Result<ChainInfo, CoreError>;

    async fn get_network_info(&self) -> Result<NetworkInfo, CoreError>;

    async fn get_block_count(&self) -> Result<u64, CoreError>;

    async fn get_best_block_hash(&self) -> Result<BlockHash, CoreError>;

    /// Hash of the block at `height` in the active chain.
    async fn get_block_hash(&self, height: u64) -> Result<BlockHash, CoreError>;

    async fn get_block_header(&self, hash: &BlockHash) -> Result<BlockHeaderInfo, CoreError>;

    /// Fetch and consensus-decode a transaction. Confirmed transactions
    /// outside the mempool need `-txindex` on the node.
    async fn get_raw_transaction(&self, txid: &Txid) -> Result<Transaction, CoreError>;

    /// Fetch a specific unspent output, including mempool spends.
    /// Returns `None` if the output has been spent or does not exist.
    async fn get_tx_out(&self, txid: &Txid, vout: u32) -> Result<Option<TxOutInfo>, CoreError>;

    /// Fetch many outpoints efficiently. Implementations may batch these
    /// requests into a single HTTP JSON-RPC call.
    async fn get_tx_outs(
        &self,
        outpoints: &[OutPoint],
    ) -> Result<Vec<Option<TxOutInfo>>, CoreError> {
        let mut results = Vec::with_capacity(outpoints.len());
        for outpoint in outpoints {
            results.push(self.get_tx_out(&outpoint.txid, outpoint.vout).await?);
        }
        Ok(results)
    }

    async fn get_mempool_info(&self) -> Result<MempoolInfo, CoreError>;

    async fn get_raw_mempool(&self) -> Result<Vec<Txid>, CoreError>;

    /// Broadcast a transaction, returning its txid.
    async fn send_raw_transaction(&self, tx: &Transaction) -> Result<Txid, CoreError>;

    /// Ask the node's default wallet for a fresh receiving address.
    async fn get_new_address(
        &self,
        label: Option<&str>,
    ) -> Result<Address<NetworkUnchecked>, CoreError>;

    /// Mine `blocks` blocks paying to `address` (regtest only).
    async fn generate_to_address(
        &self,
        blocks: u64,
        address: &Address,
    ) -> Result<Vec<BlockHash>, CoreError>;
}
