//! Typed results of the enumerated RPC methods.
//!
//! Only the fields callers actually use are modelled; everything else the
//! daemon returns is ignored during deserialization.

use bitcoin::{Amount, BlockHash, ScriptBuf, TxMerkleNode};
use serde::{Deserialize, Serialize};

// ==============================================================================
// Chain / Network Info
// ==============================================================================

/// Basic chain information from `getblockchaininfo`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainInfo {
    pub chain: String,
    pub blocks: u64,
    #[serde(default)]
    pub headers: u64,
    #[serde(rename = "bestblockhash")]
    pub best_block_hash: BlockHash,
    pub pruned: bool,
}

/// Node version and peer count from `getnetworkinfo`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkInfo {
    pub version: u64,
    pub subversion: String,
    #[serde(rename = "protocolversion")]
    pub protocol_version: u64,
    pub connections: u64,
}

// ==============================================================================
// Blocks
// ==============================================================================

/// Result of `getblockheader <hash> true`.
///
/// Only fields that are fixed for a given block hash are kept, so a decoded
/// header can be cached indefinitely. `confirmations` and `nextblockhash`
/// move with the tip and are not included.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockHeaderInfo {
    pub hash: BlockHash,
    pub height: u32,
    pub version: i32,
    #[serde(rename = "merkleroot")]
    pub merkle_root: TxMerkleNode,
    pub time: u64,
    #[serde(rename = "mediantime", default)]
    pub median_time: u64,
    pub nonce: u32,
    pub bits: String,
    pub difficulty: f64,
    #[serde(rename = "previousblockhash", default)]
    pub previous_block_hash: Option<BlockHash>,
}

// ==============================================================================
// UTXOs
// ==============================================================================

/// An unspent output as reported by `gettxout`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TxOutInfo {
    pub best_block: BlockHash,
    pub confirmations: u64,
    #[serde(with = "bitcoin::amount::serde::as_btc")]
    pub value: Amount,
    pub script_pub_key: ScriptBuf,
    pub address: Option<String>,
    pub coinbase: bool,
}

// ==============================================================================
// Mempool
// ==============================================================================

/// Result of `getmempoolinfo`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MempoolInfo {
    #[serde(default)]
    pub loaded: bool,
    pub size: u64,
    pub bytes: u64,
    pub usage: u64,
    #[serde(rename = "maxmempool")]
    pub max_mempool: u64,
    /// Minimum fee rate in BTC/kvB for a transaction to be accepted.
    #[serde(rename = "mempoolminfee", with = "bitcoin::amount::serde::as_btc")]
    pub mempool_min_fee: Amount,
}
