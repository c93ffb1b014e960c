use std::collections::HashMap;

use async_trait::async_trait;
use bitcoin::address::NetworkUnchecked;
use bitcoin::hashes::Hash;
use bitcoin::{Address, BlockHash, OutPoint, Transaction, Txid};

use crate::error::CoreError;

use super::types::{BlockHeaderInfo, ChainInfo, MempoolInfo, NetworkInfo, TxOutInfo};
use super::BitcoinRpc;

/// A mock Bitcoin RPC backend for testing. Returns canned data populated via
/// the builder pattern; unknown lookups behave like an empty node.
pub struct MockRpc {
    chain_info: ChainInfo,
    blocks: Vec<BlockHash>,
    headers: HashMap<BlockHash, BlockHeaderInfo>,
    transactions: HashMap<Txid, Transaction>,
    utxos: HashMap<OutPoint, TxOutInfo>,
    mempool: Vec<Txid>,
    new_address: Option<Address<NetworkUnchecked>>,
}

impl MockRpc {
    pub fn builder() -> MockRpcBuilder {
        MockRpcBuilder {
            rpc: MockRpc {
                chain_info: ChainInfo {
                    chain: "regtest".into(),
                    blocks: 0,
                    headers: 0,
                    best_block_hash: BlockHash::all_zeros(),
                    pruned: false,
                },
                blocks: vec![BlockHash::all_zeros()],
                headers: HashMap::new(),
                transactions: HashMap::new(),
                utxos: HashMap::new(),
                mempool: Vec::new(),
                new_address: None,
            },
        }
    }
}

pub struct MockRpcBuilder {
    rpc: MockRpc,
}

impl MockRpcBuilder {
    pub fn with_chain_info(mut self, info: ChainInfo) -> Self {
        self.rpc.chain_info = info;
        self
    }

    /// Append a block to the active chain; height is its position.
    pub fn with_block(mut self, hash: BlockHash) -> Self {
        self.rpc.blocks.push(hash);
        self
    }

    pub fn with_header(mut self, header: BlockHeaderInfo) -> Self {
        self.rpc.headers.insert(header.hash, header);
        self
    }

    pub fn with_tx(mut self, tx: Transaction) -> Self {
        self.rpc.transactions.insert(tx.compute_txid(), tx);
        self
    }

    pub fn with_utxo(mut self, outpoint: OutPoint, info: TxOutInfo) -> Self {
        self.rpc.utxos.insert(outpoint, info);
        self
    }

    pub fn with_mempool_tx(mut self, txid: Txid) -> Self {
        self.rpc.mempool.push(txid);
        self
    }

    pub fn with_new_address(mut self, address: Address<NetworkUnchecked>) -> Self {
        self.rpc.new_address = Some(address);
        self
    }

    pub fn build(self) -> MockRpc {
        self.rpc
    }
}

fn unsupported(method: &str) -> CoreError {
    CoreError::InvalidData(format!("mock rpc has no canned {method} data"))
}

#[async_trait]
impl BitcoinRpc for MockRpc {
    async fn get_blockchain_info(&self) -> Result<ChainInfo, CoreError> {
        Ok(self.chain_info.clone())
    }

    async fn get_network_info(&self) -> Result<NetworkInfo, CoreError> {
        Ok(NetworkInfo {
            version: 270000,
            subversion: "/Satoshi:27.0.0/".into(),
            protocol_version: 70016,
            connections: 0,
        })
    }

    async fn get_block_count(&self) -> Result<u64, CoreError> {
        Ok(self.blocks.len() as u64 - 1)
    }

    async fn get_best_block_hash(&self) -> Result<BlockHash, CoreError> {
        self.blocks
            .last()
            .copied()
            .ok_or_else(|| unsupported("getbestblockhash"))
    }

    async fn get_block_hash(&self, height: u64) -> Result<BlockHash, CoreError> {
        usize::try_from(height)
            .ok()
            .and_then(|h| self.blocks.get(h))
            .copied()
            .ok_or_else(|| {
                CoreError::Rpc(crate::error::RpcError::ServerError {
                    code: -8,
                    message: "Block height out of range".into(),
                })
            })
    }

    async fn get_block_header(&self, hash: &BlockHash) -> Result<BlockHeaderInfo, CoreError> {
        self.headers
            .get(hash)
            .cloned()
            .ok_or_else(|| unsupported("getblockheader"))
    }

    async fn get_raw_transaction(&self, txid: &Txid) -> Result<Transaction, CoreError> {
        self.transactions
            .get(txid)
            .cloned()
            .ok_or(CoreError::TxNotFound(*txid))
    }

    async fn get_tx_out(&self, txid: &Txid, vout: u32) -> Result<Option<TxOutInfo>, CoreError> {
        Ok(self.utxos.get(&OutPoint::new(*txid, vout)).cloned())
    }

    async fn get_mempool_info(&self) -> Result<MempoolInfo, CoreError> {
        Ok(MempoolInfo {
            loaded: true,
            size: self.mempool.len() as u64,
            bytes: 0,
            usage: 0,
            max_mempool: 300_000_000,
            mempool_min_fee: bitcoin::Amount::from_sat(1_000),
        })
    }

    async fn get_raw_mempool(&self) -> Result<Vec<Txid>, CoreError> {
        Ok(self.mempool.clone())
    }

    async fn send_raw_transaction(&self, tx: &Transaction) -> Result<Txid, CoreError> {
        Ok(tx.compute_txid())
    }

    async fn get_new_address(
        &self,
        _label: Option<&str>,
    ) -> Result<Address<NetworkUnchecked>, CoreError> {
        self.new_address
            .clone()
            .ok_or_else(|| unsupported("getnewaddress"))
    }

    async fn generate_to_address(
        &self,
        blocks: u64,
        _address: &Address,
    ) -> Result<Vec<BlockHash>, CoreError> {
        Ok((0..blocks)
            .map(|i| {
                let mut bytes = [0u8; 32];
                bytes[..8].copy_from_slice(&i.to_le_bytes());
                BlockHash::from_byte_array(bytes)
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::txid_from_byte;

    #[tokio::test]
    async fn with_chain_info_overrides_defaults() {
        let custom_info = ChainInfo {
            chain: "main".into(),
            blocks: 800_000,
            headers: 800_000,
            best_block_hash: BlockHash::all_zeros(),
            pruned: true,
        };
        let rpc = MockRpc::builder().with_chain_info(custom_info).build();
        let info = rpc.get_blockchain_info().await.unwrap();
        assert_eq!(info.chain, "main");
        assert_eq!(info.blocks, 800_000);
        assert!(info.pruned);
    }

    #[tokio::test]
    async fn block_hash_out_of_range_is_server_error() {
        let tip = BlockHash::from_byte_array([1; 32]);
        let rpc = MockRpc::builder().with_block(tip).build();
        assert_eq!(rpc.get_block_count().await.unwrap(), 1);
        assert_eq!(rpc.get_block_hash(1).await.unwrap(), tip);
        assert_eq!(rpc.get_best_block_hash().await.unwrap(), tip);
        assert!(rpc.get_block_hash(2).await.is_err());
    }

    #[tokio::test]
    async fn default_get_tx_outs_preserves_order_and_gaps() {
        let txid = txid_from_byte(1);
        let info = TxOutInfo {
            best_block: BlockHash::all_zeros(),
            confirmations: 1,
            value: bitcoin::Amount::from_sat(5000),
            script_pub_key: bitcoin::ScriptBuf::new(),
            address: None,
            coinbase: false,
        };
        let rpc = MockRpc::builder()
            .with_utxo(OutPoint::new(txid, 0), info.clone())
            .build();

        let outpoints = vec![
            OutPoint::new(txid, 99), // does not exist
            OutPoint::new(txid, 0),
        ];
        let results = rpc.get_tx_outs(&outpoints).await.unwrap();
        assert_eq!(results, vec![None, Some(info)]);
    }
}
