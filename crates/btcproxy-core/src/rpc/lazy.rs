use async_trait::async_trait;
use bitcoin::address::NetworkUnchecked;
use bitcoin::{Address, BlockHash, OutPoint, Transaction, Txid};
use tokio::sync::OnceCell;
use tracing::info;

use crate::config::RpcConfig;
use crate::error::CoreError;

use super::types::{BlockHeaderInfo, ChainInfo, MempoolInfo, NetworkInfo, TxOutInfo};
use super::{BitcoinRpc, HttpRpcClient};

type Factory<C> = Box<dyn Fn(&RpcConfig) -> Result<C, CoreError> + Send + Sync>;

/// Holds an [`RpcConfig`] and builds the underlying client on the first
/// method call.
///
/// The client is built exactly once and then reused for every call;
/// concurrent first calls wait on the same construction. If construction
/// fails, the error is returned from that call and the next call retries.
pub struct LazyRpcClient<C = HttpRpcClient> {
    config: RpcConfig,
    factory: Factory<C>,
    inner: OnceCell<C>,
}

impl LazyRpcClient<HttpRpcClient> {
    pub fn new(config: RpcConfig) -> Self {
        Self::with_factory(config, HttpRpcClient::new)
    }
}

impl<C: BitcoinRpc> LazyRpcClient<C> {
    /// Use a custom constructor for the underlying client.
    pub fn with_factory<F>(config: RpcConfig, factory: F) -> Self
    where
        F: Fn(&RpcConfig) -> Result<C, CoreError> + Send + Sync + 'static,
    {
        Self {
            config,
            factory: Box::new(factory),
            inner: OnceCell::new(),
        }
    }

    pub fn config(&self) -> &RpcConfig {
        &self.config
    }

    /// Whether the underlying client has been built yet.
    pub fn is_connected(&self) -> bool {
        self.inner.initialized()
    }

    /// Build the underlying client if needed and return it.
    pub async fn client(&self) -> Result<&C, CoreError> {
        self.inner
            .get_or_try_init(|| async {
                let client = (self.factory)(&self.config)?;
                info!(
                    host = %self.config.host,
                    port = self.config.port,
                    timeout_secs = self.config.timeout.as_secs(),
                    "rpc client initialized"
                );
                Ok::<_, CoreError>(client)
            })
            .await
    }
}

#[async_trait]
impl<C: BitcoinRpc> BitcoinRpc for LazyRpcClient<C> {
    async fn get_blockchain_info(&self) -> Result<ChainInfo, CoreError> {
        self.client().await?.get_blockchain_info().await
    }

    async fn get_network_info(&self) -> Result<NetworkInfo, CoreError> {
        self.client().await?.get_network_info().await
    }

    async fn get_block_count(&self) -> Result<u64, CoreError> {
        self.client().await?.get_block_count().await
    }

    async fn get_best_block_hash(&self) -> Result<BlockHash, CoreError> {
        self.client().await?.get_best_block_hash().await
    }

    async fn get_block_hash(&self, height: u64) -> Result<BlockHash, CoreError> {
        self.client().await?.get_block_hash(height).await
    }

    async fn get_block_header(&self, hash: &BlockHash) -> Result<BlockHeaderInfo, CoreError> {
        self.client().await?.get_block_header(hash).await
    }

    async fn get_raw_transaction(&self, txid: &Txid) -> Result<Transaction, CoreError> {
        self.client().await?.get_raw_transaction(txid).await
    }

    async fn get_tx_out(&self, txid: &Txid, vout: u32) -> Result<Option<TxOutInfo>, CoreError> {
        self.client().await?.get_tx_out(txid, vout).await
    }

    async fn get_tx_outs(
        &self,
        outpoints: &[OutPoint],
    ) -> Result<Vec<Option<TxOutInfo>>, CoreError> {
        self.client().await?.get_tx_outs(outpoints).await
    }

    async fn get_mempool_info(&self) -> Result<MempoolInfo, CoreError> {
        self.client().await?.get_mempool_info().await
    }

    async fn get_raw_mempool(&self) -> Result<Vec<Txid>, CoreError> {
        self.client().await?.get_raw_mempool().await
    }

    async fn send_raw_transaction(&self, tx: &Transaction) -> Result<Txid, CoreError> {
        self.client().await?.send_raw_transaction(tx).await
    }

    async fn get_new_address(
        &self,
        label: Option<&str>,
    ) -> Result<Address<NetworkUnchecked>, CoreError> {
        self.client().await?.get_new_address(label).await
    }

    async fn generate_to_address(
        &self,
        blocks: u64,
        address: &Address,
    ) -> Result<Vec<BlockHash>, CoreError> {
        self.client().await?.generate_to_address(blocks, address).await
    }
}
