use std::collections::HashMap;
use std::num::{NonZeroU32, NonZeroUsize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use bitcoin::address::NetworkUnchecked;
use bitcoin::consensus::encode::{deserialize_hex, serialize_hex};
use bitcoin::{Address, BlockHash, OutPoint, Transaction, Txid};
use futures::future::try_join_all;
use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use lru::LruCache;
use reqwest::{header, StatusCode};
use serde::Serialize;
use serde_json::{json, Value};
use tokio::sync::RwLock;
use tracing::{debug, trace};

use crate::config::RpcConfig;
use crate::error::{CoreError, RpcError};
use crate::rpc::method::RpcMethod;
use crate::rpc::types::{BlockHeaderInfo, ChainInfo, MempoolInfo, NetworkInfo, TxOutInfo};
use crate::rpc::BitcoinRpc;

use super::connection::{build_http_client, parse_connection};
use super::parsing::{decode_result, parse_gettxout_result};
use super::protocol::{
    into_result, parse_batch_id, JsonRpcBatchResponse, JsonRpcRequest, JsonRpcResponse,
};

/// Maximum number of decoded block headers cached in memory.
const HEADER_CACHE_CAP: usize = 10_000;

type DirectRateLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Bitcoin Core JSON-RPC client over HTTP(S).
///
/// Supports both single and batched RPC calls. Keeps an LRU cache of decoded
/// block headers, which are immutable for a given block hash.
pub struct HttpRpcClient {
    client: reqwest::Client,
    url: String,
    auth: Option<(String, String)>,
    limiter: Option<DirectRateLimiter>,
    batch_chunk_size: usize,
    next_id: AtomicU64,
    header_cache: RwLock<LruCache<BlockHash, BlockHeaderInfo>>,
}

impl HttpRpcClient {
    /// Create a client from an explicit configuration.
    ///
    /// The request timeout is `config.timeout`. If `requests_per_second` is
    /// set, calls are rate-limited per outbound HTTP request (batched calls
    /// count as one request).
    pub fn new(config: &RpcConfig) -> Result<Self, CoreError> {
        config.validate()?;
        let auth = config.resolve_auth()?;
        let url = parse_connection(&config.url())?;
        let client = build_http_client(config.timeout)?;

        let limiter = config
            .requests_per_second
            .and_then(NonZeroU32::new)
            .map(|limit| RateLimiter::direct(Quota::per_second(limit)));

        Ok(Self {
            client,
            url,
            auth,
            limiter,
            batch_chunk_size: config.batch_chunk_size,
            next_id: AtomicU64::new(initial_request_id()),
            header_cache: RwLock::new(LruCache::new(
                NonZeroUsize::new(HEADER_CACHE_CAP).expect("HEADER_CACHE_CAP is non-zero"),
            )),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Atomically reserve `count` consecutive request IDs for batch calls.
    fn reserve_request_ids(&self, count: u64) -> u64 {
        self.next_id.fetch_add(count, Ordering::Relaxed)
    }

    async fn wait_for_rate_limit(&self) {
        if let Some(limiter) = &self.limiter {
            limiter.until_ready().await;
        }
    }

    /// POST a JSON body and return the response text.
    ///
    /// Bitcoin Core reports RPC failures with a JSON body on 404/500, so only
    /// auth rejections (which carry an empty body) are treated as HTTP errors.
    async fn post<T: Serialize + ?Sized>(&self, body: &T) -> Result<(StatusCode, String), CoreError> {
        let mut builder = self
            .client
            .post(&self.url)
            .header(header::CONTENT_TYPE, "application/json")
            .json(body);
        if let Some((ref user, ref pass)) = self.auth {
            builder = builder.basic_auth(user, Some(pass));
        }

        let response = builder.send().await.map_err(RpcError::Transport)?;
        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(RpcError::Unauthorized(status).into());
        }

        let text = response.text().await.map_err(RpcError::Transport)?;
        Ok((status, text))
    }

    /// Send one call and return its raw `result`.
    pub async fn call(&self, method: RpcMethod, params: Vec<Value>) -> Result<Value, CoreError> {
        self.wait_for_rate_limit().await;
        let id = self.reserve_request_ids(1);
        debug!(
            rpc.id = id,
            rpc.method = method.as_str(),
            rpc.params = ?params,
            "rpc call"
        );
        let req = JsonRpcRequest {
            jsonrpc: "2.0",
            id,
            method: method.as_str(),
            params: &params,
        };

        let (status, body) = self.post(&req).await?;
        debug!(rpc.id = id, rpc.method = method.as_str(), %status, body_len = body.len(), "rpc response");
        trace!(rpc.id = id, rpc.method = method.as_str(), body = %body, "rpc response body");

        let decoded: JsonRpcResponse = serde_json::from_str(&body).map_err(|e| {
            RpcError::InvalidResponse(format!("decode JSON-RPC response: {e}; body={body}"))
        })?;

        into_result(decoded.result, decoded.error)
    }

    /// Send many calls, returning results in request order.
    ///
    /// Calls are split into chunks of `batch_chunk_size`; chunks are sent
    /// concurrently. The first failing item fails the whole batch.
    pub async fn call_batch(
        &self,
        calls: &[(RpcMethod, Vec<Value>)],
    ) -> Result<Vec<Value>, CoreError> {
        if calls.is_empty() {
            return Ok(Vec::new());
        }

        let chunk_futures: Vec<_> = calls
            .chunks(self.batch_chunk_size)
            .map(|chunk| self.rpc_batch(chunk))
            .collect();
        let chunked = try_join_all(chunk_futures).await?;
        Ok(chunked.into_iter().flatten().collect())
    }

    async fn rpc_batch(&self, calls: &[(RpcMethod, Vec<Value>)]) -> Result<Vec<Value>, CoreError> {
        self.wait_for_rate_limit().await;
        let start_id = self.reserve_request_ids(calls.len() as u64);
        debug!(
            rpc.batch_start_id = start_id,
            rpc.batch_size = calls.len(),
            "rpc batch call"
        );
        let requests: Vec<JsonRpcRequest<'_>> = calls
            .iter()
            .enumerate()
            .map(|(offset, (method, params))| JsonRpcRequest {
                jsonrpc: "2.0",
                id: start_id + offset as u64,
                method: method.as_str(),
                params,
            })
            .collect();

        let (status, body) = self.post(&requests).await?;
        debug!(
            rpc.batch_start_id = start_id,
            rpc.batch_size = calls.len(),
            %status,
            body_len = body.len(),
            "rpc batch response"
        );
        trace!(
            rpc.batch_start_id = start_id,
            rpc.batch_size = calls.len(),
            body = %body,
            "rpc batch response body"
        );

        let decoded: Vec<JsonRpcBatchResponse> = serde_json::from_str(&body).map_err(|e| {
            RpcError::InvalidResponse(format!("decode JSON-RPC batch response: {e}; body={body}"))
        })?;

        let mut by_id: HashMap<u64, JsonRpcBatchResponse> = HashMap::with_capacity(decoded.len());
        for item in decoded {
            let id = parse_batch_id(&item.id)?;
            by_id.insert(id, item);
        }

        let mut ordered = Vec::with_capacity(calls.len());
        for id in start_id..(start_id + calls.len() as u64) {
            let item = by_id.remove(&id).ok_or(RpcError::MissingBatchItem { id })?;
            ordered.push(into_result(item.result, item.error)?);
        }

        Ok(ordered)
    }

    async fn call_typed<T>(&self, method: RpcMethod, params: Vec<Value>) -> Result<T, CoreError>
    where
        T: serde::de::DeserializeOwned,
    {
        let raw = self.call(method, params).await?;
        decode_result(method.as_str(), raw)
    }
}

#[async_trait]
impl BitcoinRpc for HttpRpcClient {
    async fn get_blockchain_info(&self) -> Result<ChainInfo, CoreError> {
        self.call_typed(RpcMethod::GetBlockchainInfo, Vec::new())
            .await
    }

    async fn get_network_info(&self) -> Result<NetworkInfo, CoreError> {
        self.call_typed(RpcMethod::GetNetworkInfo, Vec::new()).await
    }

    async fn get_block_count(&self) -> Result<u64, CoreError> {
        self.call_typed(RpcMethod::GetBlockCount, Vec::new()).await
    }

    async fn get_best_block_hash(&self) -> Result<BlockHash, CoreError> {
        self.call_typed(RpcMethod::GetBestBlockHash, Vec::new())
            .await
    }

    async fn get_block_hash(&self, height: u64) -> Result<BlockHash, CoreError> {
        self.call_typed(RpcMethod::GetBlockHash, vec![json!(height)])
            .await
    }

    async fn get_block_header(&self, hash: &BlockHash) -> Result<BlockHeaderInfo, CoreError> {
        // `LruCache::get` updates recency, so even lookups take the write lock.
        if let Some(header) = self.header_cache.write().await.get(hash).cloned() {
            return Ok(header);
        }

        let header: BlockHeaderInfo = self
            .call_typed(
                RpcMethod::GetBlockHeader,
                vec![json!(hash.to_string()), json!(true)],
            )
            .await?;
        self.header_cache.write().await.put(*hash, header.clone());
        Ok(header)
    }

    async fn get_raw_transaction(&self, txid: &Txid) -> Result<Transaction, CoreError> {
        let raw = self
            .call(
                RpcMethod::GetRawTransaction,
                vec![json!(txid.to_string()), json!(0)],
            )
            .await
            .map_err(|err| normalize_getrawtransaction_error(txid, err))?;
        let hex: String = decode_result(RpcMethod::GetRawTransaction.as_str(), raw)?;
        deserialize_hex(&hex)
            .map_err(|e| CoreError::InvalidData(format!("invalid transaction hex for {txid}: {e}")))
    }

    async fn get_tx_out(&self, txid: &Txid, vout: u32) -> Result<Option<TxOutInfo>, CoreError> {
        let raw = self
            .call(
                RpcMethod::GetTxOut,
                vec![json!(txid.to_string()), json!(vout), json!(true)],
            )
            .await?;

        parse_gettxout_result(raw)
    }

    async fn get_tx_outs(
        &self,
        outpoints: &[OutPoint],
    ) -> Result<Vec<Option<TxOutInfo>>, CoreError> {
        let calls: Vec<(RpcMethod, Vec<Value>)> = outpoints
            .iter()
            .map(|outpoint| {
                (
                    RpcMethod::GetTxOut,
                    vec![
                        json!(outpoint.txid.to_string()),
                        json!(outpoint.vout),
                        json!(true),
                    ],
                )
            })
            .collect();

        let raw_results = self.call_batch(&calls).await?;
        raw_results.into_iter().map(parse_gettxout_result).collect()
    }

    async fn get_mempool_info(&self) -> Result<MempoolInfo, CoreError> {
        self.call_typed(RpcMethod::GetMempoolInfo, Vec::new()).await
    }

    async fn get_raw_mempool(&self) -> Result<Vec<Txid>, CoreError> {
        self.call_typed(RpcMethod::GetRawMempool, Vec::new()).await
    }

    async fn send_raw_transaction(&self, tx: &Transaction) -> Result<Txid, CoreError> {
        self.call_typed(
            RpcMethod::SendRawTransaction,
            vec![json!(serialize_hex(tx))],
        )
        .await
    }

    async fn get_new_address(
        &self,
        label: Option<&str>,
    ) -> Result<Address<NetworkUnchecked>, CoreError> {
        let params = match label {
            Some(label) => vec![json!(label)],
            None => Vec::new(),
        };
        self.call_typed(RpcMethod::GetNewAddress, params).await
    }

    async fn generate_to_address(
        &self,
        blocks: u64,
        address: &Address,
    ) -> Result<Vec<BlockHash>, CoreError> {
        self.call_typed(
            RpcMethod::GenerateToAddress,
            vec![json!(blocks), json!(address.to_string())],
        )
        .await
    }
}

fn initial_request_id() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(1)
}

// ==============================================================================
// RPC Error Normalization
// ==============================================================================

/// Convert Bitcoin Core "missing tx" JSON-RPC responses into `TxNotFound`.
///
/// Other RPC and transport failures pass through unchanged.
fn normalize_getrawtransaction_error(txid: &Txid, err: CoreError) -> CoreError {
    match err {
        CoreError::Rpc(RpcError::ServerError { code, message })
            if is_tx_not_found_server_error(code, &message) =>
        {
            CoreError::TxNotFound(*txid)
        }
        other => other,
    }
}

fn is_tx_not_found_server_error(code: i64, message: &str) -> bool {
    if code != -5 {
        return false;
    }

    let msg = message.to_ascii_lowercase();
    msg.contains("not found") || msg.contains("no such mempool or blockchain transaction")
}
