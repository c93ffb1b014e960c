use std::fmt;
use std::str::FromStr;

/// The closed set of Bitcoin Core RPC methods this crate speaks.
///
/// Anything outside this list is rejected before it reaches the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RpcMethod {
    GetBlockchainInfo,
    GetNetworkInfo,
    GetBlockCount,
    GetBestBlockHash,
    GetBlockHash,
    GetBlockHeader,
    GetRawTransaction,
    GetTxOut,
    GetMempoolInfo,
    GetRawMempool,
    SendRawTransaction,
    GetNewAddress,
    GenerateToAddress,
}

impl RpcMethod {
    pub const ALL: [RpcMethod; 13] = [
        Self::GetBlockchainInfo,
        Self::GetNetworkInfo,
        Self::GetBlockCount,
        Self::GetBestBlockHash,
        Self::GetBlockHash,
        Self::GetBlockHeader,
        Self::GetRawTransaction,
        Self::GetTxOut,
        Self::GetMempoolInfo,
        Self::GetRawMempool,
        Self::SendRawTransaction,
        Self::GetNewAddress,
        Self::GenerateToAddress,
    ];

    /// Wire name of the method.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::GetBlockchainInfo => "getblockchaininfo",
            Self::GetNetworkInfo => "getnetworkinfo",
            Self::GetBlockCount => "getblockcount",
            Self::GetBestBlockHash => "getbestblockhash",
            Self::GetBlockHash => "getblockhash",
            Self::GetBlockHeader => "getblockheader",
            Self::GetRawTransaction => "getrawtransaction",
            Self::GetTxOut => "gettxout",
            Self::GetMempoolInfo => "getmempoolinfo",
            Self::GetRawMempool => "getrawmempool",
            Self::SendRawTransaction => "sendrawtransaction",
            Self::GetNewAddress => "getnewaddress",
            Self::GenerateToAddress => "generatetoaddress",
        }
    }
}

impl fmt::Display for RpcMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unsupported rpc method `{0}`")]
pub struct UnknownMethod(pub String);

impl FromStr for RpcMethod {
    type Err = UnknownMethod;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|method| method.as_str() == s)
            .ok_or_else(|| UnknownMethod(s.to_owned()))
    }
}
