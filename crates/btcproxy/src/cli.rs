use std::path::PathBuf;
use std::time::Duration;

use bitcoin::address::NetworkUnchecked;
use bitcoin::{Address, BlockHash, Txid};
use clap::{Args, Parser, Subcommand};
use eyre::WrapErr;

use btcproxy_core::RpcConfig;

/// btcproxy: typed Bitcoin Core RPC client with long timeouts.
#[derive(Parser)]
#[command(version, about)]
pub struct Cli {
    #[command(flatten)]
    pub rpc: RpcArgs,

    #[command(subcommand)]
    pub command: Command,
}

/// Connection options. Values given here override the conf file.
#[derive(Args, Debug, Default)]
pub struct RpcArgs {
    /// `bitcoin.conf`-style file with rpcuser/rpcpassword/rpcport/rpchost/rpctimeout.
    #[arg(long, env = "BTCPROXY_CONF", global = true)]
    pub conf: Option<PathBuf>,

    /// RPC host (or full http(s):// base URL).
    #[arg(long, env = "BTCPROXY_RPC_HOST", global = true)]
    pub rpc_host: Option<String>,

    #[arg(long, env = "BTCPROXY_RPC_PORT", global = true)]
    pub rpc_port: Option<u16>,

    #[arg(long, env = "BTCPROXY_RPC_USER", global = true)]
    pub rpc_user: Option<String>,

    #[arg(long, env = "BTCPROXY_RPC_PASS", global = true, hide_env_values = true)]
    pub rpc_pass: Option<String>,

    /// Cookie file written by bitcoind (`username:password`).
    #[arg(long, env = "BTCPROXY_RPC_COOKIE_FILE", global = true)]
    pub rpc_cookie_file: Option<PathBuf>,

    /// Request timeout in seconds.
    #[arg(long, env = "BTCPROXY_RPC_TIMEOUT", global = true)]
    pub rpc_timeout: Option<u64>,

    /// Upper bound on outbound HTTP requests per second.
    #[arg(long, env = "BTCPROXY_RPC_REQUESTS_PER_SECOND", global = true)]
    pub rpc_requests_per_second: Option<u32>,

    /// Maximum calls per JSON-RPC batch envelope.
    #[arg(long, env = "BTCPROXY_RPC_BATCH_SIZE", global = true)]
    pub rpc_batch_size: Option<usize>,
}

impl RpcArgs {
    /// Layer CLI/env values over the conf file over the defaults.
    pub fn to_config(&self) -> eyre::Result<RpcConfig> {
        let mut config = match &self.conf {
            Some(path) => RpcConfig::from_conf_file(path)
                .wrap_err_with(|| format!("load config file {}", path.display()))?,
            None => RpcConfig::default(),
        };

        if let Some(host) = &self.rpc_host {
            config.host = host.clone();
        }
        if let Some(port) = self.rpc_port {
            config.port = port;
        }
        if let Some(user) = &self.rpc_user {
            config.user = Some(user.clone());
        }
        if let Some(pass) = &self.rpc_pass {
            config.password = Some(pass.clone());
        }
        if let Some(cookie) = &self.rpc_cookie_file {
            config.cookie_file = Some(cookie.clone());
        }
        if let Some(secs) = self.rpc_timeout {
            config.timeout = Duration::from_secs(secs);
        }
        if let Some(rps) = self.rpc_requests_per_second {
            config.requests_per_second = Some(rps);
        }
        if let Some(size) = self.rpc_batch_size {
            config.batch_chunk_size = size;
        }

        config.validate().wrap_err("invalid rpc configuration")?;
        Ok(config)
    }
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// getblockchaininfo
    Info,
    /// getnetworkinfo
    NetworkInfo,
    /// getblockcount
    BlockCount,
    /// getbestblockhash
    BestBlockHash,
    /// getblockhash <height>
    BlockHash { height: u64 },
    /// getblockheader <hash>
    BlockHeader { hash: BlockHash },
    /// getrawtransaction <txid>, decoded
    Tx { txid: Txid },
    /// gettxout <txid> <vout>
    TxOut { txid: Txid, vout: u32 },
    /// getmempoolinfo
    MempoolInfo,
    /// getrawmempool
    Mempool,
    /// sendrawtransaction <hex>
    SendRaw { hex: String },
    /// getnewaddress [label]
    NewAddress {
        #[arg(long)]
        label: Option<String>,
    },
    /// generatetoaddress <blocks> <address> (regtest)
    Generate {
        blocks: u64,
        address: Address<NetworkUnchecked>,
    },
    /// Print the effective configuration as `key=value` lines.
    Config {
        /// Include the RPC password instead of redacting it.
        #[arg(long)]
        show_secrets: bool,
    },
    /// Run a local JSON-RPC endpoint that forwards the supported methods.
    Serve {
        /// Address to bind the endpoint to.
        #[arg(long, default_value = "127.0.0.1")]
        bind: String,

        /// Port to listen on.
        #[arg(long, default_value = "3090")]
        port: u16,
    },
}
