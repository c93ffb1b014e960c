mod cli;
mod server;

use std::sync::Arc;

use bitcoin::consensus::encode::deserialize_hex;
use bitcoin::{Network, Transaction};
use clap::Parser;
use eyre::{eyre, WrapErr};
use serde::Serialize;

use btcproxy_core::rpc::{BitcoinRpc, LazyRpcClient};
use btcproxy_core::RpcConfig;

use cli::Command;

#[tokio::main]
async fn main() -> eyre::Result<()> {
    let args = cli::Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .with_file(true)
        .with_line_number(true)
        .with_level(true)
        .init();

    let config = args.rpc.to_config()?;
    tracing::debug!(?config, "effective rpc configuration");

    match args.command {
        Command::Config { show_secrets } => {
            print!("{}", render_config(&config, show_secrets));
            Ok(())
        }
        Command::Serve { bind, port } => serve(config, &bind, port).await,
        command => {
            let url = config.url();
            let rpc = LazyRpcClient::new(config);
            run_command(&rpc, command).await.map_err(|err| {
                let message = format_rpc_error(&url, &format!("{err:#}"));
                eyre!(message)
            })
        }
    }
}

async fn run_command(rpc: &dyn BitcoinRpc, command: Command) -> eyre::Result<()> {
    match command {
        Command::Info => print_json(&rpc.get_blockchain_info().await?),
        Command::NetworkInfo => print_json(&rpc.get_network_info().await?),
        Command::BlockCount => print_json(&rpc.get_block_count().await?),
        Command::BestBlockHash => print_json(&rpc.get_best_block_hash().await?),
        Command::BlockHash { height } => print_json(&rpc.get_block_hash(height).await?),
        Command::BlockHeader { hash } => print_json(&rpc.get_block_header(&hash).await?),
        Command::Tx { txid } => print_json(&rpc.get_raw_transaction(&txid).await?),
        Command::TxOut { txid, vout } => print_json(&rpc.get_tx_out(&txid, vout).await?),
        Command::MempoolInfo => print_json(&rpc.get_mempool_info().await?),
        Command::Mempool => print_json(&rpc.get_raw_mempool().await?),
        Command::SendRaw { hex } => {
            let tx: Transaction =
                deserialize_hex(hex.trim()).map_err(|e| eyre!("invalid transaction hex: {e}"))?;
            print_json(&rpc.send_raw_transaction(&tx).await?)
        }
        Command::NewAddress { label } => {
            let address = rpc.get_new_address(label.as_deref()).await?;
            let chain = rpc.get_blockchain_info().await?.chain;
            let address = address
                .require_network(map_chain_to_network(&chain)?)
                .wrap_err("node returned an address for a different network")?;
            print_json(&address.to_string())
        }
        Command::Generate { blocks, address } => {
            let chain = rpc.get_blockchain_info().await?.chain;
            let address = address
                .require_network(map_chain_to_network(&chain)?)
                .wrap_err_with(|| format!("address is not valid on chain `{chain}`"))?;
            print_json(&rpc.generate_to_address(blocks, &address).await?)
        }
        Command::Config { .. } | Command::Serve { .. } => {
            Err(eyre!("command does not talk to the node directly"))
        }
    }
}

fn print_json<T: Serialize>(value: &T) -> eyre::Result<()> {
    let text = serde_json::to_string_pretty(value).context("serialize result")?;
    println!("{text}");
    Ok(())
}

async fn serve(config: RpcConfig, bind: &str, port: u16) -> eyre::Result<()> {
    // Generate a random API token for this server session.
    let api_token = {
        use rand::Rng;
        let bytes: [u8; 16] = rand::thread_rng().r#gen();
        hex_encode(bytes)
    };

    let upstream = config.url();
    let rpc = Arc::new(LazyRpcClient::new(config));

    // Fail fast on a bad endpoint or credentials instead of on the first
    // forwarded call.
    let chain_info = rpc.get_blockchain_info().await.map_err(|err| {
        let message = format_rpc_error(&upstream, &err.to_string());
        eyre!(message).wrap_err("while attempting to connect to Bitcoin Core RPC")
    })?;
    tracing::info!(
        chain = %chain_info.chain,
        blocks = chain_info.blocks,
        "connected to Bitcoin Core"
    );

    let state = server::AppState {
        rpc,
        api_token: api_token.clone(),
    };

    let bind_addr = format!("{bind}:{port}");
    let origin = format!("http://{bind_addr}");
    let router = server::build_router(state, &origin)?;

    if bind == "0.0.0.0" {
        tracing::warn!("server is bound to 0.0.0.0 and is accessible from the network");
    }

    println!();
    println!("  btcproxy is forwarding to {upstream}:");
    println!("    URL:       http://{bind_addr}/");
    println!("    Header:    X-API-Token: {api_token}");
    println!();

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .context("bind TCP listener")?;

    tracing::info!("listening on {bind_addr}");
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("run HTTP server")?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %err, "failed to listen for ctrl-c; running until killed");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
}

/// Tiny hex-encoding helper to avoid adding a `hex` crate dependency.
fn hex_encode(bytes: impl AsRef<[u8]>) -> String {
    bytes.as_ref().iter().map(|b| format!("{b:02x}")).collect()
}

fn render_config(config: &RpcConfig, show_secrets: bool) -> String {
    let rendered = config.to_conf_string();
    if show_secrets {
        return rendered;
    }
    rendered
        .lines()
        .map(|line| {
            if line.starts_with("rpcpassword=") {
                "rpcpassword=<redacted>\n".to_owned()
            } else {
                format!("{line}\n")
            }
        })
        .collect()
}

fn format_rpc_error(rpc_url: &str, source_error: &str) -> String {
    let mut lines = vec![
        format!("rpc call to `{rpc_url}` failed"),
        format!("RPC error: {source_error}"),
    ];

    if source_error.contains("Could not resolve host") || source_error.contains("dns error") {
        lines.push(
            "hint: hostname resolution failed; verify --rpc-host and your DNS/network".into(),
        );
    } else if source_error.contains("tls")
        || source_error.contains("certificate")
        || source_error.contains("SSL")
    {
        lines.push(
            "hint: TLS handshake failed; verify certificate trust and that the endpoint uses HTTPS"
                .into(),
        );
    } else if source_error.contains("rejected credentials") {
        lines.push(
            "hint: authentication failed; verify rpcuser/rpcpassword or the cookie file".into(),
        );
    } else if source_error.contains("Connection refused")
        || source_error.contains("error sending request for url")
    {
        lines.push(
            "hint: node is not reachable; check that bitcoind is running with -server and the rpcport matches"
                .into(),
        );
    }

    lines.join("\n")
}

fn map_chain_to_network(chain: &str) -> eyre::Result<Network> {
    match chain {
        "main" => Ok(Network::Bitcoin),
        "test" => Ok(Network::Testnet),
        "signet" => Ok(Network::Signet),
        "regtest" => Ok(Network::Regtest),
        _ => Err(eyre!(
            "unrecognized chain name `{chain}` from getblockchaininfo"
        )),
    }
}
