//! Operator node entry point.

mod config;
mod supervisor;

use std::sync::Arc;

use clap::Parser as _;
use config::Config;
use eyre::Context as _;
use lotto_chain::{ChainClient, OperatorIdentity};

fn init_tracing(log_level: &str) -> eyre::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with_timer(tracing_subscriber::fmt::time::uptime())
        .with_target(false)
        .try_init()
        .map_err(|e| eyre::eyre!("failed to initialize tracing: {e:?}"))?;
    Ok(())
}

#[tokio::main(flavor = "multi_thread")]
async fn main() -> eyre::Result<()> {
    let _ = dotenvy::dotenv();

    let config = Config::parse();
    init_tracing(&config.log_level)?;

    let identity = OperatorIdentity::from_mnemonic(&config.mnemonic, config.network.chain_id())
        .context("failed to derive operator identity from mnemonic")?;
    tracing::info!(address = identity.address(), chain_id = config.network.chain_id(), "operator identity ready");

    let client = ChainClient::new(config.rpc_url(), identity)
        .context("failed to build chain client")?;

    let res = supervisor::run(config, Arc::new(client)).await;
    if let Err(e) = &res {
        tracing::error!(error = %e, "fatal error, exiting");
    }
    res
}
