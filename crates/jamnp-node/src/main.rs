use std::collections::HashMap;

use clap::Parser;
use jamnp_node::cli::Args;
use jamnp_node::config::NodeConfig;
use jamnp_node::node::Node;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt().with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))).init();

    let args = Args::parse();
    let config = NodeConfig::load(args.config.as_deref())?;

    let signing_key = config.signing_key()?;
    let own_key = signing_key.verifying_key().to_bytes();

    // No bootstrap peer list is configured yet (SPEC_FULL.md §4.5: validator
    // endpoints come from the chain's own validator-set state, which this
    // standalone binary has no chain manager to read). Start knowing only
    // about ourselves; a real deployment feeds `Node::bootstrap` the genesis
    // set read off-chain.
    let mut genesis = HashMap::new();
    genesis.insert(
        args.validator_index,
        jamnp_core::ids::ValidatorMetadata::new(own_key, [0u8; 32], None),
    );

    let node = std::sync::Arc::new(Node::bootstrap(&config, signing_key, args.validator_index, genesis)?);
    node.start()?;

    tracing::info!("jamnp-node running, press ctrl-c to stop");
    tokio::signal::ctrl_c().await?;
    tracing::info!("shutting down");
    node.shutdown().await;

    Ok(())
}
