// src/main.rs

use std::env;
use std::sync::Arc;

use tracing::{error, info};
use web3_context::{
    blockchain::{chains::describe_endpoints, ChainRegistry, LocalWalletConnector},
    config::Config,
    utils::init_tracing,
    ContextSnapshot, Web3Provider,
};

fn log_snapshot(snapshot: &ContextSnapshot) {
    let address = if snapshot.address.is_empty() {
        "-"
    } else {
        snapshot.address.as_str()
    };
    info!(
        "chain={} ({}) connected={} address={} can_sign={} signer_pending={}",
        snapshot.chain.id,
        snapshot.chain.name,
        snapshot.is_connected,
        address,
        snapshot.client.can_sign(),
        snapshot.signer_pending
    );
}

#[tokio::main]
async fn main() {
    // Load configuration
    let config = Config::load();
    let log_filter = config
        .as_ref()
        .map(|c| c.log_filter.clone())
        .unwrap_or_else(|_| Config::default().log_filter);
    init_tracing(&log_filter);

    let config = match config {
        Ok(cfg) => cfg,
        Err(e) => {
            error!("❌ Failed to load configuration: {:#}", e);
            return;
        }
    };

    let registry = match ChainRegistry::from_config(&config) {
        Ok(registry) => Arc::new(registry),
        Err(e) => {
            error!("❌ Invalid chain configuration: {}", e);
            return;
        }
    };
    info!("Supported chains: {:?}", describe_endpoints(&registry));

    let wallet = match LocalWalletConnector::from_config(&config, registry.clone()) {
        Ok(wallet) => Arc::new(wallet),
        Err(e) => {
            error!("❌ Failed to load local wallet: {}", e);
            return;
        }
    };

    let provider = match Web3Provider::builder()
        .registry(registry)
        .wallet(wallet)
        .mount()
    {
        Ok(provider) => provider,
        Err(e) => {
            error!("❌ Failed to mount provider: {}", e);
            return;
        }
    };

    let args: Vec<String> = env::args().collect();
    let mut connect_pending = args.contains(&"--connect".to_string());
    let mut context = provider.context();
    log_snapshot(&context.current());

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Ctrl-C received, shutting down");
                break;
            }
            changed = context.changed() => match changed {
                Ok(snapshot) => {
                    log_snapshot(&snapshot);
                    if connect_pending {
                        connect_pending = false;
                        snapshot.connect();
                    }
                }
                Err(e) => {
                    error!("{}", e);
                    break;
                }
            },
        }
    }

    provider.unmount().await;
}
