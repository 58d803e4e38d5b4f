//! Supported networks and the process-wide fallback client.

use std::collections::HashMap;

use lazy_static::lazy_static;
use tracing::warn;
use url::Url;

use crate::blockchain::client::{ClientHandle, ReadOnlyClient};
use crate::blockchain::models::{ChainDescriptor, Web3Error};
use crate::config::Config;

pub const SEPOLIA_CHAIN_ID: u64 = 11155111;
pub const BASE_CHAIN_ID: u64 = 8453;

lazy_static! {
    static ref CHAIN_REGISTRY: ChainRegistry = ChainRegistry::from_env();
}

/// Ethereum Sepolia testnet
pub fn sepolia() -> ChainDescriptor {
    ChainDescriptor::new(
        SEPOLIA_CHAIN_ID,
        "Sepolia",
        "sepolia",
        static_url("https://sepolia.drpc.org"),
    )
    .with_block_explorer(static_url("https://sepolia.etherscan.io"))
    .testnet()
}

/// Base mainnet
pub fn base() -> ChainDescriptor {
    ChainDescriptor::new(
        BASE_CHAIN_ID,
        "Base",
        "base",
        static_url("https://mainnet.base.org"),
    )
    .with_block_explorer(static_url("https://basescan.org"))
}

fn static_url(url: &'static str) -> Url {
    Url::parse(url).expect("built-in chain URLs are valid")
}

/// Ordered, non-empty set of supported chains. The first entry is the
/// fallback chain.
#[derive(Debug, Clone)]
pub struct ChainRegistry {
    chains: Vec<ChainDescriptor>,
    fallback_client: ReadOnlyClient,
}

impl ChainRegistry {
    /// Build a registry from an ordered list; the first chain becomes the
    /// fallback and gets its read-only client built here, once.
    pub fn new(chains: Vec<ChainDescriptor>) -> Result<Self, Web3Error> {
        let fallback = chains.first().cloned().ok_or(Web3Error::NoChains)?;
        Ok(Self {
            fallback_client: ReadOnlyClient::new(fallback),
            chains,
        })
    }

    /// Sepolia (fallback) and Base with their default public endpoints
    pub fn builtin() -> Self {
        let chains = vec![sepolia(), base()];
        Self {
            fallback_client: ReadOnlyClient::new(chains[0].clone()),
            chains,
        }
    }

    /// Built-in chains with endpoint overrides and fallback selection from
    /// the configuration.
    pub fn from_config(config: &Config) -> Result<Self, Web3Error> {
        let mut chains = vec![sepolia(), base()];

        for chain in chains.iter_mut() {
            if let Some(url) = config.chain_rpc_urls.get(&chain.id.to_string()) {
                let url = Url::parse(url)?;
                *chain = chain.clone().with_primary_rpc_url(url);
            }
        }

        let position = chains
            .iter()
            .position(|c| c.id == config.fallback_chain_id)
            .ok_or(Web3Error::UnsupportedChain(config.fallback_chain_id))?;
        let fallback = chains.remove(position);
        chains.insert(0, fallback);

        Self::new(chains)
    }

    /// Registry for the process environment. Does not read `.env` files.
    /// Invalid configuration is logged and the built-in registry used instead.
    pub fn from_env() -> Self {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    fn from_vars<F>(var: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let config = match Config::from_vars(var) {
            Ok(config) => config,
            Err(e) => {
                warn!("Invalid chain configuration, using built-in chains: {:#}", e);
                return Self::builtin();
            }
        };

        Self::from_config(&config).unwrap_or_else(|e| {
            warn!("Invalid chain configuration, using built-in chains: {}", e);
            Self::builtin()
        })
    }

    /// Process-wide registry, built on first use
    pub fn global() -> &'static ChainRegistry {
        &CHAIN_REGISTRY
    }

    pub fn list_supported_chains(&self) -> &[ChainDescriptor] {
        &self.chains
    }

    pub fn chain(&self, id: u64) -> Option<&ChainDescriptor> {
        self.chains.iter().find(|c| c.id == id)
    }

    pub fn is_chain_supported(&self, id: u64) -> bool {
        self.chain(id).is_some()
    }

    pub fn fallback(&self) -> &ChainDescriptor {
        self.fallback_client.chain()
    }

    /// Read-only client bound to the fallback chain. Every call returns the
    /// same handle.
    pub fn fallback_client(&self) -> &ReadOnlyClient {
        &self.fallback_client
    }
}

impl Default for ChainRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

/// The process-wide fallback client
pub fn get_fallback_client() -> ClientHandle {
    ClientHandle::ReadOnly(ChainRegistry::global().fallback_client().clone())
}

/// Chain id -> RPC URL pairs as configured, for logging
pub fn describe_endpoints(registry: &ChainRegistry) -> HashMap<u64, String> {
    registry
        .list_supported_chains()
        .iter()
        .map(|c| (c.id, c.rpc_url().to_string()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_registry_falls_back_to_sepolia() {
        let registry = ChainRegistry::builtin();
        let ids: Vec<u64> = registry.list_supported_chains().iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![SEPOLIA_CHAIN_ID, BASE_CHAIN_ID]);
        assert_eq!(registry.fallback().id, SEPOLIA_CHAIN_ID);
        assert_eq!(registry.fallback_client().chain().id, SEPOLIA_CHAIN_ID);
    }

    #[test]
    fn test_fallback_client_is_built_once() {
        let registry = ChainRegistry::builtin();
        assert_eq!(registry.fallback_client(), registry.fallback_client());
        assert_eq!(
            ClientHandle::ReadOnly(registry.fallback_client().clone()),
            ClientHandle::ReadOnly(registry.fallback_client().clone())
        );
    }

    #[test]
    fn test_config_moves_fallback_chain_first() {
        let mut config = Config::default();
        config.fallback_chain_id = BASE_CHAIN_ID;
        config.chain_rpc_urls.insert(
            BASE_CHAIN_ID.to_string(),
            "https://base.example.com".to_string(),
        );

        let registry = ChainRegistry::from_config(&config).unwrap();
        assert_eq!(registry.fallback().id, BASE_CHAIN_ID);
        assert_eq!(registry.fallback().rpc_url().as_str(), "https://base.example.com/");
        assert_eq!(registry.list_supported_chains()[1].id, SEPOLIA_CHAIN_ID);
    }

    #[test]
    fn test_config_rejects_unknown_fallback() {
        let mut config = Config::default();
        config.fallback_chain_id = 1;
        assert!(matches!(
            ChainRegistry::from_config(&config),
            Err(Web3Error::UnsupportedChain(1))
        ));
    }

    #[test]
    fn test_config_rejects_bad_rpc_url() {
        let mut config = Config::default();
        config
            .chain_rpc_urls
            .insert(SEPOLIA_CHAIN_ID.to_string(), "not a url".to_string());
        assert!(matches!(
            ChainRegistry::from_config(&config),
            Err(Web3Error::InvalidRpcUrl(_))
        ));
    }

    #[test]
    fn test_environment_registry_reads_given_variables() {
        let registry = ChainRegistry::from_vars(|key| match key {
            "FALLBACK_CHAIN_ID" => Some(BASE_CHAIN_ID.to_string()),
            _ => None,
        });
        assert_eq!(registry.fallback().id, BASE_CHAIN_ID);
    }

    #[test]
    fn test_environment_registry_uses_builtin_on_bad_config() {
        let registry = ChainRegistry::from_vars(|key| match key {
            "CHAIN_RPC_URLS" => Some("not json".to_string()),
            _ => None,
        });
        assert_eq!(registry.fallback().id, SEPOLIA_CHAIN_ID);
        assert_eq!(registry.list_supported_chains().len(), 2);
    }
}
