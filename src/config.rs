// src/config.rs

use std::collections::HashMap;
use std::env;

use anyhow::{Context, Result};
use secrecy::SecretString;

use crate::blockchain::chains::{BASE_CHAIN_ID, SEPOLIA_CHAIN_ID};

const DEFAULT_LOG_FILTER: &str = "web3_context=debug";

// A struct to hold all configuration, loaded once at startup.
#[derive(Clone, Debug)]
pub struct Config {
    /// RPC endpoint overrides, chain id -> URL. Supported chains:
    /// - Sepolia (11155111), the fallback chain by default
    /// - Base (8453)
    pub chain_rpc_urls: HashMap<String, String>,
    /// Chain used before any wallet is connected
    pub fallback_chain_id: u64,

    // Local wallet settings
    pub wallet_chain_id: u64,
    pub wallet_private_key: Option<SecretString>,
    pub wallet_mnemonic: Option<SecretString>,

    /// `tracing` filter used when `RUST_LOG` is unset
    pub log_filter: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            chain_rpc_urls: HashMap::new(),
            fallback_chain_id: SEPOLIA_CHAIN_ID,
            wallet_chain_id: BASE_CHAIN_ID,
            wallet_private_key: None,
            wallet_mnemonic: None,
            log_filter: DEFAULT_LOG_FILTER.to_string(),
        }
    }
}

impl Config {
    /// Loads the .env file into the process environment, then reads it.
    /// Meant for binaries; library code uses [`Config::from_env`].
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_env()
    }

    /// Reads configuration from the process environment as it is.
    pub fn from_env() -> Result<Self> {
        Self::from_vars(|key| env::var(key).ok())
    }

    /// Reads configuration through `var`, which returns the value of one
    /// variable if it is set.
    pub fn from_vars<F>(var: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let chain_rpc_urls: HashMap<String, String> = match var("CHAIN_RPC_URLS") {
            Some(raw) => serde_json::from_str(&raw)
                .context("Invalid CHAIN_RPC_URLS JSON format, expected chain_id -> RPC URL")?,
            None => HashMap::new(),
        };

        let fallback_chain_id = var("FALLBACK_CHAIN_ID")
            .unwrap_or_else(|| SEPOLIA_CHAIN_ID.to_string())
            .parse::<u64>()
            .context("FALLBACK_CHAIN_ID must be a valid number")?;

        let wallet_chain_id = var("WALLET_CHAIN_ID")
            .unwrap_or_else(|| BASE_CHAIN_ID.to_string())
            .parse::<u64>()
            .context("WALLET_CHAIN_ID must be a valid number")?;

        Ok(Config {
            chain_rpc_urls,
            fallback_chain_id,

            wallet_chain_id,
            wallet_private_key: var("WALLET_PRIVATE_KEY").map(SecretString::new),
            wallet_mnemonic: var("WALLET_MNEMONIC").map(SecretString::new),

            log_filter: var("LOG_FILTER").unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string()),
        })
    }
}
