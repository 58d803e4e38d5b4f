//! In-process wallet connector backed by a local key.
//!
//! Plays the role a browser extension plays for a web app: it owns the
//! connection state, reports it as snapshots and hands out signing clients
//! for its one account.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use bip39::{Language, Mnemonic};
use ethers::{
    signers::{coins_bip39::English, LocalWallet, MnemonicBuilder, Signer},
    types::Address,
};
use secrecy::ExposeSecret;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::blockchain::{
    chains::ChainRegistry,
    client::SigningClient,
    connector::{ConnectionStateSource, ConnectorRegistry, SigningClientResolver},
    models::{format_address, ChainDescriptor, ConnectionSnapshot, ConnectorInfo, Web3Error},
};
use crate::config::Config;

pub const LOCAL_CONNECTOR_ID: &str = "local";

/// Default Ethereum derivation path, first account
const DERIVATION_PATH: &str = "m/44'/60'/0'/0/0";

pub struct LocalWalletConnector {
    info: ConnectorInfo,
    wallet: Option<LocalWallet>,
    registry: Arc<ChainRegistry>,
    chain_id: AtomicU64,
    state: watch::Sender<ConnectionSnapshot>,
}

impl LocalWalletConnector {
    /// A connector without a key; every connection attempt is rejected
    pub fn new(registry: Arc<ChainRegistry>, chain_id: u64) -> Self {
        let (state, _) = watch::channel(ConnectionSnapshot::disconnected());
        Self {
            info: ConnectorInfo {
                id: LOCAL_CONNECTOR_ID.to_string(),
                name: "Local Wallet".to_string(),
            },
            wallet: None,
            registry,
            chain_id: AtomicU64::new(chain_id),
            state,
        }
    }

    pub fn with_wallet(mut self, wallet: LocalWallet) -> Self {
        self.wallet = Some(wallet);
        self
    }

    /// Hex private key, with or without `0x`
    pub fn from_private_key(
        registry: Arc<ChainRegistry>,
        chain_id: u64,
        private_key: &str,
    ) -> Result<Self, Web3Error> {
        let private_key = private_key.trim_start_matches("0x");
        let wallet = private_key
            .parse::<LocalWallet>()
            .map_err(|e| Web3Error::Wallet(format!("invalid private key: {}", e)))?;
        Ok(Self::new(registry, chain_id).with_wallet(wallet))
    }

    /// BIP-39 phrase, first account on the default Ethereum path
    pub fn from_mnemonic(
        registry: Arc<ChainRegistry>,
        chain_id: u64,
        phrase: &str,
    ) -> Result<Self, Web3Error> {
        Mnemonic::parse_in(Language::English, phrase)
            .map_err(|e| Web3Error::Wallet(format!("invalid mnemonic phrase: {}", e)))?;

        let wallet = MnemonicBuilder::<English>::default()
            .phrase(phrase)
            .derivation_path(DERIVATION_PATH)?
            .build()?;
        Ok(Self::new(registry, chain_id).with_wallet(wallet))
    }

    /// Key from `WALLET_PRIVATE_KEY` or `WALLET_MNEMONIC`, private key first
    pub fn from_config(config: &Config, registry: Arc<ChainRegistry>) -> Result<Self, Web3Error> {
        if !registry.is_chain_supported(config.wallet_chain_id) {
            return Err(Web3Error::UnsupportedChain(config.wallet_chain_id));
        }

        if let Some(key) = &config.wallet_private_key {
            return Self::from_private_key(registry, config.wallet_chain_id, key.expose_secret());
        }
        if let Some(phrase) = &config.wallet_mnemonic {
            return Self::from_mnemonic(registry, config.wallet_chain_id, phrase.expose_secret());
        }

        warn!("No local wallet key configured, connections will be rejected");
        Ok(Self::new(registry, config.wallet_chain_id))
    }

    pub fn address(&self) -> Option<Address> {
        self.wallet.as_ref().map(|w| w.address())
    }

    /// Latest snapshot reported by this connector
    pub fn snapshot(&self) -> ConnectionSnapshot {
        self.state.borrow().clone()
    }

    fn target_chain(&self) -> Result<ChainDescriptor, Web3Error> {
        let chain_id = self.chain_id.load(Ordering::SeqCst);
        self.registry
            .chain(chain_id)
            .cloned()
            .ok_or(Web3Error::UnsupportedChain(chain_id))
    }

    /// Move the wallet to another supported chain. A connected wallet
    /// reports the switch as a new snapshot.
    pub fn switch_chain(&self, chain_id: u64) -> Result<(), Web3Error> {
        let chain = self
            .registry
            .chain(chain_id)
            .cloned()
            .ok_or(Web3Error::UnsupportedChain(chain_id))?;
        self.chain_id.store(chain_id, Ordering::SeqCst);

        self.state.send_if_modified(|snapshot| {
            let target = snapshot
                .signer_target()
                .map(|(address, current)| (address, current.id));
            match target {
                Some((address, current)) if current != chain_id => {
                    info!("Local wallet switched to chain {}", chain_id);
                    *snapshot = ConnectionSnapshot::connected(address, chain);
                    true
                }
                _ => false,
            }
        });
        Ok(())
    }

    fn reset(&self) -> bool {
        self.state.send_if_modified(|snapshot| {
            if snapshot.address().is_none() && !snapshot.is_connected() {
                return false;
            }
            *snapshot = ConnectionSnapshot::disconnected();
            true
        })
    }
}

#[async_trait]
impl ConnectorRegistry for LocalWalletConnector {
    fn connectors(&self) -> Vec<ConnectorInfo> {
        vec![self.info.clone()]
    }

    async fn connect(&self, connector: &ConnectorInfo) -> Result<(), Web3Error> {
        if connector.id != self.info.id {
            return Err(Web3Error::UnknownConnector(connector.id.clone()));
        }

        let Some(wallet) = &self.wallet else {
            self.reset();
            return Err(Web3Error::ConnectionRejected(
                "no local key configured".to_string(),
            ));
        };

        let chain = match self.target_chain() {
            Ok(chain) => chain,
            Err(e) => {
                self.reset();
                return Err(e);
            }
        };

        let address = wallet.address();
        info!("Local wallet connected: {} on chain {}", format_address(&address), chain.id);
        self.state
            .send_replace(ConnectionSnapshot::connected(address, chain));
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), Web3Error> {
        if self.reset() {
            info!("Local wallet disconnected");
        }
        Ok(())
    }
}

#[async_trait]
impl ConnectionStateSource for LocalWalletConnector {
    async fn initialize(&self) -> Result<watch::Receiver<ConnectionSnapshot>, Web3Error> {
        debug!("Local wallet subsystem initialized");
        Ok(self.state.subscribe())
    }

    async fn shutdown(&self) {
        self.reset();
        debug!("Local wallet subsystem shut down");
    }
}

#[async_trait]
impl SigningClientResolver for LocalWalletConnector {
    async fn resolve(
        &self,
        account: Address,
        chain: &ChainDescriptor,
    ) -> Result<SigningClient, Web3Error> {
        let wallet = self
            .wallet
            .as_ref()
            .ok_or_else(|| Web3Error::Wallet("no local key configured".to_string()))?;

        if wallet.address() != account {
            return Err(Web3Error::SignerMismatch {
                expected: account,
                actual: wallet.address(),
            });
        }

        Ok(SigningClient::new(chain.clone(), wallet.clone()))
    }
}
