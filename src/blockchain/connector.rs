//! Interfaces to the wallet/network subsystem.
//!
//! The provider only selects and republishes clients; connecting, signing and
//! transport are done by implementations of these traits.

use async_trait::async_trait;
use ethers::types::Address;
use tokio::sync::watch;

use crate::blockchain::{
    client::{ReadOnlyClient, SigningClient},
    models::{ChainDescriptor, ConnectionSnapshot, ConnectorInfo, Web3Error},
};

/// Wallet connectors known to the application
#[async_trait]
pub trait ConnectorRegistry: Send + Sync {
    /// Available connectors, in preference order
    fn connectors(&self) -> Vec<ConnectorInfo>;

    /// Start a handshake with `connector`. The outcome is reported through
    /// the connection state source, not the return value.
    async fn connect(&self, connector: &ConnectorInfo) -> Result<(), Web3Error>;

    /// Terminate the active connection
    async fn disconnect(&self) -> Result<(), Web3Error>;
}

/// Single producer of [`ConnectionSnapshot`]s
#[async_trait]
pub trait ConnectionStateSource: Send + Sync {
    /// Bring the subsystem up and subscribe to its snapshots. Called once per
    /// provider.
    async fn initialize(&self) -> Result<watch::Receiver<ConnectionSnapshot>, Web3Error>;

    /// Release connections and subscriptions held for the provider
    async fn shutdown(&self) {}
}

/// Read-only network clients, per chain
pub trait ReadOnlyClientFactory: Send + Sync {
    fn read_only_client(&self, chain: &ChainDescriptor) -> Result<ReadOnlyClient, Web3Error>;
}

/// Signing clients for the connected account
#[async_trait]
pub trait SigningClientResolver: Send + Sync {
    async fn resolve(
        &self,
        account: Address,
        chain: &ChainDescriptor,
    ) -> Result<SigningClient, Web3Error>;
}
