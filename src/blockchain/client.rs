//! Client handles for EVM-compatible networks.
//!
//! A [`ClientHandle`] is either read-only (query capability only) or signing
//! (bound to one connected account). Each handle has its own identity: a new
//! account or chain always produces a new handle, clones share the identity
//! of their original.

use std::fmt;
use std::sync::Arc;

use dashmap::DashMap;
use ethers::{
    middleware::SignerMiddleware,
    providers::{Http, Middleware, Provider},
    signers::{LocalWallet, Signer},
    types::Address,
};
use tracing::debug;
use uuid::Uuid;

use crate::blockchain::{
    chains::ChainRegistry,
    connector::ReadOnlyClientFactory,
    models::{format_address, ChainDescriptor, Web3Error},
};

/// Read-only capability bound to one chain
#[derive(Clone)]
pub struct ReadOnlyClient {
    id: Uuid,
    chain: Arc<ChainDescriptor>,
    provider: Arc<Provider<Http>>,
}

impl ReadOnlyClient {
    /// Create a client over the chain's primary RPC endpoint
    pub fn new(chain: ChainDescriptor) -> Self {
        let provider = Provider::new(Http::new(chain.rpc_url().clone()));
        Self {
            id: Uuid::new_v4(),
            chain: Arc::new(chain),
            provider: Arc::new(provider),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn chain(&self) -> &ChainDescriptor {
        &self.chain
    }

    pub fn provider(&self) -> &Arc<Provider<Http>> {
        &self.provider
    }
}

impl PartialEq for ReadOnlyClient {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for ReadOnlyClient {}

impl fmt::Debug for ReadOnlyClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReadOnlyClient")
            .field("id", &self.id)
            .field("chain", &self.chain.id)
            .field("rpc_url", &self.chain.rpc_url().as_str())
            .finish()
    }
}

/// Signing capability bound to one account on one chain
#[derive(Clone)]
pub struct SigningClient {
    id: Uuid,
    chain: Arc<ChainDescriptor>,
    account: Address,
    middleware: Arc<SignerMiddleware<Provider<Http>, LocalWallet>>,
}

impl SigningClient {
    /// Bind `wallet` to `chain`; the wallet's chain id is overridden so
    /// signed transactions carry the right EIP-155 id.
    pub fn new(chain: ChainDescriptor, wallet: LocalWallet) -> Self {
        let wallet = wallet.with_chain_id(chain.id);
        let account = wallet.address();
        let provider = Provider::new(Http::new(chain.rpc_url().clone()));
        Self {
            id: Uuid::new_v4(),
            chain: Arc::new(chain),
            account,
            middleware: Arc::new(SignerMiddleware::new(provider, wallet)),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn chain(&self) -> &ChainDescriptor {
        &self.chain
    }

    pub fn account(&self) -> Address {
        self.account
    }

    /// Middleware that signs and submits transactions from `account`
    pub fn middleware(&self) -> &Arc<SignerMiddleware<Provider<Http>, LocalWallet>> {
        &self.middleware
    }

    pub fn provider(&self) -> &Provider<Http> {
        self.middleware.inner()
    }

    pub fn is_bound_to(&self, account: Address, chain_id: u64) -> bool {
        self.account == account && self.chain.id == chain_id
    }
}

impl PartialEq for SigningClient {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for SigningClient {}

impl fmt::Debug for SigningClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigningClient")
            .field("id", &self.id)
            .field("chain", &self.chain.id)
            .field("account", &format_address(&self.account))
            .finish()
    }
}

/// The client an application issues calls through
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientHandle {
    ReadOnly(ReadOnlyClient),
    Signing(SigningClient),
}

impl ClientHandle {
    pub fn id(&self) -> Uuid {
        match self {
            ClientHandle::ReadOnly(c) => c.id(),
            ClientHandle::Signing(c) => c.id(),
        }
    }

    pub fn can_sign(&self) -> bool {
        matches!(self, ClientHandle::Signing(_))
    }

    pub fn chain(&self) -> &ChainDescriptor {
        match self {
            ClientHandle::ReadOnly(c) => c.chain(),
            ClientHandle::Signing(c) => c.chain(),
        }
    }

    /// Account attached to the handle; `None` for read-only clients
    pub fn account(&self) -> Option<Address> {
        match self {
            ClientHandle::ReadOnly(_) => None,
            ClientHandle::Signing(c) => Some(c.account()),
        }
    }

    /// Provider for queries, available on both kinds
    pub fn provider(&self) -> &Provider<Http> {
        match self {
            ClientHandle::ReadOnly(c) => c.provider().as_ref(),
            ClientHandle::Signing(c) => c.provider(),
        }
    }

    pub fn as_signing(&self) -> Option<&SigningClient> {
        match self {
            ClientHandle::Signing(c) => Some(c),
            ClientHandle::ReadOnly(_) => None,
        }
    }

    /// Guard for signing-only operations
    pub fn signer(&self) -> Result<&SigningClient, Web3Error> {
        self.as_signing()
            .ok_or_else(|| Web3Error::ReadOnlyClient(self.chain().id))
    }
}

/// Read-only clients over HTTP, one per chain, cached for the factory's
/// lifetime. The registry's fallback chain is served by the registry's
/// fallback client.
#[derive(Debug)]
pub struct HttpClientFactory {
    registry: Arc<ChainRegistry>,
    clients: DashMap<u64, ReadOnlyClient>,
}

impl HttpClientFactory {
    pub fn new(registry: Arc<ChainRegistry>) -> Self {
        let clients = DashMap::new();
        let fallback = registry.fallback_client().clone();
        clients.insert(fallback.chain().id, fallback);
        Self { registry, clients }
    }
}

impl ReadOnlyClientFactory for HttpClientFactory {
    fn read_only_client(&self, chain: &ChainDescriptor) -> Result<ReadOnlyClient, Web3Error> {
        if !self.registry.is_chain_supported(chain.id) {
            return Err(Web3Error::UnsupportedChain(chain.id));
        }

        let client = self
            .clients
            .entry(chain.id)
            .or_insert_with(|| {
                debug!("Creating read-only client for chain {} at {}", chain.id, chain.rpc_url());
                ReadOnlyClient::new(chain.clone())
            })
            .clone();
        Ok(client)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blockchain::chains::{BASE_CHAIN_ID, SEPOLIA_CHAIN_ID};

    const TEST_KEY: &str = "4f3edf983ac636a65a842ce7c78d9aa706d3b113bce9c46f30d7d21715b23b1d";

    #[test]
    fn test_signing_client_binds_account_and_chain() {
        let registry = ChainRegistry::builtin();
        let base = registry.chain(BASE_CHAIN_ID).unwrap().clone();
        let wallet: LocalWallet = TEST_KEY.parse().unwrap();
        let client = SigningClient::new(base, wallet);

        let expected: Address = "0x90f8bf6a479f320ead074411a4b0e7944ea8c9c1".parse().unwrap();
        assert_eq!(client.account(), expected);
        assert!(client.is_bound_to(expected, BASE_CHAIN_ID));
        assert!(!client.is_bound_to(expected, SEPOLIA_CHAIN_ID));
        assert_eq!(client.middleware().signer().chain_id(), BASE_CHAIN_ID);

        let handle = ClientHandle::Signing(client);
        assert!(handle.can_sign());
        assert_eq!(handle.account(), Some(expected));
        assert!(handle.signer().is_ok());
    }

    #[test]
    fn test_read_only_handle_refuses_signing() {
        let registry = ChainRegistry::builtin();
        let handle = ClientHandle::ReadOnly(registry.fallback_client().clone());
        assert!(!handle.can_sign());
        assert!(handle.account().is_none());
        assert!(matches!(
            handle.signer(),
            Err(Web3Error::ReadOnlyClient(SEPOLIA_CHAIN_ID))
        ));
    }

    #[test]
    fn test_new_handles_never_compare_equal() {
        let registry = ChainRegistry::builtin();
        let base = registry.chain(BASE_CHAIN_ID).unwrap().clone();
        let first = ReadOnlyClient::new(base.clone());
        let second = ReadOnlyClient::new(base);
        assert_ne!(first, second);
        assert_eq!(first.clone(), first);
    }

    #[test]
    fn test_factory_caches_per_chain() {
        let registry = Arc::new(ChainRegistry::builtin());
        let factory = HttpClientFactory::new(registry.clone());
        let base = registry.chain(BASE_CHAIN_ID).unwrap();

        let first = factory.read_only_client(base).unwrap();
        let second = factory.read_only_client(base).unwrap();
        assert_eq!(first, second);

        let fallback = factory.read_only_client(registry.fallback()).unwrap();
        assert_eq!(&fallback, registry.fallback_client());
    }

    #[test]
    fn test_factory_rejects_unknown_chain() {
        let registry = Arc::new(ChainRegistry::builtin());
        let factory = HttpClientFactory::new(registry);
        let unknown = ChainDescriptor::new(
            1,
            "Ethereum",
            "homestead",
            url::Url::parse("https://eth.example.com").unwrap(),
        );
        assert!(matches!(
            factory.read_only_client(&unknown),
            Err(Web3Error::UnsupportedChain(1))
        ));
    }
}
