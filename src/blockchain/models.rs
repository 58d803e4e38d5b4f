// src/blockchain/models.rs
use ethers::types::Address;
use ethers::utils::to_checksum;
use thiserror::Error;
use url::Url;

// --- Error types ---

#[derive(Error, Debug)]
pub enum Web3Error {
    #[error("unsupported chain: {0}")]
    UnsupportedChain(u64),
    #[error("chain registry must contain at least one chain")]
    NoChains,
    #[error("no connector available")]
    NoConnector,
    #[error("unknown connector: {0}")]
    UnknownConnector(String),
    #[error("connection rejected: {0}")]
    ConnectionRejected(String),
    #[error("signer for {expected:?} requested, wallet holds {actual:?}")]
    SignerMismatch { expected: Address, actual: Address },
    #[error("client for chain {0} is read-only")]
    ReadOnlyClient(u64),
    #[error("invalid rpc url: {0}")]
    InvalidRpcUrl(#[from] url::ParseError),
    #[error("wallet error: {0}")]
    Wallet(String),
    #[error("provider must be mounted inside a tokio runtime")]
    NoRuntime,
    #[error("missing collaborator: {0}")]
    MissingCollaborator(&'static str),
    #[error("provider has been unmounted")]
    Unmounted,
}

impl From<ethers::signers::WalletError> for Web3Error {
    fn from(err: ethers::signers::WalletError) -> Self {
        Web3Error::Wallet(err.to_string())
    }
}

// --- Chain models ---

/// Native currency of a chain
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NativeCurrency {
    pub name: String,
    pub symbol: String,
    pub decimals: u8,
}

impl NativeCurrency {
    pub fn ether() -> Self {
        Self {
            name: "Ether".to_string(),
            symbol: "ETH".to_string(),
            decimals: 18,
        }
    }
}

/// Static description of a supported EVM network.
///
/// A descriptor always carries at least one RPC endpoint; the first one is
/// used by read-only and signing clients.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainDescriptor {
    /// EIP-155 chain id
    pub id: u64,
    /// Human readable name
    pub name: String,
    /// Short network slug, e.g. `base`
    pub network: String,
    pub native_currency: NativeCurrency,
    rpc_url: Url,
    extra_rpc_urls: Vec<Url>,
    /// Block explorer base URL
    pub block_explorer: Option<Url>,
    pub testnet: bool,
}

impl ChainDescriptor {
    pub fn new(id: u64, name: &str, network: &str, rpc_url: Url) -> Self {
        Self {
            id,
            name: name.to_string(),
            network: network.to_string(),
            native_currency: NativeCurrency::ether(),
            rpc_url,
            extra_rpc_urls: Vec::new(),
            block_explorer: None,
            testnet: false,
        }
    }

    pub fn with_block_explorer(mut self, url: Url) -> Self {
        self.block_explorer = Some(url);
        self
    }

    pub fn testnet(mut self) -> Self {
        self.testnet = true;
        self
    }

    /// Replace the primary endpoint, keeping the previous one as a backup
    pub fn with_primary_rpc_url(mut self, url: Url) -> Self {
        if url != self.rpc_url {
            let previous = std::mem::replace(&mut self.rpc_url, url);
            self.extra_rpc_urls.insert(0, previous);
        }
        self
    }

    /// Primary RPC endpoint
    pub fn rpc_url(&self) -> &Url {
        &self.rpc_url
    }

    /// All RPC endpoints, primary first
    pub fn rpc_urls(&self) -> impl Iterator<Item = &Url> {
        std::iter::once(&self.rpc_url).chain(self.extra_rpc_urls.iter())
    }
}

// --- Connection models ---

/// Wholesale view of the wallet connection at one point in time.
///
/// Fields are private so the `connected => address` invariant holds for every
/// value in circulation.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ConnectionSnapshot {
    address: Option<Address>,
    active_chain: Option<ChainDescriptor>,
    connected: bool,
}

impl ConnectionSnapshot {
    /// No account, no wallet-reported chain
    pub fn disconnected() -> Self {
        Self::default()
    }

    pub fn connected(address: Address, chain: ChainDescriptor) -> Self {
        Self {
            address: Some(address),
            active_chain: Some(chain),
            connected: true,
        }
    }

    /// Account known but the wallet has not finished connecting (e.g. a
    /// reconnect in progress).
    pub fn pending(address: Address, chain: ChainDescriptor) -> Self {
        Self {
            address: Some(address),
            active_chain: Some(chain),
            connected: false,
        }
    }

    pub fn address(&self) -> Option<Address> {
        self.address
    }

    pub fn active_chain(&self) -> Option<&ChainDescriptor> {
        self.active_chain.as_ref()
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// Account and chain pair a signing client must be bound to, if any
    pub fn signer_target(&self) -> Option<(Address, &ChainDescriptor)> {
        match (self.connected, self.address, self.active_chain.as_ref()) {
            (true, Some(address), Some(chain)) => Some((address, chain)),
            _ => None,
        }
    }
}

/// Connector advertised by a registry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectorInfo {
    pub id: String,
    pub name: String,
}

/// EIP-55 checksummed address string
pub fn format_address(address: &Address) -> String {
    to_checksum(address, None)
}
