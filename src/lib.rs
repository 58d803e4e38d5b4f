// src/lib.rs

// Re-export commonly used types
pub use ethers::types::Address;

// Re-export modules
pub mod blockchain;
pub mod config;
pub mod context;
pub mod utils;

pub use blockchain::{
    chains::{get_fallback_client, ChainRegistry},
    client::{ClientHandle, ReadOnlyClient, SigningClient},
    models::{ChainDescriptor, ConnectionSnapshot, ConnectorInfo, Web3Error},
};
pub use context::{ContextSnapshot, Web3Context, Web3Provider};
