// src/blockchain/mod.rs

pub mod chains;
pub mod client;
pub mod connector;
pub mod local_wallet;
pub mod models;

pub use chains::{get_fallback_client, ChainRegistry};
pub use client::{ClientHandle, HttpClientFactory, ReadOnlyClient, SigningClient};
pub use local_wallet::LocalWalletConnector;

// Re-export commonly used types
pub use ethers::{types::Address, utils::to_checksum};
