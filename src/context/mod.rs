// src/context/mod.rs

pub mod actions;
pub mod composer;
pub mod provider;
pub mod resolver;

pub use actions::Web3Actions;
pub use composer::{ContextComposer, ContextSnapshot};
pub use provider::{Web3Context, Web3Provider, Web3ProviderBuilder};
pub use resolver::resolve_client;
