// src/context/composer.rs

use std::sync::Arc;

use uuid::Uuid;

use crate::blockchain::{
    chains::ChainRegistry,
    client::ClientHandle,
    models::{format_address, ChainDescriptor, ConnectionSnapshot},
};
use crate::context::actions::Web3Actions;

/// Point-in-time view published to every consumer. Shared as
/// `Arc<ContextSnapshot>`; read the next published snapshot instead of
/// holding on to individual fields.
#[derive(Debug)]
pub struct ContextSnapshot {
    /// Client to issue calls through
    pub client: ClientHandle,
    /// Checksummed account address, empty when disconnected
    pub address: String,
    /// Wallet chain, or the fallback chain when disconnected
    pub chain: ChainDescriptor,
    pub is_connected: bool,
    /// Connected, but the signing client has not resolved yet
    pub signer_pending: bool,
    actions: Arc<Web3Actions>,
}

impl ContextSnapshot {
    /// Value seen before the provider has initialized
    pub fn seed(registry: &ChainRegistry) -> Self {
        Self {
            client: ClientHandle::ReadOnly(registry.fallback_client().clone()),
            address: String::new(),
            chain: registry.fallback().clone(),
            is_connected: false,
            signer_pending: false,
            actions: Arc::new(Web3Actions::noop()),
        }
    }

    pub fn connect(&self) {
        self.actions.connect();
    }

    pub fn disconnect(&self) {
        self.actions.disconnect();
    }
}

struct Composed {
    connection: Arc<ConnectionSnapshot>,
    client_id: Uuid,
    snapshot: Arc<ContextSnapshot>,
}

/// Merges the resolved client, connection metadata and action handles into
/// one [`ContextSnapshot`]. Identical inputs yield the previous `Arc`.
pub struct ContextComposer {
    fallback_chain: ChainDescriptor,
    actions: Arc<Web3Actions>,
    last: Option<Composed>,
}

impl ContextComposer {
    pub fn new(fallback_chain: ChainDescriptor, actions: Arc<Web3Actions>) -> Self {
        Self {
            fallback_chain,
            actions,
            last: None,
        }
    }

    pub fn compose(
        &mut self,
        connection: &Arc<ConnectionSnapshot>,
        client: ClientHandle,
    ) -> Arc<ContextSnapshot> {
        if let Some(last) = &self.last {
            let same_connection =
                Arc::ptr_eq(&last.connection, connection) || *last.connection == **connection;
            if same_connection && last.client_id == client.id() {
                return last.snapshot.clone();
            }
        }

        let address = connection.address();
        let is_connected = connection.is_connected() && address.is_some();
        let snapshot = Arc::new(ContextSnapshot {
            address: match (is_connected, address) {
                (true, Some(address)) => format_address(&address),
                _ => String::new(),
            },
            chain: connection
                .active_chain()
                .cloned()
                .unwrap_or_else(|| self.fallback_chain.clone()),
            is_connected,
            signer_pending: is_connected && !client.can_sign(),
            client,
            actions: self.actions.clone(),
        });

        self.last = Some(Composed {
            connection: connection.clone(),
            client_id: snapshot.client.id(),
            snapshot: snapshot.clone(),
        });
        snapshot
    }

    /// Most recently composed snapshot
    pub fn last(&self) -> Option<&Arc<ContextSnapshot>> {
        self.last.as_ref().map(|c| &c.snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blockchain::chains::{BASE_CHAIN_ID, SEPOLIA_CHAIN_ID};
    use crate::blockchain::client::ReadOnlyClient;
    use ethers::types::Address;

    fn composer(registry: &ChainRegistry) -> ContextComposer {
        ContextComposer::new(registry.fallback().clone(), Arc::new(Web3Actions::noop()))
    }

    #[test]
    fn test_disconnected_maps_to_fallback_chain_and_empty_address() {
        let registry = ChainRegistry::builtin();
        let mut composer = composer(&registry);
        let snapshot = composer.compose(
            &Arc::new(ConnectionSnapshot::disconnected()),
            ClientHandle::ReadOnly(registry.fallback_client().clone()),
        );

        assert_eq!(snapshot.chain.id, SEPOLIA_CHAIN_ID);
        assert_eq!(snapshot.address, "");
        assert!(!snapshot.is_connected);
        assert!(!snapshot.signer_pending);
    }

    #[test]
    fn test_connected_maps_wallet_chain_and_address() {
        let registry = ChainRegistry::builtin();
        let base = registry.chain(BASE_CHAIN_ID).unwrap().clone();
        let address: Address = "0x90f8bf6a479f320ead074411a4b0e7944ea8c9c1".parse().unwrap();
        let mut composer = composer(&registry);

        let snapshot = composer.compose(
            &Arc::new(ConnectionSnapshot::connected(address, base.clone())),
            ClientHandle::ReadOnly(ReadOnlyClient::new(base)),
        );

        assert_eq!(snapshot.chain.id, BASE_CHAIN_ID);
        assert_eq!(snapshot.address, "0x90F8bf6A479f320ead074411a4B0e7944Ea8c9C1");
        assert!(snapshot.is_connected);
        assert!(snapshot.signer_pending);
    }

    #[test]
    fn test_pending_connection_is_not_reported_as_connected() {
        let registry = ChainRegistry::builtin();
        let base = registry.chain(BASE_CHAIN_ID).unwrap().clone();
        let mut composer = composer(&registry);

        let snapshot = composer.compose(
            &Arc::new(ConnectionSnapshot::pending(Address::repeat_byte(0xab), base.clone())),
            ClientHandle::ReadOnly(ReadOnlyClient::new(base)),
        );

        assert!(!snapshot.is_connected);
        assert_eq!(snapshot.address, "");
    }

    #[test]
    fn test_unchanged_inputs_return_same_snapshot() {
        let registry = ChainRegistry::builtin();
        let mut composer = composer(&registry);
        let client = ClientHandle::ReadOnly(registry.fallback_client().clone());

        let first = composer.compose(&Arc::new(ConnectionSnapshot::disconnected()), client.clone());
        let second = composer.compose(&Arc::new(ConnectionSnapshot::disconnected()), client);
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_new_client_produces_new_snapshot() {
        let registry = ChainRegistry::builtin();
        let mut composer = composer(&registry);
        let connection = Arc::new(ConnectionSnapshot::disconnected());

        let first = composer.compose(
            &connection,
            ClientHandle::ReadOnly(registry.fallback_client().clone()),
        );
        let second = composer.compose(
            &connection,
            ClientHandle::ReadOnly(ReadOnlyClient::new(registry.fallback().clone())),
        );
        assert!(!Arc::ptr_eq(&first, &second));
        assert!(Arc::ptr_eq(composer.last().unwrap(), &second));
    }

    #[test]
    fn test_seed_snapshot_uses_fallback() {
        let registry = ChainRegistry::builtin();
        let seed = ContextSnapshot::seed(&registry);
        assert_eq!(seed.client, ClientHandle::ReadOnly(registry.fallback_client().clone()));
        assert_eq!(seed.chain.id, SEPOLIA_CHAIN_ID);
        assert_eq!(seed.address, "");
        assert!(!seed.is_connected);
        // no-op outside a mounted provider
        seed.connect();
        seed.disconnect();
    }
}
