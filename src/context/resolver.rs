// src/context/resolver.rs

use crate::blockchain::{
    chains::ChainRegistry,
    client::{ClientHandle, ReadOnlyClient, SigningClient},
    models::ConnectionSnapshot,
};

/// Select the client to expose for `connection`.
///
/// A signing client is only used when it is bound to the snapshot's account
/// and chain; anything else means the handshake has not caught up yet and the
/// read-only client is exposed instead. With no client at all the registry's
/// fallback client is returned, so callers always get a usable handle.
pub fn resolve_client(
    registry: &ChainRegistry,
    connection: &ConnectionSnapshot,
    read_only: Option<&ReadOnlyClient>,
    signing: Option<&SigningClient>,
) -> ClientHandle {
    let read_only_or_fallback = || {
        ClientHandle::ReadOnly(
            read_only
                .cloned()
                .unwrap_or_else(|| registry.fallback_client().clone()),
        )
    };

    if connection.active_chain().is_none() {
        return read_only_or_fallback();
    }

    match (connection.signer_target(), signing) {
        (Some((account, chain)), Some(signing)) if signing.is_bound_to(account, chain.id) => {
            ClientHandle::Signing(signing.clone())
        }
        _ => read_only_or_fallback(),
    }
}
