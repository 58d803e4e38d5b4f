//! Provider boundary: owns the wallet subsystem for the lifetime of the
//! application and publishes [`ContextSnapshot`]s to every consumer.
//!
//! All recomputation happens on one driver task, in the order events arrive:
//!
//! ```text
//! ConnectionStateSource --snapshot--> driver --resolve_client--> ContextComposer --> watch --> Web3Context
//!                                       ^
//!                 SigningClientResolver-+ (spawned, tagged with the snapshot generation)
//! ```

use std::sync::Arc;

use ethers::types::Address;
use tokio::runtime::Handle;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::blockchain::{
    chains::ChainRegistry,
    client::{HttpClientFactory, ReadOnlyClient, SigningClient},
    connector::{
        ConnectionStateSource, ConnectorRegistry, ReadOnlyClientFactory, SigningClientResolver,
    },
    models::{format_address, ChainDescriptor, ConnectionSnapshot, Web3Error},
};
use crate::context::{
    actions::Web3Actions,
    composer::{ContextComposer, ContextSnapshot},
    resolver::resolve_client,
};

/// Read-only access to the published snapshots
#[derive(Clone)]
pub struct Web3Context {
    rx: watch::Receiver<Arc<ContextSnapshot>>,
}

impl Web3Context {
    /// Latest published snapshot
    pub fn current(&self) -> Arc<ContextSnapshot> {
        self.rx.borrow().clone()
    }

    /// Wait for the next snapshot this handle has not seen yet. Fails once
    /// the provider has been unmounted.
    pub async fn changed(&mut self) -> Result<Arc<ContextSnapshot>, Web3Error> {
        self.rx.changed().await.map_err(|_| Web3Error::Unmounted)?;
        Ok(self.rx.borrow_and_update().clone())
    }
}

#[derive(Default)]
pub struct Web3ProviderBuilder {
    registry: Option<Arc<ChainRegistry>>,
    connectors: Option<Arc<dyn ConnectorRegistry>>,
    state_source: Option<Arc<dyn ConnectionStateSource>>,
    client_factory: Option<Arc<dyn ReadOnlyClientFactory>>,
    signing_resolver: Option<Arc<dyn SigningClientResolver>>,
}

impl Web3ProviderBuilder {
    /// Chain registry; defaults to the process-wide one
    pub fn registry(mut self, registry: Arc<ChainRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn connectors(mut self, connectors: Arc<dyn ConnectorRegistry>) -> Self {
        self.connectors = Some(connectors);
        self
    }

    pub fn state_source(mut self, source: Arc<dyn ConnectionStateSource>) -> Self {
        self.state_source = Some(source);
        self
    }

    /// Read-only client factory; defaults to [`HttpClientFactory`]
    pub fn client_factory(mut self, factory: Arc<dyn ReadOnlyClientFactory>) -> Self {
        self.client_factory = Some(factory);
        self
    }

    pub fn signing_resolver(mut self, resolver: Arc<dyn SigningClientResolver>) -> Self {
        self.signing_resolver = Some(resolver);
        self
    }

    /// Use one wallet subsystem as connector registry, state source and
    /// signing resolver.
    pub fn wallet<W>(self, wallet: Arc<W>) -> Self
    where
        W: ConnectorRegistry + ConnectionStateSource + SigningClientResolver + 'static,
    {
        self.connectors(wallet.clone())
            .state_source(wallet.clone())
            .signing_resolver(wallet)
    }

    /// Spawn the driver on the current tokio runtime. Consumers see the
    /// fallback-seeded snapshot until the subsystem has initialized.
    pub fn mount(self) -> Result<Web3Provider, Web3Error> {
        let runtime = Handle::try_current().map_err(|_| Web3Error::NoRuntime)?;

        let connectors = self
            .connectors
            .ok_or(Web3Error::MissingCollaborator("connector registry"))?;
        let state_source = self
            .state_source
            .ok_or(Web3Error::MissingCollaborator("connection state source"))?;
        let signing_resolver = self
            .signing_resolver
            .ok_or(Web3Error::MissingCollaborator("signing client resolver"))?;
        let registry = self
            .registry
            .unwrap_or_else(|| Arc::new(ChainRegistry::global().clone()));
        let client_factory = self
            .client_factory
            .unwrap_or_else(|| Arc::new(HttpClientFactory::new(registry.clone())));

        let cancel = CancellationToken::new();
        let actions = Arc::new(Web3Actions::spawn(connectors, cancel.clone(), &runtime));
        let (publisher, rx) = watch::channel(Arc::new(ContextSnapshot::seed(&registry)));
        let (resolved_tx, resolved_rx) = mpsc::unbounded_channel();

        let driver = Driver {
            composer: ContextComposer::new(registry.fallback().clone(), actions),
            registry: registry.clone(),
            state_source,
            client_factory,
            signing_resolver,
            publisher,
            cancel: cancel.clone(),
            generation: 0,
            connection: Arc::new(ConnectionSnapshot::disconnected()),
            read_only: None,
            signing: None,
            pending: None,
            resolved_tx,
        };
        let handle = runtime.spawn(driver.run(resolved_rx));

        info!("Web3 provider mounted, fallback chain {}", registry.fallback().id);
        Ok(Web3Provider {
            context: Web3Context { rx },
            cancel,
            driver: Some(handle),
        })
    }
}

/// Root of the application's wallet/network state. Dropping it tears the
/// subsystem down as well; `unmount` additionally waits for teardown to
/// finish.
pub struct Web3Provider {
    context: Web3Context,
    cancel: CancellationToken,
    driver: Option<JoinHandle<()>>,
}

impl Web3Provider {
    pub fn builder() -> Web3ProviderBuilder {
        Web3ProviderBuilder::default()
    }

    /// Handle for consumers in the wrapped subtree
    pub fn context(&self) -> Web3Context {
        self.context.clone()
    }

    pub fn current(&self) -> Arc<ContextSnapshot> {
        self.context.current()
    }

    pub async fn unmount(mut self) {
        self.cancel.cancel();
        if let Some(driver) = self.driver.take() {
            if let Err(e) = driver.await {
                error!("Web3 provider driver failed: {}", e);
            }
        }
    }
}

impl Drop for Web3Provider {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

struct SignerResolution {
    generation: u64,
    result: Result<SigningClient, Web3Error>,
}

struct Driver {
    registry: Arc<ChainRegistry>,
    state_source: Arc<dyn ConnectionStateSource>,
    client_factory: Arc<dyn ReadOnlyClientFactory>,
    signing_resolver: Arc<dyn SigningClientResolver>,
    composer: ContextComposer,
    publisher: watch::Sender<Arc<ContextSnapshot>>,
    cancel: CancellationToken,
    /// Bumped for every connection snapshot received
    generation: u64,
    connection: Arc<ConnectionSnapshot>,
    read_only: Option<ReadOnlyClient>,
    signing: Option<SigningClient>,
    pending: Option<JoinHandle<()>>,
    resolved_tx: mpsc::UnboundedSender<SignerResolution>,
}

impl Driver {
    async fn run(mut self, mut resolved_rx: mpsc::UnboundedReceiver<SignerResolution>) {
        let mut connection_rx = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => {
                debug!("Web3 provider unmounted before initialization");
                return;
            }
            result = self.state_source.initialize() => match result {
                Ok(rx) => rx,
                Err(e) => {
                    error!("Wallet subsystem failed to initialize: {}", e);
                    return;
                }
            },
        };

        let initial = connection_rx.borrow_and_update().clone();
        self.on_connection(initial);

        let mut source_open = true;
        loop {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                changed = connection_rx.changed(), if source_open => match changed {
                    Ok(()) => {
                        let snapshot = connection_rx.borrow_and_update().clone();
                        self.on_connection(snapshot);
                    }
                    Err(_) => {
                        warn!("Connection state source closed");
                        source_open = false;
                    }
                },
                Some(resolution) = resolved_rx.recv() => self.on_signer_resolved(resolution),
            }
        }

        self.teardown().await;
    }

    fn on_connection(&mut self, snapshot: ConnectionSnapshot) {
        self.generation += 1;
        if let Some(pending) = self.pending.take() {
            pending.abort();
        }

        let connection = Arc::new(snapshot);
        let target = connection
            .active_chain()
            .cloned()
            .unwrap_or_else(|| self.registry.fallback().clone());
        self.read_only = match self.client_factory.read_only_client(&target) {
            Ok(client) => Some(client),
            Err(e) => {
                warn!("No read-only client for chain {}: {}", target.id, e);
                None
            }
        };

        // keep a signer that is still bound to the same account and chain
        self.signing = match (self.signing.take(), connection.signer_target()) {
            (Some(signing), Some((account, chain))) if signing.is_bound_to(account, chain.id) => {
                Some(signing)
            }
            _ => None,
        };
        if self.signing.is_none() {
            if let Some((account, chain)) = connection.signer_target() {
                self.spawn_resolution(account, chain.clone());
            }
        }

        self.connection = connection;
        self.publish();
    }

    fn spawn_resolution(&mut self, account: Address, chain: ChainDescriptor) {
        debug!(
            "Resolving signing client for {} on chain {}",
            format_address(&account),
            chain.id
        );
        let resolver = self.signing_resolver.clone();
        let resolved_tx = self.resolved_tx.clone();
        let generation = self.generation;
        self.pending = Some(tokio::spawn(async move {
            let result = resolver.resolve(account, &chain).await;
            let _ = resolved_tx.send(SignerResolution { generation, result });
        }));
    }

    fn on_signer_resolved(&mut self, resolution: SignerResolution) {
        if resolution.generation != self.generation {
            debug!(
                "Discarding signing client from generation {}, current is {}",
                resolution.generation, self.generation
            );
            return;
        }
        self.pending = None;

        match resolution.result {
            Ok(client) => {
                let bound = self
                    .connection
                    .signer_target()
                    .map_or(false, |(account, chain)| client.is_bound_to(account, chain.id));
                if bound {
                    self.signing = Some(client);
                    self.publish();
                } else {
                    debug!("Discarding signing client bound to another account or chain");
                }
            }
            Err(e) => warn!("Signing client unavailable: {}", e),
        }
    }

    fn publish(&mut self) {
        if self.cancel.is_cancelled() {
            return;
        }

        let client = resolve_client(
            &self.registry,
            &self.connection,
            self.read_only.as_ref(),
            self.signing.as_ref(),
        );
        let snapshot = self.composer.compose(&self.connection, client);

        let published = self.publisher.send_if_modified(|current| {
            if Arc::ptr_eq(current, &snapshot) {
                return false;
            }
            *current = snapshot.clone();
            true
        });
        if published {
            debug!(
                "Published snapshot: chain={} connected={} can_sign={}",
                snapshot.chain.id,
                snapshot.is_connected,
                snapshot.client.can_sign()
            );
        }
    }

    async fn teardown(&mut self) {
        if let Some(pending) = self.pending.take() {
            pending.abort();
        }
        self.state_source.shutdown().await;
        info!("Web3 provider unmounted");
    }
}
