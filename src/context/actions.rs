// src/context/actions.rs

use std::fmt;
use std::sync::Arc;

use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::blockchain::{connector::ConnectorRegistry, models::Web3Error};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Request {
    Connect,
    Disconnect,
}

impl Request {
    fn name(self) -> &'static str {
        match self {
            Request::Connect => "connect",
            Request::Disconnect => "disconnect",
        }
    }

    async fn forward(self, registry: &dyn ConnectorRegistry) -> Result<(), Web3Error> {
        match self {
            Request::Connect => {
                let connector = registry
                    .connectors()
                    .into_iter()
                    .next()
                    .ok_or(Web3Error::NoConnector)?;
                debug!("Connecting with {}", connector.name);
                registry.connect(&connector).await
            }
            Request::Disconnect => registry.disconnect().await,
        }
    }
}

/// Connect/disconnect handles shared by every snapshot of one provider.
///
/// Both actions are fire-and-forget: they queue the request and return
/// immediately. One worker task forwards queued requests to the connector
/// registry in call order; the outcome shows up in a later snapshot.
pub struct Web3Actions {
    requests: Option<mpsc::UnboundedSender<Request>>,
    cancel: CancellationToken,
}

impl Web3Actions {
    /// Start the request worker on `runtime`. It stops with `cancel`.
    pub(crate) fn spawn(
        registry: Arc<dyn ConnectorRegistry>,
        cancel: CancellationToken,
        runtime: &Handle,
    ) -> Self {
        let (requests, rx) = mpsc::unbounded_channel();
        runtime.spawn(run_requests(registry, rx, cancel.clone()));
        Self {
            requests: Some(requests),
            cancel,
        }
    }

    /// Actions of the seed snapshot; both do nothing
    pub fn noop() -> Self {
        Self {
            requests: None,
            cancel: CancellationToken::new(),
        }
    }

    /// Connect with the registry's first connector
    pub fn connect(&self) {
        self.request(Request::Connect);
    }

    /// Ask the registry to end the active connection. Disconnecting a wallet
    /// that is not connected leaves the connection state unchanged.
    pub fn disconnect(&self) {
        self.request(Request::Disconnect);
    }

    fn request(&self, request: Request) {
        let Some(requests) = self.requests.as_ref().filter(|_| !self.cancel.is_cancelled()) else {
            debug!("{} ignored, provider is not mounted", request.name());
            return;
        };

        if requests.send(request).is_err() {
            debug!("{} ignored, request worker has stopped", request.name());
        }
    }
}

async fn run_requests(
    registry: Arc<dyn ConnectorRegistry>,
    mut rx: mpsc::UnboundedReceiver<Request>,
    cancel: CancellationToken,
) {
    loop {
        let request = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            request = rx.recv() => match request {
                Some(request) => request,
                None => break,
            },
        };

        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!("Wallet {} cancelled by teardown", request.name());
                break;
            }
            result = request.forward(registry.as_ref()) => {
                if let Err(e) = result {
                    warn!("Wallet {} failed: {}", request.name(), e);
                }
            }
        }
    }
}

impl fmt::Debug for Web3Actions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Web3Actions")
            .field("live", &(self.requests.is_some() && !self.cancel.is_cancelled()))
            .finish()
    }
}
