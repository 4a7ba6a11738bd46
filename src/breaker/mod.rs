//! Per-backend rate limiting and circuit breaking.
//!
//! [`SaneProxy`] ties the pieces together: the [`registry`] resolves
//! backend aliases to canonical hosts, [`traffic`] holds each host's
//! counters and ban flag, [`transport`] counts every outbound exchange, and
//! the [`sanitizer`] task re-evaluates bans once per [`EPOCH`] and decays
//! the counters.
//!
//! ```text
//!   router ── banned(alias)? ──► registry ──► TrafficState.banned
//!     │                                            ▲
//!     └── round_trip(req) ──► transport ──► +req / +err
//!                                                  │
//!   sanitizer (every epoch) ── evaluate, decay ────┘
//! ```

pub mod registry;
pub mod sanitizer;
pub mod traffic;
pub mod transport;

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use bytes::Bytes;
use hyper::{Request, Response};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::error::{BoxError, TransportError};
pub use registry::{canonical_host, BackendRegistry};
pub use sanitizer::EPOCH;
pub use traffic::{Thresholds, TrafficSnapshot};
pub use transport::{HyperUpstream, SaneTransport, Upstream};

pub struct SaneProxy {
    thresholds: Thresholds,
    registry: Arc<BackendRegistry>,
    transport: SaneTransport,
    shutdown_tx: watch::Sender<bool>,
    sanitizer: Mutex<Option<JoinHandle<()>>>,
}

impl SaneProxy {
    /// Build the registry from `groups` and start the epoch sanitizer.
    ///
    /// Must be called from within a Tokio runtime. The sanitizer stops when
    /// [`shutdown`](Self::shutdown) is awaited or the proxy is dropped.
    pub fn new<'a, I>(
        thresholds: Thresholds,
        groups: I,
        separator: &str,
        upstream: Arc<dyn Upstream>,
    ) -> Self
    where
        I: IntoIterator<Item = &'a String>,
    {
        Self::with_epoch(thresholds, groups, separator, upstream, EPOCH)
    }

    pub fn with_epoch<'a, I>(
        thresholds: Thresholds,
        groups: I,
        separator: &str,
        upstream: Arc<dyn Upstream>,
        epoch: Duration,
    ) -> Self
    where
        I: IntoIterator<Item = &'a String>,
    {
        let registry = Arc::new(BackendRegistry::new(groups, separator));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let sanitizer = sanitizer::spawn(registry.clone(), thresholds, epoch, shutdown_rx);

        tracing::info!(
            backends = registry.alias_count(),
            hosts = registry.host_count(),
            max_req_per_sec = thresholds.max_req_per_sec,
            max_err_per_sec = thresholds.max_err_per_sec,
            "circuit breaker initialised"
        );

        Self {
            thresholds,
            transport: SaneTransport::new(registry.clone(), upstream),
            registry,
            shutdown_tx,
            sanitizer: Mutex::new(Some(sanitizer)),
        }
    }

    /// Whether the host behind `alias` is currently excluded from traffic.
    /// Unknown aliases are never banned.
    #[must_use]
    pub fn banned(&self, alias: &str) -> bool {
        self.registry.banned(alias)
    }

    pub async fn round_trip<B>(&self, request: Request<B>) -> Result<Response<Bytes>, TransportError>
    where
        B: hyper::body::Body<Data = Bytes> + Send,
        B::Error: Into<BoxError>,
    {
        self.transport.round_trip(request).await
    }

    #[must_use]
    pub fn traffic(&self, alias: &str) -> Option<TrafficSnapshot> {
        self.registry
            .state_for_alias(alias)
            .map(|state| state.snapshot())
    }

    #[must_use]
    pub fn registry(&self) -> &BackendRegistry {
        &self.registry
    }

    #[must_use]
    pub const fn thresholds(&self) -> Thresholds {
        self.thresholds
    }

    /// Stop the sanitizer and wait for it to exit. Later calls are no-ops.
    pub async fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
        let handle = self
            .sanitizer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                tracing::error!(error = %e, "epoch sanitizer task failed");
            }
        }
    }
}

impl std::fmt::Debug for SaneProxy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SaneProxy")
            .field("thresholds", &self.thresholds)
            .field("hosts", &self.registry.host_count())
            .finish_non_exhaustive()
    }
}
