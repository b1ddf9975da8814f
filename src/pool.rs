//! Core proxy pool implementation.

use crate::config::{CollaboratorFailurePolicy, ProxyPoolConfig};
use crate::error::PoolError;
use crate::health::{HealthChecker, HttpHealthChecker};
use crate::proxy::SourceMode;
use crate::source::{FreeProxySource, ProxySource};

use futures::future::{BoxFuture, FutureExt, Shared};
use log::{info, warn};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::watch;

type DynamicLoad = Shared<BoxFuture<'static, Result<(), PoolError>>>;

/// Mutable pool state. Entries are an immutable snapshot replaced as a whole.
struct PoolState {
    entries: Arc<Vec<String>>,
    cursor: usize,
    source_mode: SourceMode,
}

impl PoolState {
    fn replace_entries(&mut self, entries: Vec<String>) {
        self.cursor = if entries.is_empty() {
            0
        } else {
            self.cursor % entries.len()
        };
        self.entries = Arc::new(entries);
    }
}

/// Progress of the one-time dynamic load.
#[derive(Default)]
struct LoadSlot {
    /// A load finished and its result is in the pool; never cleared.
    attempted: bool,
    /// The load currently running, shared by every caller waiting on it.
    in_flight: Option<DynamicLoad>,
}

/// Everything a dynamic load needs, detached from the pool so it can run as a
/// `'static` shared future.
#[derive(Clone)]
struct DynamicLoader {
    state: Arc<Mutex<PoolState>>,
    slot: Arc<Mutex<LoadSlot>>,
    source: Arc<dyn ProxySource>,
    checker: Arc<dyn HealthChecker>,
    failure_policy: CollaboratorFailurePolicy,
}

impl DynamicLoader {
    async fn run(self) -> Result<(), PoolError> {
        self.state.lock().source_mode = SourceMode::Dynamic;
        info!("Proxy pool empty, loading proxies from dynamic source");

        let outcome = match self.fetch_and_verify().await {
            Ok(verified) => Ok(verified),
            Err(e) => match self.failure_policy {
                CollaboratorFailurePolicy::Propagate => Err(e),
                CollaboratorFailurePolicy::Degrade => {
                    warn!("Dynamic proxy load failed, pool stays empty: {}", e);
                    Ok(Vec::new())
                }
            },
        };

        // Lock order: slot, then state.
        let mut slot = self.slot.lock();
        slot.in_flight = None;
        let verified = outcome?;

        if verified.is_empty() {
            warn!("No dynamic proxies loaded, proxy pool is empty");
        } else {
            info!("Loaded {} dynamic proxies", verified.len());
        }
        self.state.lock().replace_entries(verified);
        slot.attempted = true;
        Ok(())
    }

    async fn fetch_and_verify(&self) -> Result<Vec<String>, PoolError> {
        let candidates = self
            .source
            .fetch()
            .await
            .map_err(PoolError::source_failed)?;
        let total = candidates.len();
        let working = self
            .checker
            .filter_working(candidates)
            .await
            .map_err(PoolError::health_check_failed)?;
        info!("{}/{} dynamic proxies passed health check", working.len(), total);
        Ok(working)
    }
}

/// A pool of proxies handed out in round-robin order.
///
/// The pool is filled either from the static list in the configuration, which
/// is verified in the background after construction, or lazily from a
/// [`ProxySource`] on the first selection that finds the pool empty.
pub struct ProxyPool {
    state: Arc<Mutex<PoolState>>,
    /// Configuration for the pool.
    pub config: ProxyPoolConfig,
    source: Arc<dyn ProxySource>,
    checker: Arc<dyn HealthChecker>,
    dynamic_load: Arc<Mutex<LoadSlot>>,
    /// Flips to true when the startup verification of the static list is done.
    static_verified: watch::Receiver<bool>,
}

impl ProxyPool {
    /// Create a pool backed by the HTTP free-proxy source and health checker.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn new(config: ProxyPoolConfig) -> Result<Arc<Self>, reqwest::Error> {
        let source = Arc::new(FreeProxySource::new(&config)?);
        let checker = Arc::new(HttpHealthChecker::new(&config));
        Ok(Self::with_collaborators(config, source, checker))
    }

    /// Create a pool whose static list comes from `PROXY_LIST`.
    pub fn from_env() -> Result<Arc<Self>, reqwest::Error> {
        Self::new(ProxyPoolConfig::from_env())
    }

    /// Create a pool with custom collaborators.
    ///
    /// If the configuration carries static proxies they are served immediately
    /// and verified by a background task. Must be called from within a Tokio runtime.
    pub fn with_collaborators(
        config: ProxyPoolConfig,
        source: Arc<dyn ProxySource>,
        checker: Arc<dyn HealthChecker>,
    ) -> Arc<Self> {
        let static_list = config.static_proxies.clone();
        let has_static = !static_list.is_empty();
        let (verified_tx, verified_rx) = watch::channel(!has_static);

        let pool = Arc::new(Self {
            state: Arc::new(Mutex::new(PoolState {
                entries: Arc::new(static_list.clone()),
                cursor: 0,
                source_mode: if has_static {
                    SourceMode::Static
                } else {
                    SourceMode::Uninitialized
                },
            })),
            config,
            source,
            checker,
            dynamic_load: Arc::new(Mutex::new(LoadSlot::default())),
            static_verified: verified_rx,
        });

        if has_static {
            info!("Loaded {} proxies from static configuration, verifying", static_list.len());
            let pool_clone = Arc::clone(&pool);
            tokio::spawn(async move {
                pool_clone.verify_static(static_list).await;
                let _ = verified_tx.send(true);
            });
        }

        pool
    }

    async fn verify_static(&self, candidates: Vec<String>) {
        let total = candidates.len();
        match self.checker.filter_working(candidates).await {
            Ok(working) => {
                info!("{}/{} static proxies passed health check", working.len(), total);
                self.state.lock().replace_entries(working);
            }
            Err(e) => {
                warn!("Health check of static proxies failed, keeping unverified list: {:#}", e);
            }
        }
    }

    /// Wait until the startup verification of the static list has finished.
    ///
    /// Returns immediately when no static list was configured.
    pub async fn wait_until_verified(&self) {
        let mut verified = self.static_verified.clone();
        // An error means the verification task is gone; nothing left to wait for.
        let _ = verified.wait_for(|done| *done).await;
    }

    /// Get the next proxy in rotation.
    ///
    /// Returns `Ok(None)` when the pool is empty. The first call on an empty pool
    /// loads proxies from the dynamic source; concurrent callers share that load,
    /// including its error, and a load that finished is never repeated, even if
    /// it produced nothing.
    pub async fn next_proxy(&self) -> Result<Option<String>, PoolError> {
        if self.config.await_static_verification {
            self.wait_until_verified().await;
        }

        if let Some(load) = self.pending_dynamic_load() {
            load.await?;
        }

        Ok(self.rotate())
    }

    /// The dynamic load this caller has to wait for, starting it if needed.
    fn pending_dynamic_load(&self) -> Option<DynamicLoad> {
        let mut slot = self.dynamic_load.lock();
        if slot.attempted {
            return None;
        }
        if let Some(in_flight) = &slot.in_flight {
            return Some(in_flight.clone());
        }
        if !self.state.lock().entries.is_empty() {
            return None;
        }

        let loader = DynamicLoader {
            state: Arc::clone(&self.state),
            slot: Arc::clone(&self.dynamic_load),
            source: Arc::clone(&self.source),
            checker: Arc::clone(&self.checker),
            failure_policy: self.config.failure_policy,
        };
        let load = loader.run().boxed().shared();
        slot.in_flight = Some(load.clone());
        Some(load)
    }

    fn rotate(&self) -> Option<String> {
        let mut state = self.state.lock();
        if state.entries.is_empty() {
            warn!("Proxy pool empty, no proxy returned");
            return None;
        }
        state.cursor = (state.cursor + 1) % state.entries.len();
        Some(state.entries[state.cursor].clone())
    }

    /// Snapshot of the current entries in rotation order.
    pub fn entries(&self) -> Arc<Vec<String>> {
        Arc::clone(&self.state.lock().entries)
    }

    /// Number of proxies currently in the pool.
    pub fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    /// Whether the pool currently holds no proxies.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Where the current entries came from.
    pub fn source_mode(&self) -> SourceMode {
        self.state.lock().source_mode
    }

    /// Whether a dynamic load has filled the pool, even if it found nothing.
    ///
    /// A load whose error was propagated to the caller does not count.
    pub fn dynamic_load_attempted(&self) -> bool {
        self.dynamic_load.lock().attempted
    }

    /// Get statistics about the proxy pool: entry count and source mode.
    pub fn get_stats(&self) -> (usize, SourceMode) {
        let state = self.state.lock();
        (state.entries.len(), state.source_mode)
    }
}
