//! Error types for the rotating-proxy-pool crate.

use std::sync::Arc;
use thiserror::Error;

/// Errors surfaced by the proxy pool and its middleware.
///
/// An empty pool is not an error: [`crate::ProxyPool::next_proxy`] returns
/// `Ok(None)` for that case. Errors are cheap to clone so one failed load can
/// be reported to every caller waiting on it.
#[derive(Debug, Clone, Error)]
pub enum PoolError {
    /// The proxy source failed to produce a candidate list.
    #[error("proxy source failed: {0:#}")]
    Source(Arc<anyhow::Error>),
    /// The health checker failed while verifying candidates.
    #[error("proxy health check failed: {0:#}")]
    HealthCheck(Arc<anyhow::Error>),
    /// No proxy is available and the caller required one.
    #[error("No proxy available in pool")]
    NoProxyAvailable,
}

impl PoolError {
    pub(crate) fn source_failed(err: anyhow::Error) -> Self {
        Self::Source(Arc::new(err))
    }

    pub(crate) fn health_check_failed(err: anyhow::Error) -> Self {
        Self::HealthCheck(Arc::new(err))
    }
}
