//! Health checking of candidate proxies.

use crate::config::ProxyPoolConfig;
use crate::proxy::to_reqwest_proxy;

use anyhow::Context;
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use log::{debug, info};
use std::time::{Duration, Instant};
use url::Url;

/// Filters candidate proxies down to the ones that actually work.
#[async_trait]
pub trait HealthChecker: Send + Sync {
    /// Return the working subsequence of `candidates`, preserving their relative order.
    async fn filter_working(&self, candidates: Vec<String>) -> anyhow::Result<Vec<String>>;
}

/// Checks proxies by fetching a known URL through each of them.
#[derive(Debug, Clone)]
pub struct HttpHealthChecker {
    check_url: String,
    timeout: Duration,
    concurrency: usize,
    default_scheme: String,
}

impl HttpHealthChecker {
    /// Create a checker using the health check settings of `config`.
    pub fn new(config: &ProxyPoolConfig) -> Self {
        Self {
            check_url: config.health_check_url.clone(),
            timeout: config.health_check_timeout,
            concurrency: config.health_check_concurrency.max(1),
            default_scheme: config.default_scheme.clone(),
        }
    }

    /// Probe a single proxy.
    pub async fn probe(&self, address: &str) -> bool {
        let proxy = match to_reqwest_proxy(address, &self.default_scheme) {
            Ok(proxy) => proxy,
            Err(e) => {
                debug!("Skipping malformed proxy {}: {:#}", address, e);
                return false;
            }
        };

        let client = match reqwest::Client::builder()
            .timeout(self.timeout)
            .proxy(proxy)
            .build()
        {
            Ok(client) => client,
            Err(e) => {
                debug!("Failed to build client for proxy {}: {}", address, e);
                return false;
            }
        };

        let start = Instant::now();
        match client.get(&self.check_url).send().await {
            Ok(resp) if resp.status().is_success() => {
                debug!("Proxy {} healthy ({:.2}s)", address, start.elapsed().as_secs_f64());
                true
            }
            Ok(resp) => {
                debug!("Proxy {} answered {}", address, resp.status());
                false
            }
            Err(e) => {
                debug!("Proxy {} failed: {}", address, e);
                false
            }
        }
    }
}

#[async_trait]
impl HealthChecker for HttpHealthChecker {
    async fn filter_working(&self, candidates: Vec<String>) -> anyhow::Result<Vec<String>> {
        if candidates.is_empty() {
            return Ok(Vec::new());
        }
        Url::parse(&self.check_url)
            .with_context(|| format!("invalid health check url {}", self.check_url))?;

        info!("Starting health check for {} proxies", candidates.len());

        // `buffered` keeps results in input order
        let results: Vec<(String, bool)> = stream::iter(candidates)
            .map(|address| async move {
                let healthy = self.probe(&address).await;
                (address, healthy)
            })
            .buffered(self.concurrency)
            .collect()
            .await;

        let total = results.len();
        let working: Vec<String> = results
            .into_iter()
            .filter_map(|(address, healthy)| healthy.then_some(address))
            .collect();

        info!(
            "Health check completed: {} healthy, {} unhealthy",
            working.len(),
            total - working.len()
        );
        Ok(working)
    }
}
