//! Middleware implementation for reqwest.

use crate::config::ProxyPoolConfig;
use crate::error::PoolError;
use crate::pool::ProxyPool;
use crate::proxy::to_reqwest_proxy;

use anyhow::anyhow;
use async_trait::async_trait;
use governor::{clock::DefaultClock, state::keyed::DefaultKeyedStateStore, Quota, RateLimiter};
use log::{debug, info, warn};
use reqwest_middleware::{Error, Middleware, Next, Result};
use std::num::NonZeroU32;
use std::sync::Arc;

type ProxyRateLimiter = RateLimiter<String, DefaultKeyedStateStore<String>, DefaultClock>;

/// Middleware that sends each request through the next proxy of a pool.
#[derive(Clone)]
pub struct ProxyPoolMiddleware {
    /// The proxy pool.
    pool: Arc<ProxyPool>,
    /// Per-proxy request rate limiter.
    limiter: Arc<ProxyRateLimiter>,
}

impl ProxyPoolMiddleware {
    /// Create a new middleware backed by a fresh pool built from `config`.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn new(config: ProxyPoolConfig) -> Result<Self> {
        let pool = ProxyPool::new(config).map_err(Error::Reqwest)?;
        let (total, mode) = pool.get_stats();
        info!("Proxy pool created with {} proxies ({:?})", total, mode);
        Ok(Self::from_pool(pool))
    }

    /// Wrap an existing pool.
    pub fn from_pool(pool: Arc<ProxyPool>) -> Self {
        let rps = pool.config.max_requests_per_second.ceil() as u32;
        let quota = Quota::per_second(NonZeroU32::new(rps).unwrap_or(NonZeroU32::MIN));
        Self {
            pool,
            limiter: Arc::new(RateLimiter::keyed(quota)),
        }
    }

    /// The pool requests are routed through.
    pub fn pool(&self) -> &Arc<ProxyPool> {
        &self.pool
    }
}

#[async_trait]
impl Middleware for ProxyPoolMiddleware {
    async fn handle(
        &self,
        req: reqwest::Request,
        extensions: &mut http::Extensions,
        next: Next<'_>,
    ) -> Result<reqwest::Response> {
        let proxy_url = match self.pool.next_proxy().await {
            Ok(Some(proxy_url)) => proxy_url,
            Ok(None) if self.pool.config.direct_fallback => {
                debug!("No proxy available, sending {} directly", req.url());
                return next.run(req, extensions).await;
            }
            Ok(None) => {
                warn!("No proxy available for {}", req.url());
                return Err(Error::Middleware(anyhow!(PoolError::NoProxyAvailable)));
            }
            Err(e) => return Err(Error::Middleware(anyhow!(e))),
        };

        info!("Using proxy: {}", proxy_url);

        // Apply rate limiting
        self.limiter.until_key_ready(&proxy_url).await;

        let reqwest_proxy = to_reqwest_proxy(&proxy_url, &self.pool.config.default_scheme)
            .map_err(Error::Middleware)?;

        let client = reqwest::Client::builder()
            .proxy(reqwest_proxy)
            .timeout(self.pool.config.request_timeout)
            .build()
            .map_err(Error::Reqwest)?;

        client.execute(req).await.map_err(|e| {
            warn!("Request failed with proxy {}: {}", proxy_url, e);
            Error::Reqwest(e)
        })
    }
}
