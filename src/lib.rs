//! # rotating-proxy-pool
//!
//! A rotating, health-checked outbound proxy pool for reqwest.
//!
//! Proxies come either from a static list (the `PROXY_LIST` environment variable),
//! verified in the background at startup, or from free proxy lists fetched and
//! health-checked the first time the pool is found empty. Callers get proxies in
//! round-robin order from [`ProxyPool::next_proxy`], or route requests through
//! them with [`ProxyPoolMiddleware`].

pub mod config;
pub mod error;
pub mod health;
pub mod middleware;
pub mod pool;
pub mod proxy;
pub mod source;

pub use config::{
    parse_proxy_list, CollaboratorFailurePolicy, ProxyPoolConfig, ProxyPoolConfigBuilder, PROXY_LIST_ENV,
};
pub use error::PoolError;
pub use health::{HealthChecker, HttpHealthChecker};
pub use middleware::ProxyPoolMiddleware;
pub use pool::ProxyPool;
pub use proxy::SourceMode;
pub use source::{FreeProxySource, ProxySource};
