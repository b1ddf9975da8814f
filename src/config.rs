//! Configuration for the proxy pool.

use std::time::Duration;

/// Environment variable holding the static, comma-separated proxy list.
pub const PROXY_LIST_ENV: &str = "PROXY_LIST";

/// Free proxy lists read by the dynamic source when none are configured.
pub const DEFAULT_SOURCES: [&str; 2] = [
    "https://cdn.jsdelivr.net/gh/proxifly/free-proxy-list@main/proxies/protocols/http/data.txt",
    "https://raw.githubusercontent.com/TheSpeedX/PROXY-List/master/http.txt",
];

/// What the pool does when the proxy source or the health checker fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CollaboratorFailurePolicy {
    /// Log the cause and carry on as if the collaborator returned nothing.
    #[default]
    Degrade,
    /// Return the error to the caller of `next_proxy`.
    Propagate,
}

/// Configuration for the proxy pool.
#[derive(Debug, Clone)]
pub struct ProxyPoolConfig {
    /// Statically configured proxies, verified in the background at startup.
    pub static_proxies: Vec<String>,
    /// Source URLs (or file paths) the dynamic source reads proxy lists from.
    pub sources: Vec<String>,
    /// Scheme assumed for entries given as bare `host:port`.
    pub default_scheme: String,
    /// Timeout for fetching a single dynamic source.
    pub source_timeout: Duration,
    /// Upper bound on dynamic candidates handed to the health checker.
    pub max_candidates: Option<usize>,
    /// URL used for health checks.
    pub health_check_url: String,
    /// Timeout for health checks.
    pub health_check_timeout: Duration,
    /// Number of health probes in flight at once.
    pub health_check_concurrency: usize,
    /// Handling of collaborator failures during a dynamic load.
    pub failure_policy: CollaboratorFailurePolicy,
    /// Make selection wait until the static list has been verified.
    pub await_static_verification: bool,
    /// Maximum requests per second per proxy.
    pub max_requests_per_second: f64,
    /// Timeout for requests sent through a proxy.
    pub request_timeout: Duration,
    /// Send requests without a proxy when the pool is empty.
    pub direct_fallback: bool,
}

impl ProxyPoolConfig {
    /// Create a new configuration builder.
    pub fn builder() -> ProxyPoolConfigBuilder {
        ProxyPoolConfigBuilder::new()
    }

    /// Default configuration with the static list taken from `PROXY_LIST`.
    pub fn from_env() -> Self {
        Self::builder().static_proxies_from_env().build()
    }
}

impl Default for ProxyPoolConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// Split a comma-separated proxy list, trimming entries and dropping empty ones.
pub fn parse_proxy_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(str::to_string)
        .collect()
}

/// Builder for `ProxyPoolConfig`.
pub struct ProxyPoolConfigBuilder {
    static_proxies: Vec<String>,
    sources: Option<Vec<String>>,
    default_scheme: Option<String>,
    source_timeout: Option<Duration>,
    max_candidates: Option<Option<usize>>,
    health_check_url: Option<String>,
    health_check_timeout: Option<Duration>,
    health_check_concurrency: Option<usize>,
    failure_policy: Option<CollaboratorFailurePolicy>,
    await_static_verification: bool,
    max_requests_per_second: Option<f64>,
    request_timeout: Option<Duration>,
    direct_fallback: Option<bool>,
}

impl ProxyPoolConfigBuilder {
    /// Create a new builder with default values.
    pub fn new() -> Self {
        Self {
            static_proxies: Vec::new(),
            sources: None,
            default_scheme: None,
            source_timeout: None,
            max_candidates: None,
            health_check_url: None,
            health_check_timeout: None,
            health_check_concurrency: None,
            failure_policy: None,
            await_static_verification: false,
            max_requests_per_second: None,
            request_timeout: None,
            direct_fallback: None,
        }
    }

    /// Set the static proxy list.
    pub fn static_proxies(mut self, proxies: Vec<impl Into<String>>) -> Self {
        self.static_proxies = proxies.into_iter().map(Into::into).collect();
        self
    }

    /// Load the static proxy list from the `PROXY_LIST` environment variable.
    ///
    /// An unset or empty variable leaves the static list empty.
    pub fn static_proxies_from_env(mut self) -> Self {
        self.static_proxies = std::env::var(PROXY_LIST_ENV)
            .map(|raw| parse_proxy_list(&raw))
            .unwrap_or_default();
        self
    }

    /// Set the source URLs to fetch proxy lists from.
    pub fn sources(mut self, sources: Vec<impl Into<String>>) -> Self {
        self.sources = Some(sources.into_iter().map(Into::into).collect());
        self
    }

    /// Set the scheme used for `host:port` entries.
    pub fn default_scheme(mut self, scheme: impl Into<String>) -> Self {
        self.default_scheme = Some(scheme.into());
        self
    }

    /// Set the timeout for fetching a single source.
    pub fn source_timeout(mut self, timeout: Duration) -> Self {
        self.source_timeout = Some(timeout);
        self
    }

    /// Limit the number of dynamic candidates; `None` disables the limit.
    pub fn max_candidates(mut self, max: Option<usize>) -> Self {
        self.max_candidates = Some(max);
        self
    }

    /// Set the URL used for health checks.
    pub fn health_check_url(mut self, url: impl Into<String>) -> Self {
        self.health_check_url = Some(url.into());
        self
    }

    /// Set the timeout for health checks.
    pub fn health_check_timeout(mut self, timeout: Duration) -> Self {
        self.health_check_timeout = Some(timeout);
        self
    }

    /// Set how many health probes may run at once.
    pub fn health_check_concurrency(mut self, concurrency: usize) -> Self {
        self.health_check_concurrency = Some(concurrency);
        self
    }

    /// Set the collaborator failure policy.
    pub fn failure_policy(mut self, policy: CollaboratorFailurePolicy) -> Self {
        self.failure_policy = Some(policy);
        self
    }

    /// Hold proxy selection until the static list has been verified.
    pub fn await_static_verification(mut self, wait: bool) -> Self {
        self.await_static_verification = wait;
        self
    }

    /// Set the maximum requests per second per proxy.
    pub fn max_requests_per_second(mut self, rps: f64) -> Self {
        self.max_requests_per_second = Some(rps);
        self
    }

    /// Set the timeout for proxied requests.
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    /// Allow or forbid sending requests directly when the pool is empty.
    pub fn direct_fallback(mut self, fallback: bool) -> Self {
        self.direct_fallback = Some(fallback);
        self
    }

    /// Build the configuration.
    pub fn build(self) -> ProxyPoolConfig {
        ProxyPoolConfig {
            static_proxies: self.static_proxies,
            sources: self
                .sources
                .unwrap_or_else(|| DEFAULT_SOURCES.iter().map(|s| s.to_string()).collect()),
            default_scheme: self.default_scheme.unwrap_or_else(|| "http".to_string()),
            source_timeout: self.source_timeout.unwrap_or(Duration::from_secs(15)),
            max_candidates: self.max_candidates.unwrap_or(Some(100)),
            health_check_url: self.health_check_url.unwrap_or_else(|| "https://httpbin.org/ip".to_string()),
            health_check_timeout: self.health_check_timeout.unwrap_or(Duration::from_secs(5)),
            health_check_concurrency: self.health_check_concurrency.unwrap_or(20).max(1),
            failure_policy: self.failure_policy.unwrap_or_default(),
            await_static_verification: self.await_static_verification,
            max_requests_per_second: self.max_requests_per_second.unwrap_or(5.0),
            request_timeout: self.request_timeout.unwrap_or(Duration::from_secs(30)),
            direct_fallback: self.direct_fallback.unwrap_or(true),
        }
    }
}

impl Default for ProxyPoolConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_trims_and_drops_empty_entries() {
        assert_eq!(parse_proxy_list(" a, b ,,c "), vec!["a", "b", "c"]);
    }

    #[test]
    fn parse_blank_input_is_empty() {
        assert!(parse_proxy_list("").is_empty());
        assert!(parse_proxy_list(" , ,\t,").is_empty());
    }

    #[test]
    fn parse_keeps_order_and_duplicates() {
        assert_eq!(
            parse_proxy_list("10.0.0.1:80,socks5://10.0.0.2:1080,10.0.0.1:80"),
            vec!["10.0.0.1:80", "socks5://10.0.0.2:1080", "10.0.0.1:80"]
        );
    }

    #[test]
    fn static_list_comes_from_env() {
        std::env::set_var(PROXY_LIST_ENV, " 1.1.1.1:80 ,, 2.2.2.2:8080");
        let config = ProxyPoolConfig::from_env();
        std::env::remove_var(PROXY_LIST_ENV);

        assert_eq!(config.static_proxies, vec!["1.1.1.1:80", "2.2.2.2:8080"]);
    }

    #[test]
    fn builder_defaults() {
        let config = ProxyPoolConfig::builder().build();

        assert!(config.static_proxies.is_empty());
        assert_eq!(config.sources.len(), DEFAULT_SOURCES.len());
        assert_eq!(config.default_scheme, "http");
        assert_eq!(config.max_candidates, Some(100));
        assert_eq!(config.failure_policy, CollaboratorFailurePolicy::Degrade);
        assert!(!config.await_static_verification);
        assert!(config.direct_fallback);
    }

    #[test]
    fn builder_overrides() {
        let config = ProxyPoolConfig::builder()
            .static_proxies(vec!["a:1"])
            .sources(vec!["/tmp/proxies.txt"])
            .max_candidates(None)
            .health_check_concurrency(0)
            .failure_policy(CollaboratorFailurePolicy::Propagate)
            .direct_fallback(false)
            .build();

        assert_eq!(config.static_proxies, vec!["a:1"]);
        assert_eq!(config.sources, vec!["/tmp/proxies.txt"]);
        assert_eq!(config.max_candidates, None);
        assert_eq!(config.health_check_concurrency, 1);
        assert_eq!(config.failure_policy, CollaboratorFailurePolicy::Propagate);
        assert!(!config.direct_fallback);
    }
}
