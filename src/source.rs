//! Dynamic proxy sources.

use crate::config::ProxyPoolConfig;

use anyhow::{anyhow, Context};
use async_trait::async_trait;
use log::{debug, info, warn};
use reqwest::Client;
use std::collections::HashSet;
use url::Url;

/// Supplies candidate proxies when no static list is usable.
#[async_trait]
pub trait ProxySource: Send + Sync {
    /// Fetch an ordered list of candidate proxy addresses.
    ///
    /// An empty list is a valid answer; errors are reserved for transport failures.
    async fn fetch(&self) -> anyhow::Result<Vec<String>>;
}

/// Reads free proxy lists from URLs or local files.
pub struct FreeProxySource {
    client: Client,
    sources: Vec<String>,
    max_candidates: Option<usize>,
}

impl FreeProxySource {
    /// Create a source reading the lists named in `config.sources`.
    pub fn new(config: &ProxyPoolConfig) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(config.source_timeout).build()?;
        Ok(Self {
            client,
            sources: config.sources.clone(),
            max_candidates: config.max_candidates,
        })
    }

    async fn fetch_source(&self, source: &str) -> anyhow::Result<Vec<String>> {
        let content = if is_remote_source(source) {
            self.client
                .get(source)
                .send()
                .await?
                .error_for_status()?
                .text()
                .await?
        } else {
            tokio::fs::read_to_string(source)
                .await
                .with_context(|| format!("reading proxy list {}", source))?
        };
        Ok(parse_proxy_text(&content))
    }
}

#[async_trait]
impl ProxySource for FreeProxySource {
    async fn fetch(&self) -> anyhow::Result<Vec<String>> {
        info!("Fetching proxies from {} sources", self.sources.len());

        let mut seen = HashSet::new();
        let mut candidates = Vec::new();
        let mut failures = 0;

        for source in &self.sources {
            match self.fetch_source(source).await {
                Ok(proxies) => {
                    info!("Fetched {} proxies from {}", proxies.len(), source);
                    for proxy in proxies {
                        if seen.insert(proxy.clone()) {
                            candidates.push(proxy);
                        }
                    }
                }
                Err(e) => {
                    warn!("Failed to fetch proxies from {}: {:#}", source, e);
                    failures += 1;
                }
            }
        }

        if failures > 0 && failures == self.sources.len() {
            return Err(anyhow!("all {} proxy sources failed", failures));
        }

        if let Some(max) = self.max_candidates {
            if candidates.len() > max {
                debug!("Truncating {} candidates to {}", candidates.len(), max);
                candidates.truncate(max);
            }
        }

        info!("Found {} unique proxies before health check", candidates.len());
        Ok(candidates)
    }
}

/// Whether `source` names an HTTP(S) list rather than a local file.
fn is_remote_source(source: &str) -> bool {
    Url::parse(source)
        .map(|url| matches!(url.scheme(), "http" | "https"))
        .unwrap_or(false)
}

/// Extract proxy entries from a line-oriented proxy list.
///
/// Accepts `scheme://host:port` and `host:port` lines; blanks and `#` comments are skipped.
pub fn parse_proxy_text(content: &str) -> Vec<String> {
    content
        .lines()
        .filter_map(|line| {
            let line = line.trim();
            if line.starts_with('#') || !line.contains(':') {
                None
            } else {
                Some(line.to_string())
            }
        })
        .collect()
}
