//! Proxy addresses and the origin of the pool's entries.

use url::Url;

/// Where the pool's current entries came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceMode {
    /// Nothing has been loaded yet.
    Uninitialized,
    /// Entries were configured through `PROXY_LIST`.
    Static,
    /// Entries were fetched on demand from the proxy source.
    Dynamic,
}

/// Turn a pool entry into a proxy URL.
///
/// Entries without a scheme (e.g. "127.0.0.1:8080") get `default_scheme`.
pub fn to_proxy_url(address: &str, default_scheme: &str) -> Result<Url, url::ParseError> {
    if address.contains("://") {
        Url::parse(address)
    } else {
        Url::parse(&format!("{}://{}", default_scheme, address))
    }
}

/// Convert a pool entry to a reqwest::Proxy routing all traffic through it.
pub fn to_reqwest_proxy(address: &str, default_scheme: &str) -> anyhow::Result<reqwest::Proxy> {
    let url = to_proxy_url(address, default_scheme)?;
    Ok(reqwest::Proxy::all(url)?)
}
