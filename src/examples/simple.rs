//! Simple example of using rotating-proxy-pool.
//!
//! Run with `PROXY_LIST="http://10.0.0.1:3128, 10.0.0.2:8080"` to use a static list,
//! or without it to fall back to free proxy lists.

use reqwest_middleware::ClientBuilder;
use rotating_proxy_pool::{ProxyPoolConfig, ProxyPoolMiddleware};
use std::time::Duration;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    println!("Initializing proxy pool...");

    let config = ProxyPoolConfig::builder()
        .static_proxies_from_env()
        .health_check_timeout(Duration::from_secs(5))
        .health_check_url("https://httpbin.org/ip")
        .await_static_verification(true)
        // rate limit for each proxy, lower performance but avoid banned
        .max_requests_per_second(3.0)
        .build();

    let proxy_pool = ProxyPoolMiddleware::new(config)?;

    let client = ClientBuilder::new(reqwest::Client::new())
        .with(proxy_pool)
        .build();

    println!("Sending request...");
    let response = client.get("https://httpbin.org/ip").send().await?;

    println!("Status: {}", response.status());
    println!("Response: {}", response.text().await?);

    Ok(())
}
