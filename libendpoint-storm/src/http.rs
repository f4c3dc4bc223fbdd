use reqwest::Client;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum HttpError {
    #[error("Failed to create HTTP client: {0}")]
    Build(#[from] reqwest::Error),
}

/// Shared client for all probes. Certificate verification is disabled.
pub fn create_http_pool(timeout: Duration, max_idle_per_host: usize) -> Result<Client, HttpError> {
    let client = Client::builder()
        .timeout(timeout)
        .pool_max_idle_per_host(max_idle_per_host)
        .pool_idle_timeout(Duration::from_secs(90))
        .tcp_keepalive(Duration::from_secs(60))
        .tcp_nodelay(true)
        .use_rustls_tls()
        .danger_accept_invalid_certs(true)
        .build()?;
    Ok(client)
}
