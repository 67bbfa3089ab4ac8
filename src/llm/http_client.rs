use reqwest::Client;
use std::time::Duration;

/// Build the shared HTTP client used by every provider adapter.
///
/// No overall request timeout is set here: the execution engine enforces
/// the per-attempt deadline and a client-level timeout would race it.
pub fn build_provider_client() -> Client {
    Client::builder()
        .connect_timeout(Duration::from_secs(10))
        .pool_max_idle_per_host(10)
        .pool_idle_timeout(Duration::from_secs(90))
        .tcp_keepalive(Duration::from_secs(60))
        .build()
        .unwrap_or_else(|_| Client::new())
}
