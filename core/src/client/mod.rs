pub mod config;
pub mod remote;

pub use config::{ClientConfig, DEFAULT_ENDPOINT};
pub use remote::{ScanCommand, TelemetryClient};

use log::warn;

/// HTTP client shared by the producers, bounded by the configured request timeout.
pub fn http_client(config: &ClientConfig) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(config.request_timeout())
        .build()
        .unwrap_or_else(|err| {
            warn!("falling back to default http client: {err}");
            reqwest::Client::new()
        })
}
