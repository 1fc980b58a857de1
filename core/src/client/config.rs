use crate::prelude::ConfigError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_ENDPOINT: &str = "http://127.0.0.1:9000";

/// Endpoint and cadence settings shared by both snapshot producers.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Base URL of the field device, without a trailing path.
    pub base_endpoint: String,
    pub poll_interval_ms: u64,
    pub capture_interval_ms: u64,
    /// JPEG quality (1-100) for frames submitted to `/detect`.
    pub jpeg_quality: u8,
    pub request_timeout_ms: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_endpoint: DEFAULT_ENDPOINT.to_string(),
            poll_interval_ms: 700,
            capture_interval_ms: 500,
            jpeg_quality: 80,
            request_timeout_ms: 5_000,
        }
    }
}

impl ClientConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path.as_ref())?;
        let config: ClientConfig = serde_yaml::from_str(&contents)?;
        Ok(config)
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.base_endpoint = endpoint.into();
        self
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    pub fn capture_interval(&self) -> Duration {
        Duration::from_millis(self.capture_interval_ms.max(1))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms.max(1))
    }

    /// `<base>/<path>` with exactly one slash between the two.
    pub fn endpoint_url(base: &str, path: &str) -> String {
        format!(
            "{}/{}",
            base.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}
