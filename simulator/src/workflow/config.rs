use crate::generator::profile::GeneratorConfig;
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::fs;
use std::net::SocketAddr;
use std::path::Path;

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    pub port: u16,
    /// Listen on all interfaces instead of loopback only.
    pub public: bool,
    pub generator: GeneratorConfig,
    pub feed_width: u32,
    pub feed_height: u32,
    pub feed_fps: u32,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            port: 9000,
            public: false,
            generator: GeneratorConfig::default(),
            feed_width: 640,
            feed_height: 360,
            feed_fps: 10,
        }
    }
}

impl DeviceConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path_ref = path.as_ref();
        let contents = fs::read_to_string(path_ref)
            .with_context(|| format!("reading device config {}", path_ref.display()))?;
        let config: DeviceConfig = serde_yaml::from_str(&contents)
            .with_context(|| format!("parsing device config {}", path_ref.display()))?;
        Ok(config)
    }

    pub fn bind_address(&self) -> SocketAddr {
        let host = if self.public { [0, 0, 0, 0] } else { [127, 0, 0, 1] };
        SocketAddr::from((host, self.port))
    }

    pub fn to_generator_config(&self) -> GeneratorConfig {
        self.generator.clone()
    }
}
