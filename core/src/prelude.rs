use serde::{Deserialize, Serialize};
use std::fmt;

/// Which producer currently feeds the snapshot bus.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ProducerMode {
    /// Snapshots polled from the field device.
    #[default]
    Remote,
    /// Snapshots merged from local camera detections.
    Local,
}

impl fmt::Display for ProducerMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProducerMode::Remote => write!(f, "remote"),
            ProducerMode::Local => write!(f, "local"),
        }
    }
}

/// A request against the field device that produced no usable payload.
#[derive(thiserror::Error, Debug)]
pub enum FetchError {
    #[error("transport failure: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("unexpected status: {0}")]
    Status(reqwest::StatusCode),
    #[error("malformed payload: {0}")]
    Malformed(String),
}

/// The local capture device could not be opened or read.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum CaptureError {
    #[error("capture device unavailable: {0}")]
    Unavailable(String),
    #[error("capture permission denied: {0}")]
    PermissionDenied(String),
    #[error("frame grab failed: {0}")]
    Frame(String),
}

#[derive(thiserror::Error, Debug)]
pub enum EncodeError {
    #[error("invalid frame: {0}")]
    InvalidFrame(String),
    #[error("jpeg encoding failed: {0}")]
    Jpeg(#[from] image::ImageError),
}

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("reading config: {0}")]
    Io(#[from] std::io::Error),
    #[error("parsing config: {0}")]
    Parse(#[from] serde_yaml::Error),
}

/// Common error type for starting a producer.
#[derive(thiserror::Error, Debug)]
pub enum ProducerError {
    #[error(transparent)]
    Capture(#[from] CaptureError),
}

pub type ProducerResult<T> = Result<T, ProducerError>;

/// Anything that feeds snapshots into a bus and can be started or stopped.
#[allow(async_fn_in_trait)]
pub trait SnapshotProducer {
    fn mode(&self) -> ProducerMode;
    fn is_running(&self) -> bool;
    async fn start(&mut self) -> ProducerResult<()>;
    async fn stop(&mut self);
}
