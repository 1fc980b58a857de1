pub mod detection;
pub mod frame;

pub use detection::DetectionBox;
pub use frame::{epoch_millis, GeoFix, SystemStats, TelemetrySnapshot};
