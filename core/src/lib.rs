//! Telemetry synchronization core for the FieldScan rover dashboard.
//!
//! Two producers feed one [`SnapshotBus`]: the [`TelemetryClient`] polls the
//! field device, and the [`LocalInferenceDispatcher`] turns local camera
//! frames into snapshots through the device's detection endpoint. Consumers
//! such as the [`TrajectoryTracker`] subscribe to the bus, and the
//! [`OverlayProjector`] maps detections onto whatever surface displays them.

pub mod client;
pub mod inference;
pub mod mode;
pub mod prelude;
pub mod processing;
pub mod snapshot;
pub mod telemetry;

pub use client::{ClientConfig, ScanCommand, TelemetryClient};
pub use inference::LocalInferenceDispatcher;
pub use mode::{ModeChange, ModeSwitch};
pub use prelude::{ProducerMode, SnapshotProducer};
pub use processing::{OverlayProjector, TrajectoryTracker};
pub use snapshot::{DetectionBox, GeoFix, SystemStats, TelemetrySnapshot};
pub use telemetry::{SnapshotBus, Subscription};
