pub mod bus;
pub mod metrics;

pub use bus::{SnapshotBus, Subscription};
pub use metrics::{TickCounts, TickMetrics};
