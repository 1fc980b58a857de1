pub mod overlay;
pub mod trajectory;

pub use overlay::{OverlayItem, OverlayProjector, PixelRect, TargetRect};
pub use trajectory::{ProjectedPoint, TrajectoryTracker, PATH_CAPACITY};
