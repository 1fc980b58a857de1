use crate::snapshot::{DetectionBox, TelemetrySnapshot};
use serde::Serialize;

/// Pixel dimensions of whatever the overlay is drawn on (video frame or canvas).
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TargetRect {
    pub width: f32,
    pub height: f32,
}

impl TargetRect {
    pub fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }
}

/// Detection box in target pixel space, top-left origin.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PixelRect {
    pub left: f32,
    pub top: f32,
    pub width: f32,
    pub height: f32,
}

/// One renderable overlay element.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OverlayItem {
    pub rect: PixelRect,
    pub caption: String,
    pub color: String,
}

/// Maps normalized detection boxes onto a target rectangle. Boxes are not
/// clamped, so unclipped detector output extends past the target edges.
pub struct OverlayProjector;

impl OverlayProjector {
    pub fn project(detection: &DetectionBox, target: TargetRect) -> PixelRect {
        PixelRect {
            left: detection.x * target.width,
            top: detection.y * target.height,
            width: detection.width * target.width,
            height: detection.height * target.height,
        }
    }

    /// `"<label> <confidence>%"`, confidence rounded to a whole percent.
    pub fn caption(detection: &DetectionBox) -> String {
        format!(
            "{} {}%",
            detection.label,
            (detection.confidence * 100.0).round() as i64
        )
    }

    /// Overlay items for every detection in emission order.
    pub fn project_all(snapshot: &TelemetrySnapshot, target: TargetRect) -> Vec<OverlayItem> {
        snapshot
            .detections
            .iter()
            .map(|detection| OverlayItem {
                rect: Self::project(detection, target),
                caption: Self::caption(detection),
                color: detection.display_color.clone(),
            })
            .collect()
    }
}
