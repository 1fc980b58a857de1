use serde::{Deserialize, Serialize};

/// Labeled detection rectangle normalized to the source frame (top-left origin).
///
/// Values are carried exactly as the detector emitted them: `x + width` or
/// `y + height` may exceed 1 and `confidence` is not range-checked.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionBox {
    #[serde(rename = "class")]
    pub label: String,
    pub confidence: f32,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    #[serde(rename = "color", default)]
    pub display_color: String,
}

impl DetectionBox {
    pub fn new(
        label: impl Into<String>,
        confidence: f32,
        x: f32,
        y: f32,
        width: f32,
        height: f32,
        display_color: impl Into<String>,
    ) -> Self {
        Self {
            label: label.into(),
            confidence,
            x,
            y,
            width,
            height,
            display_color: display_color.into(),
        }
    }

    /// True when the box and confidence both lie inside `[0, 1]`.
    pub fn is_normalized(&self) -> bool {
        let unit = 0.0..=1.0;
        unit.contains(&self.confidence)
            && unit.contains(&self.x)
            && unit.contains(&self.y)
            && self.width >= 0.0
            && self.height >= 0.0
            && unit.contains(&(self.x + self.width))
            && unit.contains(&(self.y + self.height))
    }
}
