use crate::snapshot::detection::DetectionBox;
use serde::{Deserialize, Deserializer, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// Geographic fix reported by the rover GPS.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct GeoFix {
    #[serde(rename = "lat")]
    pub latitude: f64,
    #[serde(rename = "lng")]
    pub longitude: f64,
}

impl GeoFix {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }
}

/// Host health figures published by the field device.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SystemStats {
    #[serde(rename = "cpuTemp")]
    pub cpu_temperature_c: f32,
    #[serde(rename = "cpuUsage")]
    pub cpu_usage_pct: f32,
    #[serde(rename = "memoryUsage")]
    pub memory_usage_pct: f32,
    #[serde(rename = "diskUsage")]
    pub disk_usage_pct: f32,
    #[serde(rename = "fps")]
    pub inference_fps: f32,
}

/// One telemetry observation, the unit every producer and consumer exchanges.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetrySnapshot {
    /// Epoch milliseconds at which the producer built the snapshot.
    #[serde(rename = "timestamp")]
    pub captured_at: f64,
    /// `None` when the producer has no fix, e.g. a local merge before any
    /// rover telemetry arrived.
    #[serde(rename = "gps", skip_serializing_if = "Option::is_none")]
    pub position: Option<GeoFix>,
    #[serde(rename = "stats")]
    pub system_stats: SystemStats,
    pub detections: Vec<DetectionBox>,
    #[serde(
        rename = "ai_insight",
        deserialize_with = "non_empty_text",
        skip_serializing_if = "Option::is_none"
    )]
    pub advisory_text: Option<String>,
    #[serde(
        rename = "scan_report",
        deserialize_with = "non_empty_text",
        skip_serializing_if = "Option::is_none"
    )]
    pub summary_report: Option<String>,
}

impl TelemetrySnapshot {
    pub fn new(position: GeoFix, system_stats: SystemStats, detections: Vec<DetectionBox>) -> Self {
        Self {
            captured_at: epoch_millis(),
            position: Some(position),
            system_stats,
            detections,
            advisory_text: None,
            summary_report: None,
        }
    }

    /// Detections whose box or confidence falls outside the unit range.
    pub fn out_of_range_count(&self) -> usize {
        self.detections
            .iter()
            .filter(|detection| !detection.is_normalized())
            .count()
    }
}

/// Current wall-clock time in epoch milliseconds.
pub fn epoch_millis() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs_f64() * 1000.0)
        .unwrap_or(0.0)
}

// The device sends "" when no insight or report is available.
fn non_empty_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let text = Option::<String>::deserialize(deserializer)?;
    Ok(text.filter(|value| !value.trim().is_empty()))
}
