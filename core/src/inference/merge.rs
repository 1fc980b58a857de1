use crate::snapshot::{epoch_millis, DetectionBox, TelemetrySnapshot};
use serde::Deserialize;

/// Body returned by the device's `/detect` endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct DetectResponse {
    pub detections: Vec<DetectionBox>,
}

/// Folds a detection-only result into the last known snapshot.
///
/// The local camera has no access to the rover's GPS or host sensors, so
/// position and stats are carried over from `previous` unchanged, except
/// `inference_fps`, which is reset to 0 because the local path does not
/// measure throughput. `detections` replaces the previous list wholesale.
/// Without a previous snapshot the stats are zeroed and there is no fix.
pub fn merge_detections(
    previous: Option<&TelemetrySnapshot>,
    detections: Vec<DetectionBox>,
) -> TelemetrySnapshot {
    let base = previous.cloned().unwrap_or_default();
    let mut system_stats = base.system_stats;
    system_stats.inference_fps = 0.0;

    TelemetrySnapshot {
        captured_at: epoch_millis(),
        position: base.position,
        system_stats,
        detections,
        advisory_text: base.advisory_text,
        summary_report: base.summary_report,
    }
}
