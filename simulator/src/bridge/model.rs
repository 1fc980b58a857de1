use crate::generator::classes::advisory_for;
use crate::generator::profile::{GeneratorConfig, RoverGenerator};
use crate::workflow::session::{ScanSession, FINDING_CONFIDENCE};
use fieldcore::snapshot::{epoch_millis, DetectionBox, GeoFix, TelemetrySnapshot};
use image::GenericImageView;
use serde_json::{json, Value};

/// Outcome of a `/control` command.
#[derive(Debug, Clone, PartialEq)]
pub enum ControlOutcome {
    Accepted(Value),
    Unknown(String),
}

/// Everything the simulated device knows: rover state, scan session, advisor note.
pub struct DeviceModel {
    generator: RoverGenerator,
    session: ScanSession,
    insight: Option<String>,
}

impl DeviceModel {
    pub fn new(config: GeneratorConfig) -> Self {
        Self {
            generator: RoverGenerator::new(config),
            session: ScanSession::new(),
            insight: None,
        }
    }

    /// Advances the rover one step and reports the resulting telemetry.
    pub fn next_telemetry(&mut self) -> TelemetrySnapshot {
        let frame = self.generator.next_frame();
        self.session.observe(&frame.detections);

        if let Some(confident) = frame
            .detections
            .iter()
            .find(|detection| detection.confidence > FINDING_CONFIDENCE)
        {
            self.insight = Some(advisory_for(&confident.label));
        }

        TelemetrySnapshot {
            captured_at: epoch_millis(),
            position: Some(frame.position),
            system_stats: frame.stats,
            detections: frame.detections,
            advisory_text: self.insight.clone(),
            summary_report: self.session.report().map(str::to_string),
        }
    }

    /// Runs the detector on an uploaded image.
    pub fn detect_image(&self, encoded: &[u8]) -> Result<Vec<DetectionBox>, image::ImageError> {
        let decoded = image::load_from_memory(encoded)?;
        let (width, height) = decoded.dimensions();
        Ok(self.generator.detect(width, height, encoded.len()))
    }

    pub fn control(&mut self, command: &str) -> ControlOutcome {
        match command {
            "START_SCAN" => {
                self.session.start();
                ControlOutcome::Accepted(json!({
                    "status": "started",
                    "message": "Scan started. Tracking pests..."
                }))
            }
            "STOP_SCAN" => {
                let (pests, report) = self.session.stop();
                ControlOutcome::Accepted(json!({
                    "status": "stopped",
                    "pests_found": pests,
                    "report": report
                }))
            }
            other => ControlOutcome::Unknown(other.to_string()),
        }
    }

    pub fn position(&self) -> GeoFix {
        self.generator.position()
    }

    pub fn is_scanning(&self) -> bool {
        self.session.is_scanning()
    }
}
