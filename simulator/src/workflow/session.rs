use crate::generator::classes::advisory_for;
use fieldcore::snapshot::DetectionBox;
use std::collections::BTreeSet;

/// Confidence a detection needs before it counts as a scan finding.
pub const FINDING_CONFIDENCE: f32 = 0.5;

/// Tracks the pests seen between `START_SCAN` and `STOP_SCAN`.
#[derive(Debug, Default)]
pub struct ScanSession {
    scanning: bool,
    findings: BTreeSet<String>,
    report: Option<String>,
}

impl ScanSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start(&mut self) {
        self.scanning = true;
        self.findings.clear();
        self.report = None;
    }

    /// Ends the scan and returns the pests found, with the generated report.
    pub fn stop(&mut self) -> (Vec<String>, String) {
        self.scanning = false;
        let pests: Vec<String> = self.findings.iter().cloned().collect();
        let report = build_report(&pests);
        self.report = Some(report.clone());
        (pests, report)
    }

    pub fn observe(&mut self, detections: &[DetectionBox]) {
        if !self.scanning {
            return;
        }
        for detection in detections {
            if detection.confidence > FINDING_CONFIDENCE {
                self.findings.insert(detection.label.clone());
            }
        }
    }

    pub fn is_scanning(&self) -> bool {
        self.scanning
    }

    pub fn report(&self) -> Option<&str> {
        self.report.as_deref()
    }
}

fn build_report(pests: &[String]) -> String {
    if pests.is_empty() {
        return "No pests detected during the scan.".to_string();
    }

    let mut report = format!(
        "Scan summary: {} pest type(s) found: {}.\n",
        pests.len(),
        pests.join(", ")
    );
    for pest in pests {
        report.push_str("- ");
        report.push_str(&advisory_for(pest));
        report.push('\n');
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detection(label: &str, confidence: f32) -> DetectionBox {
        DetectionBox::new(label, confidence, 0.1, 0.1, 0.1, 0.1, "#00FF00")
    }

    #[test]
    fn findings_only_accumulate_while_scanning() {
        let mut session = ScanSession::new();
        session.observe(&[detection("Aphid", 0.9)]);
        session.start();
        session.observe(&[detection("Whitefly", 0.9), detection("Locust", 0.3)]);
        let (pests, report) = session.stop();

        assert_eq!(pests, vec!["Whitefly".to_string()]);
        assert!(report.contains("Whitefly"));
        assert!(!session.is_scanning());
        assert_eq!(session.report(), Some(report.as_str()));
    }

    #[test]
    fn empty_scan_reports_nothing_found() {
        let mut session = ScanSession::new();
        session.start();
        let (pests, report) = session.stop();
        assert!(pests.is_empty());
        assert_eq!(report, "No pests detected during the scan.");
    }

    #[test]
    fn restart_clears_previous_report() {
        let mut session = ScanSession::new();
        session.start();
        session.stop();
        session.start();
        assert!(session.report().is_none());
    }
}
