use fieldcore::processing::{OverlayItem, OverlayProjector, ProjectedPoint, TargetRect};
use fieldcore::{TelemetrySnapshot, TrajectoryTracker};

const HISTORY_LIMIT: usize = 20;

/// What a display would render from the latest snapshot.
#[derive(Debug)]
pub struct DashboardView {
    target: TargetRect,
    tracker: TrajectoryTracker,
    overlay: Vec<OverlayItem>,
    status: String,
    advisory: Option<String>,
    report: Option<String>,
    history: Vec<String>,
    received: u64,
}

impl DashboardView {
    pub fn new(target: TargetRect) -> Self {
        Self {
            target,
            tracker: TrajectoryTracker::new(),
            overlay: Vec::new(),
            status: "Waiting for telemetry...".into(),
            advisory: None,
            report: None,
            history: Vec::new(),
            received: 0,
        }
    }

    pub fn update(&mut self, snapshot: &TelemetrySnapshot) {
        self.received += 1;
        let point = self.tracker.on_snapshot(snapshot);
        self.overlay = OverlayProjector::project_all(snapshot, self.target);

        let fix = match (snapshot.position, point) {
            (Some(fix), Some(point)) => format!(
                "fix ({:.6}, {:.6}) -> ({:.1}, {:.1})",
                fix.latitude, fix.longitude, point.planar_x, point.planar_y
            ),
            _ => "no fix".to_string(),
        };
        let stats = &snapshot.system_stats;
        self.status = format!(
            "{fix} | cpu {:.0}% {:.1}C | {:.1} fps | {} detections",
            stats.cpu_usage_pct,
            stats.cpu_temperature_c,
            stats.inference_fps,
            self.overlay.len()
        );

        let entries: Vec<String> = self
            .overlay
            .iter()
            .map(|item| {
                format!(
                    "{} at ({:.0}, {:.0}) {:.0}x{:.0}",
                    item.caption, item.rect.left, item.rect.top, item.rect.width, item.rect.height
                )
            })
            .collect();
        for entry in entries {
            self.push_history(entry);
        }
        if snapshot.advisory_text.is_some() && snapshot.advisory_text != self.advisory {
            self.advisory = snapshot.advisory_text.clone();
        }
        if snapshot.summary_report.is_some() {
            self.report = snapshot.summary_report.clone();
        }
    }

    pub fn status(&self) -> &str {
        &self.status
    }

    pub fn overlay(&self) -> &[OverlayItem] {
        &self.overlay
    }

    pub fn advisory(&self) -> Option<&str> {
        self.advisory.as_deref()
    }

    pub fn report(&self) -> Option<&str> {
        self.report.as_deref()
    }

    pub fn history(&self) -> &[String] {
        &self.history
    }

    pub fn received(&self) -> u64 {
        self.received
    }

    pub fn path(&self) -> Vec<ProjectedPoint> {
        self.tracker.points().copied().collect()
    }

    fn push_history(&mut self, entry: String) {
        self.history.push(entry);
        if self.history.len() > HISTORY_LIMIT {
            self.history.remove(0);
        }
    }
}
