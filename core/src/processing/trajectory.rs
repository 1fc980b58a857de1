use crate::snapshot::{GeoFix, TelemetrySnapshot};
use serde::Serialize;
use std::collections::VecDeque;

/// Maximum number of projected points retained for the path trace.
pub const PATH_CAPACITY: usize = 200;
/// Planar units per degree of latitude or longitude.
pub const UNITS_PER_DEGREE: f64 = 100_000.0;
/// Canvas position of the session's origin fix.
pub const CANVAS_ORIGIN: ProjectedPoint = ProjectedPoint {
    planar_x: 400.0,
    planar_y: 300.0,
};

/// A fix projected onto the top-down map canvas.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ProjectedPoint {
    pub planar_x: f64,
    pub planar_y: f64,
}

/// Incrementally projects the rover's fixes into a bounded planar path.
///
/// Flat-plane approximation around the first fix of the session; only
/// meaningful over a few hundred meters.
#[derive(Debug, Clone, Default)]
pub struct TrajectoryTracker {
    origin: Option<GeoFix>,
    path: VecDeque<ProjectedPoint>,
}

impl TrajectoryTracker {
    pub fn new() -> Self {
        Self {
            origin: None,
            path: VecDeque::with_capacity(PATH_CAPACITY),
        }
    }

    /// Records the snapshot's fix. Snapshots without one leave the path and
    /// origin untouched.
    pub fn on_snapshot(&mut self, snapshot: &TelemetrySnapshot) -> Option<ProjectedPoint> {
        snapshot.position.map(|fix| self.record(fix))
    }

    /// Appends `fix`, evicting the oldest point beyond [`PATH_CAPACITY`].
    pub fn record(&mut self, fix: GeoFix) -> ProjectedPoint {
        let origin = *self.origin.get_or_insert(fix);
        let point = project_from(origin, fix);

        self.path.push_back(point);
        while self.path.len() > PATH_CAPACITY {
            self.path.pop_front();
        }
        point
    }

    /// Clears the path and forgets the origin; the next fix starts a new session.
    pub fn reset(&mut self) {
        self.origin = None;
        self.path.clear();
    }

    pub fn origin(&self) -> Option<GeoFix> {
        self.origin
    }

    pub fn project(&self, fix: GeoFix) -> Option<ProjectedPoint> {
        self.origin.map(|origin| project_from(origin, fix))
    }

    /// Inverse projection, used for the map's coordinate readout.
    pub fn unproject(&self, point: ProjectedPoint) -> Option<GeoFix> {
        self.origin.map(|origin| {
            GeoFix::new(
                origin.latitude - (point.planar_y - CANVAS_ORIGIN.planar_y) / UNITS_PER_DEGREE,
                origin.longitude + (point.planar_x - CANVAS_ORIGIN.planar_x) / UNITS_PER_DEGREE,
            )
        })
    }

    pub fn current(&self) -> Option<ProjectedPoint> {
        self.path.back().copied()
    }

    /// Points in arrival order, oldest first.
    pub fn points(&self) -> impl Iterator<Item = &ProjectedPoint> {
        self.path.iter()
    }

    pub fn len(&self) -> usize {
        self.path.len()
    }

    pub fn is_empty(&self) -> bool {
        self.path.is_empty()
    }
}

fn project_from(origin: GeoFix, fix: GeoFix) -> ProjectedPoint {
    ProjectedPoint {
        planar_x: CANVAS_ORIGIN.planar_x + (fix.longitude - origin.longitude) * UNITS_PER_DEGREE,
        // Screen y grows downward, latitude grows north.
        planar_y: CANVAS_ORIGIN.planar_y - (fix.latitude - origin.latitude) * UNITS_PER_DEGREE,
    }
}
