use crate::generator::classes::{CLASS_NAMES, DETECTION_COLOR};
use fieldcore::snapshot::{DetectionBox, GeoFix, SystemStats};
use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::{Deserialize, Serialize};

/// Configuration for the synthetic rover walk and its detector output.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    pub seed: u64,
    pub origin_latitude: f64,
    pub origin_longitude: f64,
    /// Distance covered per telemetry request, in degrees.
    pub step_degrees: f64,
    pub max_detections: usize,
    /// Confidence below which `/detect` results are discarded.
    pub detect_threshold: f32,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            seed: 0,
            origin_latitude: 34.0522,
            origin_longitude: -118.2437,
            step_degrees: 0.00001,
            max_detections: 3,
            detect_threshold: 0.4,
        }
    }
}

/// One inference pass of the simulated on-board detector.
#[derive(Debug, Clone)]
pub struct GeneratedFrame {
    pub position: GeoFix,
    pub stats: SystemStats,
    pub detections: Vec<DetectionBox>,
}

/// Seeded random walk around the configured origin.
pub struct RoverGenerator {
    config: GeneratorConfig,
    rng: StdRng,
    position: GeoFix,
    heading: f64,
}

impl RoverGenerator {
    pub fn new(config: GeneratorConfig) -> Self {
        Self {
            rng: StdRng::seed_from_u64(config.seed),
            position: GeoFix::new(config.origin_latitude, config.origin_longitude),
            heading: 0.0,
            config,
        }
    }

    pub fn next_frame(&mut self) -> GeneratedFrame {
        self.heading += self.rng.gen_range(-0.3..0.3);
        self.position.latitude += self.config.step_degrees * self.heading.cos();
        self.position.longitude += self.config.step_degrees * self.heading.sin();

        let inference_time: f32 = self.rng.gen_range(0.06..0.12);
        let stats = SystemStats {
            cpu_temperature_c: self.rng.gen_range(55.0..70.0),
            cpu_usage_pct: self.rng.gen_range(20.0..80.0),
            memory_usage_pct: self.rng.gen_range(40.0..60.0),
            disk_usage_pct: 31.4,
            inference_fps: 1.0 / inference_time,
        };

        let count = self.rng.gen_range(0..=self.config.max_detections);
        let detections = (0..count).map(|_| random_detection(&mut self.rng)).collect();

        GeneratedFrame {
            position: self.position,
            stats,
            detections,
        }
    }

    /// Detections for an uploaded frame. Identical uploads yield identical results.
    pub fn detect(&self, width: u32, height: u32, payload_len: usize) -> Vec<DetectionBox> {
        let seed = self.config.seed
            ^ (u64::from(width) << 32)
            ^ (u64::from(height) << 16)
            ^ payload_len as u64;
        let mut rng = StdRng::seed_from_u64(seed);
        let count = rng.gen_range(0..=self.config.max_detections);

        (0..count)
            .map(|_| random_detection(&mut rng))
            .filter(|detection| detection.confidence > self.config.detect_threshold)
            .collect()
    }

    pub fn position(&self) -> GeoFix {
        self.position
    }
}

fn random_detection(rng: &mut StdRng) -> DetectionBox {
    let label = CLASS_NAMES[rng.gen_range(0..CLASS_NAMES.len())];
    DetectionBox::new(
        label,
        rng.gen_range(0.3..0.99),
        rng.gen_range(0.0..0.8),
        rng.gen_range(0.0..0.8),
        rng.gen_range(0.05..0.2),
        rng.gen_range(0.05..0.2),
        DETECTION_COLOR,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_seed_replays_the_same_walk() {
        let mut first = RoverGenerator::new(GeneratorConfig::default());
        let mut second = RoverGenerator::new(GeneratorConfig::default());
        for _ in 0..10 {
            let a = first.next_frame();
            let b = second.next_frame();
            assert_eq!(a.position, b.position);
            assert_eq!(a.detections, b.detections);
        }
    }

    #[test]
    fn walk_stays_local_and_boxes_stay_normalized() {
        let config = GeneratorConfig {
            seed: 7,
            ..Default::default()
        };
        let mut generator = RoverGenerator::new(config.clone());
        for _ in 0..500 {
            let frame = generator.next_frame();
            assert!(frame.detections.len() <= config.max_detections);
            assert!(frame.detections.iter().all(|d| d.is_normalized()));
            assert!(frame.stats.inference_fps > 8.0);
        }
        let drift = (generator.position().latitude - config.origin_latitude).abs()
            + (generator.position().longitude - config.origin_longitude).abs();
        assert!(drift <= 500.0 * config.step_degrees * 2.0);
    }

    #[test]
    fn detect_is_deterministic_and_thresholded() {
        let generator = RoverGenerator::new(GeneratorConfig::default());
        let a = generator.detect(1280, 720, 40_000);
        let b = generator.detect(1280, 720, 40_000);
        assert_eq!(a, b);
        assert!(a.iter().all(|d| d.confidence > 0.4));
    }
}
