use crate::generator::template::{drift, paint_box};
use incidentcore::frame_interface::{BoundingBox, Detection, FlowGrid, FlowVector, FrameMetadata};
use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::{Deserialize, Serialize};

/// Configuration for generating synthetic detection/flow frames.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    pub seed: u64,
    pub frame_width: f32,
    pub frame_height: f32,
    pub block_size: u32,
    pub flow_scale: f32,
    /// Nanoseconds between presentation timestamps.
    pub frame_interval_ns: u64,
    /// Chance per quiet frame that a new burst begins.
    pub burst_probability: f64,
    pub burst_min_frames: u32,
    pub burst_max_frames: u32,
    /// Share of bursts that are persons rather than vehicles.
    pub person_share: f64,
    /// Share of vehicle bursts that stay parked.
    pub parked_share: f64,
    /// Pixels per frame a moving object travels.
    pub speed: f32,
    pub missing_pts_probability: f64,
    pub vehicle_class_ids: Vec<u32>,
    pub person_class_id: u32,
    pub scenario: Option<String>,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            seed: 0,
            frame_width: 640.0,
            frame_height: 360.0,
            block_size: 4,
            flow_scale: 32.0,
            frame_interval_ns: 33_333_333,
            burst_probability: 0.02,
            burst_min_frames: 30,
            burst_max_frames: 90,
            person_share: 0.5,
            parked_share: 0.3,
            speed: 1.5,
            missing_pts_probability: 0.01,
            vehicle_class_ids: vec![1, 2, 3, 5, 6, 7],
            person_class_id: 0,
            scenario: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BurstKind {
    Person,
    MovingVehicle,
    ParkedVehicle,
}

#[derive(Debug, Clone)]
struct Burst {
    class_id: u32,
    bbox: BoundingBox,
    step: (f32, f32),
    remaining: u32,
}

/// Seeded source of synthetic frames: quiet stretches broken by bursts of
/// one person or vehicle crossing (or parked in) the scene.
pub struct SceneGenerator {
    config: GeneratorConfig,
    rng: StdRng,
    burst: Option<Burst>,
    frame_number: u64,
    bursts_started: u64,
}

impl SceneGenerator {
    pub fn new(config: GeneratorConfig) -> Self {
        let rng = StdRng::seed_from_u64(config.seed);
        Self {
            config,
            rng,
            burst: None,
            frame_number: 0,
            bursts_started: 0,
        }
    }

    pub fn bursts_started(&self) -> u64 {
        self.bursts_started
    }

    fn grid_dims(&self) -> (usize, usize) {
        let block = self.config.block_size.max(1) as f32;
        (
            (self.config.frame_height / block).ceil() as usize,
            (self.config.frame_width / block).ceil() as usize,
        )
    }

    fn start_burst(&mut self) -> Burst {
        let kind = if self.rng.gen_bool(self.config.person_share.clamp(0.0, 1.0)) {
            BurstKind::Person
        } else if self.rng.gen_bool(self.config.parked_share.clamp(0.0, 1.0)) {
            BurstKind::ParkedVehicle
        } else {
            BurstKind::MovingVehicle
        };
        let class_id = match kind {
            BurstKind::Person => self.config.person_class_id,
            _ if self.config.vehicle_class_ids.is_empty() => self.config.person_class_id,
            _ => {
                let index = self.rng.gen_range(0..self.config.vehicle_class_ids.len());
                self.config.vehicle_class_ids[index]
            }
        };
        let (width, height) = match kind {
            BurstKind::Person => (30.0, 70.0),
            _ => (90.0, 50.0),
        };
        let left = self
            .rng
            .gen_range(0.0..(self.config.frame_width - width).max(1.0));
        let top = self
            .rng
            .gen_range(0.0..(self.config.frame_height - height).max(1.0));
        let direction = if self.rng.gen_bool(0.5) { 1.0 } else { -1.0 };
        let step = match kind {
            BurstKind::ParkedVehicle => (0.0, 0.0),
            _ => (direction * self.config.speed, 0.0),
        };
        let min = self.config.burst_min_frames.max(1);
        let max = self.config.burst_max_frames.max(min);
        self.bursts_started += 1;
        Burst {
            class_id,
            bbox: BoundingBox::new(left, top, width, height),
            step,
            remaining: self.rng.gen_range(min..=max),
        }
    }

    pub fn next_frame(&mut self) -> FrameMetadata {
        let frame_number = self.frame_number;
        self.frame_number += 1;

        let burst_probability = self.config.burst_probability.clamp(0.0, 1.0);
        if self.burst.is_none() && self.rng.gen_bool(burst_probability) {
            self.burst = Some(self.start_burst());
        }

        let (rows, cols) = self.grid_dims();
        let mut grid = FlowGrid::still(rows, cols);
        let mut detections = Vec::new();
        let mut finished = false;
        if let Some(burst) = self.burst.as_mut() {
            let vector: FlowVector = drift(burst.step.0, burst.step.1, self.config.flow_scale);
            paint_box(&mut grid, &burst.bbox, self.config.block_size, vector);
            detections.push(
                Detection::new(burst.class_id, burst.bbox).with_tracking_id(self.bursts_started),
            );

            let max_left = (self.config.frame_width - burst.bbox.width).max(0.0);
            burst.bbox.left = (burst.bbox.left + burst.step.0).clamp(0.0, max_left);
            burst.remaining -= 1;
            finished = burst.remaining == 0;
        }
        if finished {
            self.burst = None;
        }

        let mut frame = FrameMetadata::new(frame_number, detections).with_flow(grid);
        if !self.rng.gen_bool(self.config.missing_pts_probability.clamp(0.0, 1.0)) {
            frame = frame.with_pts(frame_number * self.config.frame_interval_ns);
        }
        frame
    }
}
