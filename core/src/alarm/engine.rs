use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::alarm::rate_limiter::{AlarmState, RateLimiter};
use crate::config::{AlarmConfig, DetectionConfig, EngineConfig};
use crate::frame_interface::FrameMetadata;
use crate::prelude::CoreResult;
use crate::processing::{MotionClassifier, SlidingWindowCounter, ZoneClassifier};
use crate::telemetry::log::LogManager;

/// What the engine concluded for one frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AlarmDecision {
    /// Counters updated, nothing to do.
    Quiet,
    /// Recording already running or inside the cooldown; windows were cleared.
    Suppressed,
    /// Start an incident recording now.
    Triggered,
}

/// Per-frame tallies alongside the decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameSummary {
    pub persons: usize,
    pub moving_vehicles: usize,
    pub stationary_vehicles: usize,
    pub excluded: usize,
    pub decision: AlarmDecision,
}

/// Turns per-object detections into a debounced, rate-limited alarm.
pub struct AlarmEngine {
    detection: DetectionConfig,
    alarm: AlarmConfig,
    motion_enabled: bool,
    zones: ZoneClassifier,
    motion: MotionClassifier,
    person_window: SlidingWindowCounter,
    vehicle_window: SlidingWindowCounter,
    limiter: RateLimiter,
    state: AlarmState,
    logger: LogManager,
}

impl AlarmEngine {
    pub fn new(config: &EngineConfig, zones: ZoneClassifier) -> Self {
        let limiter = RateLimiter::new(&config.alarm);
        Self {
            detection: config.detection.clone(),
            alarm: config.alarm.clone(),
            motion_enabled: config.motion.enabled,
            zones,
            motion: MotionClassifier::new(&config.motion),
            person_window: SlidingWindowCounter::new(config.alarm.window),
            vehicle_window: SlidingWindowCounter::new(config.alarm.window),
            state: AlarmState::new(limiter.base()),
            limiter,
            logger: LogManager::new("incidentcore::alarm", config.camera_id.clone()),
        }
    }

    /// Builds the engine and loads the configured exclusion zones.
    pub fn from_config(config: &EngineConfig) -> CoreResult<Self> {
        let zones = ZoneClassifier::from_config(
            &config.zones,
            LogManager::new("incidentcore::zone", config.camera_id.clone()),
        )?;
        Ok(Self::new(config, zones))
    }

    pub fn state(&self) -> &AlarmState {
        &self.state
    }

    pub fn person_window(&self) -> &SlidingWindowCounter {
        &self.person_window
    }

    pub fn vehicle_window(&self) -> &SlidingWindowCounter {
        &self.vehicle_window
    }

    pub fn zones(&self) -> &ZoneClassifier {
        &self.zones
    }

    pub fn zones_mut(&mut self) -> &mut ZoneClassifier {
        &mut self.zones
    }

    /// Runs one frame through the filters and the alarm rules.
    ///
    /// `incident_recording` is the incident channel's current record flag.
    pub fn process_frame(
        &mut self,
        frame: &mut FrameMetadata,
        incident_recording: bool,
        now: Instant,
    ) -> FrameSummary {
        let mut persons = 0;
        let mut moving_vehicles = 0;
        let mut stationary_vehicles = 0;
        let mut excluded = 0;

        let flow = frame.flow.as_ref();
        for detection in frame.detections.iter_mut() {
            let class_id = detection.class_id;
            if class_id == self.detection.person_class_id {
                if !self.detection.person_enabled {
                    continue;
                }
                self.zones.classify(detection);
                if detection.in_zone() {
                    excluded += 1;
                    self.logger.detail("person inside exclusion zone, removing");
                } else {
                    persons += 1;
                }
            } else if self.detection.is_vehicle_class(class_id) {
                if !self.detection.vehicle_enabled {
                    continue;
                }
                self.zones.classify(detection);
                if detection.in_zone() {
                    excluded += 1;
                    self.logger.detail("vehicle inside exclusion zone, removing");
                    continue;
                }
                let moving = match flow {
                    Some(grid) if self.motion_enabled => {
                        self.motion.is_moving(&detection.bbox, grid)
                    }
                    _ => true,
                };
                if moving {
                    moving_vehicles += 1;
                } else {
                    stationary_vehicles += 1;
                    detection.mark_stationary();
                }
            }
        }

        self.person_window.observe(persons > 0);
        self.vehicle_window.observe(moving_vehicles > 0);

        let decision = self.decide(incident_recording, now);
        FrameSummary {
            persons,
            moving_vehicles,
            stationary_vehicles,
            excluded,
            decision,
        }
    }

    fn decide(&mut self, incident_recording: bool, now: Instant) -> AlarmDecision {
        self.state.recording_on = incident_recording;
        let interval = self.state.current_interval;
        let elapsed = self.state.elapsed_since_alarm(now);
        let within_interval = elapsed.map_or(false, |e| e < interval);
        let past_interval = elapsed.map_or(true, |e| e > interval);

        let at_quota = self.state.recording_counter == self.limiter.threshold() - 1;
        if self.state.recording_on || (within_interval && at_quota) {
            self.reset_windows();
            return AlarmDecision::Suppressed;
        }

        if past_interval {
            self.state.recording_counter = 0;
        }

        let person = self.person_window.sum() > self.alarm.person_frames_limit;
        let vehicle = self.vehicle_window.sum() > self.alarm.vehicle_frames_limit;
        self.logger.detail(&format!(
            "person {} ({}), vehicle {} ({})",
            person,
            self.person_window.sum(),
            vehicle,
            self.vehicle_window.sum()
        ));
        if !(person || vehicle) {
            return AlarmDecision::Quiet;
        }

        self.reset_windows();
        self.state.recording_counter += 1;
        self.state.last_alarm = Some(now);
        self.limiter.update(&mut self.state);
        self.logger.record(&format!(
            "alarm raised (person={}, vehicle={}), next interval {}s, counter {}",
            person,
            vehicle,
            self.state.current_interval.as_secs(),
            self.state.recording_counter
        ));
        AlarmDecision::Triggered
    }

    fn reset_windows(&mut self) {
        self.person_window.reset();
        self.vehicle_window.reset();
    }

    pub fn current_interval(&self) -> Duration {
        self.state.current_interval
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame_interface::{
        BoundingBox, Detection, FlowGrid, FlowVector, Point, Polygon, ZoneSet,
    };

    fn engine() -> AlarmEngine {
        AlarmEngine::from_config(&EngineConfig::default()).unwrap()
    }

    fn person_frame(n: u64) -> FrameMetadata {
        FrameMetadata::new(n, vec![Detection::new(0, BoundingBox::new(100.0, 100.0, 40.0, 80.0))])
    }

    fn vehicle_frame(n: u64, dx: i16) -> FrameMetadata {
        let mut grid = FlowGrid::still(90, 160);
        for row in 0..90 {
            for col in 0..160 {
                grid.set(row, col, FlowVector::new(dx, 0));
            }
        }
        FrameMetadata::new(n, vec![Detection::new(2, BoundingBox::new(200.0, 120.0, 60.0, 40.0))])
            .with_flow(grid)
    }

    #[test]
    fn twenty_one_person_frames_trigger_once() {
        let mut engine = engine();
        let now = Instant::now();
        for n in 0..20 {
            let summary = engine.process_frame(&mut person_frame(n), false, now);
            assert_eq!(summary.decision, AlarmDecision::Quiet);
        }
        let summary = engine.process_frame(&mut person_frame(20), false, now);
        assert_eq!(summary.decision, AlarmDecision::Triggered);
        assert_eq!(engine.person_window().sum(), 0);
        assert_eq!(engine.state().recording_counter, 1);
        assert_eq!(engine.current_interval(), Duration::from_secs(60));
    }

    #[test]
    fn recording_in_progress_suppresses_and_clears_windows() {
        let mut engine = engine();
        let now = Instant::now();
        for n in 0..21 {
            engine.process_frame(&mut person_frame(n), false, now);
        }
        let counter = engine.state().recording_counter;
        for n in 21..60 {
            let summary = engine.process_frame(&mut person_frame(n), true, now);
            assert_eq!(summary.decision, AlarmDecision::Suppressed);
            assert_eq!(engine.person_window().sum(), 0);
            assert_eq!(engine.vehicle_window().sum(), 0);
        }
        assert_eq!(engine.state().recording_counter, counter);
    }

    #[test]
    fn second_alarm_inside_interval_is_suppressed() {
        let mut engine = engine();
        let start = Instant::now();
        for n in 0..21 {
            engine.process_frame(&mut person_frame(n), false, start);
        }
        assert_eq!(engine.state().recording_counter, 1);
        let soon = start + Duration::from_secs(30);
        for n in 21..50 {
            let summary = engine.process_frame(&mut person_frame(n), false, soon);
            assert_eq!(summary.decision, AlarmDecision::Suppressed);
        }
    }

    #[test]
    fn cooldown_elapsed_allows_next_alarm_and_decays_counter() {
        let mut engine = engine();
        let start = Instant::now();
        for n in 0..21 {
            engine.process_frame(&mut person_frame(n), false, start);
        }
        let later = start + Duration::from_secs(61);
        let mut decisions = Vec::new();
        for n in 21..42 {
            decisions.push(engine.process_frame(&mut person_frame(n), false, later).decision);
        }
        assert_eq!(decisions.last(), Some(&AlarmDecision::Triggered));
        // counter decayed to 0 before this alarm, so it is back at 1
        assert_eq!(engine.state().recording_counter, 1);
    }

    #[test]
    fn moving_vehicle_counts_and_stationary_is_marked() {
        let mut engine = engine();
        let now = Instant::now();

        let mut moving = vehicle_frame(0, 16);
        let summary = engine.process_frame(&mut moving, false, now);
        assert_eq!(summary.moving_vehicles, 1);
        assert_eq!(engine.vehicle_window().sum(), 1);

        let mut parked = vehicle_frame(1, 0);
        let summary = engine.process_frame(&mut parked, false, now);
        assert_eq!(summary.stationary_vehicles, 1);
        assert!(parked.detections[0].border_color.is_some());
        assert_eq!(engine.vehicle_window().sum(), 1);
    }

    #[test]
    fn vehicle_without_flow_counts_as_moving() {
        let mut engine = engine();
        let mut frame =
            FrameMetadata::new(0, vec![Detection::new(3, BoundingBox::new(0.0, 0.0, 8.0, 8.0))]);
        let summary = engine.process_frame(&mut frame, false, Instant::now());
        assert_eq!(summary.moving_vehicles, 1);
    }

    #[test]
    fn persons_inside_exclusion_zone_are_ignored() {
        let mut engine = engine();
        engine.zones_mut().set_zones(ZoneSet::new(vec![Polygon {
            name: "yard".into(),
            points: vec![
                Point::new(0, 0),
                Point::new(639, 0),
                Point::new(639, 359),
                Point::new(0, 359),
            ],
        }]));
        let now = Instant::now();
        for n in 0..40 {
            let summary = engine.process_frame(&mut person_frame(n), false, now);
            assert_eq!(summary.excluded, 1);
            assert_eq!(summary.decision, AlarmDecision::Quiet);
        }
        assert_eq!(engine.person_window().sum(), 0);
    }

    #[test]
    fn upstream_zone_tag_excludes_person() {
        let mut engine = engine();
        let mut frame = person_frame(0);
        frame.detections[0].tag_zone("RF");
        let summary = engine.process_frame(&mut frame, false, Instant::now());
        assert_eq!(summary.persons, 0);
        assert_eq!(summary.excluded, 1);
    }

    #[test]
    fn disabled_person_detection_ignores_persons() {
        let mut config = EngineConfig::default();
        config.detection.person_enabled = false;
        let mut engine = AlarmEngine::from_config(&config).unwrap();
        let summary = engine.process_frame(&mut person_frame(0), false, Instant::now());
        assert_eq!(summary.persons, 0);
        assert_eq!(summary.excluded, 0);
    }

    #[test]
    fn back_to_back_alarms_widen_interval() {
        let mut engine = engine();
        let start = Instant::now();
        for n in 0..21 {
            engine.process_frame(&mut person_frame(n), false, start);
        }
        // Exactly at the interval boundary: neither suppressed nor decayed.
        let boundary = start + Duration::from_secs(60);
        let mut last = AlarmDecision::Quiet;
        for n in 21..42 {
            last = engine.process_frame(&mut person_frame(n), false, boundary).decision;
        }
        assert_eq!(last, AlarmDecision::Triggered);
        assert_eq!(engine.state().recording_counter, 0);
        assert_eq!(engine.current_interval(), Duration::from_secs(135));
    }
}
