//! Immutable per-camera configuration.
//!
//! Every tunable the engine and the recording controller read lives here;
//! defaults reproduce the deployed constants.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::prelude::{CoreError, CoreResult};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    pub person_enabled: bool,
    pub vehicle_enabled: bool,
    pub person_class_id: u32,
    pub vehicle_class_ids: Vec<u32>,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            person_enabled: true,
            vehicle_enabled: true,
            person_class_id: 0,
            vehicle_class_ids: vec![1, 2, 3, 5, 6, 7],
        }
    }
}

impl DetectionConfig {
    pub fn is_vehicle_class(&self, class_id: u32) -> bool {
        self.vehicle_class_ids.contains(&class_id)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlarmConfig {
    /// Sliding window length in frames.
    pub window: usize,
    pub person_frames_limit: i64,
    pub vehicle_frames_limit: i64,
    pub base_interval_secs: u64,
    pub max_interval_secs: u64,
    pub increase_step_secs: u64,
    pub decrease_step_secs: u64,
    /// Recordings allowed inside one interval before backing off.
    pub frequency_threshold: u32,
}

impl Default for AlarmConfig {
    fn default() -> Self {
        Self {
            window: 100,
            person_frames_limit: 20,
            vehicle_frames_limit: 20,
            base_interval_secs: 60,
            max_interval_secs: 420,
            increase_step_secs: 75,
            decrease_step_secs: 15,
            frequency_threshold: 2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ZoneConfig {
    /// Key file with a `[contours]` group; `None` means no exclusion zones.
    pub file: Option<PathBuf>,
    pub reference_width: usize,
    pub reference_height: usize,
    pub inside_ratio: f64,
}

impl Default for ZoneConfig {
    fn default() -> Self {
        Self {
            file: None,
            reference_width: 640,
            reference_height: 360,
            inside_ratio: 0.8,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MotionConfig {
    pub enabled: bool,
    /// Edge length in pixels of one flow block.
    pub block_size: u32,
    /// Fixed-point scale of the flow vectors.
    pub flow_scale: f32,
    pub block_threshold: f32,
    pub box_fraction: f64,
}

impl Default for MotionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            block_size: 4,
            flow_scale: 32.0,
            block_threshold: 0.20,
            box_fraction: 0.4,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecordingConfig {
    pub incident_dir: PathBuf,
    pub incident_pre_roll_secs: u32,
    pub incident_duration_secs: u32,
    pub incident_cache_secs: u32,
    pub incident_default_duration_secs: u32,
    pub stream_enabled: bool,
    pub stream_dir: PathBuf,
    pub stream_pre_roll_secs: u32,
    /// Zero lets the backend apply `stream_chunk_secs`.
    pub stream_duration_secs: u32,
    pub stream_cache_secs: u32,
    pub stream_chunk_secs: u32,
    pub reset_timeout_secs: u64,
}

impl Default for RecordingConfig {
    fn default() -> Self {
        Self {
            incident_dir: PathBuf::from("tmp/0/videos"),
            incident_pre_roll_secs: 2,
            incident_duration_secs: 8,
            incident_cache_secs: 15,
            incident_default_duration_secs: 10,
            stream_enabled: false,
            stream_dir: PathBuf::from("recorded_streams/0"),
            stream_pre_roll_secs: 2,
            stream_duration_secs: 0,
            stream_cache_secs: 15,
            stream_chunk_secs: 10_800,
            reset_timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotifyConfig {
    pub exchange: String,
    pub routing_key: String,
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            exchange: "threat_detect".into(),
            routing_key: "threat_detect".into(),
        }
    }
}

/// Complete configuration for one camera channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Identifier published with every incident (the camera MAC in deployment).
    pub camera_id: String,
    pub detection: DetectionConfig,
    pub alarm: AlarmConfig,
    pub zones: ZoneConfig,
    pub motion: MotionConfig,
    pub recording: RecordingConfig,
    pub notify: NotifyConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::for_camera("0")
    }
}

impl EngineConfig {
    /// Defaults with recording directories derived from the camera id.
    pub fn for_camera(camera_id: &str) -> Self {
        let recording = RecordingConfig {
            incident_dir: PathBuf::from(format!("tmp/{}/videos", camera_id)),
            stream_dir: PathBuf::from(format!("recorded_streams/{}", camera_id)),
            ..RecordingConfig::default()
        };
        Self {
            camera_id: camera_id.to_string(),
            detection: DetectionConfig::default(),
            alarm: AlarmConfig::default(),
            zones: ZoneConfig::default(),
            motion: MotionConfig::default(),
            recording,
            notify: NotifyConfig::default(),
        }
    }

    pub fn reset_timeout(&self) -> Duration {
        Duration::from_secs(self.recording.reset_timeout_secs)
    }

    pub fn validate(&self) -> CoreResult<()> {
        let mut problems = Vec::new();

        if self.camera_id.trim().is_empty() {
            problems.push("camera_id is empty".to_string());
        }
        if self.alarm.window == 0 {
            problems.push("alarm.window must be positive".into());
        }
        if self.alarm.base_interval_secs > self.alarm.max_interval_secs {
            problems.push(format!(
                "alarm.base_interval_secs {} exceeds alarm.max_interval_secs {}",
                self.alarm.base_interval_secs, self.alarm.max_interval_secs
            ));
        }
        if self.alarm.frequency_threshold == 0 {
            problems.push("alarm.frequency_threshold must be positive".into());
        }
        if self.detection.vehicle_enabled && self.detection.vehicle_class_ids.is_empty() {
            problems.push("vehicle detection enabled without vehicle_class_ids".into());
        }
        if self
            .detection
            .vehicle_class_ids
            .contains(&self.detection.person_class_id)
        {
            problems.push("person_class_id also listed as a vehicle class".into());
        }
        if !(self.zones.inside_ratio > 0.0 && self.zones.inside_ratio <= 1.0) {
            problems.push("zones.inside_ratio must be in (0, 1]".into());
        }
        if self.zones.reference_width == 0 || self.zones.reference_height == 0 {
            problems.push("zones reference resolution must be non-zero".into());
        }
        if self.motion.block_size == 0 {
            problems.push("motion.block_size must be positive".into());
        }
        if self.motion.flow_scale <= 0.0 {
            problems.push("motion.flow_scale must be positive".into());
        }
        if !(self.motion.box_fraction > 0.0 && self.motion.box_fraction <= 1.0) {
            problems.push("motion.box_fraction must be in (0, 1]".into());
        }
        if self.recording.incident_duration_secs == 0 {
            problems.push("recording.incident_duration_secs must be positive".into());
        }
        if self.recording.stream_enabled && self.recording.stream_chunk_secs == 0 {
            problems.push("recording.stream_chunk_secs must be positive".into());
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(CoreError::InvalidConfig(problems.join("; ")))
        }
    }
}
