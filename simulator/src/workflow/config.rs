use crate::generator::profile::GeneratorConfig;
use anyhow::Context;
use incidentcore::EngineConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// One simulated camera run: the engine configuration plus the synthetic
/// scene that drives it.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkflowConfig {
    pub engine: EngineConfig,
    pub generator: GeneratorConfig,
    pub frames: u64,
    /// Simulated time between frames.
    pub frame_interval_ms: u64,
    /// Notification outbox; notifications are only logged when unset.
    pub outbox: Option<PathBuf>,
    /// Frames between status publications.
    pub status_every: u64,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            engine: EngineConfig::default(),
            generator: GeneratorConfig::default(),
            frames: 3_000,
            frame_interval_ms: 33,
            outbox: None,
            status_every: 30,
        }
    }
}

impl WorkflowConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path_ref = path.as_ref();
        let contents = fs::read_to_string(path_ref)
            .with_context(|| format!("reading workflow config {}", path_ref.display()))?;
        let config: WorkflowConfig = serde_yaml::from_str(&contents)
            .with_context(|| format!("parsing workflow config {}", path_ref.display()))?;
        Ok(config)
    }

    pub fn from_args(camera_id: &str, frames: u64, seed: u64) -> Self {
        let engine = EngineConfig::for_camera(camera_id);
        let generator = GeneratorConfig {
            seed,
            person_class_id: engine.detection.person_class_id,
            vehicle_class_ids: engine.detection.vehicle_class_ids.clone(),
            ..GeneratorConfig::default()
        };
        Self {
            engine,
            generator,
            frames,
            ..Self::default()
        }
    }

    /// Applies command-line overrides on top of a loaded file.
    pub fn with_overrides(
        mut self,
        zones: Option<PathBuf>,
        stream_record: bool,
        frames: Option<u64>,
        seed: Option<u64>,
    ) -> Self {
        if zones.is_some() {
            self.engine.zones.file = zones;
        }
        if stream_record {
            self.engine.recording.stream_enabled = true;
        }
        if let Some(frames) = frames {
            self.frames = frames;
        }
        if let Some(seed) = seed {
            self.generator.seed = seed;
        }
        self
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        self.engine
            .validate()
            .context("validating engine section")?;
        anyhow::ensure!(self.frame_interval_ms > 0, "frame_interval_ms must be positive");
        Ok(())
    }
}
