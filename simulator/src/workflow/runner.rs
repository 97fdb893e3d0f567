use crate::generator::profile::SceneGenerator;
use crate::status_bridge::bridge::StatusBridge;
use crate::status_bridge::model::StatusModel;
use crate::workflow::config::WorkflowConfig;
use anyhow::Context;
use incidentcore::alarm::AlarmDecision;
use incidentcore::channel::ChannelStatus;
use incidentcore::lifecycle::ShutdownSignal;
use incidentcore::recording::{
    completion_channel, CompletionOutcome, JsonLinesSink, LogSink, NotificationSink,
    SimulatedBackend, SimulatedBackendConfig,
};
use incidentcore::CameraChannel;
use log::{info, warn};
use std::time::{Duration, Instant};

pub struct WorkflowResult {
    pub frames: u64,
    pub triggered: u64,
    pub published: Vec<String>,
    pub renamed: Vec<String>,
    pub dropped: u64,
    pub bursts: u64,
    pub stopped_early: bool,
    pub status: ChannelStatus,
}

#[derive(Clone)]
pub struct Runner {
    config: WorkflowConfig,
}

impl Runner {
    pub fn new(config: WorkflowConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &WorkflowConfig {
        &self.config
    }

    fn sink(&self) -> Box<dyn NotificationSink> {
        match &self.config.outbox {
            Some(path) => Box::new(JsonLinesSink::new(path.clone())),
            None => Box::new(LogSink),
        }
    }

    /// Feeds the configured number of frames through one camera channel on
    /// a simulated clock, then stops the recording channels.
    pub fn execute(
        &self,
        shutdown: &ShutdownSignal,
        bridge: Option<&StatusBridge>,
    ) -> anyhow::Result<WorkflowResult> {
        self.config.validate()?;
        let engine_config = &self.config.engine;
        let (completion_tx, mut completions) = completion_channel();
        let backend = SimulatedBackend::new(
            SimulatedBackendConfig::from_recording(&engine_config.recording),
            completion_tx,
        );
        let channel = CameraChannel::from_config(engine_config, backend.clone(), self.sink())
            .context("building camera channel")?;
        let mut generator = SceneGenerator::new(self.config.generator.clone());
        if let Some(name) = &self.config.generator.scenario {
            info!("scenario {} on camera {}", name, engine_config.camera_id);
        }

        let start = Instant::now();
        let step = Duration::from_millis(self.config.frame_interval_ms);
        backend.advance(start);

        let mut frames = 0;
        let mut triggered = 0;
        let mut published = Vec::new();
        let mut renamed = Vec::new();
        let mut dropped = 0;
        let mut last_decision = None;
        let mut stopped_early = false;

        for index in 0..self.config.frames {
            if shutdown.is_requested() {
                warn!("shutdown requested after {} frames", frames);
                stopped_early = true;
                break;
            }
            let now = start + step * index as u32;
            let mut frame = generator.next_frame();

            channel.on_stream_buffer();
            let summary = channel.on_inference_frame_at(&mut frame, now);
            if summary.decision == AlarmDecision::Triggered {
                triggered += 1;
            }
            last_decision = Some(summary.decision);
            backend.advance(now);
            for outcome in channel.drain_completions(&mut completions) {
                match outcome {
                    CompletionOutcome::Published(message) => published.push(message.video_path),
                    CompletionOutcome::Renamed(path) => renamed.push(path.display().to_string()),
                    CompletionOutcome::Dropped => dropped += 1,
                }
            }
            frames += 1;

            if let Some(bridge) = bridge {
                if frames % self.config.status_every.max(1) == 0 {
                    bridge.publish(StatusModel {
                        frame: frame.frame_number,
                        last_decision,
                        channel: Some(channel.status()),
                        message: "running".into(),
                    });
                }
            }
        }

        let stop = channel.shutdown(engine_config.reset_timeout());
        for outcome in channel.drain_completions(&mut completions) {
            match outcome {
                CompletionOutcome::Published(message) => published.push(message.video_path),
                CompletionOutcome::Renamed(path) => renamed.push(path.display().to_string()),
                CompletionOutcome::Dropped => dropped += 1,
            }
        }
        let status = channel.status();
        if let Some(bridge) = bridge {
            bridge.publish(StatusModel {
                frame: frames,
                last_decision,
                channel: Some(status.clone()),
                message: "stopped".into(),
            });
        }
        stop.context("stopping recording channels")?;

        info!(
            "camera {}: {} frames, {} alarms, {} published, {} segments",
            channel.camera_id(),
            frames,
            triggered,
            published.len(),
            renamed.len()
        );
        Ok(WorkflowResult {
            frames,
            triggered,
            published,
            renamed,
            dropped,
            bursts: generator.bursts_started(),
            stopped_early,
            status,
        })
    }
}
