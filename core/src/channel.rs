//! One camera's decision pipeline wired to its recording channels.

use std::fs;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::alarm::{AlarmDecision, AlarmEngine, FrameSummary};
use crate::config::EngineConfig;
use crate::frame_interface::FrameMetadata;
use crate::prelude::{CoreError, CoreResult};
use crate::processing::TimestampRepair;
use crate::recording::{
    ChannelState, CompletionOutcome, CompletionReceiver, FileRenamer, NotificationPublisher,
    NotificationSink, RecordingBackend, RecordingChannel, RecordingCompletion,
    RecordingSessionController,
};
use crate::telemetry::log::LogManager;
use crate::telemetry::metrics::{MetricsRecorder, MetricsSnapshot};

/// Serializable view of a channel for status reporting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelStatus {
    pub camera_id: String,
    pub current_interval_secs: u64,
    pub recording_counter: u32,
    pub person_window_sum: i64,
    pub vehicle_window_sum: i64,
    pub incident: ChannelState,
    pub stream: ChannelState,
    pub repaired_timestamps: u64,
    pub metrics: MetricsSnapshot,
}

/// Entry points the media pipeline calls for one camera.
///
/// The inference probe, the stream probe and completion delivery may run
/// on different threads.
pub struct CameraChannel<B: RecordingBackend> {
    camera_id: String,
    engine: Mutex<AlarmEngine>,
    recorder: RecordingSessionController<B>,
    timestamps: Mutex<TimestampRepair>,
    metrics: Arc<MetricsRecorder>,
    logger: LogManager,
}

impl<B: RecordingBackend> CameraChannel<B> {
    pub fn new(
        config: &EngineConfig,
        engine: AlarmEngine,
        recorder: RecordingSessionController<B>,
    ) -> Self {
        Self {
            camera_id: config.camera_id.clone(),
            engine: Mutex::new(engine),
            metrics: Arc::clone(recorder.metrics()),
            recorder,
            timestamps: Mutex::new(TimestampRepair::new()),
            logger: LogManager::new("incidentcore::channel", config.camera_id.clone()),
        }
    }

    /// Validates `config`, creates the recording directories, loads the
    /// zones and wires the recording side to `backend` and `sink`.
    pub fn from_config(
        config: &EngineConfig,
        backend: B,
        sink: Box<dyn NotificationSink>,
    ) -> CoreResult<Self> {
        config.validate()?;
        fs::create_dir_all(&config.recording.incident_dir)?;
        if config.recording.stream_enabled {
            fs::create_dir_all(&config.recording.stream_dir)?;
        }
        let engine = AlarmEngine::from_config(config)?;
        let publisher = NotificationPublisher::new(
            sink,
            &config.notify,
            LogManager::new("incidentcore::notify", config.camera_id.clone()),
        );
        let renamer = FileRenamer::from_env(LogManager::new(
            "incidentcore::rename",
            config.camera_id.clone(),
        ));
        let recorder = RecordingSessionController::new(
            backend,
            config,
            publisher,
            renamer,
            Arc::new(MetricsRecorder::new()),
        );
        Ok(Self::new(config, engine, recorder))
    }

    fn engine(&self) -> MutexGuard<'_, AlarmEngine> {
        self.engine.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn camera_id(&self) -> &str {
        &self.camera_id
    }

    pub fn recorder(&self) -> &RecordingSessionController<B> {
        &self.recorder
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    pub fn on_inference_frame(&self, frame: &mut FrameMetadata) -> FrameSummary {
        self.on_inference_frame_at(frame, Instant::now())
    }

    /// Inference probe with an explicit clock.
    pub fn on_inference_frame_at(&self, frame: &mut FrameMetadata, now: Instant) -> FrameSummary {
        if let Ok(mut timestamps) = self.timestamps.lock() {
            frame.pts = timestamps.repair(frame.pts);
        }
        self.metrics.record_frame();

        let recording = self.recorder.incident_recording();
        let summary = self.engine().process_frame(frame, recording, now);
        match summary.decision {
            AlarmDecision::Quiet => {}
            AlarmDecision::Suppressed => self.metrics.record_suppressed(),
            AlarmDecision::Triggered => {
                self.metrics.record_alarm();
                match self.recorder.start_incident() {
                    Ok(_) | Err(CoreError::AlreadyRecording(_)) => {}
                    Err(err) => self
                        .logger
                        .warn(&format!("frame {} alarm lost: {}", frame.frame_number, err)),
                }
            }
        }
        summary
    }

    pub fn on_stream_buffer(&self) -> bool {
        self.recorder.on_stream_buffer()
    }

    pub fn on_completion(&self, completion: RecordingCompletion) -> CompletionOutcome {
        self.recorder.on_completion(completion)
    }

    /// Handles every completion already queued on `receiver`.
    pub fn drain_completions(&self, receiver: &mut CompletionReceiver) -> Vec<CompletionOutcome> {
        let mut outcomes = Vec::new();
        while let Ok(completion) = receiver.try_recv() {
            outcomes.push(self.on_completion(completion));
        }
        outcomes
    }

    /// Blacks out the exclusion zones in a raw frame.
    pub fn blackout(
        &self,
        pixels: &mut [u8],
        width: usize,
        height: usize,
        bytes_per_pixel: usize,
    ) -> CoreResult<()> {
        self.engine()
            .zones_mut()
            .blackout(pixels, width, height, bytes_per_pixel)
    }

    pub fn status(&self) -> ChannelStatus {
        let engine = self.engine();
        let repaired = self
            .timestamps
            .lock()
            .map(|t| t.repaired())
            .unwrap_or_default();
        ChannelStatus {
            camera_id: self.camera_id.clone(),
            current_interval_secs: engine.current_interval().as_secs(),
            recording_counter: engine.state().recording_counter,
            person_window_sum: engine.person_window().sum(),
            vehicle_window_sum: engine.vehicle_window().sum(),
            incident: self.recorder.state(RecordingChannel::Incident),
            stream: self.recorder.state(RecordingChannel::Stream),
            repaired_timestamps: repaired,
            metrics: self.metrics.snapshot(),
        }
    }

    pub fn shutdown(&self, timeout: Duration) -> CoreResult<()> {
        self.logger.record("shutting down recording channels");
        self.recorder.shutdown(timeout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame_interface::{BoundingBox, Detection};
    use crate::recording::notify::{ChannelSink, PublishedMessage};
    use crate::recording::{completion_channel, SimulatedBackend, SimulatedBackendConfig};
    use std::path::Path;
    use tokio::sync::mpsc::UnboundedReceiver;

    struct Rig {
        channel: CameraChannel<SimulatedBackend>,
        backend: SimulatedBackend,
        completions: CompletionReceiver,
        messages: UnboundedReceiver<PublishedMessage>,
    }

    fn rig(root: &Path, stream: bool) -> Rig {
        let mut config = EngineConfig::for_camera("cam-7");
        config.recording.incident_dir = root.join("videos");
        config.recording.stream_dir = root.join("streams");
        config.recording.stream_enabled = stream;
        config.recording.stream_chunk_secs = 60;

        let (tx, completions) = completion_channel();
        let mut sim_config = SimulatedBackendConfig::from_recording(&config.recording);
        sim_config.reset_latency = Duration::from_millis(250);
        let backend = SimulatedBackend::new(sim_config, tx);
        let (sink, messages) = ChannelSink::channel();
        let channel = CameraChannel::from_config(&config, backend.clone(), Box::new(sink)).unwrap();
        Rig {
            channel,
            backend,
            completions,
            messages,
        }
    }

    fn person_frame(n: u64) -> FrameMetadata {
        FrameMetadata::new(n, vec![Detection::new(0, BoundingBox::new(50.0, 50.0, 30.0, 60.0))])
    }

    #[test]
    fn sustained_person_starts_exactly_one_incident() {
        let dir = tempfile::tempdir().unwrap();
        let mut rig = rig(dir.path(), false);
        let t0 = Instant::now();
        rig.backend.advance(t0);

        let mut triggered = 0;
        for n in 0..21 {
            let summary = rig.channel.on_inference_frame_at(&mut person_frame(n), t0);
            if summary.decision == AlarmDecision::Triggered {
                triggered += 1;
                assert_eq!(n, 20);
            }
        }
        assert_eq!(triggered, 1);
        assert_eq!(rig.backend.starts(RecordingChannel::Incident), 1);

        for n in 21..60 {
            let summary = rig.channel.on_inference_frame_at(&mut person_frame(n), t0);
            assert_eq!(summary.decision, AlarmDecision::Suppressed);
        }
        let status = rig.channel.status();
        assert_eq!(status.recording_counter, 1);
        assert_eq!(status.incident, ChannelState::Recording);
        assert_eq!(status.metrics.frames, 60);
        assert_eq!(status.metrics.alarms, 1);
        assert_eq!(status.metrics.suppressed, 39);
        assert_eq!(rig.backend.starts(RecordingChannel::Incident), 1);

        rig.backend.advance(t0 + Duration::from_secs(8));
        let outcomes = rig.channel.drain_completions(&mut rig.completions);
        assert_eq!(outcomes.len(), 1);
        assert!(matches!(outcomes[0], CompletionOutcome::Published(_)));

        let body: serde_json::Value =
            serde_json::from_str(&rig.messages.try_recv().unwrap().body).unwrap();
        assert_eq!(body["camera_id"], "cam-7");
        assert_eq!(body["length"], "10000");
    }

    #[test]
    fn missing_timestamps_are_repaired() {
        let dir = tempfile::tempdir().unwrap();
        let rig = rig(dir.path(), false);
        let mut first = person_frame(0).with_pts(1_000);
        rig.channel.on_inference_frame(&mut first);
        let mut second = person_frame(1);
        rig.channel.on_inference_frame(&mut second);
        assert_eq!(second.pts, Some(1_000));
        assert_eq!(rig.channel.status().repaired_timestamps, 1);
    }

    #[test]
    fn leading_frames_without_timestamp_stay_unstamped() {
        let dir = tempfile::tempdir().unwrap();
        let rig = rig(dir.path(), false);
        let mut first = person_frame(0);
        rig.channel.on_inference_frame(&mut first);
        assert_eq!(first.pts, None);
        assert_eq!(rig.channel.status().repaired_timestamps, 0);
    }

    #[test]
    fn stream_segments_loop_and_stop_on_shutdown() {
        let dir = tempfile::tempdir().unwrap();
        let mut rig = rig(dir.path(), true);
        let t0 = Instant::now();
        rig.backend.advance(t0);

        assert!(rig.channel.on_stream_buffer());
        rig.backend.advance(t0 + Duration::from_secs(60));
        assert_eq!(rig.channel.status().stream, ChannelState::ResetPending);
        assert!(!rig.channel.on_stream_buffer());
        rig.backend.advance(t0 + Duration::from_secs(61));
        assert!(rig.channel.on_stream_buffer());
        assert_eq!(rig.backend.starts(RecordingChannel::Stream), 2);

        let outcomes = rig.channel.drain_completions(&mut rig.completions);
        assert!(matches!(outcomes[..], [CompletionOutcome::Renamed(_)]));

        rig.channel.shutdown(Duration::from_secs(5)).unwrap();
        assert!(rig.backend.is_torn_down());
        assert!(!rig.channel.on_stream_buffer());
        assert_eq!(rig.channel.metrics().renamed, 1);
    }

    #[test]
    fn shutdown_waits_out_pending_stream_reset() {
        let dir = tempfile::tempdir().unwrap();
        let rig = rig(dir.path(), true);
        let t0 = Instant::now();
        rig.backend.advance(t0);

        assert!(rig.channel.on_stream_buffer());
        rig.backend.advance(t0 + Duration::from_secs(60));
        assert_eq!(rig.channel.status().stream, ChannelState::ResetPending);

        rig.channel.shutdown(Duration::from_secs(2)).unwrap();
        assert!(rig.backend.is_torn_down());
        assert_eq!(rig.channel.status().stream, ChannelState::Idle);
    }
}
