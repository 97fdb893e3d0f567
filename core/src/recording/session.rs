use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, SystemTime};

use super::{
    BackendFlags, ChannelState, FileRenamer, IncidentNotification, NotificationPublisher,
    RecordingBackend, RecordingChannel, RecordingCompletion, RecordingSession, SessionId,
    SessionParams,
};
use crate::config::EngineConfig;
use crate::prelude::{CoreError, CoreResult};
use crate::telemetry::log::LogManager;
use crate::telemetry::metrics::MetricsRecorder;

/// What happened to one completed recording.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompletionOutcome {
    Published(IncidentNotification),
    Renamed(PathBuf),
    /// Logged and discarded; recording goes on.
    Dropped,
}

struct ControllerState<B> {
    backend: B,
    sessions: [Option<RecordingSession>; 2],
    states: [ChannelState; 2],
}

impl<B: RecordingBackend> ControllerState<B> {
    /// Re-reads the backend flags for `channel` and stores the derived state.
    fn refresh(&mut self, channel: RecordingChannel) -> BackendFlags {
        let flags = self.backend.flags(channel);
        let state = if flags.record_on {
            ChannelState::Recording
        } else if !flags.reset_done && channel == RecordingChannel::Stream {
            ChannelState::ResetPending
        } else {
            ChannelState::Idle
        };
        self.states[channel.index()] = state;
        if !flags.record_on {
            self.sessions[channel.index()] = None;
        }
        flags
    }

    fn start(&mut self, channel: RecordingChannel, params: SessionParams) -> CoreResult<SessionId> {
        let id = channel.session_id();
        self.backend
            .start(channel, id, params.pre_roll_secs, params.duration_secs)?;
        self.states[channel.index()] = ChannelState::Recording;
        self.sessions[channel.index()] = Some(RecordingSession {
            id,
            channel,
            started_at: SystemTime::now(),
            params,
        });
        Ok(id)
    }
}

/// Coordinates the incident and looping-stream channels of one camera.
///
/// Both probes and the completion path may call in from different threads;
/// backend access is serialized through one lock, and completion side
/// effects (publishing, renaming) run after it is released.
pub struct RecordingSessionController<B: RecordingBackend> {
    state: Mutex<ControllerState<B>>,
    stop_requested: AtomicBool,
    stream_enabled: bool,
    incident: SessionParams,
    stream: SessionParams,
    camera_id: String,
    publisher: NotificationPublisher,
    renamer: FileRenamer,
    metrics: Arc<MetricsRecorder>,
    logger: LogManager,
}

impl<B: RecordingBackend> RecordingSessionController<B> {
    pub fn new(
        backend: B,
        config: &EngineConfig,
        publisher: NotificationPublisher,
        renamer: FileRenamer,
        metrics: Arc<MetricsRecorder>,
    ) -> Self {
        let recording = &config.recording;
        Self {
            state: Mutex::new(ControllerState {
                backend,
                sessions: [None, None],
                states: [ChannelState::Idle; 2],
            }),
            stop_requested: AtomicBool::new(false),
            stream_enabled: recording.stream_enabled,
            incident: SessionParams {
                pre_roll_secs: recording.incident_pre_roll_secs,
                duration_secs: recording.incident_duration_secs,
            },
            stream: SessionParams {
                pre_roll_secs: recording.stream_pre_roll_secs,
                duration_secs: recording.stream_duration_secs,
            },
            camera_id: config.camera_id.clone(),
            publisher,
            renamer,
            metrics,
            logger: LogManager::new("incidentcore::record", config.camera_id.clone()),
        }
    }

    fn lock(&self) -> CoreResult<MutexGuard<'_, ControllerState<B>>> {
        self.state
            .lock()
            .map_err(|_| CoreError::Backend("recording controller state poisoned".into()))
    }

    pub fn metrics(&self) -> &Arc<MetricsRecorder> {
        &self.metrics
    }

    pub fn stream_enabled(&self) -> bool {
        self.stream_enabled
    }

    /// Starts an incident clip; a channel that is already recording is left
    /// alone and reported as `AlreadyRecording`.
    pub fn start_incident(&self) -> CoreResult<SessionId> {
        let mut state = self.lock()?;
        let channel = RecordingChannel::Incident;
        if state.refresh(channel).record_on {
            self.logger.detail("incident start ignored, already recording");
            return Err(CoreError::AlreadyRecording(channel));
        }
        match state.start(channel, self.incident) {
            Ok(id) => {
                self.logger.record(&format!(
                    "incident recording started ({}s pre-roll, {}s)",
                    self.incident.pre_roll_secs, self.incident.duration_secs
                ));
                Ok(id)
            }
            Err(err) => {
                self.metrics.record_start_failure();
                self.logger
                    .error(&format!("unable to start incident recording: {}", err));
                Err(err)
            }
        }
    }

    /// Backend `recordOn` flag of the incident channel.
    pub fn incident_recording(&self) -> bool {
        self.lock()
            .map(|state| state.backend.flags(RecordingChannel::Incident).record_on)
            .unwrap_or(false)
    }

    /// Stream-branch probe: restarts the looping recording whenever the
    /// channel is idle, its encoder has reset and no stop was requested.
    /// Returns whether a new segment was started.
    pub fn on_stream_buffer(&self) -> bool {
        if !self.stream_enabled {
            return false;
        }
        let Ok(mut state) = self.lock() else {
            return false;
        };
        let channel = RecordingChannel::Stream;
        let flags = state.refresh(channel);
        if flags.record_on || !flags.reset_done || self.stop_requested() {
            return false;
        }
        match state.start(channel, self.stream) {
            Ok(_) => {
                self.logger.detail("stream segment started");
                true
            }
            Err(err) => {
                self.metrics.record_start_failure();
                self.logger
                    .warn(&format!("unable to start stream recording: {}", err));
                false
            }
        }
    }

    /// Handles a backend completion: incident clips are published, stream
    /// segments renamed to local time.
    pub fn on_completion(&self, completion: RecordingCompletion) -> CompletionOutcome {
        let channel = completion.channel;
        if let Ok(mut state) = self.lock() {
            state.refresh(channel);
        }

        let Some(path) = completion.info.full_path() else {
            self.metrics.record_dropped();
            self.logger.error(&format!(
                "{} completion without a usable path, dropped",
                channel
            ));
            return CompletionOutcome::Dropped;
        };

        match channel {
            RecordingChannel::Incident => match self.publisher.publish(
                &path,
                &self.camera_id,
                completion.info.duration_ms,
                0,
            ) {
                Ok(message) => {
                    self.metrics.record_published();
                    CompletionOutcome::Published(message)
                }
                Err(err) => {
                    self.metrics.record_dropped();
                    self.logger
                        .error(&format!("notification for {} dropped: {}", path.display(), err));
                    CompletionOutcome::Dropped
                }
            },
            RecordingChannel::Stream => {
                match self
                    .renamer
                    .rename(&completion.info.filename, &completion.info.dirpath)
                {
                    Ok(renamed) => {
                        self.metrics.record_renamed();
                        CompletionOutcome::Renamed(renamed)
                    }
                    Err(_) => {
                        self.metrics.record_rename_failure();
                        CompletionOutcome::Dropped
                    }
                }
            }
        }
    }

    pub fn state(&self, channel: RecordingChannel) -> ChannelState {
        match self.lock() {
            Ok(mut state) => {
                state.refresh(channel);
                state.states[channel.index()]
            }
            Err(_) => ChannelState::Idle,
        }
    }

    pub fn session(&self, channel: RecordingChannel) -> Option<RecordingSession> {
        self.lock()
            .ok()
            .and_then(|state| state.sessions[channel.index()].clone())
    }

    /// Stops the stream probe from starting new segments.
    pub fn request_stop(&self) {
        self.stop_requested.store(true, Ordering::SeqCst);
    }

    pub fn stop_requested(&self) -> bool {
        self.stop_requested.load(Ordering::SeqCst)
    }

    /// Stops the stream channel, waits up to `timeout` for its encoder to
    /// reset, then tears the backend down.
    pub fn shutdown(&self, timeout: Duration) -> CoreResult<()> {
        self.request_stop();
        let mut state = self.lock()?;
        if !self.stream_enabled {
            state.backend.teardown();
            return Ok(());
        }

        let channel = RecordingChannel::Stream;
        if state.refresh(channel).record_on {
            self.logger.record("stopping stream recording");
            if let Err(err) = state.backend.stop(channel, channel.session_id()) {
                self.logger
                    .error(&format!("unable to stop stream recording: {}", err));
            }
        }
        let reset = state.backend.reset_signal(channel);
        drop(state);

        let reset_done = reset.wait_timeout(timeout);
        let mut state = self.lock()?;
        state.refresh(channel);
        state.backend.teardown();
        if reset_done {
            self.logger.record("stream encoder reset, backend torn down");
            Ok(())
        } else {
            self.logger.error(&format!(
                "stream encoder did not reset within {:?}, backend torn down",
                timeout
            ));
            Err(CoreError::ResetTimeout(timeout))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::NotifyConfig;
    use crate::recording::notify::{ChannelSink, PublishedMessage};
    use crate::recording::{RecordingCompletionInfo, ResetSignal};
    use std::thread;
    use tokio::sync::mpsc::UnboundedReceiver;

    #[derive(Default)]
    struct Shared {
        record_on: [bool; 2],
        starts: Vec<(RecordingChannel, u32, u32)>,
        stops: usize,
        fail_start: bool,
        torn_down: bool,
    }

    /// Backend whose stop resets the encoder on a helper thread, unless
    /// `resets_on_stop` is off.
    #[derive(Clone)]
    struct TestBackend {
        shared: Arc<Mutex<Shared>>,
        resets: [ResetSignal; 2],
        resets_on_stop: bool,
    }

    impl TestBackend {
        fn new(resets_on_stop: bool) -> Self {
            Self {
                shared: Arc::default(),
                resets: [ResetSignal::new(true), ResetSignal::new(true)],
                resets_on_stop,
            }
        }

        fn finish(&self, channel: RecordingChannel, reset: bool) {
            self.shared.lock().unwrap().record_on[channel.index()] = false;
            self.resets[channel.index()].set(reset);
        }
    }

    impl RecordingBackend for TestBackend {
        fn start(
            &mut self,
            channel: RecordingChannel,
            _session_id: SessionId,
            pre_roll_secs: u32,
            duration_secs: u32,
        ) -> CoreResult<()> {
            let mut shared = self.shared.lock().unwrap();
            if shared.fail_start {
                return Err(CoreError::Backend("no encoder".into()));
            }
            shared.record_on[channel.index()] = true;
            shared.starts.push((channel, pre_roll_secs, duration_secs));
            self.resets[channel.index()].set(false);
            Ok(())
        }

        fn stop(&mut self, channel: RecordingChannel, _session_id: SessionId) -> CoreResult<()> {
            let mut shared = self.shared.lock().unwrap();
            shared.record_on[channel.index()] = false;
            shared.stops += 1;
            if self.resets_on_stop {
                let signal = self.resets[channel.index()].clone();
                thread::spawn(move || {
                    thread::sleep(Duration::from_millis(10));
                    signal.set(true);
                });
            }
            Ok(())
        }

        fn flags(&self, channel: RecordingChannel) -> BackendFlags {
            BackendFlags {
                record_on: self.shared.lock().unwrap().record_on[channel.index()],
                reset_done: self.resets[channel.index()].is_done(),
            }
        }

        fn reset_signal(&self, channel: RecordingChannel) -> ResetSignal {
            self.resets[channel.index()].clone()
        }

        fn teardown(&mut self) {
            self.shared.lock().unwrap().torn_down = true;
        }
    }

    fn controller(
        backend: TestBackend,
        stream: bool,
        tz: chrono_tz::Tz,
    ) -> (
        RecordingSessionController<TestBackend>,
        UnboundedReceiver<PublishedMessage>,
    ) {
        let mut config = EngineConfig::for_camera("cam");
        config.recording.stream_enabled = stream;
        let (sink, rx) = ChannelSink::channel();
        let publisher = NotificationPublisher::new(
            Box::new(sink),
            &NotifyConfig::default(),
            LogManager::default(),
        );
        let renamer = FileRenamer::new(tz, LogManager::default());
        (
            RecordingSessionController::new(
                backend,
                &config,
                publisher,
                renamer,
                Arc::new(MetricsRecorder::new()),
            ),
            rx,
        )
    }

    #[test]
    fn incident_start_is_a_noop_while_recording() {
        let backend = TestBackend::new(true);
        let (ctl, _rx) = controller(backend.clone(), false, chrono_tz::UTC);

        assert_eq!(ctl.start_incident().unwrap(), 0);
        assert!(ctl.incident_recording());
        assert_eq!(ctl.state(RecordingChannel::Incident), ChannelState::Recording);
        assert!(matches!(
            ctl.start_incident(),
            Err(CoreError::AlreadyRecording(RecordingChannel::Incident))
        ));
        let starts = backend.shared.lock().unwrap().starts.clone();
        assert_eq!(starts, vec![(RecordingChannel::Incident, 2, 8)]);
    }

    #[test]
    fn failed_start_is_counted() {
        let backend = TestBackend::new(true);
        backend.shared.lock().unwrap().fail_start = true;
        let (ctl, _rx) = controller(backend, false, chrono_tz::UTC);
        assert!(ctl.start_incident().is_err());
        assert_eq!(ctl.metrics().snapshot().start_failures, 1);
        assert_eq!(ctl.state(RecordingChannel::Incident), ChannelState::Idle);
    }

    #[test]
    fn incident_completion_publishes_notification() {
        let backend = TestBackend::new(true);
        let (ctl, mut rx) = controller(backend.clone(), false, chrono_tz::UTC);
        ctl.start_incident().unwrap();
        backend.finish(RecordingChannel::Incident, true);

        let outcome = ctl.on_completion(RecordingCompletion {
            channel: RecordingChannel::Incident,
            info: RecordingCompletionInfo {
                dirpath: PathBuf::from("tmp/cam/videos"),
                filename: "incident_00000_20240115-143022_1.mp4".into(),
                duration_ms: 10_000,
            },
        });
        assert!(matches!(outcome, CompletionOutcome::Published(_)));
        assert_eq!(ctl.state(RecordingChannel::Incident), ChannelState::Idle);
        assert!(ctl.session(RecordingChannel::Incident).is_none());

        let body: serde_json::Value = serde_json::from_str(&rx.try_recv().unwrap().body).unwrap();
        assert_eq!(body["video_path"], "tmp/cam/videos/incident_00000_20240115-143022_1.mp4");
        assert_eq!(body["length"], "10000");
        assert_eq!(body["retries"], "0");
        assert_eq!(ctl.metrics().snapshot().published, 1);
    }

    #[test]
    fn completion_without_path_is_dropped() {
        let (ctl, mut rx) = controller(TestBackend::new(true), false, chrono_tz::UTC);
        let outcome = ctl.on_completion(RecordingCompletion {
            channel: RecordingChannel::Incident,
            info: RecordingCompletionInfo {
                dirpath: PathBuf::new(),
                filename: "incident.mp4".into(),
                duration_ms: 1,
            },
        });
        assert_eq!(outcome, CompletionOutcome::Dropped);
        assert!(rx.try_recv().is_err());
        assert_eq!(ctl.metrics().snapshot().dropped, 1);
    }

    #[test]
    fn stream_probe_loops_segments_until_stop() {
        let backend = TestBackend::new(true);
        let (ctl, _rx) = controller(backend.clone(), true, chrono_tz::UTC);

        assert!(ctl.on_stream_buffer());
        assert!(!ctl.on_stream_buffer());

        // Segment done, encoder still resetting.
        backend.finish(RecordingChannel::Stream, false);
        assert!(!ctl.on_stream_buffer());
        assert_eq!(ctl.state(RecordingChannel::Stream), ChannelState::ResetPending);

        backend.resets[RecordingChannel::Stream.index()].set(true);
        assert!(ctl.on_stream_buffer());

        backend.finish(RecordingChannel::Stream, true);
        ctl.request_stop();
        assert!(!ctl.on_stream_buffer());
        assert_eq!(backend.shared.lock().unwrap().starts.len(), 2);
    }

    #[test]
    fn stream_probe_is_inert_when_disabled() {
        let backend = TestBackend::new(true);
        let (ctl, _rx) = controller(backend.clone(), false, chrono_tz::UTC);
        assert!(!ctl.on_stream_buffer());
        assert!(backend.shared.lock().unwrap().starts.is_empty());
    }

    #[test]
    fn stream_completion_renames_segment() {
        let dir = tempfile::tempdir().unwrap();
        let name = "stream_00001_20240115-143022_4242.mp4";
        std::fs::write(dir.path().join(name), b"").unwrap();
        let (ctl, _rx) = controller(
            TestBackend::new(true),
            true,
            chrono_tz::America::New_York,
        );
        let outcome = ctl.on_completion(RecordingCompletion {
            channel: RecordingChannel::Stream,
            info: RecordingCompletionInfo {
                dirpath: dir.path().to_path_buf(),
                filename: name.into(),
                duration_ms: 0,
            },
        });
        assert_eq!(
            outcome,
            CompletionOutcome::Renamed(dir.path().join("stream_00001_20240115-093022_EST.mp4"))
        );
        assert_eq!(ctl.metrics().snapshot().renamed, 1);
    }

    #[test]
    fn shutdown_stops_stream_and_waits_for_reset() {
        let backend = TestBackend::new(true);
        let (ctl, _rx) = controller(backend.clone(), true, chrono_tz::UTC);
        assert!(ctl.on_stream_buffer());
        ctl.shutdown(Duration::from_secs(5)).unwrap();

        let shared = backend.shared.lock().unwrap();
        assert_eq!(shared.stops, 1);
        assert!(shared.torn_down);
        drop(shared);
        assert!(ctl.stop_requested());
        assert!(!ctl.on_stream_buffer());
    }

    #[test]
    fn shutdown_times_out_when_encoder_never_resets() {
        let backend = TestBackend::new(false);
        let (ctl, _rx) = controller(backend.clone(), true, chrono_tz::UTC);
        assert!(ctl.on_stream_buffer());
        let err = ctl.shutdown(Duration::from_millis(20)).unwrap_err();
        assert!(matches!(err, CoreError::ResetTimeout(_)));
        assert!(backend.shared.lock().unwrap().torn_down);
    }
}
