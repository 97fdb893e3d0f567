use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use log::{debug, warn};

use super::backend::{CompletionSender, RecordingBackend};
use super::{
    BackendFlags, RecordingChannel, RecordingCompletion, RecordingCompletionInfo, ResetSignal,
    SessionId,
};
use crate::config::RecordingConfig;
use crate::prelude::{CoreError, CoreResult};

/// Settings for [`SimulatedBackend`].
#[derive(Debug, Clone)]
pub struct SimulatedBackendConfig {
    pub incident_dir: PathBuf,
    pub incident_default_secs: u32,
    pub stream_dir: PathBuf,
    pub stream_default_secs: u32,
    /// Pre-roll the encoder cache can hold, per channel.
    pub incident_cache_secs: u32,
    pub stream_cache_secs: u32,
    /// Delay between a session finishing and the encoder reporting reset.
    pub reset_latency: Duration,
    /// Write an empty file for every completed session.
    pub write_placeholders: bool,
}

impl SimulatedBackendConfig {
    pub fn from_recording(config: &RecordingConfig) -> Self {
        Self {
            incident_dir: config.incident_dir.clone(),
            incident_default_secs: config.incident_default_duration_secs,
            stream_dir: config.stream_dir.clone(),
            stream_default_secs: config.stream_chunk_secs,
            incident_cache_secs: config.incident_cache_secs,
            stream_cache_secs: config.stream_cache_secs,
            reset_latency: Duration::from_millis(50),
            write_placeholders: true,
        }
    }
}

struct ActiveSession {
    id: SessionId,
    started: Instant,
    started_utc: DateTime<Utc>,
    pre_roll_secs: u32,
    duration: Duration,
}

struct SimChannel {
    dir: PathBuf,
    default_secs: u32,
    cache_secs: u32,
    active: Option<ActiveSession>,
    reset_pending: bool,
    /// Bumped on every finished session so a stale reset timer is ignored.
    reset_epoch: u64,
    starts: u64,
    completed: u64,
}

struct SimState {
    clock: Instant,
    sequence: u64,
    torn_down: bool,
    channels: [SimChannel; 2],
}

/// In-process backend driven by an explicit clock.
///
/// Sessions finish once their duration has elapsed on the clock passed to
/// [`advance`](Self::advance) or when stopped. The encoder reset follows on
/// the next tick or after `reset_latency`, whichever comes first, so a
/// shutdown waiting on the reset completes even when the clock stops.
/// Clones share state, so a driver can keep one handle while the
/// controller owns another.
#[derive(Clone)]
pub struct SimulatedBackend {
    state: Arc<Mutex<SimState>>,
    resets: [ResetSignal; 2],
    completions: CompletionSender,
    reset_latency: Duration,
    write_placeholders: bool,
}

impl SimulatedBackend {
    pub fn new(config: SimulatedBackendConfig, completions: CompletionSender) -> Self {
        let channel = |dir: PathBuf, default_secs: u32, cache_secs: u32| SimChannel {
            dir,
            default_secs,
            cache_secs,
            active: None,
            reset_pending: false,
            reset_epoch: 0,
            starts: 0,
            completed: 0,
        };
        Self {
            state: Arc::new(Mutex::new(SimState {
                clock: Instant::now(),
                sequence: 0,
                torn_down: false,
                channels: [
                    channel(
                        config.incident_dir,
                        config.incident_default_secs,
                        config.incident_cache_secs,
                    ),
                    channel(
                        config.stream_dir,
                        config.stream_default_secs,
                        config.stream_cache_secs,
                    ),
                ],
            })),
            resets: [ResetSignal::new(true), ResetSignal::new(true)],
            completions,
            reset_latency: config.reset_latency,
            write_placeholders: config.write_placeholders,
        }
    }

    fn lock(&self) -> CoreResult<MutexGuard<'_, SimState>> {
        self.state
            .lock()
            .map_err(|_| CoreError::Backend("simulated backend state poisoned".into()))
    }

    /// Moves the clock forward, completing pending resets and expired sessions.
    pub fn advance(&self, now: Instant) {
        let Ok(mut state) = self.lock() else {
            return;
        };
        state.clock = now;
        for channel in RecordingChannel::ALL {
            let slot = &mut state.channels[channel.index()];
            if slot.reset_pending {
                slot.reset_pending = false;
                self.resets[channel.index()].set(true);
            }
            let expired = slot
                .active
                .as_ref()
                .map_or(false, |s| now.saturating_duration_since(s.started) >= s.duration);
            if expired {
                self.finish(&mut state, channel, now);
            }
        }
    }

    /// Number of successful starts on `channel`.
    pub fn starts(&self, channel: RecordingChannel) -> u64 {
        self.lock()
            .map(|s| s.channels[channel.index()].starts)
            .unwrap_or(0)
    }

    pub fn completed(&self, channel: RecordingChannel) -> u64 {
        self.lock()
            .map(|s| s.channels[channel.index()].completed)
            .unwrap_or(0)
    }

    pub fn is_torn_down(&self) -> bool {
        self.lock().map(|s| s.torn_down).unwrap_or(true)
    }

    fn finish(&self, state: &mut SimState, channel: RecordingChannel, now: Instant) {
        state.sequence += 1;
        let sequence = state.sequence;
        let slot = &mut state.channels[channel.index()];
        let Some(session) = slot.active.take() else {
            return;
        };
        slot.reset_pending = true;
        slot.reset_epoch += 1;
        slot.completed += 1;
        self.schedule_reset(channel, slot.reset_epoch);

        // The encoder can only prepend what its cache still holds.
        let pre_roll_secs = session.pre_roll_secs.min(slot.cache_secs);
        let elapsed = now.saturating_duration_since(session.started);
        let duration_ms = elapsed.as_millis() as u64 + u64::from(pre_roll_secs) * 1000;
        let filename = format!(
            "{}_{:05}_{}_{}.mp4",
            channel.prefix(),
            session.id,
            session.started_utc.format("%Y%m%d-%H%M%S"),
            sequence
        );
        if self.write_placeholders {
            write_placeholder(&slot.dir, &filename);
        }

        let completion = RecordingCompletion {
            channel,
            info: RecordingCompletionInfo {
                dirpath: slot.dir.clone(),
                filename,
                duration_ms,
            },
        };
        if self.completions.send(completion).is_err() {
            debug!(
                target: "incidentcore::record",
                "completion receiver gone, {} completion dropped", channel
            );
        }
    }

    /// Completes the reset for `epoch` after `reset_latency` unless a tick
    /// or a newer session got there first.
    fn schedule_reset(&self, channel: RecordingChannel, epoch: u64) {
        let shared = Arc::clone(&self.state);
        let signal = self.resets[channel.index()].clone();
        let latency = self.reset_latency;
        thread::spawn(move || {
            thread::sleep(latency);
            if let Ok(mut state) = shared.lock() {
                let slot = &mut state.channels[channel.index()];
                if slot.reset_pending && slot.reset_epoch == epoch {
                    slot.reset_pending = false;
                    signal.set(true);
                }
            }
        });
    }
}

fn write_placeholder(dir: &Path, filename: &str) {
    if let Err(err) = fs::create_dir_all(dir).and_then(|_| fs::write(dir.join(filename), b"")) {
        warn!(
            target: "incidentcore::record",
            "could not write {}: {}",
            dir.join(filename).display(),
            err
        );
    }
}

impl RecordingBackend for SimulatedBackend {
    fn start(
        &mut self,
        channel: RecordingChannel,
        session_id: SessionId,
        pre_roll_secs: u32,
        duration_secs: u32,
    ) -> CoreResult<()> {
        let mut state = self.lock()?;
        if state.torn_down {
            return Err(CoreError::Backend("backend torn down".into()));
        }
        let clock = state.clock;
        let signal = &self.resets[channel.index()];
        let slot = &mut state.channels[channel.index()];
        if slot.active.is_some() {
            return Err(CoreError::AlreadyRecording(channel));
        }
        if !signal.is_done() {
            return Err(CoreError::Backend(format!(
                "{} encoder reset in progress",
                channel
            )));
        }
        let secs = if duration_secs == 0 {
            slot.default_secs
        } else {
            duration_secs
        };
        slot.active = Some(ActiveSession {
            id: session_id,
            started: clock,
            started_utc: Utc::now(),
            pre_roll_secs,
            duration: Duration::from_secs(u64::from(secs)),
        });
        slot.starts += 1;
        signal.set(false);
        Ok(())
    }

    fn stop(&mut self, channel: RecordingChannel, _session_id: SessionId) -> CoreResult<()> {
        let mut state = self.lock()?;
        if state.channels[channel.index()].active.is_none() {
            return Err(CoreError::NotRecording(channel));
        }
        let clock = state.clock;
        self.finish(&mut state, channel, clock);
        Ok(())
    }

    fn flags(&self, channel: RecordingChannel) -> BackendFlags {
        let record_on = self
            .lock()
            .map(|s| s.channels[channel.index()].active.is_some())
            .unwrap_or(false);
        BackendFlags {
            record_on,
            reset_done: self.resets[channel.index()].is_done(),
        }
    }

    fn reset_signal(&self, channel: RecordingChannel) -> ResetSignal {
        self.resets[channel.index()].clone()
    }

    fn teardown(&mut self) {
        if let Ok(mut state) = self.lock() {
            state.torn_down = true;
            for slot in state.channels.iter_mut() {
                slot.active = None;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recording::backend::completion_channel;
    use tempfile::tempdir;

    fn backend(root: &Path) -> (SimulatedBackend, crate::recording::CompletionReceiver) {
        let (tx, rx) = completion_channel();
        let config = SimulatedBackendConfig {
            incident_dir: root.join("incident"),
            incident_default_secs: 10,
            stream_dir: root.join("stream"),
            stream_default_secs: 30,
            incident_cache_secs: 15,
            stream_cache_secs: 1,
            reset_latency: Duration::from_millis(250),
            write_placeholders: true,
        };
        (SimulatedBackend::new(config, tx), rx)
    }

    #[test]
    fn session_completes_after_duration_and_resets_next_tick() {
        let dir = tempdir().unwrap();
        let (mut sim, mut rx) = backend(dir.path());
        let t0 = Instant::now();
        sim.advance(t0);
        sim.start(RecordingChannel::Incident, 0, 2, 8).unwrap();
        assert!(sim.flags(RecordingChannel::Incident).record_on);
        assert!(matches!(
            sim.start(RecordingChannel::Incident, 0, 2, 8),
            Err(CoreError::AlreadyRecording(_))
        ));

        sim.advance(t0 + Duration::from_secs(7));
        assert!(rx.try_recv().is_err());

        sim.advance(t0 + Duration::from_secs(8));
        let done = rx.try_recv().unwrap();
        assert_eq!(done.channel, RecordingChannel::Incident);
        assert_eq!(done.info.duration_ms, 10_000);
        assert!(done.info.filename.starts_with("incident_00000_"));
        assert!(done.info.full_path().unwrap().exists());
        let flags = sim.flags(RecordingChannel::Incident);
        assert!(!flags.record_on);
        assert!(!flags.reset_done);

        sim.advance(t0 + Duration::from_secs(9));
        assert!(sim.flags(RecordingChannel::Incident).reset_done);
        assert_eq!(sim.completed(RecordingChannel::Incident), 1);
    }

    #[test]
    fn zero_duration_uses_channel_default() {
        let dir = tempdir().unwrap();
        let (mut sim, mut rx) = backend(dir.path());
        let t0 = Instant::now();
        sim.advance(t0);
        sim.start(RecordingChannel::Stream, 1, 2, 0).unwrap();
        sim.advance(t0 + Duration::from_secs(29));
        assert!(rx.try_recv().is_err());
        sim.advance(t0 + Duration::from_secs(30));
        assert_eq!(rx.try_recv().unwrap().channel, RecordingChannel::Stream);
    }

    #[test]
    fn stop_completes_and_resets_asynchronously() {
        let dir = tempdir().unwrap();
        let (mut sim, mut rx) = backend(dir.path());
        assert!(matches!(
            sim.stop(RecordingChannel::Stream, 1),
            Err(CoreError::NotRecording(_))
        ));
        sim.start(RecordingChannel::Stream, 1, 2, 0).unwrap();
        sim.stop(RecordingChannel::Stream, 1).unwrap();
        assert!(rx.try_recv().is_ok());
        assert!(sim
            .reset_signal(RecordingChannel::Stream)
            .wait_timeout(Duration::from_secs(5)));
    }

    #[test]
    fn expired_session_resets_without_another_tick() {
        let dir = tempdir().unwrap();
        let (mut sim, mut rx) = backend(dir.path());
        let t0 = Instant::now();
        sim.advance(t0);
        sim.start(RecordingChannel::Stream, 1, 2, 1).unwrap();
        sim.advance(t0 + Duration::from_secs(1));
        assert!(rx.try_recv().is_ok());
        assert!(!sim.flags(RecordingChannel::Stream).reset_done);
        assert!(sim
            .reset_signal(RecordingChannel::Stream)
            .wait_timeout(Duration::from_secs(5)));
    }

    #[test]
    fn stale_reset_timer_leaves_new_session_alone() {
        let dir = tempdir().unwrap();
        let (mut sim, _rx) = backend(dir.path());
        let t0 = Instant::now();
        sim.advance(t0);
        sim.start(RecordingChannel::Incident, 0, 2, 1).unwrap();
        sim.advance(t0 + Duration::from_secs(1));
        sim.advance(t0 + Duration::from_secs(2));
        sim.start(RecordingChannel::Incident, 0, 2, 5).unwrap();
        std::thread::sleep(Duration::from_millis(400));
        let flags = sim.flags(RecordingChannel::Incident);
        assert!(flags.record_on);
        assert!(!flags.reset_done);
    }

    #[test]
    fn pre_roll_is_capped_by_cache() {
        let dir = tempdir().unwrap();
        let (mut sim, mut rx) = backend(dir.path());
        let t0 = Instant::now();
        sim.advance(t0);
        sim.start(RecordingChannel::Stream, 1, 2, 4).unwrap();
        sim.advance(t0 + Duration::from_secs(4));
        assert_eq!(rx.try_recv().unwrap().info.duration_ms, 5_000);
    }

    #[test]
    fn start_refused_while_encoder_resets() {
        let dir = tempdir().unwrap();
        let (mut sim, _rx) = backend(dir.path());
        let t0 = Instant::now();
        sim.advance(t0);
        sim.start(RecordingChannel::Incident, 0, 2, 1).unwrap();
        sim.advance(t0 + Duration::from_secs(1));
        assert!(sim.start(RecordingChannel::Incident, 0, 2, 1).is_err());
        sim.advance(t0 + Duration::from_secs(2));
        assert!(sim.start(RecordingChannel::Incident, 0, 2, 1).is_ok());
        assert_eq!(sim.starts(RecordingChannel::Incident), 2);
    }
}
