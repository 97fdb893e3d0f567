//! Recording channels, their backend contract and completion handling.

pub mod backend;
pub mod naming;
pub mod notify;
pub mod reset;
pub mod session;
pub mod simulated;

use std::fmt;
use std::path::PathBuf;
use std::time::SystemTime;

use serde::{Deserialize, Serialize};

pub use backend::{completion_channel, CompletionReceiver, CompletionSender, RecordingBackend};
pub use naming::FileRenamer;
pub use notify::{
    ChannelSink, IncidentNotification, JsonLinesSink, LogSink, NotificationPublisher,
    NotificationSink, PublishedMessage,
};
pub use reset::ResetSignal;
pub use session::{CompletionOutcome, RecordingSessionController};
pub use simulated::{SimulatedBackend, SimulatedBackendConfig};

pub type SessionId = u32;

/// The two independent recording channels of a camera.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordingChannel {
    /// Alarm-triggered clips.
    Incident,
    /// Continuously looping background segments.
    Stream,
}

impl RecordingChannel {
    pub const ALL: [RecordingChannel; 2] = [RecordingChannel::Incident, RecordingChannel::Stream];

    pub fn index(self) -> usize {
        match self {
            RecordingChannel::Incident => 0,
            RecordingChannel::Stream => 1,
        }
    }

    /// Filename prefix used by the backend.
    pub fn prefix(self) -> &'static str {
        match self {
            RecordingChannel::Incident => "incident",
            RecordingChannel::Stream => "stream",
        }
    }

    pub fn session_id(self) -> SessionId {
        match self {
            RecordingChannel::Incident => 0,
            RecordingChannel::Stream => 1,
        }
    }
}

impl fmt::Display for RecordingChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.prefix())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelState {
    Idle,
    Recording,
    /// Session finished, encoder not yet reset.
    ResetPending,
}

/// Readable backend flags for one channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BackendFlags {
    pub record_on: bool,
    pub reset_done: bool,
}

/// Start/duration parameters of one channel, in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionParams {
    pub pre_roll_secs: u32,
    /// Zero selects the backend default.
    pub duration_secs: u32,
}

/// A session the controller started and has not yet seen complete.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordingSession {
    pub id: SessionId,
    pub channel: RecordingChannel,
    pub started_at: SystemTime,
    pub params: SessionParams,
}

/// What the backend reports once a session's file is closed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordingCompletionInfo {
    pub dirpath: PathBuf,
    pub filename: String,
    pub duration_ms: u64,
}

impl RecordingCompletionInfo {
    /// Directory joined with the filename.
    pub fn full_path(&self) -> Option<PathBuf> {
        if self.dirpath.as_os_str().is_empty() || self.filename.is_empty() {
            return None;
        }
        Some(self.dirpath.join(&self.filename))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordingCompletion {
    pub channel: RecordingChannel,
    pub info: RecordingCompletionInfo,
}
