use std::time::Duration;

use crate::recording::RecordingChannel;

/// Common error type for the alarm and recording core.
#[derive(thiserror::Error, Debug)]
pub enum CoreError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("zone file line {line}: {message}")]
    ZoneParse { line: usize, message: String },
    #[error("io failure: {0}")]
    Io(#[from] std::io::Error),
    #[error("{0} channel is already recording")]
    AlreadyRecording(RecordingChannel),
    #[error("{0} channel is not recording")]
    NotRecording(RecordingChannel),
    #[error("recording backend failure: {0}")]
    Backend(String),
    #[error("invalid completion info: {0}")]
    InvalidCompletion(String),
    #[error("malformed recording filename: {0}")]
    MalformedFilename(String),
    #[error("encoder reset not observed within {0:?}")]
    ResetTimeout(Duration),
    #[error("publish failure: {0}")]
    Publish(String),
    #[error("frame geometry mismatch: {0}")]
    FrameMismatch(String),
}

pub type CoreResult<T> = Result<T, CoreError>;
