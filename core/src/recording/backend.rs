use tokio::sync::mpsc;

use super::{BackendFlags, RecordingChannel, RecordingCompletion, ResetSignal, SessionId};
use crate::prelude::CoreResult;

/// Sending half handed to a backend; one message per completed session.
pub type CompletionSender = mpsc::UnboundedSender<RecordingCompletion>;
pub type CompletionReceiver = mpsc::UnboundedReceiver<RecordingCompletion>;

pub fn completion_channel() -> (CompletionSender, CompletionReceiver) {
    mpsc::unbounded_channel()
}

/// Control surface of the recording backend shared by both channels.
///
/// Implementations report completed sessions through the
/// [`CompletionSender`] they were built with, exactly once per session.
pub trait RecordingBackend: Send {
    /// Fails when `channel` is already recording.
    fn start(
        &mut self,
        channel: RecordingChannel,
        session_id: SessionId,
        pre_roll_secs: u32,
        duration_secs: u32,
    ) -> CoreResult<()>;

    /// Fails when `channel` is not recording.
    fn stop(&mut self, channel: RecordingChannel, session_id: SessionId) -> CoreResult<()>;

    fn flags(&self, channel: RecordingChannel) -> BackendFlags;

    /// Handle the shutdown path can wait on.
    fn reset_signal(&self, channel: RecordingChannel) -> ResetSignal;

    /// Releases backend resources; called once after the final stop.
    fn teardown(&mut self) {}
}
