use incidentcore::alarm::AlarmDecision;
use incidentcore::channel::ChannelStatus;
use serde::{Deserialize, Serialize};

/// Latest state served on `GET /status`.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct StatusModel {
    pub frame: u64,
    pub last_decision: Option<AlarmDecision>,
    pub channel: Option<ChannelStatus>,
    pub message: String,
}
