use serde::{Deserialize, Serialize};

use super::detection::Detection;
use super::flow::FlowGrid;

/// Per-frame metadata handed to the core by the inference/tracking branch.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FrameMetadata {
    pub frame_number: u64,
    /// Presentation timestamp in nanoseconds, if the upstream buffer carried one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pts: Option<u64>,
    #[serde(default)]
    pub detections: Vec<Detection>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flow: Option<FlowGrid>,
}

impl FrameMetadata {
    pub fn new(frame_number: u64, detections: Vec<Detection>) -> Self {
        Self {
            frame_number,
            pts: None,
            detections,
            flow: None,
        }
    }

    pub fn with_flow(mut self, flow: FlowGrid) -> Self {
        self.flow = Some(flow);
        self
    }

    pub fn with_pts(mut self, pts: u64) -> Self {
        self.pts = Some(pts);
        self
    }
}
