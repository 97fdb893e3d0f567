use serde::{Deserialize, Serialize};

/// Border colour applied to vehicles that were seen but not moving.
pub const STATIONARY_BORDER: [f32; 4] = [0.0, 1.0, 0.0, 1.0];

/// Axis-aligned bounding box in muxer pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub left: f32,
    pub top: f32,
    pub width: f32,
    pub height: f32,
}

impl BoundingBox {
    pub fn new(left: f32, top: f32, width: f32, height: f32) -> Self {
        Self {
            left,
            top,
            width,
            height,
        }
    }

    pub fn right(&self) -> f32 {
        self.left + self.width
    }

    pub fn bottom(&self) -> f32 {
        self.top + self.height
    }
}

/// One tracked object on one frame, as delivered by the inference/tracker stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Detection {
    pub class_id: u32,
    pub bbox: BoundingBox,
    /// Zone-membership tags attached by an upstream or local zone stage.
    #[serde(default)]
    pub zone_tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tracking_id: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub border_color: Option<[f32; 4]>,
}

impl Detection {
    pub fn new(class_id: u32, bbox: BoundingBox) -> Self {
        Self {
            class_id,
            bbox,
            zone_tags: Vec::new(),
            tracking_id: None,
            border_color: None,
        }
    }

    pub fn with_tracking_id(mut self, tracking_id: u64) -> Self {
        self.tracking_id = Some(tracking_id);
        self
    }

    pub fn in_zone(&self) -> bool {
        !self.zone_tags.is_empty()
    }

    pub fn tag_zone(&mut self, tag: &str) {
        self.zone_tags.push(tag.to_string());
    }

    /// Marks a vehicle that was dropped for lack of motion.
    pub fn mark_stationary(&mut self) {
        self.border_color = Some(STATIONARY_BORDER);
    }
}
