use crate::config::MotionConfig;
use crate::frame_interface::{BoundingBox, FlowGrid};

/// Block range covered by a bounding box, inclusive on both ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockSpan {
    pub row_start: i64,
    pub row_end: i64,
    pub col_start: i64,
    pub col_end: i64,
}

impl BlockSpan {
    pub fn total_blocks(&self) -> i64 {
        (self.row_end - self.row_start + 1) * (self.col_end - self.col_start + 1)
    }
}

/// Decides whether an object is moving from the optical flow under its box.
#[derive(Debug, Clone)]
pub struct MotionClassifier {
    block_size: f32,
    flow_scale: f32,
    block_threshold: f32,
    box_fraction: f64,
}

impl MotionClassifier {
    pub fn new(config: &MotionConfig) -> Self {
        Self {
            block_size: config.block_size.max(1) as f32,
            flow_scale: config.flow_scale,
            block_threshold: config.block_threshold,
            box_fraction: config.box_fraction,
        }
    }

    pub fn span(&self, bbox: &BoundingBox) -> BlockSpan {
        BlockSpan {
            row_start: (bbox.top / self.block_size) as i64,
            row_end: (bbox.bottom() / self.block_size) as i64,
            col_start: (bbox.left / self.block_size) as i64,
            col_end: (bbox.right() / self.block_size) as i64,
        }
    }

    /// True once at least `box_fraction` of the covered blocks move.
    ///
    /// Blocks outside the grid count towards the total but never move.
    pub fn is_moving(&self, bbox: &BoundingBox, grid: &FlowGrid) -> bool {
        let span = self.span(bbox);
        let needed = span.total_blocks() as f64 * self.box_fraction;
        let mut moving_blocks = 0u64;

        for row in span.row_start..=span.row_end {
            for col in span.col_start..=span.col_end {
                let Some(vector) = grid.get(row, col) else {
                    continue;
                };
                if vector.magnitude(self.flow_scale) > self.block_threshold {
                    moving_blocks += 1;
                    // The tally only grows; stop at the threshold.
                    if moving_blocks as f64 >= needed {
                        return true;
                    }
                }
            }
        }
        false
    }
}
