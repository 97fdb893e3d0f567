use serde::{Deserialize, Serialize};

use crate::prelude::{CoreError, CoreResult};

/// One optical-flow vector in fixed point (pixels scaled by the flow scale).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowVector {
    pub dx: i16,
    pub dy: i16,
}

impl FlowVector {
    pub fn new(dx: i16, dy: i16) -> Self {
        Self { dx, dy }
    }

    /// L1 magnitude in pixels after removing the fixed-point scale.
    pub fn magnitude(&self, scale: f32) -> f32 {
        (self.dx as f32 / scale).abs() + (self.dy as f32 / scale).abs()
    }
}

/// Dense block-level flow field for one frame, stored row-major.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowGrid {
    rows: usize,
    cols: usize,
    vectors: Vec<FlowVector>,
}

impl FlowGrid {
    pub fn new(rows: usize, cols: usize, vectors: Vec<FlowVector>) -> CoreResult<Self> {
        if vectors.len() != rows * cols {
            return Err(CoreError::FrameMismatch(format!(
                "flow grid {}x{} carries {} vectors",
                rows,
                cols,
                vectors.len()
            )));
        }
        Ok(Self {
            rows,
            cols,
            vectors,
        })
    }

    pub fn still(rows: usize, cols: usize) -> Self {
        Self {
            rows,
            cols,
            vectors: vec![FlowVector::default(); rows * cols],
        }
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    /// Vector of block `(row, col)`; `None` outside the grid.
    pub fn get(&self, row: i64, col: i64) -> Option<FlowVector> {
        if row < 0 || col < 0 || row as usize >= self.rows || col as usize >= self.cols {
            return None;
        }
        self.vectors.get(row as usize * self.cols + col as usize).copied()
    }

    pub fn set(&mut self, row: usize, col: usize, vector: FlowVector) {
        if row < self.rows && col < self.cols {
            self.vectors[row * self.cols + col] = vector;
        }
    }
}
