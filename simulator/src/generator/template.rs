use incidentcore::frame_interface::{BoundingBox, FlowGrid, FlowVector};

/// Fixed-point flow vector for a drift of `dx`/`dy` pixels per frame.
pub fn drift(dx: f32, dy: f32, flow_scale: f32) -> FlowVector {
    let clamp = |v: f32| (v * flow_scale).clamp(i16::MIN as f32, i16::MAX as f32) as i16;
    FlowVector::new(clamp(dx), clamp(dy))
}

/// Writes `vector` into every block under `bbox`, clipped to the grid.
pub fn paint_box(grid: &mut FlowGrid, bbox: &BoundingBox, block_size: u32, vector: FlowVector) {
    let block = block_size.max(1) as f32;
    let row_start = (bbox.top / block).max(0.0) as usize;
    let col_start = (bbox.left / block).max(0.0) as usize;
    let row_end = ((bbox.bottom() / block) as usize).min(grid.rows().saturating_sub(1));
    let col_end = ((bbox.right() / block) as usize).min(grid.cols().saturating_sub(1));
    for row in row_start..=row_end {
        for col in col_start..=col_end {
            grid.set(row, col, vector);
        }
    }
}
