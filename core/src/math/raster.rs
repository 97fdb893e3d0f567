use ndarray::{s, Array2};

use crate::frame_interface::{BoundingBox, Point};

/// Integer pixel rectangle; `width`/`height` are pixel counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelRect {
    pub x: i64,
    pub y: i64,
    pub width: i64,
    pub height: i64,
}

impl PixelRect {
    /// Truncates a floating-point box onto the pixel lattice.
    pub fn from_bbox(bbox: &BoundingBox) -> Self {
        Self {
            x: bbox.left as i64,
            y: bbox.top as i64,
            width: bbox.width as i64,
            height: bbox.height as i64,
        }
    }

    pub fn area(&self) -> i64 {
        self.width.max(0) * self.height.max(0)
    }
}

/// Binary mask helper over an `(rows, cols)` byte array.
pub struct MaskRaster;

impl MaskRaster {
    pub fn blank(width: usize, height: usize) -> Array2<u8> {
        Array2::zeros((height, width))
    }

    /// Fills a closed polygon, boundary pixels included.
    pub fn fill_polygon(mask: &mut Array2<u8>, points: &[Point], value: u8) {
        if points.is_empty() {
            return;
        }
        let (rows, cols) = mask.dim();
        let rows = rows as i64;
        let cols = cols as i64;

        let min_y = points.iter().map(|p| p.y as i64).min().unwrap_or(0).max(0);
        let max_y = points
            .iter()
            .map(|p| p.y as i64)
            .max()
            .unwrap_or(-1)
            .min(rows - 1);

        let mut crossings: Vec<f64> = Vec::with_capacity(points.len());
        for y in min_y..=max_y {
            crossings.clear();
            for (a, b) in edges(points) {
                let (y1, y2) = (a.y as i64, b.y as i64);
                if y1 == y2 {
                    continue;
                }
                let spans = (y1 <= y && y < y2) || (y2 <= y && y < y1);
                if spans {
                    let t = (y - y1) as f64 / (y2 - y1) as f64;
                    crossings.push(a.x as f64 + t * (b.x - a.x) as f64);
                }
            }
            crossings.sort_by(|l, r| l.total_cmp(r));
            for pair in crossings.chunks_exact(2) {
                let start = (pair[0].ceil() as i64).max(0);
                let end = (pair[1].floor() as i64).min(cols - 1);
                if start <= end {
                    mask.slice_mut(s![y as usize, start as usize..=end as usize])
                        .fill(value);
                }
            }
        }

        for (a, b) in edges(points) {
            Self::draw_segment(mask, a, b, value);
        }
    }

    fn draw_segment(mask: &mut Array2<u8>, a: Point, b: Point, value: u8) {
        let (rows, cols) = mask.dim();
        let dx = (b.x - a.x) as f64;
        let dy = (b.y - a.y) as f64;
        let steps = dx.abs().max(dy.abs()) as i64;
        for i in 0..=steps {
            let t = if steps == 0 { 0.0 } else { i as f64 / steps as f64 };
            let x = (a.x as f64 + t * dx).round() as i64;
            let y = (a.y as f64 + t * dy).round() as i64;
            if x >= 0 && y >= 0 && (x as usize) < cols && (y as usize) < rows {
                mask[[y as usize, x as usize]] = value;
            }
        }
    }

    /// Counts non-zero mask pixels under `rect`, clipped to the mask.
    pub fn count_in_rect(mask: &Array2<u8>, rect: &PixelRect) -> u64 {
        let (rows, cols) = mask.dim();
        let x0 = rect.x.clamp(0, cols as i64) as usize;
        let y0 = rect.y.clamp(0, rows as i64) as usize;
        let x1 = (rect.x + rect.width.max(0)).clamp(0, cols as i64) as usize;
        let y1 = (rect.y + rect.height.max(0)).clamp(0, rows as i64) as usize;
        if x0 >= x1 || y0 >= y1 {
            return 0;
        }
        mask.slice(s![y0..y1, x0..x1])
            .iter()
            .filter(|&&v| v != 0)
            .count() as u64
    }
}

fn edges(points: &[Point]) -> impl Iterator<Item = (Point, Point)> + '_ {
    points
        .iter()
        .copied()
        .zip(points.iter().copied().cycle().skip(1))
}
