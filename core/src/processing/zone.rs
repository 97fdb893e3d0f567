use std::collections::BTreeMap;

use ndarray::Array2;

use crate::config::ZoneConfig;
use crate::frame_interface::{BoundingBox, Detection, ZoneSet};
use crate::math::raster::{MaskRaster, PixelRect};
use crate::prelude::{CoreError, CoreResult};
use crate::telemetry::log::LogManager;

/// Tag attached to every object found inside an exclusion zone.
pub const ZONE_TAG: &str = "RF";

/// Added to the box area so empty boxes never divide by zero.
pub const AREA_EPSILON: f64 = 1e-5;

/// Outcome of testing one box against the exclusion mask.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ZoneVerdict {
    pub inside: bool,
    pub ratio: f64,
}

impl ZoneVerdict {
    /// `inside` is inclusive at the threshold.
    pub fn from_ratio(ratio: f64, threshold: f64) -> Self {
        Self {
            inside: ratio >= threshold,
            ratio,
        }
    }
}

/// Tests detections against the rasterized exclusion polygons of one stream.
pub struct ZoneClassifier {
    zones: ZoneSet,
    width: usize,
    height: usize,
    threshold: f64,
    mask: Option<Array2<u8>>,
    membership: BTreeMap<String, u64>,
    class_counts: BTreeMap<u32, u64>,
    logger: LogManager,
}

impl ZoneClassifier {
    pub fn new(zones: ZoneSet, config: &ZoneConfig, logger: LogManager) -> Self {
        Self {
            zones,
            width: config.reference_width,
            height: config.reference_height,
            threshold: config.inside_ratio,
            mask: None,
            membership: BTreeMap::new(),
            class_counts: BTreeMap::new(),
            logger,
        }
    }

    /// Loads the polygons named by `config.file`; no file means no zones.
    pub fn from_config(config: &ZoneConfig, logger: LogManager) -> CoreResult<Self> {
        let zones = match &config.file {
            Some(path) => ZoneSet::load(path)?,
            None => ZoneSet::default(),
        };
        logger.record(&format!("{} exclusion zone(s) loaded", zones.len()));
        Ok(Self::new(zones, config, logger))
    }

    pub fn zones(&self) -> &ZoneSet {
        &self.zones
    }

    /// Replaces the polygons; the mask is rebuilt on next use.
    pub fn set_zones(&mut self, zones: ZoneSet) {
        self.zones = zones;
        self.mask = None;
    }

    fn mask(&mut self) -> &Array2<u8> {
        let (width, height) = (self.width, self.height);
        let zones = &self.zones;
        self.mask.get_or_insert_with(|| {
            let mut mask = MaskRaster::blank(width, height);
            for polygon in &zones.polygons {
                MaskRaster::fill_polygon(&mut mask, &polygon.points, 255);
            }
            mask
        })
    }

    /// Overlap ratio of `bbox` with the exclusion mask, without side effects
    /// beyond building the mask.
    pub fn measure(&mut self, bbox: &BoundingBox) -> ZoneVerdict {
        if self.zones.is_empty() {
            return ZoneVerdict::from_ratio(0.0, self.threshold);
        }
        let rect = PixelRect::from_bbox(bbox);
        let area = rect.area() as f64 + AREA_EPSILON;
        let intersection = MaskRaster::count_in_rect(self.mask(), &rect) as f64;
        ZoneVerdict::from_ratio(intersection / area, self.threshold)
    }

    /// Measures `detection`, updates the reporting counters and tags the
    /// object when it lies inside a zone.
    pub fn classify(&mut self, detection: &mut Detection) -> ZoneVerdict {
        let verdict = self.measure(&detection.bbox);
        *self.class_counts.entry(detection.class_id).or_default() += 1;
        if verdict.inside {
            // Every zone shares one tag; the counter label carries the
            // polygon count instead of the matched polygon.
            let label = format!("{}{}", ZONE_TAG, self.zones.len() + 1);
            *self.membership.entry(label).or_default() += 1;
            detection.tag_zone(ZONE_TAG);
            self.logger.detail(&format!(
                "class {} inside exclusion zone (ratio {:.3})",
                detection.class_id, verdict.ratio
            ));
        }
        verdict
    }

    pub fn membership(&self) -> &BTreeMap<String, u64> {
        &self.membership
    }

    pub fn class_counts(&self) -> &BTreeMap<u32, u64> {
        &self.class_counts
    }

    /// Paints every zone black in an interleaved frame at the reference
    /// resolution.
    pub fn blackout(
        &mut self,
        pixels: &mut [u8],
        width: usize,
        height: usize,
        bytes_per_pixel: usize,
    ) -> CoreResult<()> {
        if width != self.width || height != self.height {
            return Err(CoreError::FrameMismatch(format!(
                "frame {}x{} but zones are defined at {}x{}",
                width, height, self.width, self.height
            )));
        }
        if pixels.len() != width * height * bytes_per_pixel {
            return Err(CoreError::FrameMismatch(format!(
                "buffer of {} bytes for {}x{}x{}",
                pixels.len(),
                width,
                height,
                bytes_per_pixel
            )));
        }
        if self.zones.is_empty() {
            return Ok(());
        }
        let mask = self.mask();
        for ((row, col), &value) in mask.indexed_iter() {
            if value != 0 {
                let offset = (row * width + col) * bytes_per_pixel;
                pixels[offset..offset + bytes_per_pixel].fill(0);
            }
        }
        Ok(())
    }
}
