pub mod raster;

pub use raster::{MaskRaster, PixelRect};
