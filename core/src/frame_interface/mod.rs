pub mod detection;
pub mod flow;
pub mod frame;
pub mod zones;

pub use detection::{BoundingBox, Detection};
pub use flow::{FlowGrid, FlowVector};
pub use frame::FrameMetadata;
pub use zones::{Point, Polygon, ZoneSet};
