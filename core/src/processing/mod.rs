pub mod motion;
pub mod pts;
pub mod window;
pub mod zone;

pub use motion::MotionClassifier;
pub use pts::TimestampRepair;
pub use window::SlidingWindowCounter;
pub use zone::{ZoneClassifier, ZoneVerdict};
