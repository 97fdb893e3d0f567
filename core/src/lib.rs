//! Alarm decision engine and recording-session control for one camera channel.
//!
//! Per-frame detections and optical-flow grids come in from the analytics
//! pipeline; the crate filters them against exclusion zones and motion,
//! debounces them through sliding windows, rate-limits the resulting alarms,
//! and drives an incident recording channel next to a continuously looping
//! stream channel.

pub mod alarm;
pub mod channel;
pub mod config;
pub mod frame_interface;
pub mod lifecycle;
pub mod math;
pub mod prelude;
pub mod processing;
pub mod recording;
pub mod telemetry;

pub use channel::CameraChannel;
pub use config::EngineConfig;
pub use prelude::{CoreError, CoreResult};
