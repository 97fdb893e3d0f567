pub mod engine;
pub mod rate_limiter;

pub use engine::{AlarmDecision, AlarmEngine, FrameSummary};
pub use rate_limiter::{AlarmState, RateLimiter};
