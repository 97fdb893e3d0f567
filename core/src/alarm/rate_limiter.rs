use std::time::{Duration, Instant};

use crate::config::AlarmConfig;

/// Mutable alarm bookkeeping for one camera channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlarmState {
    /// Whether the incident channel was recording on the last frame.
    pub recording_on: bool,
    pub last_alarm: Option<Instant>,
    pub current_interval: Duration,
    pub recording_counter: u32,
}

impl AlarmState {
    pub fn new(base_interval: Duration) -> Self {
        Self {
            recording_on: false,
            last_alarm: None,
            current_interval: base_interval,
            recording_counter: 0,
        }
    }

    /// Whole seconds since the last alarm; `None` before the first one.
    pub fn elapsed_since_alarm(&self, now: Instant) -> Option<Duration> {
        self.last_alarm
            .map(|at| Duration::from_secs(now.saturating_duration_since(at).as_secs()))
    }
}

/// Additive-increase/additive-decrease controller for the minimum spacing
/// between recordings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimiter {
    base: Duration,
    max: Duration,
    increase: Duration,
    decrease: Duration,
    threshold: u32,
}

impl RateLimiter {
    pub fn new(config: &AlarmConfig) -> Self {
        Self {
            base: Duration::from_secs(config.base_interval_secs),
            max: Duration::from_secs(config.max_interval_secs),
            increase: Duration::from_secs(config.increase_step_secs),
            decrease: Duration::from_secs(config.decrease_step_secs),
            threshold: config.frequency_threshold.max(1),
        }
    }

    pub fn base(&self) -> Duration {
        self.base
    }

    pub fn threshold(&self) -> u32 {
        self.threshold
    }

    /// Next `(recording_counter, current_interval)`.
    ///
    /// Reaching the threshold widens the interval and clears the counter;
    /// an isolated recording narrows it; no recording leaves it alone.
    pub fn adjust(&self, recording_counter: u32, current_interval: Duration) -> (u32, Duration) {
        if recording_counter >= self.threshold {
            (0, (current_interval + self.increase).min(self.max))
        } else if recording_counter > 0 {
            (
                recording_counter,
                current_interval.saturating_sub(self.decrease).max(self.base),
            )
        } else {
            (recording_counter, current_interval)
        }
    }

    pub fn update(&self, state: &mut AlarmState) {
        let (counter, interval) = self.adjust(state.recording_counter, state.current_interval);
        state.recording_counter = counter;
        state.current_interval = interval;
    }
}
