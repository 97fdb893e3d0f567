use std::sync::Mutex;

use serde::{Deserialize, Serialize};

/// Point-in-time copy of the channel counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub frames: u64,
    pub suppressed: u64,
    pub alarms: u64,
    pub start_failures: u64,
    pub published: u64,
    pub dropped: u64,
    pub renamed: u64,
    pub rename_failures: u64,
}

pub struct MetricsRecorder {
    inner: Mutex<MetricsSnapshot>,
}

impl MetricsRecorder {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(MetricsSnapshot::default()),
        }
    }

    fn bump(&self, update: impl FnOnce(&mut MetricsSnapshot)) {
        if let Ok(mut metrics) = self.inner.lock() {
            update(&mut metrics);
        }
    }

    pub fn record_frame(&self) {
        self.bump(|m| m.frames += 1);
    }

    pub fn record_suppressed(&self) {
        self.bump(|m| m.suppressed += 1);
    }

    pub fn record_alarm(&self) {
        self.bump(|m| m.alarms += 1);
    }

    pub fn record_start_failure(&self) {
        self.bump(|m| m.start_failures += 1);
    }

    pub fn record_published(&self) {
        self.bump(|m| m.published += 1);
    }

    pub fn record_dropped(&self) {
        self.bump(|m| m.dropped += 1);
    }

    pub fn record_renamed(&self) {
        self.bump(|m| m.renamed += 1);
    }

    pub fn record_rename_failure(&self) {
        self.bump(|m| m.rename_failures += 1);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        self.inner.lock().map(|m| *m).unwrap_or_default()
    }
}

impl Default for MetricsRecorder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_accumulate() {
        let metrics = MetricsRecorder::new();
        metrics.record_frame();
        metrics.record_frame();
        metrics.record_alarm();
        metrics.record_dropped();
        let snap = metrics.snapshot();
        assert_eq!(snap.frames, 2);
        assert_eq!(snap.alarms, 1);
        assert_eq!(snap.dropped, 1);
        assert_eq!(snap.published, 0);
    }
}
