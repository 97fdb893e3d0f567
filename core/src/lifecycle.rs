use std::sync::atomic::{AtomicU32, Ordering};

/// Interrupts needed before shutdown stops waiting for the encoder.
pub const FORCE_AFTER: u32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownRequest {
    /// Stop the stream channel and wait for its reset.
    Graceful,
    /// Repeated interrupt; exit without waiting.
    Force,
}

/// Counts interrupt requests for the process.
#[derive(Debug, Default)]
pub struct ShutdownSignal {
    requests: AtomicU32,
}

impl ShutdownSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request(&self) -> ShutdownRequest {
        let count = self.requests.fetch_add(1, Ordering::SeqCst) + 1;
        if count >= FORCE_AFTER {
            ShutdownRequest::Force
        } else {
            ShutdownRequest::Graceful
        }
    }

    pub fn is_requested(&self) -> bool {
        self.count() > 0
    }

    pub fn count(&self) -> u32 {
        self.requests.load(Ordering::SeqCst)
    }
}
