use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;

/// Encoder reset flag of one recording channel.
///
/// The backend flips it; the shutdown path waits on it with a deadline
/// instead of spinning.
#[derive(Debug, Clone)]
pub struct ResetSignal {
    inner: Arc<(Mutex<bool>, Condvar)>,
}

impl ResetSignal {
    pub fn new(done: bool) -> Self {
        Self {
            inner: Arc::new((Mutex::new(done), Condvar::new())),
        }
    }

    pub fn set(&self, done: bool) {
        let (lock, cvar) = &*self.inner;
        if let Ok(mut flag) = lock.lock() {
            *flag = done;
            if done {
                cvar.notify_all();
            }
        }
    }

    pub fn is_done(&self) -> bool {
        self.inner.0.lock().map(|flag| *flag).unwrap_or(false)
    }

    /// Blocks until the reset is done or `timeout` passes; returns the flag.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let (lock, cvar) = &*self.inner;
        let Ok(guard) = lock.lock() else {
            return false;
        };
        match cvar.wait_timeout_while(guard, timeout, |done| !*done) {
            Ok((flag, _)) => *flag,
            Err(_) => false,
        }
    }
}

impl Default for ResetSignal {
    fn default() -> Self {
        Self::new(true)
    }
}
