/// Fills in missing presentation timestamps with the last valid one seen.
/// Until a valid timestamp arrives there is nothing to substitute.
#[derive(Debug, Clone, Default)]
pub struct TimestampRepair {
    last_valid: Option<u64>,
    repaired: u64,
}

impl TimestampRepair {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn repair(&mut self, pts: Option<u64>) -> Option<u64> {
        match pts {
            Some(pts) => {
                self.last_valid = Some(pts);
                Some(pts)
            }
            None => {
                if self.last_valid.is_some() {
                    self.repaired += 1;
                }
                self.last_valid
            }
        }
    }

    /// Number of buffers that needed a substitute timestamp.
    pub fn repaired(&self) -> u64 {
        self.repaired
    }
}
