use log::{debug, error, info, warn};

/// Thin wrapper over the `log` facade that tags every line with a
/// component scope and the camera it belongs to.
#[derive(Debug, Clone)]
pub struct LogManager {
    target: &'static str,
    scope: &'static str,
    camera_id: String,
}

impl LogManager {
    /// `target` is a log target such as `incidentcore::alarm`; its last
    /// path segment becomes the bracketed scope.
    pub fn new(target: &'static str, camera_id: impl Into<String>) -> Self {
        let scope = target.rsplit("::").next().unwrap_or(target);
        Self {
            target,
            scope,
            camera_id: camera_id.into(),
        }
    }

    pub fn camera_id(&self) -> &str {
        &self.camera_id
    }

    pub fn record(&self, message: &str) {
        info!(target: self.target, "[{}] camera {} - {}", self.scope, self.camera_id, message);
    }

    pub fn detail(&self, message: &str) {
        debug!(target: self.target, "[{}] camera {} - {}", self.scope, self.camera_id, message);
    }

    pub fn warn(&self, message: &str) {
        warn!(target: self.target, "[{}] camera {} - {}", self.scope, self.camera_id, message);
    }

    pub fn error(&self, message: &str) {
        error!(target: self.target, "[{}] camera {} - {}", self.scope, self.camera_id, message);
    }
}

impl Default for LogManager {
    fn default() -> Self {
        Self::new("incidentcore", "unknown")
    }
}
