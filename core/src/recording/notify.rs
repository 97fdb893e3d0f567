use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use log::info;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::config::NotifyConfig;
use crate::prelude::{CoreError, CoreResult};
use crate::telemetry::log::LogManager;

/// Message body published for every finished incident clip.
///
/// Numeric fields travel as strings to keep the object flat key/value text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncidentNotification {
    pub video_path: String,
    pub camera_id: String,
    pub retries: String,
    pub length: String,
}

impl IncidentNotification {
    pub fn new(video_path: &Path, camera_id: &str, length_ms: u64, retries: u32) -> Self {
        Self {
            video_path: video_path.to_string_lossy().into_owned(),
            camera_id: camera_id.to_string(),
            retries: retries.to_string(),
            length: length_ms.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishedMessage {
    pub exchange: String,
    pub routing_key: String,
    pub body: String,
}

/// Where notifications go. Implementations must not block for delivery.
pub trait NotificationSink: Send + Sync {
    fn publish(&self, exchange: &str, routing_key: &str, body: &str) -> CoreResult<()>;
}

/// Writes every message to the log.
#[derive(Debug, Default)]
pub struct LogSink;

impl NotificationSink for LogSink {
    fn publish(&self, exchange: &str, routing_key: &str, body: &str) -> CoreResult<()> {
        info!(target: "incidentcore::notify", "{}/{} {}", exchange, routing_key, body);
        Ok(())
    }
}

/// Appends one JSON line per message to a file.
#[derive(Debug)]
pub struct JsonLinesSink {
    path: PathBuf,
    guard: Mutex<()>,
}

impl JsonLinesSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            guard: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl NotificationSink for JsonLinesSink {
    fn publish(&self, exchange: &str, routing_key: &str, body: &str) -> CoreResult<()> {
        let line = serde_json::to_string(&PublishedMessage {
            exchange: exchange.to_string(),
            routing_key: routing_key.to_string(),
            body: body.to_string(),
        })
        .map_err(|err| CoreError::Publish(err.to_string()))?;

        let _guard = self
            .guard
            .lock()
            .map_err(|_| CoreError::Publish("sink lock poisoned".into()))?;
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(file, "{}", line)?;
        Ok(())
    }
}

/// Forwards messages to an in-process receiver.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<PublishedMessage>,
}

impl ChannelSink {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<PublishedMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl NotificationSink for ChannelSink {
    fn publish(&self, exchange: &str, routing_key: &str, body: &str) -> CoreResult<()> {
        self.tx
            .send(PublishedMessage {
                exchange: exchange.to_string(),
                routing_key: routing_key.to_string(),
                body: body.to_string(),
            })
            .map_err(|_| CoreError::Publish("notification receiver closed".into()))
    }
}

pub struct NotificationPublisher {
    sink: Box<dyn NotificationSink>,
    exchange: String,
    routing_key: String,
    logger: LogManager,
}

impl NotificationPublisher {
    pub fn new(sink: Box<dyn NotificationSink>, config: &NotifyConfig, logger: LogManager) -> Self {
        Self {
            sink,
            exchange: config.exchange.clone(),
            routing_key: config.routing_key.clone(),
            logger,
        }
    }

    /// Serializes and hands off one notification; no delivery confirmation.
    pub fn publish(
        &self,
        video_path: &Path,
        camera_id: &str,
        length_ms: u64,
        retries: u32,
    ) -> CoreResult<IncidentNotification> {
        let message = IncidentNotification::new(video_path, camera_id, length_ms, retries);
        let body =
            serde_json::to_string(&message).map_err(|err| CoreError::Publish(err.to_string()))?;
        self.sink
            .publish(&self.exchange, &self.routing_key, &body)?;
        self.logger.record(&format!(
            "incident {} published ({} ms)",
            message.video_path, message.length
        ));
        Ok(message)
    }
}
