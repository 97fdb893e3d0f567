use crate::status_bridge::model::StatusModel;
use log::{error, info};
use std::{
    net::SocketAddr,
    sync::{Arc, RwLock},
    thread,
};
use tokio::runtime::Builder;
use warp::Filter;

/// Hosts the status endpoint and holds the model it serves.
#[derive(Clone)]
pub struct StatusBridge {
    state: Arc<RwLock<StatusModel>>,
}

impl StatusBridge {
    /// In-memory bridge without an HTTP listener.
    pub fn detached() -> Self {
        Self {
            state: Arc::new(RwLock::new(StatusModel::default())),
        }
    }

    /// Starts `GET /status` on `address` from a dedicated thread.
    pub fn serve(address: SocketAddr) -> Self {
        let bridge = Self::detached();
        let state_for_filter = bridge.state.clone();
        let state_filter = warp::any().map(move || state_for_filter.clone());

        let status_route = warp::path("status")
            .and(warp::get())
            .and(state_filter)
            .map(|state: Arc<RwLock<StatusModel>>| {
                let model = state.read().map(|m| m.clone()).unwrap_or_default();
                warp::reply::json(&model)
            });

        thread::spawn(move || {
            let runtime = match Builder::new_current_thread().enable_all().build() {
                Ok(runtime) => runtime,
                Err(err) => {
                    error!("status bridge runtime failed: {}", err);
                    return;
                }
            };
            info!("status endpoint on http://{}/status", address);
            runtime.block_on(async move {
                warp::serve(status_route).run(address).await;
            });
        });

        bridge
    }

    pub fn publish(&self, model: StatusModel) {
        if let Ok(mut guard) = self.state.write() {
            *guard = model;
        }
    }

    #[cfg(test)]
    pub fn snapshot(&self) -> StatusModel {
        self.state.read().map(|m| m.clone()).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn publish_replaces_model() {
        let bridge = StatusBridge::detached();
        bridge.publish(StatusModel {
            frame: 42,
            message: "running".into(),
            ..StatusModel::default()
        });
        let snapshot = bridge.snapshot();
        assert_eq!(snapshot.frame, 42);
        assert_eq!(snapshot.message, "running");
    }
}
