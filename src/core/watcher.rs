//! Device-change watcher
//!
//! Turns hot-plug notifications into session actions: every notification
//! refreshes the device list, and a removal of the open device forces the
//! session closed. Arrivals never open anything.

use crate::core::session::SessionManager;
use crate::infrastructure::serial::{DeviceChange, DeviceChangeSource};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

pub struct DeviceChangeWatcher {
    manager: Arc<SessionManager>,
}

impl DeviceChangeWatcher {
    pub fn new(manager: Arc<SessionManager>) -> Self {
        Self { manager }
    }

    /// Process one notification
    ///
    /// Returns true when it forced the open session closed.
    pub async fn handle_change(&self, change: &DeviceChange) -> bool {
        debug!("Device change: {:?}", change);
        self.manager.refresh_ports();

        match change {
            DeviceChange::Arrived(_) => false,
            DeviceChange::Removed(device) => {
                let dropped = self.manager.handle_device_removed(device).await;
                if dropped {
                    info!("Open device '{}' was removed; session closed", device);
                }
                dropped
            }
        }
    }

    /// Drive the watcher from `source` until it is exhausted
    pub fn spawn<S>(self, mut source: S) -> JoinHandle<()>
    where
        S: DeviceChangeSource + 'static,
    {
        tokio::spawn(async move {
            while let Some(change) = source.next_change().await {
                self.handle_change(&change).await;
            }
            debug!("Device change source closed; watcher stopped");
        })
    }
}
