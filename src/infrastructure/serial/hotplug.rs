//! Device hot-plug notification sources
//!
//! A source yields arrival and removal notifications keyed by device
//! identifier. Concrete OS bindings only need to implement
//! [`DeviceChangeSource`]; the watcher logic never sees the OS.

use super::backend::SerialBackend;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// A single hot-plug notification
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceChange {
    Arrived(String),
    Removed(String),
}

impl DeviceChange {
    pub fn device(&self) -> &str {
        match self {
            DeviceChange::Arrived(device) | DeviceChange::Removed(device) => device,
        }
    }
}

/// Something that delivers hot-plug notifications
#[async_trait]
pub trait DeviceChangeSource: Send {
    /// Wait for the next notification; `None` means the source is exhausted
    async fn next_change(&mut self) -> Option<DeviceChange>;
}

/// Sending half of a [`ChannelDeviceSource`]
#[derive(Debug, Clone)]
pub struct DeviceChangeSender {
    tx: mpsc::UnboundedSender<DeviceChange>,
}

impl DeviceChangeSender {
    /// Push a notification; returns false once the watcher has gone away
    pub fn notify(&self, change: DeviceChange) -> bool {
        self.tx.send(change).is_ok()
    }

    pub fn arrived(&self, device: &str) -> bool {
        self.notify(DeviceChange::Arrived(device.to_string()))
    }

    pub fn removed(&self, device: &str) -> bool {
        self.notify(DeviceChange::Removed(device.to_string()))
    }
}

/// Push-based source fed through a channel
#[derive(Debug)]
pub struct ChannelDeviceSource {
    rx: mpsc::UnboundedReceiver<DeviceChange>,
}

impl ChannelDeviceSource {
    pub fn channel() -> (DeviceChangeSender, Self) {
        let (tx, rx) = mpsc::unbounded_channel();
        (DeviceChangeSender { tx }, Self { rx })
    }
}

#[async_trait]
impl DeviceChangeSource for ChannelDeviceSource {
    async fn next_change(&mut self) -> Option<DeviceChange> {
        self.rx.recv().await
    }
}

/// Portable source that diffs successive port listings
pub struct PollingDeviceSource {
    backend: Arc<dyn SerialBackend>,
    interval: tokio::time::Interval,
    known: Vec<String>,
    pending: VecDeque<DeviceChange>,
}

impl PollingDeviceSource {
    /// Must be called from within a Tokio runtime.
    pub fn new(backend: Arc<dyn SerialBackend>, period: Duration) -> Self {
        let known = match backend.list_ports() {
            Ok(ports) => ports,
            Err(e) => {
                warn!("Initial port listing for hot-plug polling failed: {}", e);
                Vec::new()
            }
        };

        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        Self {
            backend,
            interval,
            known,
            pending: VecDeque::new(),
        }
    }

    fn poll_once(&mut self) {
        let current = match self.backend.list_ports() {
            Ok(ports) => ports,
            Err(e) => {
                debug!("Port listing failed during hot-plug poll: {}", e);
                return;
            }
        };

        for port in &current {
            if !self.known.contains(port) {
                info!("Serial device arrived: {}", port);
                self.pending.push_back(DeviceChange::Arrived(port.clone()));
            }
        }
        for port in &self.known {
            if !current.contains(port) {
                info!("Serial device removed: {}", port);
                self.pending.push_back(DeviceChange::Removed(port.clone()));
            }
        }

        self.known = current;
    }
}

#[async_trait]
impl DeviceChangeSource for PollingDeviceSource {
    async fn next_change(&mut self) -> Option<DeviceChange> {
        loop {
            if let Some(change) = self.pending.pop_front() {
                return Some(change);
            }
            self.interval.tick().await;
            self.poll_once();
        }
    }
}
