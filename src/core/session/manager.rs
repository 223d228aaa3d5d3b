use crate::core::ports::{PortDescriptor, PortEnumerator};
use crate::core::pump::ReceivePump;
use crate::core::session::state::{SessionEvent, SessionState, SessionStatistics};
use crate::core::text;
use crate::domain::config::SessionConfig;
use crate::domain::error::{CloseError, OpenError, SendError};
use crate::infrastructure::serial::{PortHandle, SerialBackend};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Receiving end of the session event stream
pub type EventReceiver = mpsc::UnboundedReceiver<SessionEvent>;

/// Tunables for a session manager
#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// How often the receive pump checks for unread bytes
    pub receive_poll_interval: Duration,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            receive_poll_interval: Duration::from_millis(10),
        }
    }
}

/// The {state, handle, configuration} triple guarded by the manager's mutex
///
/// Invariant: `state` is Open exactly when `handle` is `Some`.
pub(crate) struct SessionCore {
    pub(crate) state: SessionState,
    pub(crate) handle: Option<Box<dyn PortHandle>>,
    pub(crate) config: Option<SessionConfig>,
    /// Bumped on every successful open so a pump can tell it belongs to an
    /// earlier session.
    pub(crate) generation: u64,
    pub(crate) statistics: SessionStatistics,
}

impl SessionCore {
    pub(crate) fn new() -> Self {
        Self {
            state: SessionState::Closed,
            handle: None,
            config: None,
            generation: 0,
            statistics: SessionStatistics::default(),
        }
    }

    /// Whether a pump started for `generation` may still touch the handle
    pub(crate) fn is_live(&self, generation: u64) -> bool {
        self.state.is_open() && self.generation == generation && self.handle.is_some()
    }

    fn active_device(&self) -> Option<&str> {
        if self.state.is_open() {
            self.config.as_ref().map(|c| c.device.as_str())
        } else {
            None
        }
    }

    /// Take the handle, leaving the session Closed
    fn teardown(&mut self) -> Option<Box<dyn PortHandle>> {
        self.state = SessionState::Closed;
        self.handle.take()
    }
}

/// Owner of the single logical serial session
///
/// `open`, `close`, `send`, the forced close and every pump read go through
/// one mutex, so none of them can observe a handle that another is
/// releasing.
///
/// Events are queued without bound until the [`EventReceiver`] drains them.
/// A consumer that keeps the receiver must keep draining it; dropping the
/// receiver discards events instead.
pub struct SessionManager {
    backend: Arc<dyn SerialBackend>,
    enumerator: PortEnumerator,
    core: Arc<Mutex<SessionCore>>,
    /// Kept outside `core` so it can be aborted without taking the session lock.
    pump: parking_lot::Mutex<Option<JoinHandle<()>>>,
    events: mpsc::UnboundedSender<SessionEvent>,
    options: SessionOptions,
}

impl SessionManager {
    /// Create a new session manager and the event stream it publishes to
    pub fn new(backend: Arc<dyn SerialBackend>) -> (Self, EventReceiver) {
        Self::with_options(backend, SessionOptions::default())
    }

    pub fn with_options(
        backend: Arc<dyn SerialBackend>,
        options: SessionOptions,
    ) -> (Self, EventReceiver) {
        let (events, receiver) = mpsc::unbounded_channel();
        let manager = Self {
            enumerator: PortEnumerator::new(Arc::clone(&backend)),
            backend,
            core: Arc::new(Mutex::new(SessionCore::new())),
            pump: parking_lot::Mutex::new(None),
            events,
            options,
        };
        (manager, receiver)
    }

    /// Query the OS for the current device list
    pub fn list_ports(&self) -> Vec<PortDescriptor> {
        self.enumerator.list_ports()
    }

    /// Re-enumerate and publish the new list as [`SessionEvent::PortsChanged`]
    pub fn refresh_ports(&self) -> Vec<PortDescriptor> {
        let ports = self.enumerator.list_ports();
        self.emit(SessionEvent::PortsChanged(ports.clone()));
        ports
    }

    /// Device list from the most recent enumeration
    pub fn ports(&self) -> Vec<PortDescriptor> {
        self.enumerator.last_listing()
    }

    /// Open a session with `config`
    ///
    /// On an OS failure the device list is refreshed before returning.
    pub async fn open(&self, config: SessionConfig) -> Result<(), OpenError> {
        if config.device.is_empty() {
            return Err(OpenError::NoDeviceSelected);
        }

        let failure = {
            let mut core = self.core.lock().await;

            if let Some(device) = core.active_device() {
                return Err(OpenError::AlreadyOpen {
                    device: device.to_string(),
                });
            }

            match self.backend.open(&config) {
                Ok(handle) => {
                    core.generation = core.generation.wrapping_add(1);
                    core.handle = Some(handle);
                    core.state = SessionState::Open;
                    core.statistics = SessionStatistics::started();

                    let pump =
                        ReceivePump::new(Arc::clone(&self.core), core.generation, self.events.clone());
                    let task = pump.spawn(self.options.receive_poll_interval);
                    if let Some(stale) = self.pump.lock().replace(task) {
                        stale.abort();
                    }

                    info!("Session opened: {}", config);
                    core.config = Some(config);
                    return Ok(());
                }
                Err(e) => e,
            }
        };

        warn!("Failed to open serial port '{}': {}", config.device, failure);
        self.refresh_ports();

        Err(OpenError::DeviceUnavailable {
            device: config.device,
            source: failure,
        })
    }

    /// Close the open session
    ///
    /// Pending output and input are discarded before the handle is released.
    /// If that fails the handle is assumed dead: the session still ends up
    /// Closed and the failure is reported as [`CloseError::AlreadyInvalid`].
    pub async fn close(&self) -> Result<(), CloseError> {
        let mut core = self.core.lock().await;

        let device = match core.active_device() {
            Some(device) => device.to_string(),
            None => return Err(CloseError::NotOpen),
        };

        self.stop_pump();
        let Some(mut handle) = core.teardown() else {
            return Ok(());
        };

        let discarded = handle
            .discard_output()
            .and_then(|_| handle.discard_input());
        let released = handle.release();

        match discarded.and(released) {
            Ok(()) => {
                info!("Session on '{}' closed", device);
                Ok(())
            }
            Err(source) => {
                warn!("Closing '{}' failed, handle already invalid: {}", device, source);
                Err(CloseError::AlreadyInvalid { device, source })
            }
        }
    }

    /// Drop the session because its device was unplugged
    ///
    /// No graceful close is attempted. Returns whether a session was actually
    /// closed; calling this while Closed does nothing and publishes nothing.
    pub async fn force_close_due_to_removal(&self) -> bool {
        let mut core = self.core.lock().await;
        self.force_close_locked(&mut core)
    }

    /// Force-close only if `device` is the one currently open
    pub async fn handle_device_removed(&self, device: &str) -> bool {
        let mut core = self.core.lock().await;
        let active = core.active_device().map(str::to_string);
        match active.as_deref() {
            Some(active) if active == device => self.force_close_locked(&mut core),
            Some(active) => {
                debug!("Removal of '{}' does not affect open session on '{}'", device, active);
                false
            }
            None => false,
        }
    }

    fn force_close_locked(&self, core: &mut SessionCore) -> bool {
        let device = match core.active_device() {
            Some(device) => device.to_string(),
            None => {
                debug!("Forced close requested with no open session");
                return false;
            }
        };

        // The handle is dead; dropping it is all that is left to do.
        self.stop_pump();
        drop(core.teardown());

        warn!("Session on '{}' dropped: device removed", device);
        self.emit(SessionEvent::SessionDropped { device });
        true
    }

    /// Encode `text` and write it to the open port
    ///
    /// A write failure leaves the session state alone.
    pub async fn send(&self, text: &str) -> Result<(), SendError> {
        let mut guard = self.core.lock().await;
        let core = &mut *guard;

        if !core.state.is_open() {
            return Err(SendError::NotOpen);
        }
        let Some(handle) = core.handle.as_mut() else {
            return Err(SendError::NotOpen);
        };

        let bytes = text::encode(text);
        match handle.write_all(&bytes) {
            Ok(()) => {
                core.statistics.bytes_sent += bytes.len() as u64;
                debug!("Sent {} bytes to '{}'", bytes.len(), handle.name());
                Ok(())
            }
            Err(source) => {
                let device = handle.name().to_string();
                warn!("Write to '{}' failed: {}", device, source);
                Err(SendError::WriteFailed { device, source })
            }
        }
    }

    pub async fn state(&self) -> SessionState {
        self.core.lock().await.state
    }

    pub async fn is_open(&self) -> bool {
        self.state().await.is_open()
    }

    /// Identifier of the open device, if any
    pub async fn active_device(&self) -> Option<String> {
        self.core.lock().await.active_device().map(str::to_string)
    }

    /// Configuration of the current or most recent session
    pub async fn config(&self) -> Option<SessionConfig> {
        self.core.lock().await.config.clone()
    }

    pub async fn statistics(&self) -> SessionStatistics {
        self.core.lock().await.statistics.clone()
    }

    fn stop_pump(&self) {
        if let Some(pump) = self.pump.lock().take() {
            pump.abort();
        }
    }

    fn emit(&self, event: SessionEvent) {
        if self.events.send(event).is_err() {
            debug!("No event consumer; session event discarded");
        }
    }
}

fn teardown_on_drop(core: &mut SessionCore) {
    if core.state.is_open() {
        warn!("SessionManager dropped with an open session");
    }
    drop(core.teardown());
}

impl Drop for SessionManager {
    fn drop(&mut self) {
        // The pump holds its own reference to the core, so stop it first.
        self.stop_pump();

        match self.core.try_lock() {
            Ok(mut core) => teardown_on_drop(&mut core),
            Err(_) => match tokio::runtime::Handle::try_current() {
                Ok(runtime) => {
                    let core = Arc::clone(&self.core);
                    runtime.spawn(async move {
                        teardown_on_drop(&mut *core.lock().await);
                    });
                }
                Err(_) => {
                    warn!("Session core busy at drop; handle released with its last reference")
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::config::Parity;
    use crate::infrastructure::serial::MemoryBackend;

    fn create_manager(ports: &[&str]) -> (MemoryBackend, SessionManager, EventReceiver) {
        let backend = MemoryBackend::new(ports);
        let (manager, events) = SessionManager::new(Arc::new(backend.clone()));
        (backend, manager, events)
    }

    #[tokio::test]
    async fn test_manager_starts_closed() {
        let (_backend, manager, _events) = create_manager(&["COM1"]);
        assert_eq!(manager.state().await, SessionState::Closed);
        assert_eq!(manager.active_device().await, None);
        assert!(manager.ports().is_empty());
    }

    #[tokio::test]
    async fn test_open_and_close() {
        let (backend, manager, _events) = create_manager(&["COM1"]);
        let config = SessionConfig::new("COM1", 115200).parity(Parity::Odd);

        manager.open(config.clone()).await.unwrap();
        assert!(manager.is_open().await);
        assert_eq!(manager.active_device().await.as_deref(), Some("COM1"));
        assert_eq!(backend.last_config(), Some(config.clone()));

        manager.close().await.unwrap();
        assert!(!manager.is_open().await);
        assert!(!backend.is_open("COM1"));
        assert_eq!(manager.config().await, Some(config));
    }

    #[tokio::test]
    async fn test_double_open_rejected() {
        let (backend, manager, _events) = create_manager(&["COM1", "COM2"]);
        manager.open(SessionConfig::new("COM1", 9600)).await.unwrap();

        let err = manager
            .open(SessionConfig::new("COM2", 9600))
            .await
            .unwrap_err();
        assert!(matches!(err, OpenError::AlreadyOpen { ref device } if device == "COM1"));
        assert_eq!(backend.open_calls(), 1);
        assert_eq!(manager.active_device().await.as_deref(), Some("COM1"));
    }

    #[tokio::test]
    async fn test_failed_open_refreshes_ports() {
        let (backend, manager, mut events) = create_manager(&["COM1"]);
        backend.reject_open("COM1");

        let err = manager
            .open(SessionConfig::new("COM1", 9600))
            .await
            .unwrap_err();
        assert!(matches!(err, OpenError::DeviceUnavailable { .. }));
        assert_eq!(manager.state().await, SessionState::Closed);
        assert_eq!(
            events.try_recv().unwrap(),
            SessionEvent::PortsChanged(vec![PortDescriptor::new("COM1")])
        );
    }

    #[tokio::test]
    async fn test_close_discards_pending_input() {
        let backend = MemoryBackend::new(&["COM1"]);
        let options = SessionOptions {
            receive_poll_interval: Duration::from_secs(3600),
        };
        let (manager, _events) = SessionManager::with_options(Arc::new(backend.clone()), options);

        manager.open(SessionConfig::new("COM1", 9600)).await.unwrap();
        // Let the pump take its immediate first tick before data shows up.
        tokio::task::yield_now().await;
        backend.inject("COM1", b"unread");

        manager.close().await.unwrap();
        assert_eq!(backend.pending_input("COM1"), 0);
    }

    #[tokio::test]
    async fn test_close_on_removed_device_reports_already_invalid() {
        let (backend, manager, _events) = create_manager(&["COM1"]);
        manager.open(SessionConfig::new("COM1", 9600)).await.unwrap();
        backend.remove_port("COM1");

        let err = manager.close().await.unwrap_err();
        assert!(matches!(err, CloseError::AlreadyInvalid { .. }));
        assert_eq!(manager.state().await, SessionState::Closed);
        assert!(matches!(manager.close().await, Err(CloseError::NotOpen)));
    }

    #[tokio::test]
    async fn test_send_counts_bytes() {
        let (backend, manager, _events) = create_manager(&["COM1"]);
        manager.open(SessionConfig::new("COM1", 9600)).await.unwrap();

        manager.send("hello").await.unwrap();
        assert_eq!(backend.written("COM1"), b"hello");
        assert_eq!(manager.statistics().await.bytes_sent, 5);
    }

    #[tokio::test]
    async fn test_send_failure_keeps_state() {
        let (backend, manager, _events) = create_manager(&["COM1"]);
        manager.open(SessionConfig::new("COM1", 9600)).await.unwrap();
        backend.remove_port("COM1");

        let err = manager.send("x").await.unwrap_err();
        assert!(matches!(err, SendError::WriteFailed { .. }));
        assert!(manager.is_open().await);
    }

    #[tokio::test]
    async fn test_removal_of_other_device_ignored() {
        let (_backend, manager, mut events) = create_manager(&["COM1", "COM3"]);
        manager.open(SessionConfig::new("COM3", 9600)).await.unwrap();

        assert!(!manager.handle_device_removed("COM1").await);
        assert!(manager.is_open().await);
        assert!(events.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_drop_with_core_locked_stops_pump_and_releases_port() {
        let backend = MemoryBackend::new(&["COM1"]);
        let options = SessionOptions {
            receive_poll_interval: Duration::from_millis(1),
        };
        let (manager, mut events) = SessionManager::with_options(Arc::new(backend.clone()), options);
        manager.open(SessionConfig::new("COM1", 9600)).await.unwrap();

        let core = Arc::clone(&manager.core);
        let guard = core.lock().await;
        drop(manager);
        drop(guard);
        drop(core);

        tokio::time::sleep(Duration::from_millis(20)).await;
        backend.inject("COM1", b"zombie");
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert!(!backend.is_open("COM1"));
        assert_eq!(backend.pending_input("COM1"), 6);
        // Every sender is gone once the pump has stopped.
        let next = tokio::time::timeout(Duration::from_secs(1), events.recv())
            .await
            .expect("event stream still open after drop");
        assert_eq!(next, None);
    }

    #[tokio::test]
    async fn test_forced_close_releases_port_for_reopen() {
        let (backend, manager, mut events) = create_manager(&["COM3"]);
        manager.open(SessionConfig::new("COM3", 9600)).await.unwrap();

        assert!(manager.handle_device_removed("COM3").await);
        assert_eq!(
            events.try_recv().unwrap(),
            SessionEvent::SessionDropped {
                device: "COM3".to_string()
            }
        );
        assert!(!backend.is_open("COM3"));

        manager.open(SessionConfig::new("COM3", 9600)).await.unwrap();
        assert!(manager.is_open().await);
    }
}
