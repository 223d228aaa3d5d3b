//! Receive pump
//!
//! Runs for exactly one open session. Each firing reads the bytes the port
//! reports as available, decodes them and publishes the text. The pump reads
//! under the session mutex and checks its generation first, so once the
//! session is torn down it can never touch the released handle.

use crate::core::session::manager::SessionCore;
use crate::core::session::state::SessionEvent;
use crate::core::text;
use std::io;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

/// Result of a single pump firing
#[derive(Debug)]
pub(crate) enum PumpOutcome {
    /// Nothing was waiting
    Idle,
    /// This many bytes were read and forwarded
    Delivered(usize),
    /// The port reported an error; the session is left to the hot-plug path
    Failed(io::Error),
    /// The session this pump belonged to is gone
    Stale,
}

pub(crate) struct ReceivePump {
    core: Arc<Mutex<SessionCore>>,
    generation: u64,
    events: mpsc::UnboundedSender<SessionEvent>,
}

impl ReceivePump {
    pub(crate) fn new(
        core: Arc<Mutex<SessionCore>>,
        generation: u64,
        events: mpsc::UnboundedSender<SessionEvent>,
    ) -> Self {
        Self {
            core,
            generation,
            events,
        }
    }

    pub(crate) fn spawn(self, period: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            let mut failing = false;

            loop {
                ticker.tick().await;

                match self.fire().await {
                    PumpOutcome::Idle => {}
                    PumpOutcome::Delivered(n) => {
                        trace!("Receive pump forwarded {} bytes", n);
                        failing = false;
                    }
                    PumpOutcome::Failed(e) => {
                        // Only the first error of a run is worth a warning.
                        if !failing {
                            warn!("Serial read failed: {}", e);
                            failing = true;
                        }
                    }
                    PumpOutcome::Stale => break,
                }
            }

            debug!("Receive pump for session #{} stopped", self.generation);
        })
    }

    pub(crate) async fn fire(&self) -> PumpOutcome {
        let mut guard = self.core.lock().await;
        if !guard.is_live(self.generation) {
            return PumpOutcome::Stale;
        }

        let core = &mut *guard;
        let Some(handle) = core.handle.as_mut() else {
            return PumpOutcome::Stale;
        };

        let available = match handle.bytes_to_read() {
            Ok(0) => return PumpOutcome::Idle,
            Ok(n) => n,
            Err(e) => return PumpOutcome::Failed(e),
        };

        // Sized to what is waiting so the read never blocks for more.
        let mut buffer = vec![0u8; available];
        let n = match handle.read(&mut buffer) {
            Ok(n) => n,
            Err(ref e) if e.kind() == io::ErrorKind::TimedOut => return PumpOutcome::Idle,
            Err(e) => return PumpOutcome::Failed(e),
        };
        if n == 0 {
            return PumpOutcome::Idle;
        }
        buffer.truncate(n);
        core.statistics.bytes_received += n as u64;

        // Published under the lock so no text can follow a SessionDropped.
        if self
            .events
            .send(SessionEvent::TextReceived(text::decode(&buffer)))
            .is_err()
        {
            debug!("No event consumer; received text discarded");
        }

        PumpOutcome::Delivered(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::session::state::SessionState;
    use crate::domain::config::SessionConfig;
    use crate::infrastructure::serial::{MemoryBackend, SerialBackend};

    fn open_core(backend: &MemoryBackend) -> Arc<Mutex<SessionCore>> {
        let mut core = SessionCore::new();
        core.handle = Some(backend.open(&SessionConfig::new("COM1", 9600)).unwrap());
        core.state = SessionState::Open;
        core.generation = 1;
        Arc::new(Mutex::new(core))
    }

    #[tokio::test]
    async fn test_fire_reads_exactly_available_bytes() {
        let backend = MemoryBackend::new(&["COM1"]);
        let core = open_core(&backend);
        let (tx, mut rx) = mpsc::unbounded_channel();
        let pump = ReceivePump::new(Arc::clone(&core), 1, tx);

        assert!(matches!(pump.fire().await, PumpOutcome::Idle));

        backend.inject("COM1", b"hello");
        assert!(matches!(pump.fire().await, PumpOutcome::Delivered(5)));
        assert_eq!(rx.try_recv().unwrap(), SessionEvent::TextReceived("hello".to_string()));
        assert_eq!(backend.pending_input("COM1"), 0);
        assert_eq!(core.lock().await.statistics.bytes_received, 5);
    }

    #[tokio::test]
    async fn test_malformed_bytes_forwarded_with_replacement() {
        let backend = MemoryBackend::new(&["COM1"]);
        let core = open_core(&backend);
        let (tx, mut rx) = mpsc::unbounded_channel();
        let pump = ReceivePump::new(core, 1, tx);

        backend.inject("COM1", &[b'o', 0xfe, b'k']);
        pump.fire().await;
        assert_eq!(
            rx.try_recv().unwrap(),
            SessionEvent::TextReceived("o\u{fffd}k".to_string())
        );
    }

    #[tokio::test]
    async fn test_stale_generation_does_not_read() {
        let backend = MemoryBackend::new(&["COM1"]);
        let core = open_core(&backend);
        let (tx, mut rx) = mpsc::unbounded_channel();
        let pump = ReceivePump::new(Arc::clone(&core), 0, tx);

        backend.inject("COM1", b"abc");
        assert!(matches!(pump.fire().await, PumpOutcome::Stale));
        assert_eq!(backend.pending_input("COM1"), 3);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_read_error_is_absorbed() {
        let backend = MemoryBackend::new(&["COM1"]);
        let core = open_core(&backend);
        let (tx, mut rx) = mpsc::unbounded_channel();
        let pump = ReceivePump::new(core, 1, tx);

        backend.remove_port("COM1");
        assert!(matches!(pump.fire().await, PumpOutcome::Failed(_)));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_spawned_pump_stops_when_session_closes() {
        let backend = MemoryBackend::new(&["COM1"]);
        let core = open_core(&backend);
        let (tx, _rx) = mpsc::unbounded_channel();
        let handle = ReceivePump::new(Arc::clone(&core), 1, tx).spawn(Duration::from_millis(1));

        {
            let mut core = core.lock().await;
            core.state = SessionState::Closed;
            core.handle = None;
        }

        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("pump did not stop")
            .unwrap();
    }
}
