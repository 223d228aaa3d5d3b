//! In-memory serial backend
//!
//! Virtual ports that live entirely in process. Bytes written to a port are
//! recorded (and echoed back when loopback is on), arriving bytes can be
//! injected, and a port can be yanked out from under an open handle to
//! reproduce hot-unplug. Every backend call is counted so callers can assert
//! which OS operations were attempted.

use super::backend::{PortHandle, SerialBackend};
use crate::domain::config::SessionConfig;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet, VecDeque};
use std::io;
use std::sync::Arc;

#[derive(Debug, Default)]
struct VirtualLine {
    inbound: VecDeque<u8>,
    written: Vec<u8>,
    open: bool,
    dead: bool,
}

#[derive(Debug, Default)]
struct BackendState {
    ports: Vec<String>,
    lines: HashMap<String, Arc<Mutex<VirtualLine>>>,
    rejected: HashSet<String>,
    loopback: bool,
    list_calls: usize,
    open_calls: usize,
    last_config: Option<SessionConfig>,
}

impl BackendState {
    fn line(&mut self, name: &str) -> Arc<Mutex<VirtualLine>> {
        Arc::clone(
            self.lines
                .entry(name.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(VirtualLine::default()))),
        )
    }
}

/// Serial backend backed by virtual in-memory ports
#[derive(Debug, Clone, Default)]
pub struct MemoryBackend {
    state: Arc<Mutex<BackendState>>,
}

impl MemoryBackend {
    /// Create a backend exposing `ports` in the given order
    pub fn new<S: AsRef<str>>(ports: &[S]) -> Self {
        let backend = Self::default();
        backend.set_ports(ports);
        backend
    }

    /// Replace the set of present ports
    pub fn set_ports<S: AsRef<str>>(&self, ports: &[S]) {
        let mut state = self.state.lock();
        state.ports = ports.iter().map(|p| p.as_ref().to_string()).collect();
        for name in state.ports.clone() {
            state.line(&name).lock().dead = false;
        }
    }

    /// Plug in a port
    ///
    /// A handle still held from before the unplug keeps the line busy until
    /// it is released or dropped.
    pub fn add_port(&self, name: &str) {
        let mut state = self.state.lock();
        if !state.ports.iter().any(|p| p == name) {
            state.ports.push(name.to_string());
        }
        state.line(name).lock().dead = false;
    }

    /// Unplug a port; any open handle on it becomes invalid
    pub fn remove_port(&self, name: &str) {
        let mut state = self.state.lock();
        state.ports.retain(|p| p != name);
        if let Some(line) = state.lines.get(name) {
            let mut line = line.lock();
            line.dead = true;
            line.inbound.clear();
        }
    }

    /// Make every open of `name` fail as if the device were busy
    pub fn reject_open(&self, name: &str) {
        self.state.lock().rejected.insert(name.to_string());
    }

    /// Echo written bytes back as received bytes
    pub fn set_loopback(&self, enabled: bool) {
        self.state.lock().loopback = enabled;
    }

    /// Simulate bytes arriving on `name`
    pub fn inject(&self, name: &str, data: &[u8]) {
        let line = self.state.lock().line(name);
        line.lock().inbound.extend(data.iter().copied());
    }

    /// Everything successfully written to `name` so far
    pub fn written(&self, name: &str) -> Vec<u8> {
        let line = self.state.lock().line(name);
        let written = line.lock().written.clone();
        written
    }

    /// Whether a handle on `name` is currently held
    pub fn is_open(&self, name: &str) -> bool {
        let state = self.state.lock();
        state
            .lines
            .get(name)
            .map(|line| line.lock().open)
            .unwrap_or(false)
    }

    /// Number of bytes received on `name` that nobody has read yet
    pub fn pending_input(&self, name: &str) -> usize {
        let line = self.state.lock().line(name);
        let pending = line.lock().inbound.len();
        pending
    }

    pub fn list_calls(&self) -> usize {
        self.state.lock().list_calls
    }

    pub fn open_calls(&self) -> usize {
        self.state.lock().open_calls
    }

    /// Configuration passed to the most recent open attempt
    pub fn last_config(&self) -> Option<SessionConfig> {
        self.state.lock().last_config.clone()
    }
}

impl SerialBackend for MemoryBackend {
    fn list_ports(&self) -> io::Result<Vec<String>> {
        let mut state = self.state.lock();
        state.list_calls += 1;
        Ok(state.ports.clone())
    }

    fn open(&self, config: &SessionConfig) -> io::Result<Box<dyn PortHandle>> {
        let mut state = self.state.lock();
        state.open_calls += 1;
        state.last_config = Some(config.clone());

        if !state.ports.iter().any(|p| p == &config.device) {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("{} does not exist", config.device),
            ));
        }
        if state.rejected.contains(&config.device) {
            return Err(io::Error::new(
                io::ErrorKind::PermissionDenied,
                format!("{} is in use", config.device),
            ));
        }
        if !(5..=8).contains(&config.data_bits) || config.baud_rate == 0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("{} rejected line parameters", config.device),
            ));
        }

        let line = state.line(&config.device);
        {
            let mut line = line.lock();
            if line.open {
                return Err(io::Error::new(
                    io::ErrorKind::PermissionDenied,
                    format!("{} is in use", config.device),
                ));
            }
            line.open = true;
            line.dead = false;
        }

        Ok(Box::new(MemoryPort {
            name: config.device.clone(),
            line,
            backend: Arc::clone(&self.state),
        }))
    }
}

struct MemoryPort {
    name: String,
    line: Arc<Mutex<VirtualLine>>,
    backend: Arc<Mutex<BackendState>>,
}

impl MemoryPort {
    fn gone(&self) -> io::Error {
        io::Error::new(
            io::ErrorKind::BrokenPipe,
            format!("{} has been removed", self.name),
        )
    }
}

impl PortHandle for MemoryPort {
    fn name(&self) -> &str {
        &self.name
    }

    fn bytes_to_read(&mut self) -> io::Result<usize> {
        let line = self.line.lock();
        if line.dead {
            return Err(self.gone());
        }
        Ok(line.inbound.len())
    }

    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut line = self.line.lock();
        if line.dead {
            return Err(self.gone());
        }
        let n = buf.len().min(line.inbound.len());
        for (slot, byte) in buf.iter_mut().zip(line.inbound.drain(..n)) {
            *slot = byte;
        }
        Ok(n)
    }

    fn write_all(&mut self, data: &[u8]) -> io::Result<()> {
        let loopback = self.backend.lock().loopback;
        let mut line = self.line.lock();
        if line.dead {
            return Err(self.gone());
        }
        line.written.extend_from_slice(data);
        if loopback {
            line.inbound.extend(data.iter().copied());
        }
        Ok(())
    }

    fn discard_output(&mut self) -> io::Result<()> {
        if self.line.lock().dead {
            return Err(self.gone());
        }
        Ok(())
    }

    fn discard_input(&mut self) -> io::Result<()> {
        let mut line = self.line.lock();
        if line.dead {
            return Err(self.gone());
        }
        line.inbound.clear();
        Ok(())
    }

    fn release(self: Box<Self>) -> io::Result<()> {
        self.line.lock().open = false;
        Ok(())
    }
}

impl Drop for MemoryPort {
    fn drop(&mut self) {
        self.line.lock().open = false;
    }
}
