//! Serial port enumeration
//!
//! Every call rebuilds the device list wholesale in the order the OS reports
//! it. A failed OS query is treated as "no devices" so callers never have to
//! handle an enumeration error.

use crate::infrastructure::serial::SerialBackend;
use parking_lot::Mutex;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

/// A selectable serial device
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct PortDescriptor {
    pub identifier: String,
}

impl PortDescriptor {
    pub fn new(identifier: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
        }
    }
}

impl fmt::Display for PortDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.identifier)
    }
}

/// Lists available serial devices and remembers the last listing
pub struct PortEnumerator {
    backend: Arc<dyn SerialBackend>,
    last: Mutex<Vec<PortDescriptor>>,
}

impl PortEnumerator {
    pub fn new(backend: Arc<dyn SerialBackend>) -> Self {
        Self {
            backend,
            last: Mutex::new(Vec::new()),
        }
    }

    /// Query the OS for the current device list
    ///
    /// Safe to call while a port is open; it never touches an open handle.
    pub fn list_ports(&self) -> Vec<PortDescriptor> {
        // Held across the query so concurrent refreshes land in call order.
        let mut last = self.last.lock();

        let ports = match self.backend.list_ports() {
            Ok(names) => names.into_iter().map(PortDescriptor::new).collect(),
            Err(e) => {
                warn!("Failed to enumerate serial ports: {}", e);
                Vec::new()
            }
        };

        if ports.is_empty() {
            debug!("No serial ports found");
        } else {
            debug!("Found {} serial port(s)", ports.len());
        }

        *last = ports.clone();
        ports
    }

    /// The result of the most recent enumeration
    pub fn last_listing(&self) -> Vec<PortDescriptor> {
        self.last.lock().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::serial::MemoryBackend;

    #[test]
    fn test_listing_in_os_order() {
        let enumerator = PortEnumerator::new(Arc::new(MemoryBackend::new(&["COM1", "COM3"])));
        let ports = enumerator.list_ports();
        assert_eq!(ports, vec![PortDescriptor::new("COM1"), PortDescriptor::new("COM3")]);
    }

    #[test]
    fn test_empty_listing_is_not_an_error() {
        let enumerator = PortEnumerator::new(Arc::new(MemoryBackend::default()));
        assert!(enumerator.list_ports().is_empty());
    }

    #[test]
    fn test_listing_is_rebuilt_wholesale() {
        let backend = MemoryBackend::new(&["COM1", "COM3"]);
        let enumerator = PortEnumerator::new(Arc::new(backend.clone()));
        enumerator.list_ports();

        backend.set_ports(&["COM5"]);
        assert_eq!(enumerator.list_ports(), vec![PortDescriptor::new("COM5")]);
        assert_eq!(enumerator.last_listing(), vec![PortDescriptor::new("COM5")]);
    }
}
