//! SerialTerm Library
//!
//! Minimal serial-port terminal core: a single-port session manager that
//! serializes open/close/send with asynchronous receive and hot-plug events,
//! and publishes what it observes on an event stream for the UI to drain.

pub mod cli;
pub mod core;
pub mod domain;
pub mod infrastructure;

pub use crate::core::ports::{PortDescriptor, PortEnumerator};
pub use crate::core::session::{EventReceiver, SessionEvent, SessionManager, SessionOptions, SessionState};
pub use crate::core::watcher::DeviceChangeWatcher;
pub use crate::domain::config::{Parity, SerialTermConfig, SessionConfig, StopBits};
pub use crate::domain::error::{CloseError, OpenError, SendError, SerialTermError, SerialTermResult};
pub use crate::infrastructure::serial::{
    ChannelDeviceSource, DeviceChange, DeviceChangeSender, DeviceChangeSource, MemoryBackend,
    PollingDeviceSource, SerialBackend, SystemBackend,
};
