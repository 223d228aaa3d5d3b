// Core module - Session lifecycle, receive pump and hot-plug handling
pub mod ports;
pub(crate) mod pump;
pub mod session;
pub mod text;
pub mod watcher;

pub use ports::{PortDescriptor, PortEnumerator};
pub use session::{SessionEvent, SessionManager, SessionState};
pub use watcher::DeviceChangeWatcher;
