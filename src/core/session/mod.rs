// Session module - Single-port session state machine
pub mod manager;
pub mod state;

pub use manager::{EventReceiver, SessionManager, SessionOptions};
pub use state::{SessionEvent, SessionState, SessionStatistics};
