use crate::core::ports::PortDescriptor;
use serde::Serialize;
use std::fmt;
use std::time::SystemTime;

/// Session status enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum SessionState {
    /// No handle is held
    #[default]
    Closed,
    /// A handle is held and the receive pump is live
    Open,
}

impl SessionState {
    pub fn is_open(&self) -> bool {
        matches!(self, SessionState::Open)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::Closed => write!(f, "Closed"),
            SessionState::Open => write!(f, "Open"),
        }
    }
}

/// Notifications delivered to the presentation layer
///
/// Events are produced on whatever task observed them; the consumer drains
/// the receiver on its own schedule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// Text decoded from bytes that arrived on the open port
    TextReceived(String),
    /// The open device disappeared and the session was closed involuntarily
    SessionDropped { device: String },
    /// The selectable device list was rebuilt
    PortsChanged(Vec<PortDescriptor>),
}

/// Session statistics
#[derive(Debug, Clone, Default, Serialize)]
pub struct SessionStatistics {
    /// Total bytes sent
    pub bytes_sent: u64,
    /// Total bytes received
    pub bytes_received: u64,
    /// When the current (or last) session was opened
    pub opened_at: Option<SystemTime>,
}

impl SessionStatistics {
    pub(crate) fn started() -> Self {
        Self {
            opened_at: Some(SystemTime::now()),
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_state_is_closed() {
        assert_eq!(SessionState::default(), SessionState::Closed);
        assert!(!SessionState::default().is_open());
        assert!(SessionState::Open.is_open());
    }

    #[test]
    fn test_state_display() {
        assert_eq!(SessionState::Open.to_string(), "Open");
        assert_eq!(SessionState::Closed.to_string(), "Closed");
    }

    #[test]
    fn test_statistics_start_empty() {
        let stats = SessionStatistics::started();
        assert_eq!(stats.bytes_sent, 0);
        assert_eq!(stats.bytes_received, 0);
        assert!(stats.opened_at.is_some());
    }
}
