//! Core domain types

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identity of one attached session.
///
/// Identities are allocated by the session registry and never reused, so a
/// reconnecting client always receives a fresh one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SessionId(pub u64);

impl SessionId {
    /// Create a session ID from its raw value
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Get the raw ID value
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "s-{}", self.0)
    }
}

/// One published event
///
/// The payload is opaque to the hub. The sequence number is assigned at
/// publish time and gives a total order over every event the store has seen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    /// Monotonic sequence number, unique for the lifetime of the store
    pub sequence: u64,
    /// Opaque payload
    pub payload: String,
    /// Receive time in milliseconds since the UNIX epoch
    pub received_at: u64,
}

impl Event {
    /// Create a new event stamped with the current time
    pub fn new(sequence: u64, payload: impl Into<String>) -> Self {
        Self {
            sequence,
            payload: payload.into(),
            received_at: current_time_millis(),
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.payload)
    }
}

/// Get current time in milliseconds since UNIX epoch.
pub fn current_time_millis() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_id_display() {
        assert_eq!(format!("{}", SessionId::new(7)), "s-7");
    }

    #[test]
    fn test_session_id_ordering() {
        assert!(SessionId::new(1) < SessionId::new(2));
    }

    #[test]
    fn test_event_displays_payload() {
        let event = Event::new(3, "demo");
        assert_eq!(event.to_string(), "demo");
        assert_eq!(event.sequence, 3);
        assert!(event.received_at > 0);
    }
}
