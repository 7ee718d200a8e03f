//! Ordered event history

use std::collections::VecDeque;

use glisten_core::{Event, HubError};

/// Ordered, append-only history of events
///
/// Index order always matches publish order. Two reads are offered and they
/// are deliberately different:
///
/// - [`first`](Self::first) peeks at the oldest event and leaves it in place
/// - [`pop_latest`](Self::pop_latest) removes the newest event (a drain read)
///
/// A consumer that polls with `first` will see the same event forever, while
/// one that polls with `pop_latest` consumes events newest-first and no two
/// callers ever receive the same one.
#[derive(Debug, Default)]
pub struct EventStore {
    events: VecDeque<Event>,
    next_sequence: u64,
    max_events: Option<usize>,
}

impl EventStore {
    /// Create an empty, unbounded store
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store that evicts its oldest events beyond `max_events`
    pub fn with_capacity_limit(max_events: usize) -> Self {
        Self {
            max_events: Some(max_events.max(1)),
            ..Self::default()
        }
    }

    /// Append a payload, assigning it the next sequence number
    pub fn append(&mut self, payload: impl Into<String>) -> Event {
        let event = Event::new(self.next_sequence, payload);
        self.next_sequence += 1;
        self.events.push_back(event.clone());

        if let Some(max) = self.max_events {
            while self.events.len() > max {
                if let Some(evicted) = self.events.pop_front() {
                    tracing::trace!("Evicted event #{} (retention limit {})", evicted.sequence, max);
                }
            }
        }

        event
    }

    /// Oldest retained event, without removing it
    pub fn first(&self) -> Result<&Event, HubError> {
        self.events.front().ok_or(HubError::EmptyStore)
    }

    /// Remove and return the most recently appended event
    pub fn pop_latest(&mut self) -> Result<Event, HubError> {
        self.events.pop_back().ok_or(HubError::EmptyStore)
    }

    /// Remove the first event whose payload equals `payload`
    pub fn delete(&mut self, payload: &str) -> bool {
        match self.events.iter().position(|e| e.payload == payload) {
            Some(index) => self.events.remove(index).is_some(),
            None => false,
        }
    }

    /// Retained events in publish order
    pub fn iter(&self) -> impl Iterator<Item = &Event> {
        self.events.iter()
    }

    /// Sequence number the next append will receive
    pub fn next_sequence(&self) -> u64 {
        self.next_sequence
    }

    /// Number of retained events
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}
