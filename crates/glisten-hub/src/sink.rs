//! Outbound write capabilities for attached sessions

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

use glisten_core::{Event, SinkError};

/// One message pushed to a session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    /// A published event, also retained in the store
    Event(Event),
    /// A message that is never stored: presence announcements and direct
    /// messages such as a greeting
    Notice(String),
}

impl Delivery {
    /// Text of the delivery as shown to a terminal
    pub fn text(&self) -> String {
        match self {
            Delivery::Event(event) => format!("Event: {}", event.payload),
            Delivery::Notice(text) => text.clone(),
        }
    }
}

/// Write side of an attached session
///
/// `push` must not block: the hub calls it while holding its publish lock.
/// For the same reason it must not publish, attach or send through the hub.
pub trait Sink: Send + Sync {
    /// Queue one delivery for the session
    fn push(&self, delivery: Delivery) -> Result<(), SinkError>;
}

/// Sink backed by a bounded tokio channel
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::Sender<Delivery>,
}

impl ChannelSink {
    /// Create a sink and the receiver its session task drains
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<Delivery>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }
}

impl Sink for ChannelSink {
    fn push(&self, delivery: Delivery) -> Result<(), SinkError> {
        self.tx.try_send(delivery).map_err(|e| match e {
            TrySendError::Full(_) => SinkError::Full,
            TrySendError::Closed(_) => SinkError::Closed,
        })
    }
}
