//! glisten-hub: In-process event broadcast hub
//!
//! The hub accepts events from an ingress path, keeps them in an ordered
//! store for pull-based readers, and pushes every new event to all sessions
//! attached at the moment of publishing.
//!
//! # Components
//!
//! - [`EventStore`]: ordered, sequenced event history
//! - [`SessionRegistry`]: the sinks currently attached
//! - [`BroadcastHub`]: owns both and serializes every mutation
//!
//! Sinks are write capabilities implementing [`Sink`]. The usual sink is a
//! [`ChannelSink`], a bounded queue drained by the session's own task, so a
//! slow session never delays the others.

mod hub;
mod registry;
mod sink;
mod store;

pub use hub::{BroadcastHub, HubOptions, HubStats};
pub use registry::{SessionEntry, SessionRegistry};
pub use sink::{ChannelSink, Delivery, Sink};
pub use store::EventStore;
