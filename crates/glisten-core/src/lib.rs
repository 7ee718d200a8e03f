//! glisten-core: Shared types, errors and configuration for glisten
//!
//! This crate provides the domain types and configuration structures used by
//! the broadcast hub and the SSH/HTTP daemon.

pub mod config;
pub mod error;
pub mod types;

pub use error::{GlistenError, HubError, IngressError, SinkError};
pub use types::{Event, SessionId};
