//! glisten-server: Webhook-to-SSH broadcast daemon
//!
//! Webhook POSTs arrive over HTTP and are published into the broadcast hub;
//! every connected SSH terminal receives each event as a line of text.

pub mod auth;
pub mod http;
pub mod server;
pub mod state;

pub use state::GlistenState;
