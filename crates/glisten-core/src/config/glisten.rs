//! Daemon configuration

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use super::serde_utils::duration_secs;

/// Which store read backs the "current event" pull endpoint
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReadMode {
    /// Return the oldest retained event without removing it
    #[default]
    Peek,
    /// Remove and return the newest event
    Drain,
}

impl fmt::Display for ReadMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReadMode::Peek => write!(f, "peek"),
            ReadMode::Drain => write!(f, "drain"),
        }
    }
}

/// How SSH sessions treat terminal input
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionMode {
    /// Sessions only receive events; input is ignored
    #[default]
    Broadcast,
    /// Every line a session types is published as an event
    Chat,
}

impl fmt::Display for SessionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionMode::Broadcast => write!(f, "broadcast"),
            SessionMode::Chat => write!(f, "chat"),
        }
    }
}

/// Configuration for the glisten daemon
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GlistenConfig {
    /// Address to bind the SSH server to
    pub ssh_bind_address: String,

    /// Address to bind the webhook HTTP server to
    pub http_bind_address: String,

    /// Path to the SSH host key file
    pub host_key_path: PathBuf,

    /// Read behavior of `GET /`
    pub read_mode: ReadMode,

    /// Input handling for SSH sessions
    pub session_mode: SessionMode,

    /// JSON field of the webhook body that becomes the event payload
    pub event_field: String,

    /// Announce joins and leaves to the other sessions
    pub announce_presence: bool,

    /// Outbound queue depth per session; a session that falls this far
    /// behind is disconnected
    pub sink_capacity: usize,

    /// Longest line, in bytes, a chat session may type; input past it is
    /// dropped
    pub max_line_length: usize,

    /// Maximum number of concurrently attached sessions
    pub max_sessions: Option<usize>,

    /// Maximum number of retained events (oldest evicted first)
    pub max_events: Option<usize>,

    /// Delay before answering a failed authentication attempt
    #[serde(with = "duration_secs")]
    pub auth_rejection_time: Duration,

    /// Message sent once when a session attaches; `{user}` is replaced by
    /// the login name
    pub greeting: String,

    /// Accounts allowed to log in. An empty value admits the user without a
    /// password, otherwise the value is `sha256:<hex digest>`.
    pub accounts: BTreeMap<String, String>,
}

impl Default for GlistenConfig {
    fn default() -> Self {
        let config_dir = super::default_config_dir();

        let mut accounts = BTreeMap::new();
        accounts.insert("guest".to_string(), String::new());

        Self {
            ssh_bind_address: "0.0.0.0:8022".to_string(),
            http_bind_address: "0.0.0.0:8080".to_string(),
            host_key_path: config_dir.join("ssh_host_key"),
            read_mode: ReadMode::default(),
            session_mode: SessionMode::default(),
            event_field: "project_name".to_string(),
            announce_presence: false,
            sink_capacity: 64,
            max_line_length: 1024,
            max_sessions: None,
            max_events: None,
            auth_rejection_time: Duration::from_secs(1),
            greeting: "Welcome to glisten, {user}!".to_string(),
            accounts,
        }
    }
}

impl GlistenConfig {
    /// Render the greeting for a user
    pub fn greeting_for(&self, user: &str) -> String {
        self.greeting.replace("{user}", user)
    }

    /// Validate values that serde cannot check on its own
    pub fn validate(&self) -> Result<(), crate::error::ConfigError> {
        use crate::error::ConfigError;

        if self.sink_capacity == 0 {
            return Err(ConfigError::Invalid("sink_capacity must be at least 1".into()));
        }
        if self.max_line_length == 0 {
            return Err(ConfigError::Invalid("max_line_length must be at least 1".into()));
        }
        if self.event_field.trim().is_empty() {
            return Err(ConfigError::Invalid("event_field must not be empty".into()));
        }
        if self.max_sessions == Some(0) {
            return Err(ConfigError::Invalid("max_sessions must be at least 1".into()));
        }
        if self.max_events == Some(0) {
            return Err(ConfigError::Invalid("max_events must be at least 1".into()));
        }
        Ok(())
    }
}
