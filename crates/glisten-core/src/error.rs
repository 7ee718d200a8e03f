//! Core error types for glisten

use std::path::PathBuf;
use thiserror::Error;

/// Top-level error type for the glisten crates
#[derive(Error, Debug)]
pub enum GlistenError {
    /// Hub error
    #[error("Hub error: {0}")]
    Hub(#[from] HubError),

    /// Ingress error
    #[error("Ingress error: {0}")]
    Ingress(#[from] IngressError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors reported by the broadcast hub
///
/// None of these are fatal. Callers are expected to handle them and carry on.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HubError {
    /// A read was attempted while no events are retained
    #[error("No events")]
    EmptyStore,

    /// The registry already holds the maximum number of sessions
    #[error("Session limit exceeded ({0} sessions attached)")]
    SessionLimitExceeded(usize),
}

/// A sink rejected a push
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkError {
    /// The receiving side has gone away
    #[error("Sink closed")]
    Closed,

    /// The sink's queue is full
    #[error("Sink queue full")]
    Full,
}

/// Inbound webhook payload could not be turned into an event
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IngressError {
    /// Body is not valid JSON
    #[error("Malformed JSON body: {0}")]
    MalformedJson(String),

    /// Body is JSON but not an object
    #[error("Expected a JSON object")]
    NotAnObject,

    /// Required field is absent
    #[error("Missing field: {0}")]
    MissingField(String),

    /// Field is present but not a string, number or boolean
    #[error("Field {0} must be a string, number or boolean")]
    InvalidField(String),

    /// Field is an empty string
    #[error("Field {0} must not be empty")]
    EmptyField(String),
}

/// Configuration-related errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Config file not found
    #[error("Config file not found: {0}")]
    NotFound(PathBuf),

    /// Invalid configuration
    #[error("Invalid config: {0}")]
    Invalid(String),

    /// TOML parse error
    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),

    /// TOML serialize error
    #[error("TOML serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),
}
