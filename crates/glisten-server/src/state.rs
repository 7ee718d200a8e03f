//! Shared daemon state

use std::sync::Arc;

use anyhow::Result;

use glisten_core::config::GlistenConfig;
use glisten_hub::BroadcastHub;

use crate::auth::{CredentialVerifier, PasswordTable};

/// State shared by the HTTP ingress and every SSH session
pub struct GlistenState {
    /// Configuration
    pub config: GlistenConfig,
    /// Broadcast hub
    pub hub: Arc<BroadcastHub>,
    /// Credential check for SSH logins
    pub credentials: Arc<dyn CredentialVerifier>,
}

impl GlistenState {
    /// Create state with credentials taken from the `[accounts]` section
    pub fn new(config: GlistenConfig) -> Result<Self> {
        let credentials = PasswordTable::from_accounts(&config.accounts)?;
        if credentials.is_empty() {
            tracing::warn!("No accounts configured - all SSH logins will be rejected");
        }
        Ok(Self::with_credentials(config, Arc::new(credentials)))
    }

    /// Create state with a custom credential verifier
    pub fn with_credentials(
        config: GlistenConfig,
        credentials: Arc<dyn CredentialVerifier>,
    ) -> Self {
        let hub = Arc::new(BroadcastHub::from_config(&config));
        Self {
            config,
            hub,
            credentials,
        }
    }

    /// Get the broadcast hub
    pub fn hub(&self) -> &Arc<BroadcastHub> {
        &self.hub
    }
}
