//! SSH server listener
//!
//! Accepts incoming connections and spawns a handler for each client.

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use russh_keys::key::KeyPair;
use tokio::net::{TcpListener, TcpStream};
use tokio_util::sync::CancellationToken;

use crate::server::handler::{ServerConfig, SessionHandler};
use crate::state::GlistenState;

/// SSH server that listens for terminal clients
pub struct SshServer {
    /// Server configuration
    config: ServerConfig,
    /// Shared daemon state
    state: Arc<GlistenState>,
    /// Cancellation token for graceful shutdown
    cancel: CancellationToken,
}

impl SshServer {
    /// Create a new SSH server
    pub fn new(host_key: KeyPair, state: Arc<GlistenState>, cancel: CancellationToken) -> Self {
        let config = ServerConfig::new(host_key, state.config.auth_rejection_time);
        Self {
            config,
            state,
            cancel,
        }
    }

    /// Run the SSH server until cancelled
    pub async fn run(&self, bind_addr: &str) -> Result<()> {
        let listener = TcpListener::bind(bind_addr)
            .await
            .with_context(|| format!("Failed to bind SSH server to {}", bind_addr))?;

        tracing::info!("SSH server listening on {}", listener.local_addr()?);

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => {
                    tracing::info!("SSH server shutting down");
                    break;
                }

                result = listener.accept() => {
                    match result {
                        Ok((socket, peer_addr)) => self.handle_connection(socket, peer_addr),
                        Err(e) => tracing::error!("Failed to accept connection: {}", e),
                    }
                }
            }
        }

        Ok(())
    }

    /// Serve one connection on its own task
    fn handle_connection(&self, socket: TcpStream, peer_addr: SocketAddr) {
        tracing::info!("SSH connection received from {}", peer_addr);

        let config = Arc::clone(&self.config.ssh_config);
        let handler = SessionHandler::new(Arc::clone(&self.state), peer_addr);
        let cancel = self.cancel.clone();

        tokio::spawn(async move {
            let result = tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::debug!("Connection handler cancelled for {}", peer_addr);
                    return;
                }
                result = russh::server::run_stream(config, socket, handler) => result
            };

            match result {
                Ok(_) => tracing::info!("SSH connection from {} closed", peer_addr),
                Err(e) => tracing::warn!("SSH connection error from {}: {}", peer_addr, e),
            }
        });
    }
}

/// Load the host key, or generate one if the file does not exist
///
/// A generated key lives only in memory, so clients will see a new host key
/// after every restart until one is written to `path`
/// (`ssh-keygen -t ed25519 -f <path>`).
pub async fn load_or_generate_host_key(path: &Path) -> Result<KeyPair> {
    if path.exists() {
        tracing::info!("Loading host key from {:?}", path);
        let key = russh_keys::load_secret_key(path, None)
            .with_context(|| format!("Failed to load host key from {:?}", path))?;
        return Ok(key);
    }

    tracing::warn!(
        "Host key {:?} not found - using an ephemeral Ed25519 key for this run",
        path
    );
    KeyPair::generate_ed25519().ok_or_else(|| anyhow::anyhow!("Failed to generate Ed25519 key"))
}
