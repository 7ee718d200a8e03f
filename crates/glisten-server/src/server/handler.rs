//! SSH session handler implementation
//!
//! Implements the russh server handler for terminal clients. Each shell
//! session attaches a bounded channel sink to the broadcast hub and runs a
//! writer task that drains it into the SSH channel.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::anyhow;
use async_trait::async_trait;
use russh::server::{Auth, Handle, Handler, Msg, Session};
use russh::{Channel, ChannelId, CryptoVec, MethodSet, Pty};
use tokio::task::JoinHandle;

use crate::server::session::{forward_deliveries, SessionAction, ShellSession, TerminalOutput};
use crate::state::GlistenState;

/// Handler for a single SSH client connection
pub struct SessionHandler {
    /// Shared daemon state
    state: Arc<GlistenState>,
    /// Peer address of the connecting client
    peer_addr: SocketAddr,
    /// Authenticated user name
    user: Option<String>,
    /// The channel carrying the shell
    channel: Option<ChannelId>,
    /// Hub session, set once the shell starts
    shell: Option<ShellSession>,
    /// Task draining the hub sink into the channel
    writer: Option<JoinHandle<()>>,
}

impl SessionHandler {
    /// Create a handler for a new connection
    pub fn new(state: Arc<GlistenState>, peer_addr: SocketAddr) -> Self {
        Self {
            state,
            peer_addr,
            user: None,
            channel: None,
            shell: None,
            writer: None,
        }
    }

    fn user(&self) -> &str {
        self.user.as_deref().unwrap_or("anonymous")
    }

    /// Attach to the hub and start forwarding deliveries to the channel
    fn start_session(&mut self, channel: ChannelId, handle: Handle) -> bool {
        let (shell, rx) = match ShellSession::attach(Arc::clone(&self.state), self.user()) {
            Ok(attached) => attached,
            Err(e) => {
                tracing::warn!("Refusing shell for {} from {}: {}", self.user(), self.peer_addr, e);
                return false;
            }
        };

        let output = ChannelOutput { handle, channel };
        self.writer = Some(tokio::spawn(forward_deliveries(shell.id(), output, rx)));
        self.shell = Some(shell);
        true
    }

    /// Detach from the hub; safe to call more than once
    fn end_session(&mut self) {
        self.shell.take();
    }

    fn close_channel(&mut self, channel: ChannelId, session: &mut Session) {
        tracing::debug!("Closing channel {:?} for {}", channel, self.user());
        self.end_session();
        session.exit_status_request(channel, 0);
        session.eof(channel);
        session.close(channel);
    }
}

impl Drop for SessionHandler {
    fn drop(&mut self) {
        self.end_session();
        if let Some(writer) = self.writer.take() {
            writer.abort();
        }
    }
}

/// SSH channel as a terminal
struct ChannelOutput {
    handle: Handle,
    channel: ChannelId,
}

#[async_trait]
impl TerminalOutput for ChannelOutput {
    async fn write(&self, data: &[u8]) -> anyhow::Result<()> {
        self.handle
            .data(self.channel, CryptoVec::from_slice(data))
            .await
            .map_err(|_| anyhow!("channel {:?} closed", self.channel))
    }

    async fn hang_up(&self) {
        let _ = self.handle.close(self.channel).await;
    }
}

#[async_trait]
impl Handler for SessionHandler {
    type Error = anyhow::Error;

    /// Accounts configured without a password are let in straight away
    async fn auth_none(&mut self, user: &str) -> Result<Auth, Self::Error> {
        if self.state.credentials.requires_password(user) {
            return Ok(Auth::Reject {
                proceed_with_methods: Some(MethodSet::PASSWORD),
            });
        }

        tracing::info!("Open account {} accepted from {}", user, self.peer_addr);
        self.user = Some(user.to_string());
        Ok(Auth::Accept)
    }

    async fn auth_password(&mut self, user: &str, password: &str) -> Result<Auth, Self::Error> {
        if self.state.credentials.verify(user, password) {
            tracing::info!("Password accepted for {} from {}", user, self.peer_addr);
            self.user = Some(user.to_string());
            return Ok(Auth::Accept);
        }

        tracing::warn!("Authentication REJECTED for {} from {}", user, self.peer_addr);
        Ok(Auth::Reject {
            proceed_with_methods: None,
        })
    }

    async fn channel_open_session(
        &mut self,
        channel: Channel<Msg>,
        _session: &mut Session,
    ) -> Result<bool, Self::Error> {
        if self.channel.is_some() {
            tracing::debug!("Refusing second session channel from {}", self.peer_addr);
            return Ok(false);
        }

        tracing::debug!("Channel opened: {:?}", channel.id());
        self.channel = Some(channel.id());
        Ok(true)
    }

    #[allow(clippy::too_many_arguments)]
    async fn pty_request(
        &mut self,
        channel: ChannelId,
        term: &str,
        col_width: u32,
        row_height: u32,
        _pix_width: u32,
        _pix_height: u32,
        _modes: &[(Pty, u32)],
        session: &mut Session,
    ) -> Result<(), Self::Error> {
        tracing::trace!("PTY requested: {} {}x{}", term, col_width, row_height);
        session.channel_success(channel);
        Ok(())
    }

    async fn shell_request(
        &mut self,
        channel: ChannelId,
        session: &mut Session,
    ) -> Result<(), Self::Error> {
        if self.shell.is_some() {
            session.channel_failure(channel);
            return Ok(());
        }

        if self.start_session(channel, session.handle()) {
            session.channel_success(channel);
        } else {
            session.channel_failure(channel);
            session.close(channel);
        }
        Ok(())
    }

    async fn data(
        &mut self,
        channel: ChannelId,
        data: &[u8],
        session: &mut Session,
    ) -> Result<(), Self::Error> {
        tracing::trace!("Received {} bytes on channel {:?}", data.len(), channel);

        let Some(shell) = self.shell.as_mut() else {
            return Ok(());
        };

        for action in shell.input(data) {
            match action {
                SessionAction::Echo(text) => {
                    session.data(channel, CryptoVec::from_slice(text.as_bytes()));
                }
                SessionAction::Close => {
                    self.close_channel(channel, session);
                    break;
                }
            }
        }
        Ok(())
    }

    async fn channel_eof(
        &mut self,
        channel: ChannelId,
        _session: &mut Session,
    ) -> Result<(), Self::Error> {
        // Input is optional, so EOF does not end the session
        tracing::debug!("Channel EOF: {:?}", channel);
        Ok(())
    }

    async fn channel_close(
        &mut self,
        channel: ChannelId,
        _session: &mut Session,
    ) -> Result<(), Self::Error> {
        tracing::debug!("Channel closed: {:?}", channel);
        self.end_session();
        self.channel = None;
        Ok(())
    }
}

/// Configuration for the SSH server
#[derive(Clone)]
pub struct ServerConfig {
    /// russh server configuration
    pub ssh_config: Arc<russh::server::Config>,
}

impl ServerConfig {
    /// Create a new server configuration with the given host key
    pub fn new(host_key: russh_keys::key::KeyPair, auth_rejection_time: std::time::Duration) -> Self {
        let mut config = russh::server::Config::default();
        config.keys.push(host_key);
        config.methods = MethodSet::NONE | MethodSet::PASSWORD;
        config.auth_rejection_time = auth_rejection_time;
        config.auth_rejection_time_initial = Some(std::time::Duration::from_secs(0));

        Self {
            ssh_config: Arc::new(config),
        }
    }
}
