//! Shell session logic
//!
//! Everything a terminal session does between attach and detach, apart from
//! the SSH transport: greeting, input handling per [`SessionMode`], and the
//! writer loop that drains the hub sink into the terminal.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::mpsc;

use glisten_core::config::SessionMode;
use glisten_core::{HubError, SessionId};
use glisten_hub::{ChannelSink, Delivery};

use crate::server::terminal::{LineEditor, LineInput};
use crate::state::GlistenState;

const CTRL_C: u8 = 0x03;
const CTRL_D: u8 = 0x04;

/// What the transport should do in response to input
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionAction {
    /// Write text back to the terminal
    Echo(String),
    /// End the session and close the channel
    Close,
}

/// A terminal attached to the hub
///
/// Dropping the session detaches it.
pub struct ShellSession {
    state: Arc<GlistenState>,
    user: String,
    id: SessionId,
    editor: LineEditor,
}

impl ShellSession {
    /// Attach a new session for `user`
    ///
    /// The greeting is queued before any event. Returns the receiver the
    /// session's writer drains.
    pub fn attach(
        state: Arc<GlistenState>,
        user: &str,
    ) -> Result<(Self, mpsc::Receiver<Delivery>), HubError> {
        let (sink, rx) = ChannelSink::channel(state.config.sink_capacity);
        let greeting = state.config.greeting_for(user);
        let id = state
            .hub
            .attach_with_greeting(user, Arc::new(sink), Some(greeting))?;

        let editor = LineEditor::with_max_len(state.config.max_line_length);
        let session = Self {
            state,
            user: user.to_string(),
            id,
            editor,
        };
        Ok((session, rx))
    }

    /// Hub session ID
    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Login name of the session
    pub fn user(&self) -> &str {
        &self.user
    }

    /// Handle terminal input
    ///
    /// In broadcast mode input is ignored except Ctrl-C/Ctrl-D. In chat
    /// mode completed lines are published as `<user>: <line>`.
    pub fn input(&mut self, data: &[u8]) -> Vec<SessionAction> {
        match self.state.config.session_mode {
            SessionMode::Broadcast => {
                if data.iter().any(|&b| b == CTRL_C || b == CTRL_D) {
                    vec![SessionAction::Close]
                } else {
                    Vec::new()
                }
            }
            SessionMode::Chat => self.chat_input(data),
        }
    }

    fn chat_input(&mut self, data: &[u8]) -> Vec<SessionAction> {
        let mut actions = Vec::new();
        for input in self.editor.feed(data) {
            match input {
                LineInput::Echo(text) => actions.push(SessionAction::Echo(text)),
                LineInput::Line(line) => {
                    let event = self.state.hub.publish(format!("{}: {}", self.user, line));
                    tracing::debug!("Chat line from {} published as #{}", self.user, event.sequence);
                }
                LineInput::Interrupt => {
                    actions.push(SessionAction::Close);
                    break;
                }
            }
        }
        actions
    }
}

impl Drop for ShellSession {
    fn drop(&mut self) {
        self.state.hub.detach(self.id);
    }
}

/// Write side of a terminal
#[async_trait]
pub trait TerminalOutput: Send + Sync {
    /// Write bytes to the terminal
    async fn write(&self, data: &[u8]) -> Result<()>;

    /// Close the terminal
    async fn hang_up(&self);
}

/// Write every delivery to the terminal until the hub drops the sink or the
/// client goes away
pub async fn forward_deliveries<O: TerminalOutput>(
    session_id: SessionId,
    output: O,
    mut rx: mpsc::Receiver<Delivery>,
) {
    tracing::debug!("Writer started for session {}", session_id);

    while let Some(delivery) = rx.recv().await {
        let line = format!("{}\r\n", delivery.text());
        if let Err(e) = output.write(line.as_bytes()).await {
            tracing::debug!("Terminal gone for session {}: {}", session_id, e);
            return;
        }
    }

    // The hub let go of the sink: the session was detached, possibly
    // because it fell too far behind
    tracing::debug!("Writer finished for session {}", session_id);
    output.hang_up().await;
}
