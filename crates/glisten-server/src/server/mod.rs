//! SSH server implementation

mod handler;
mod listener;
mod session;
mod terminal;

pub use handler::{ServerConfig, SessionHandler};
pub use listener::{load_or_generate_host_key, SshServer};
pub use session::{forward_deliveries, SessionAction, ShellSession, TerminalOutput};
pub use terminal::{LineEditor, LineInput, DEFAULT_MAX_LINE_LENGTH};
