//! One-shot SSH command execution against tunnel endpoints
//!
//! Every call opens its own authenticated connection, runs at most one
//! command and closes the connection again. Nothing is pooled or reused.
//!
//! Success of [`execute`] means the transport worked and the command was
//! dispatched. The command's exit status is *not* part of the contract: a
//! command that exits non-zero still yields `Ok` with whatever it printed.

mod session;
mod shell;
mod target;

pub use session::{execute, probe};
pub use shell::{RemoteShell, SshShell};
pub use target::{Credential, SshTarget, DEFAULT_CONNECT_TIMEOUT};

use thiserror::Error;

/// Errors raised by a remote session
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// Resolve, TCP connect, handshake, authentication or connect timeout
    #[error("SSH connection error: {0}")]
    Connection(String),

    /// Channel could not be opened, the command could not be dispatched, or
    /// its output stream broke
    #[error("SSH execution error: {0}")]
    Execution(String),
}

impl SessionError {
    pub fn is_connection(&self) -> bool {
        matches!(self, SessionError::Connection(_))
    }
}
