//! Trait seam over remote sessions so orchestration can be driven without
//! real hosts

use async_trait::async_trait;

use crate::{SessionError, SshTarget};

/// Something that can run one command on one host, or check that a host is
/// reachable
#[async_trait]
pub trait RemoteShell: Send + Sync {
    /// Run a single command; see [`crate::execute`] for the success contract
    async fn execute(&self, target: &SshTarget, command: &str) -> Result<String, SessionError>;

    /// Connect and authenticate without running anything
    async fn probe(&self, target: &SshTarget) -> bool;
}

/// [`RemoteShell`] backed by real SSH sessions
#[derive(Debug, Clone, Copy, Default)]
pub struct SshShell;

#[async_trait]
impl RemoteShell for SshShell {
    async fn execute(&self, target: &SshTarget, command: &str) -> Result<String, SessionError> {
        crate::execute(target, command).await
    }

    async fn probe(&self, target: &SshTarget) -> bool {
        crate::probe(target).await
    }
}
