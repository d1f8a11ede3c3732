//! Error taxonomy for registry access and orchestration

use thiserror::Error;

use crate::diagnostics::DiagnosticKind;
use crate::model::TunnelType;

/// Errors surfaced by a [`crate::Registry`] implementation
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// A uniqueness constraint was violated (node address + port)
    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Record not found: {0}")]
    NotFound(String),

    /// The backing store failed
    #[error("Registry backend error: {0}")]
    Backend(String),
}

/// Terminal error of one orchestration call
///
/// Partial outcomes (one endpoint succeeded, the other did not) only show up
/// in the message text.
#[derive(Error, Debug)]
pub enum OrchestratorError {
    #[error("Node not found: {0}")]
    NodeNotFound(String),

    #[error("Tunnel not found: {0}")]
    TunnelNotFound(String),

    #[error("Unsupported tunnel type: {0}")]
    UnsupportedTunnelType(String),

    #[error("Unsupported diagnostic: {0}")]
    UnsupportedDiagnostic(String),

    #[error("Invalid tunnel configuration: {0}")]
    InvalidTunnelSpec(String),

    #[error("Invalid node: {0}")]
    InvalidNode(String),

    /// Admission probe failed; the node was not stored
    #[error("SSH connection to {0} failed. Check credentials, address and port.")]
    NodeUnreachable(String),

    #[error("Failed to configure {tunnel_type} tunnel on destination nodes: {detail}")]
    TunnelProvisioningFailed {
        tunnel_type: TunnelType,
        detail: String,
    },

    #[error("Diagnostic '{0}' requires a target node")]
    DiagnosticTargetRequired(DiagnosticKind),

    #[error("Diagnostic command failed: {0}")]
    DiagnosticExecutionFailed(String),

    #[error(transparent)]
    Registry(#[from] RegistryError),
}

impl OrchestratorError {
    /// Stable machine-readable code
    pub fn code(&self) -> &'static str {
        match self {
            OrchestratorError::NodeNotFound(_) => "NODE_NOT_FOUND",
            OrchestratorError::TunnelNotFound(_) => "TUNNEL_NOT_FOUND",
            OrchestratorError::UnsupportedTunnelType(_) => "UNSUPPORTED_TUNNEL_TYPE",
            OrchestratorError::UnsupportedDiagnostic(_) => "UNSUPPORTED_DIAGNOSTIC",
            OrchestratorError::InvalidTunnelSpec(_) => "INVALID_TUNNEL_SPEC",
            OrchestratorError::InvalidNode(_) => "INVALID_NODE",
            OrchestratorError::NodeUnreachable(_) => "NODE_UNREACHABLE",
            OrchestratorError::TunnelProvisioningFailed { .. } => "TUNNEL_PROVISIONING_FAILED",
            OrchestratorError::DiagnosticTargetRequired(_) => "DIAGNOSTIC_TARGET_REQUIRED",
            OrchestratorError::DiagnosticExecutionFailed(_) => "DIAGNOSTIC_EXECUTION_FAILED",
            OrchestratorError::Registry(RegistryError::Conflict(_)) => "CONFLICT",
            OrchestratorError::Registry(RegistryError::NotFound(_)) => "NOT_FOUND",
            OrchestratorError::Registry(RegistryError::Backend(_)) => "REGISTRY_ERROR",
        }
    }
}
