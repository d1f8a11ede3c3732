//! Dual-host orchestration for GRE and VXLAN overlay links
//!
//! The [`Orchestrator`] pairs shell commands produced by the
//! [`CommandSynthesizer`] and runs them against both endpoints of a tunnel
//! concurrently through a [`RemoteShell`]. Provisioning is strict (both sides
//! must dispatch before anything is persisted), teardown is advisory (remote
//! failures never keep a record alive).
//!
//! Dispatch success is trusted as tunnel success. Nothing here verifies
//! afterwards that an interface exists or is up.

pub mod allocator;
pub mod diagnostics;
pub mod error;
pub mod model;
pub mod orchestrator;
pub mod provisioning;
pub mod registry;
pub mod synthesizer;
pub mod teardown;

pub use allocator::{InterfaceAllocator, RandomAllocator};
pub use diagnostics::{
    DiagnosticKind, DiagnosticReport, DiagnosticRequest, DiagnosticsConfig, SetupOutcome,
    ThroughputPhases,
};
pub use error::{OrchestratorError, RegistryError};
pub use model::{
    NewNode, NewTunnel, Node, NodeSummary, Tunnel, TunnelDetails, TunnelSpec, TunnelStatus,
    TunnelType,
};
pub use orchestrator::{Orchestrator, OrchestratorConfig};
pub use provisioning::DispatchOutcome;
pub use registry::{InMemoryRegistry, Registry};
pub use synthesizer::{CommandPair, CommandSynthesizer, Endpoint};

pub use linkmesh_ssh::{Credential, RemoteShell, SessionError, SshShell, SshTarget};
