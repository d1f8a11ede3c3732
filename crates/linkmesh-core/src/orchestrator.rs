//! Orchestrator entry point: node admission and read views
//!
//! Tunnel provisioning, teardown and diagnostics live in their own modules
//! as further `impl Orchestrator` blocks.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use linkmesh_ssh::{RemoteShell, SshTarget, DEFAULT_CONNECT_TIMEOUT};
use tracing::{info, warn};

use crate::allocator::InterfaceAllocator;
use crate::diagnostics::DiagnosticsConfig;
use crate::error::OrchestratorError;
use crate::model::{NewNode, Node, NodeSummary, TunnelDetails};
use crate::registry::Registry;
use crate::synthesizer::CommandSynthesizer;

/// Tunables shared by every orchestration call
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Connect timeout for every remote session
    pub connect_timeout: Duration,
    pub diagnostics: DiagnosticsConfig,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            diagnostics: DiagnosticsConfig::default(),
        }
    }
}

/// Runs paired remote operations and keeps the registry in step
///
/// Holds no locks across remote calls: two calls touching the same node may
/// interleave in any order.
pub struct Orchestrator {
    pub(crate) registry: Arc<dyn Registry>,
    pub(crate) shell: Arc<dyn RemoteShell>,
    pub(crate) synthesizer: CommandSynthesizer,
    pub(crate) config: OrchestratorConfig,
}

impl Orchestrator {
    pub fn new(registry: Arc<dyn Registry>, shell: Arc<dyn RemoteShell>) -> Self {
        Self {
            registry,
            shell,
            synthesizer: CommandSynthesizer::default(),
            config: OrchestratorConfig::default(),
        }
    }

    /// Replace the random interface name / VNI allocator
    pub fn with_allocator(mut self, allocator: Arc<dyn InterfaceAllocator>) -> Self {
        self.synthesizer = CommandSynthesizer::new(allocator);
        self
    }

    pub fn with_config(mut self, config: OrchestratorConfig) -> Self {
        self.config = config;
        self
    }

    pub fn registry(&self) -> &Arc<dyn Registry> {
        &self.registry
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Probe the host and store it only if the probe succeeds
    pub async fn add_node(&self, node: NewNode) -> Result<NodeSummary, OrchestratorError> {
        node.validate()?;

        let target = SshTarget::new(
            node.address.clone(),
            node.port,
            node.username.clone(),
            node.credential.clone(),
        )
        .with_connect_timeout(self.config.connect_timeout);

        if !self.shell.probe(&target).await {
            warn!(address = %target.address(), "Refusing to register unreachable node");
            return Err(OrchestratorError::NodeUnreachable(target.address()));
        }

        let node = self.registry.create_node(node).await?;
        info!(node_id = %node.id, name = %node.name, address = %node.address, "Node admitted");

        Ok(node.summary())
    }

    pub async fn list_nodes(&self) -> Result<Vec<NodeSummary>, OrchestratorError> {
        let nodes = self.registry.list_nodes().await?;
        Ok(nodes.iter().map(Node::summary).collect())
    }

    /// All tunnels with their endpoints, newest first
    pub async fn list_tunnels(&self) -> Result<Vec<TunnelDetails>, OrchestratorError> {
        let nodes: HashMap<String, NodeSummary> = self
            .registry
            .list_nodes()
            .await?
            .iter()
            .map(|node| (node.id.clone(), node.summary()))
            .collect();

        let tunnels = self.registry.list_tunnels().await?;
        Ok(tunnels
            .into_iter()
            .map(|tunnel| TunnelDetails {
                local_node: nodes.get(&tunnel.local_node_id).cloned(),
                remote_node: nodes.get(&tunnel.remote_node_id).cloned(),
                tunnel,
            })
            .collect())
    }

    /// Resolve a node or fail with `NodeNotFound`
    pub(crate) async fn require_node(&self, id: &str) -> Result<Node, OrchestratorError> {
        self.registry
            .find_node(id)
            .await?
            .ok_or_else(|| OrchestratorError::NodeNotFound(id.to_string()))
    }

    pub(crate) fn target_for(&self, node: &Node) -> SshTarget {
        node.ssh_target(self.config.connect_timeout)
    }
}
