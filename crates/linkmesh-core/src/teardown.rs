//! Advisory teardown of tunnels and cascading node removal
//!
//! Remote deletes are best effort: every outcome is logged and dropped, and
//! the registry record goes away regardless. After teardown the registry no
//! longer says anything about what interfaces really exist on the hosts.

use linkmesh_ssh::SshTarget;
use tracing::{debug, info, warn};

use crate::error::{OrchestratorError, RegistryError};
use crate::model::Tunnel;
use crate::orchestrator::Orchestrator;
use crate::synthesizer::{is_managed_interface, teardown_command};

impl Orchestrator {
    /// Remove a tunnel from both hosts (best effort) and from the registry
    pub async fn delete_tunnel(&self, id: &str) -> Result<(), OrchestratorError> {
        let tunnel = self
            .registry
            .find_tunnel(id)
            .await?
            .ok_or_else(|| OrchestratorError::TunnelNotFound(id.to_string()))?;

        self.teardown_remote(&tunnel).await;
        self.forget_tunnel(&tunnel).await?;

        info!(tunnel_id = %tunnel.id, name = %tunnel.name, "Tunnel deleted");
        Ok(())
    }

    /// Tear down every tunnel touching the node, then remove the node
    pub async fn remove_node(&self, id: &str) -> Result<(), OrchestratorError> {
        let node = self.require_node(id).await?;
        let tunnels = self.registry.find_tunnels_by_node(id).await?;

        info!(
            node_id = %node.id,
            name = %node.name,
            tunnels = tunnels.len(),
            "Removing node and its tunnels"
        );

        for tunnel in &tunnels {
            self.teardown_remote(tunnel).await;
            self.forget_tunnel(tunnel).await?;
        }

        match self.registry.delete_node(id).await {
            Ok(()) | Err(RegistryError::NotFound(_)) => {}
            Err(e) => return Err(e.into()),
        }

        info!(node_id = %node.id, "Node removed");
        Ok(())
    }

    /// Delete the record; someone else getting there first is fine
    async fn forget_tunnel(&self, tunnel: &Tunnel) -> Result<(), OrchestratorError> {
        match self.registry.delete_tunnel(&tunnel.id).await {
            Ok(()) => Ok(()),
            Err(RegistryError::NotFound(_)) => {
                debug!(tunnel_id = %tunnel.id, "Tunnel record already gone");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Issue `ip link delete` on both endpoints in parallel, ignoring every
    /// outcome
    async fn teardown_remote(&self, tunnel: &Tunnel) {
        if !is_managed_interface(&tunnel.name) {
            debug!(
                tunnel_id = %tunnel.id,
                name = %tunnel.name,
                "Skipping remote teardown for operator-named tunnel"
            );
            return;
        }

        let command = teardown_command(&tunnel.name);
        let local = self.endpoint_target(&tunnel.local_node_id).await;
        let remote = self.endpoint_target(&tunnel.remote_node_id).await;

        tokio::join!(
            self.delete_interface(tunnel, "local", local, &command),
            self.delete_interface(tunnel, "remote", remote, &command),
        );
    }

    async fn delete_interface(
        &self,
        tunnel: &Tunnel,
        side: &'static str,
        target: Option<SshTarget>,
        command: &str,
    ) {
        let Some(target) = target else {
            return;
        };

        match self.shell.execute(&target, command).await {
            Ok(output) => debug!(
                tunnel_id = %tunnel.id,
                side,
                address = %target.address(),
                output = %output.trim(),
                "Interface delete dispatched"
            ),
            Err(e) => warn!(
                tunnel_id = %tunnel.id,
                side,
                address = %target.address(),
                "Ignoring teardown failure: {}",
                e
            ),
        }
    }

    /// Look up an endpoint for teardown; a missing or unreadable node just
    /// skips that side
    async fn endpoint_target(&self, node_id: &str) -> Option<SshTarget> {
        match self.registry.find_node(node_id).await {
            Ok(Some(node)) => Some(self.target_for(&node)),
            Ok(None) => {
                warn!(node_id = %node_id, "Endpoint node missing, skipping its teardown");
                None
            }
            Err(e) => {
                warn!(node_id = %node_id, "Could not load endpoint node for teardown: {}", e);
                None
            }
        }
    }
}
