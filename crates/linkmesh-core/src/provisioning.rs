//! Tunnel provisioning: both endpoints concurrently, persist only if both
//! dispatched
//!
//! Trust boundary: a successful dispatch on both sides is taken to mean the
//! tunnel exists. When only one side succeeds its interface is left in place
//! and nothing is recorded; there is no compensating teardown.

use linkmesh_ssh::SessionError;
use tracing::{debug, error, info};

use crate::error::OrchestratorError;
use crate::model::{NewTunnel, Tunnel, TunnelSpec, TunnelStatus};
use crate::orchestrator::Orchestrator;
use crate::synthesizer::Endpoint;

/// Result of dispatching the command pair on both endpoints
#[derive(Debug)]
pub struct DispatchOutcome {
    pub local: Result<String, SessionError>,
    pub remote: Result<String, SessionError>,
}

impl DispatchOutcome {
    pub fn both_succeeded(&self) -> bool {
        self.local.is_ok() && self.remote.is_ok()
    }

    /// Prose description of the failed sides, `None` when both succeeded
    pub fn failure_detail(&self) -> Option<String> {
        let failures: Vec<String> = [("local", &self.local), ("remote", &self.remote)]
            .into_iter()
            .filter_map(|(side, result)| {
                result
                    .as_ref()
                    .err()
                    .map(|e| format!("{} side failed ({})", side, e))
            })
            .collect();

        if failures.is_empty() {
            return None;
        }

        let mut detail = failures.join("; ");
        if self.local.is_ok() {
            detail.push_str("; local side was configured and is now unmanaged");
        } else if self.remote.is_ok() {
            detail.push_str("; remote side was configured and is now unmanaged");
        }
        Some(detail)
    }
}

impl Orchestrator {
    /// Provision a tunnel on both nodes and record it as `active`
    pub async fn create_tunnel(&self, spec: TunnelSpec) -> Result<Tunnel, OrchestratorError> {
        spec.validate()?;

        let local_node = self.require_node(&spec.local_node_id).await?;
        let remote_node = self.require_node(&spec.remote_node_id).await?;

        let pair = self.synthesizer.synthesize(
            spec.tunnel_type,
            Endpoint {
                address: &local_node.address,
                overlay_ip: spec.local_ip,
            },
            Endpoint {
                address: &remote_node.address,
                overlay_ip: spec.remote_ip,
            },
        );

        debug!(
            interface = %pair.interface,
            vni = ?pair.vni,
            local_command = %pair.local,
            remote_command = %pair.remote,
            "Synthesized tunnel commands"
        );

        let local_target = self.target_for(&local_node);
        let remote_target = self.target_for(&remote_node);

        let (local, remote) = tokio::join!(
            self.shell.execute(&local_target, &pair.local),
            self.shell.execute(&remote_target, &pair.remote),
        );
        let outcome = DispatchOutcome { local, remote };

        if let Some(detail) = outcome.failure_detail() {
            error!(
                tunnel_type = %spec.tunnel_type,
                interface = %pair.interface,
                local_node_id = %local_node.id,
                remote_node_id = %remote_node.id,
                "Tunnel provisioning failed: {}",
                detail
            );
            return Err(OrchestratorError::TunnelProvisioningFailed {
                tunnel_type: spec.tunnel_type,
                detail,
            });
        }

        let tunnel = self
            .registry
            .create_tunnel(NewTunnel {
                name: spec.record_name(&pair.interface),
                tunnel_type: spec.tunnel_type,
                local_node_id: local_node.id.clone(),
                remote_node_id: remote_node.id.clone(),
                local_ip: spec.local_ip.to_string(),
                remote_ip: spec.remote_ip.to_string(),
                status: TunnelStatus::Active,
            })
            .await?;

        info!(
            tunnel_id = %tunnel.id,
            name = %tunnel.name,
            tunnel_type = %tunnel.tunnel_type,
            local_node_id = %tunnel.local_node_id,
            remote_node_id = %tunnel.remote_node_id,
            "Tunnel provisioned"
        );

        Ok(tunnel)
    }
}
