//! Node and tunnel records plus the operator-facing inputs that create them

use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use linkmesh_ssh::{Credential, SshTarget};
use serde::{Deserialize, Serialize};

use crate::error::OrchestratorError;

/// Overlay protocol of a tunnel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TunnelType {
    Gre,
    Vxlan,
}

impl TunnelType {
    pub const ALL: [TunnelType; 2] = [TunnelType::Gre, TunnelType::Vxlan];

    pub fn as_str(&self) -> &'static str {
        match self {
            TunnelType::Gre => "gre",
            TunnelType::Vxlan => "vxlan",
        }
    }
}

impl fmt::Display for TunnelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TunnelType {
    type Err = OrchestratorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "gre" => Ok(TunnelType::Gre),
            "vxlan" => Ok(TunnelType::Vxlan),
            other => Err(OrchestratorError::UnsupportedTunnelType(other.to_string())),
        }
    }
}

/// Lifecycle state of a persisted tunnel
///
/// Only `Active` is reachable: a tunnel is written after both endpoints
/// dispatched and removed outright on teardown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TunnelStatus {
    Active,
}

impl TunnelStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TunnelStatus::Active => "active",
        }
    }
}

/// A managed remote endpoint, including its secret
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub id: String,
    pub name: String,
    pub address: String,
    pub port: u16,
    pub username: String,
    pub credential: Credential,
    pub created_at: DateTime<Utc>,
}

impl Node {
    /// Connection parameters for one session against this node
    pub fn ssh_target(&self, connect_timeout: Duration) -> SshTarget {
        SshTarget::new(
            self.address.clone(),
            self.port,
            self.username.clone(),
            self.credential.clone(),
        )
        .with_connect_timeout(connect_timeout)
    }

    pub fn summary(&self) -> NodeSummary {
        NodeSummary {
            id: self.id.clone(),
            name: self.name.clone(),
            address: self.address.clone(),
            port: self.port,
            username: self.username.clone(),
            created_at: self.created_at,
        }
    }
}

/// Node as shown to operators; never carries the credential
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeSummary {
    pub id: String,
    pub name: String,
    pub address: String,
    pub port: u16,
    pub username: String,
    pub created_at: DateTime<Utc>,
}

/// Fields for a node about to be admitted
#[derive(Debug, Clone)]
pub struct NewNode {
    pub name: String,
    pub address: String,
    pub port: u16,
    pub username: String,
    pub credential: Credential,
}

impl NewNode {
    pub fn validate(&self) -> Result<(), OrchestratorError> {
        if self.name.trim().is_empty() {
            return Err(OrchestratorError::InvalidNode("name is required".into()));
        }
        if self.username.trim().is_empty() {
            return Err(OrchestratorError::InvalidNode("username is required".into()));
        }
        if self.port == 0 {
            return Err(OrchestratorError::InvalidNode("port must be non-zero".into()));
        }
        if !is_valid_address(&self.address) {
            return Err(OrchestratorError::InvalidNode(format!(
                "'{}' is not an IP address or host name",
                self.address
            )));
        }
        Ok(())
    }
}

/// Node addresses end up inside shell commands, so only IP literals and
/// plain DNS names are accepted
fn is_valid_address(address: &str) -> bool {
    if address.parse::<IpAddr>().is_ok() {
        return true;
    }
    !address.is_empty()
        && address.len() <= 253
        && !address.starts_with(['-', '.'])
        && address
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '.')
}

/// A persisted overlay link between two nodes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tunnel {
    pub id: String,
    /// Operator-supplied name, or the generated interface name
    pub name: String,
    #[serde(rename = "type")]
    pub tunnel_type: TunnelType,
    pub local_node_id: String,
    pub remote_node_id: String,
    pub local_ip: String,
    pub remote_ip: String,
    pub status: TunnelStatus,
    pub created_at: DateTime<Utc>,
}

impl Tunnel {
    pub fn references(&self, node_id: &str) -> bool {
        self.local_node_id == node_id || self.remote_node_id == node_id
    }
}

/// Fields for a tunnel record about to be written
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTunnel {
    pub name: String,
    pub tunnel_type: TunnelType,
    pub local_node_id: String,
    pub remote_node_id: String,
    pub local_ip: String,
    pub remote_ip: String,
    pub status: TunnelStatus,
}

/// Tunnel with both endpoints resolved for display
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TunnelDetails {
    #[serde(flatten)]
    pub tunnel: Tunnel,
    pub local_node: Option<NodeSummary>,
    pub remote_node: Option<NodeSummary>,
}

/// Operator request to provision a tunnel
#[derive(Debug, Clone)]
pub struct TunnelSpec {
    pub name: Option<String>,
    pub tunnel_type: TunnelType,
    pub local_node_id: String,
    pub remote_node_id: String,
    /// Overlay address assigned on the local node's interface
    pub local_ip: IpAddr,
    /// Overlay address assigned on the remote node's interface
    pub remote_ip: IpAddr,
}

impl TunnelSpec {
    pub fn validate(&self) -> Result<(), OrchestratorError> {
        if self.local_node_id.is_empty() || self.remote_node_id.is_empty() {
            return Err(OrchestratorError::InvalidTunnelSpec(
                "both local and remote node ids are required".into(),
            ));
        }
        if self.local_node_id == self.remote_node_id {
            return Err(OrchestratorError::InvalidTunnelSpec(
                "local and remote node must differ".into(),
            ));
        }
        Ok(())
    }

    /// Name to persist: the operator's, or the interface name when none was
    /// given
    pub fn record_name(&self, interface: &str) -> String {
        match self.name.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => interface.to_string(),
        }
    }
}
