use chrono::{DateTime, Utc};
use linkmesh_core::{
    Credential, DiagnosticReport, NewNode, NodeSummary, SetupOutcome, Tunnel, TunnelDetails,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Overlay protocol
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum TunnelType {
    /// GRE point-to-point tunnel, /30 overlay
    Gre,
    /// VXLAN on UDP 4789, /24 overlay
    Vxlan,
}

impl From<linkmesh_core::TunnelType> for TunnelType {
    fn from(value: linkmesh_core::TunnelType) -> Self {
        match value {
            linkmesh_core::TunnelType::Gre => TunnelType::Gre,
            linkmesh_core::TunnelType::Vxlan => TunnelType::Vxlan,
        }
    }
}

/// Managed node, without its credential
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Node {
    /// Node ID
    pub id: String,
    /// Display name
    pub name: String,
    /// IP address or host name
    pub address: String,
    /// SSH port
    pub port: u16,
    /// SSH user
    pub username: String,
    /// When the node was admitted
    pub created_at: DateTime<Utc>,
}

impl From<NodeSummary> for Node {
    fn from(node: NodeSummary) -> Self {
        Self {
            id: node.id,
            name: node.name,
            address: node.address,
            port: node.port,
            username: node.username,
            created_at: node.created_at,
        }
    }
}

/// List of nodes
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct NodeList {
    pub nodes: Vec<Node>,
    pub total: usize,
}

fn default_ssh_port() -> u16 {
    22
}

/// Request to admit a node
///
/// Exactly one of `password` and `private_key` must be set.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CreateNodeRequest {
    pub name: String,
    /// IP address or host name
    #[serde(alias = "ip")]
    pub address: String,
    /// SSH port (default 22)
    #[serde(default = "default_ssh_port")]
    pub port: u16,
    pub username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    /// PEM-encoded private key
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub private_key: Option<String>,
    /// Passphrase for `private_key`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub passphrase: Option<String>,
}

impl CreateNodeRequest {
    /// Validate the credential fields and build the node to admit
    pub fn into_new_node(self) -> Result<NewNode, String> {
        let credential = match (self.password, self.private_key) {
            (Some(password), None) if !password.is_empty() => Credential::password(password),
            (None, Some(key)) if !key.is_empty() => Credential::private_key(key, self.passphrase),
            (Some(_), Some(_)) => {
                return Err("provide either password or private_key, not both".to_string())
            }
            _ => return Err("a password or private_key is required".to_string()),
        };

        Ok(NewNode {
            name: self.name,
            address: self.address,
            port: self.port,
            username: self.username,
            credential,
        })
    }
}

/// Persisted tunnel with its endpoints
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TunnelInfo {
    /// Tunnel ID
    pub id: String,
    /// Operator name, or the generated interface name
    pub name: String,
    #[serde(rename = "type")]
    pub tunnel_type: TunnelType,
    pub local_node_id: String,
    pub remote_node_id: String,
    /// Overlay address on the local node
    pub local_ip: String,
    /// Overlay address on the remote node
    pub remote_ip: String,
    /// Always `active` for stored tunnels
    pub status: String,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub local_node: Option<Node>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remote_node: Option<Node>,
}

impl From<Tunnel> for TunnelInfo {
    fn from(tunnel: Tunnel) -> Self {
        Self {
            id: tunnel.id,
            name: tunnel.name,
            tunnel_type: tunnel.tunnel_type.into(),
            local_node_id: tunnel.local_node_id,
            remote_node_id: tunnel.remote_node_id,
            local_ip: tunnel.local_ip,
            remote_ip: tunnel.remote_ip,
            status: tunnel.status.as_str().to_string(),
            created_at: tunnel.created_at,
            local_node: None,
            remote_node: None,
        }
    }
}

impl From<TunnelDetails> for TunnelInfo {
    fn from(details: TunnelDetails) -> Self {
        Self {
            local_node: details.local_node.map(Node::from),
            remote_node: details.remote_node.map(Node::from),
            ..TunnelInfo::from(details.tunnel)
        }
    }
}

/// List of tunnels, newest first
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TunnelList {
    pub tunnels: Vec<TunnelInfo>,
    pub total: usize,
}

/// Request to provision a tunnel between two nodes
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CreateTunnelRequest {
    /// Optional name; defaults to the generated interface name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// `gre` or `vxlan`
    #[serde(rename = "type")]
    pub tunnel_type: String,
    pub local_node_id: String,
    pub remote_node_id: String,
    /// Overlay address for the local node
    pub local_ip: String,
    /// Overlay address for the remote node
    pub remote_ip: String,
}

/// Request to run a diagnostic
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RunTestRequest {
    pub source_node_id: String,
    /// Required for `throughput`; `ping` falls back to a public address
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_node_id: Option<String>,
    /// `ping` or `throughput`
    pub test_type: String,
}

/// Outcome of the listener start on the target
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ListenerSetup {
    pub started: bool,
    /// Listener output, or the failure reason
    pub detail: String,
}

/// Diagnostic result
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TestResult {
    pub test_type: String,
    /// Combined stdout and stderr of the measurement
    pub output: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub setup: Option<ListenerSetup>,
}

impl From<DiagnosticReport> for TestResult {
    fn from(report: DiagnosticReport) -> Self {
        Self {
            test_type: report.kind.to_string(),
            output: report.output,
            setup: report.setup.map(|setup| match setup {
                SetupOutcome::Started { output } => ListenerSetup {
                    started: true,
                    detail: output,
                },
                SetupOutcome::Failed { reason } => ListenerSetup {
                    started: false,
                    detail: reason,
                },
            }),
        }
    }
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    /// Service status
    pub status: String,
    /// Service version
    pub version: String,
}

/// Error response
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    /// Error message
    pub error: String,
    /// Error code
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}
