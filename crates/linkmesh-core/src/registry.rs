//! Registry contract for node and tunnel records
//!
//! The orchestrator only ever performs single-record creates and deletes;
//! no transaction spans a remote call and a registry write.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::error::RegistryError;
use crate::model::{NewNode, NewTunnel, Node, Tunnel};

/// Persistence for nodes and tunnels
///
/// Implementations must reject a second node with the same address and port
/// with [`RegistryError::Conflict`], and deleting a node must also delete
/// every tunnel referencing it.
#[async_trait]
pub trait Registry: Send + Sync {
    async fn find_node(&self, id: &str) -> Result<Option<Node>, RegistryError>;

    /// All nodes, newest first
    async fn list_nodes(&self) -> Result<Vec<Node>, RegistryError>;

    async fn create_node(&self, node: NewNode) -> Result<Node, RegistryError>;

    async fn delete_node(&self, id: &str) -> Result<(), RegistryError>;

    async fn find_tunnel(&self, id: &str) -> Result<Option<Tunnel>, RegistryError>;

    /// Tunnels with `node_id` on either side
    async fn find_tunnels_by_node(&self, node_id: &str) -> Result<Vec<Tunnel>, RegistryError>;

    async fn create_tunnel(&self, tunnel: NewTunnel) -> Result<Tunnel, RegistryError>;

    async fn delete_tunnel(&self, id: &str) -> Result<(), RegistryError>;

    /// All tunnels, newest first
    async fn list_tunnels(&self) -> Result<Vec<Tunnel>, RegistryError>;
}

#[derive(Default)]
struct Tables {
    /// Insertion counter, breaks ties between equal timestamps
    seq: u64,
    nodes: HashMap<String, (u64, Node)>,
    tunnels: HashMap<String, (u64, Tunnel)>,
}

impl Tables {
    fn next_seq(&mut self) -> u64 {
        self.seq += 1;
        self.seq
    }
}

/// Process-local registry, used by tests and embedders without a database
#[derive(Default)]
pub struct InMemoryRegistry {
    tables: RwLock<Tables>,
}

impl InMemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }
}

fn newest_first<T: Clone>(
    rows: impl Iterator<Item = (u64, T)>,
    created_at: impl Fn(&T) -> chrono::DateTime<Utc>,
) -> Vec<T> {
    let mut rows: Vec<(u64, T)> = rows.collect();
    rows.sort_by(|(seq_a, a), (seq_b, b)| {
        created_at(b)
            .cmp(&created_at(a))
            .then_with(|| seq_b.cmp(seq_a))
    });
    rows.into_iter().map(|(_, row)| row).collect()
}

#[async_trait]
impl Registry for InMemoryRegistry {
    async fn find_node(&self, id: &str) -> Result<Option<Node>, RegistryError> {
        let tables = self.tables.read().await;
        Ok(tables.nodes.get(id).map(|(_, node)| node.clone()))
    }

    async fn list_nodes(&self) -> Result<Vec<Node>, RegistryError> {
        let tables = self.tables.read().await;
        Ok(newest_first(
            tables.nodes.values().cloned(),
            |node: &Node| node.created_at,
        ))
    }

    async fn create_node(&self, node: NewNode) -> Result<Node, RegistryError> {
        let mut tables = self.tables.write().await;

        let taken = tables
            .nodes
            .values()
            .any(|(_, n)| n.address == node.address && n.port == node.port);
        if taken {
            return Err(RegistryError::Conflict(format!(
                "a node with address {}:{} already exists",
                node.address, node.port
            )));
        }

        let node = Node {
            id: uuid::Uuid::new_v4().to_string(),
            name: node.name,
            address: node.address,
            port: node.port,
            username: node.username,
            credential: node.credential,
            created_at: Utc::now(),
        };

        let seq = tables.next_seq();
        tables.nodes.insert(node.id.clone(), (seq, node.clone()));
        info!(node_id = %node.id, address = %node.address, "Registered node");

        Ok(node)
    }

    async fn delete_node(&self, id: &str) -> Result<(), RegistryError> {
        let mut tables = self.tables.write().await;

        if tables.nodes.remove(id).is_none() {
            return Err(RegistryError::NotFound(format!("node {}", id)));
        }

        let before = tables.tunnels.len();
        tables.tunnels.retain(|_, (_, tunnel)| !tunnel.references(id));
        let cascaded = before - tables.tunnels.len();

        info!(node_id = %id, cascaded_tunnels = cascaded, "Removed node");
        Ok(())
    }

    async fn find_tunnel(&self, id: &str) -> Result<Option<Tunnel>, RegistryError> {
        let tables = self.tables.read().await;
        Ok(tables.tunnels.get(id).map(|(_, tunnel)| tunnel.clone()))
    }

    async fn find_tunnels_by_node(&self, node_id: &str) -> Result<Vec<Tunnel>, RegistryError> {
        let tables = self.tables.read().await;
        Ok(newest_first(
            tables
                .tunnels
                .values()
                .filter(|(_, tunnel)| tunnel.references(node_id))
                .cloned(),
            |tunnel: &Tunnel| tunnel.created_at,
        ))
    }

    async fn create_tunnel(&self, tunnel: NewTunnel) -> Result<Tunnel, RegistryError> {
        let mut tables = self.tables.write().await;

        for node_id in [&tunnel.local_node_id, &tunnel.remote_node_id] {
            if !tables.nodes.contains_key(node_id.as_str()) {
                return Err(RegistryError::NotFound(format!("node {}", node_id)));
            }
        }

        let tunnel = Tunnel {
            id: uuid::Uuid::new_v4().to_string(),
            name: tunnel.name,
            tunnel_type: tunnel.tunnel_type,
            local_node_id: tunnel.local_node_id,
            remote_node_id: tunnel.remote_node_id,
            local_ip: tunnel.local_ip,
            remote_ip: tunnel.remote_ip,
            status: tunnel.status,
            created_at: Utc::now(),
        };

        let seq = tables.next_seq();
        tables.tunnels.insert(tunnel.id.clone(), (seq, tunnel.clone()));
        debug!(tunnel_id = %tunnel.id, name = %tunnel.name, "Stored tunnel");

        Ok(tunnel)
    }

    async fn delete_tunnel(&self, id: &str) -> Result<(), RegistryError> {
        let mut tables = self.tables.write().await;
        match tables.tunnels.remove(id) {
            Some(_) => {
                debug!(tunnel_id = %id, "Removed tunnel record");
                Ok(())
            }
            None => Err(RegistryError::NotFound(format!("tunnel {}", id))),
        }
    }

    async fn list_tunnels(&self) -> Result<Vec<Tunnel>, RegistryError> {
        let tables = self.tables.read().await;
        Ok(newest_first(
            tables.tunnels.values().cloned(),
            |tunnel: &Tunnel| tunnel.created_at,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{TunnelStatus, TunnelType};
    use linkmesh_ssh::Credential;

    fn new_node(address: &str, port: u16) -> NewNode {
        NewNode {
            name: format!("node-{}", address),
            address: address.to_string(),
            port,
            username: "root".to_string(),
            credential: Credential::password("secret"),
        }
    }

    fn new_tunnel(local: &str, remote: &str, name: &str) -> NewTunnel {
        NewTunnel {
            name: name.to_string(),
            tunnel_type: TunnelType::Gre,
            local_node_id: local.to_string(),
            remote_node_id: remote.to_string(),
            local_ip: "10.0.0.1".to_string(),
            remote_ip: "10.0.0.2".to_string(),
            status: TunnelStatus::Active,
        }
    }

    #[tokio::test]
    async fn test_address_and_port_are_unique() {
        let registry = InMemoryRegistry::new();

        registry.create_node(new_node("10.1.1.1", 22)).await.unwrap();
        registry.create_node(new_node("10.1.1.1", 2222)).await.unwrap();

        match registry.create_node(new_node("10.1.1.1", 22)).await {
            Err(RegistryError::Conflict(msg)) => assert!(msg.contains("10.1.1.1:22")),
            other => panic!("Expected conflict, got {:?}", other),
        }
        assert_eq!(registry.list_nodes().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_delete_node_cascades_to_tunnels() {
        let registry = InMemoryRegistry::new();
        let a = registry.create_node(new_node("10.1.1.1", 22)).await.unwrap();
        let b = registry.create_node(new_node("10.1.1.2", 22)).await.unwrap();
        let c = registry.create_node(new_node("10.1.1.3", 22)).await.unwrap();

        registry.create_tunnel(new_tunnel(&a.id, &b.id, "gret1")).await.unwrap();
        registry.create_tunnel(new_tunnel(&c.id, &a.id, "gret2")).await.unwrap();
        let survivor = registry
            .create_tunnel(new_tunnel(&b.id, &c.id, "gret3"))
            .await
            .unwrap();

        assert_eq!(registry.find_tunnels_by_node(&a.id).await.unwrap().len(), 2);

        registry.delete_node(&a.id).await.unwrap();

        assert!(registry.find_tunnels_by_node(&a.id).await.unwrap().is_empty());
        let remaining = registry.list_tunnels().await.unwrap();
        assert_eq!(remaining, vec![survivor]);
    }

    #[tokio::test]
    async fn test_list_tunnels_newest_first() {
        let registry = InMemoryRegistry::new();
        let a = registry.create_node(new_node("10.1.1.1", 22)).await.unwrap();
        let b = registry.create_node(new_node("10.1.1.2", 22)).await.unwrap();

        for name in ["gret1", "gret2", "gret3"] {
            registry.create_tunnel(new_tunnel(&a.id, &b.id, name)).await.unwrap();
        }

        let names: Vec<String> = registry
            .list_tunnels()
            .await
            .unwrap()
            .into_iter()
            .map(|t| t.name)
            .collect();
        assert_eq!(names, vec!["gret3", "gret2", "gret1"]);
    }

    #[tokio::test]
    async fn test_missing_records() {
        let registry = InMemoryRegistry::new();

        assert!(registry.find_node("nope").await.unwrap().is_none());
        assert!(matches!(
            registry.delete_node("nope").await,
            Err(RegistryError::NotFound(_))
        ));
        assert!(matches!(
            registry.delete_tunnel("nope").await,
            Err(RegistryError::NotFound(_))
        ));
        assert!(matches!(
            registry.create_tunnel(new_tunnel("x", "y", "gret1")).await,
            Err(RegistryError::NotFound(_))
        ));
    }
}
