//! [`Registry`] implementation over SeaORM

use async_trait::async_trait;
use chrono::Utc;
use linkmesh_core::{
    Credential, NewNode, NewTunnel, Node, Registry, RegistryError, Tunnel, TunnelStatus,
    TunnelType,
};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, DbErr, EntityTrait,
    QueryFilter, QueryOrder, Set, SqlErr, TransactionTrait,
};
use tracing::{debug, info};

use crate::entities::node::{self, AuthMethod};
use crate::entities::tunnel::{self, TunnelKind, TunnelState};

/// Registry backed by any database SeaORM can reach
#[derive(Clone)]
pub struct SeaOrmRegistry {
    db: DatabaseConnection,
}

impl SeaOrmRegistry {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    pub fn connection(&self) -> &DatabaseConnection {
        &self.db
    }
}

fn backend(err: DbErr) -> RegistryError {
    RegistryError::Backend(err.to_string())
}

impl From<TunnelType> for TunnelKind {
    fn from(value: TunnelType) -> Self {
        match value {
            TunnelType::Gre => TunnelKind::Gre,
            TunnelType::Vxlan => TunnelKind::Vxlan,
        }
    }
}

impl From<TunnelKind> for TunnelType {
    fn from(value: TunnelKind) -> Self {
        match value {
            TunnelKind::Gre => TunnelType::Gre,
            TunnelKind::Vxlan => TunnelType::Vxlan,
        }
    }
}

impl From<TunnelStatus> for TunnelState {
    fn from(value: TunnelStatus) -> Self {
        match value {
            TunnelStatus::Active => TunnelState::Active,
        }
    }
}

impl From<TunnelState> for TunnelStatus {
    fn from(value: TunnelState) -> Self {
        match value {
            TunnelState::Active => TunnelStatus::Active,
        }
    }
}

fn node_from_model(model: node::Model) -> Result<Node, RegistryError> {
    let port = u16::try_from(model.port).map_err(|_| {
        RegistryError::Backend(format!("node {} has invalid port {}", model.id, model.port))
    })?;

    let credential = match model.auth_method {
        AuthMethod::Password => Credential::Password(model.secret),
        AuthMethod::PrivateKey => Credential::PrivateKey {
            pem: model.secret,
            passphrase: model.passphrase,
        },
    };

    Ok(Node {
        id: model.id,
        name: model.name,
        address: model.address,
        port,
        username: model.username,
        credential,
        created_at: model.created_at,
    })
}

fn tunnel_from_model(model: tunnel::Model) -> Tunnel {
    Tunnel {
        id: model.id,
        name: model.name,
        tunnel_type: model.tunnel_type.into(),
        local_node_id: model.local_node_id,
        remote_node_id: model.remote_node_id,
        local_ip: model.local_ip,
        remote_ip: model.remote_ip,
        status: model.status.into(),
        created_at: model.created_at,
    }
}

fn touches_node(node_id: &str) -> Condition {
    Condition::any()
        .add(tunnel::Column::LocalNodeId.eq(node_id))
        .add(tunnel::Column::RemoteNodeId.eq(node_id))
}

#[async_trait]
impl Registry for SeaOrmRegistry {
    async fn find_node(&self, id: &str) -> Result<Option<Node>, RegistryError> {
        node::Entity::find_by_id(id.to_string())
            .one(&self.db)
            .await
            .map_err(backend)?
            .map(node_from_model)
            .transpose()
    }

    async fn list_nodes(&self) -> Result<Vec<Node>, RegistryError> {
        node::Entity::find()
            .order_by_desc(node::Column::CreatedAt)
            .all(&self.db)
            .await
            .map_err(backend)?
            .into_iter()
            .map(node_from_model)
            .collect()
    }

    async fn create_node(&self, new: NewNode) -> Result<Node, RegistryError> {
        let conflict = || {
            RegistryError::Conflict(format!(
                "a node with address {}:{} already exists",
                new.address, new.port
            ))
        };

        let existing = node::Entity::find()
            .filter(node::Column::Address.eq(new.address.as_str()))
            .filter(node::Column::Port.eq(i32::from(new.port)))
            .one(&self.db)
            .await
            .map_err(backend)?;
        if existing.is_some() {
            return Err(conflict());
        }

        let (auth_method, secret, passphrase) = match &new.credential {
            Credential::Password(password) => (AuthMethod::Password, password.clone(), None),
            Credential::PrivateKey { pem, passphrase } => {
                (AuthMethod::PrivateKey, pem.clone(), passphrase.clone())
            }
        };

        let model = node::ActiveModel {
            id: Set(uuid::Uuid::new_v4().to_string()),
            name: Set(new.name.clone()),
            address: Set(new.address.clone()),
            port: Set(i32::from(new.port)),
            username: Set(new.username.clone()),
            auth_method: Set(auth_method),
            secret: Set(secret),
            passphrase: Set(passphrase),
            created_at: Set(Utc::now()),
        };

        // The unique index still guards against a concurrent insert
        let model = model.insert(&self.db).await.map_err(|e| match e.sql_err() {
            Some(SqlErr::UniqueConstraintViolation(_)) => conflict(),
            _ => backend(e),
        })?;

        info!(node_id = %model.id, address = %model.address, "Registered node");
        node_from_model(model)
    }

    async fn delete_node(&self, id: &str) -> Result<(), RegistryError> {
        let txn = self.db.begin().await.map_err(backend)?;

        // Foreign keys cascade as well; deleting explicitly keeps SQLite
        // connections without `foreign_keys` enabled consistent
        let cascaded = tunnel::Entity::delete_many()
            .filter(touches_node(id))
            .exec(&txn)
            .await
            .map_err(backend)?
            .rows_affected;

        let deleted = node::Entity::delete_by_id(id.to_string())
            .exec(&txn)
            .await
            .map_err(backend)?
            .rows_affected;

        if deleted == 0 {
            txn.rollback().await.map_err(backend)?;
            return Err(RegistryError::NotFound(format!("node {}", id)));
        }

        txn.commit().await.map_err(backend)?;
        info!(node_id = %id, cascaded_tunnels = cascaded, "Removed node");
        Ok(())
    }

    async fn find_tunnel(&self, id: &str) -> Result<Option<Tunnel>, RegistryError> {
        Ok(tunnel::Entity::find_by_id(id.to_string())
            .one(&self.db)
            .await
            .map_err(backend)?
            .map(tunnel_from_model))
    }

    async fn find_tunnels_by_node(&self, node_id: &str) -> Result<Vec<Tunnel>, RegistryError> {
        Ok(tunnel::Entity::find()
            .filter(touches_node(node_id))
            .order_by_desc(tunnel::Column::CreatedAt)
            .all(&self.db)
            .await
            .map_err(backend)?
            .into_iter()
            .map(tunnel_from_model)
            .collect())
    }

    async fn create_tunnel(&self, new: NewTunnel) -> Result<Tunnel, RegistryError> {
        for node_id in [&new.local_node_id, &new.remote_node_id] {
            let exists = node::Entity::find_by_id(node_id.clone())
                .one(&self.db)
                .await
                .map_err(backend)?
                .is_some();
            if !exists {
                return Err(RegistryError::NotFound(format!("node {}", node_id)));
            }
        }

        let model = tunnel::ActiveModel {
            id: Set(uuid::Uuid::new_v4().to_string()),
            name: Set(new.name),
            tunnel_type: Set(new.tunnel_type.into()),
            local_node_id: Set(new.local_node_id),
            remote_node_id: Set(new.remote_node_id),
            local_ip: Set(new.local_ip),
            remote_ip: Set(new.remote_ip),
            status: Set(new.status.into()),
            created_at: Set(Utc::now()),
        }
        .insert(&self.db)
        .await
        .map_err(backend)?;

        debug!(tunnel_id = %model.id, name = %model.name, "Stored tunnel");
        Ok(tunnel_from_model(model))
    }

    async fn delete_tunnel(&self, id: &str) -> Result<(), RegistryError> {
        let result = tunnel::Entity::delete_by_id(id.to_string())
            .exec(&self.db)
            .await
            .map_err(backend)?;

        if result.rows_affected == 0 {
            return Err(RegistryError::NotFound(format!("tunnel {}", id)));
        }

        debug!(tunnel_id = %id, "Removed tunnel record");
        Ok(())
    }

    async fn list_tunnels(&self) -> Result<Vec<Tunnel>, RegistryError> {
        Ok(tunnel::Entity::find()
            .order_by_desc(tunnel::Column::CreatedAt)
            .all(&self.db)
            .await
            .map_err(backend)?
            .into_iter()
            .map(tunnel_from_model)
            .collect())
    }
}
