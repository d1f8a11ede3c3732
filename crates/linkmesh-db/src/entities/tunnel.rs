//! Tunnel entity: an overlay link between two nodes

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, EnumIter, DeriveActiveEnum)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
pub enum TunnelKind {
    #[sea_orm(string_value = "gre")]
    Gre,

    #[sea_orm(string_value = "vxlan")]
    Vxlan,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, EnumIter, DeriveActiveEnum)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
pub enum TunnelState {
    #[sea_orm(string_value = "active")]
    Active,
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "tunnels")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    /// Operator-supplied name or generated interface name
    pub name: String,

    pub tunnel_type: TunnelKind,

    pub local_node_id: String,

    pub remote_node_id: String,

    /// Overlay address on the local node
    pub local_ip: String,

    /// Overlay address on the remote node
    pub remote_ip: String,

    pub status: TunnelState,

    pub created_at: ChronoDateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::node::Entity",
        from = "Column::LocalNodeId",
        to = "super::node::Column::Id",
        on_update = "Cascade",
        on_delete = "Cascade"
    )]
    LocalNode,

    #[sea_orm(
        belongs_to = "super::node::Entity",
        from = "Column::RemoteNodeId",
        to = "super::node::Column::Id",
        on_update = "Cascade",
        on_delete = "Cascade"
    )]
    RemoteNode,
}

impl ActiveModelBehavior for ActiveModel {}
