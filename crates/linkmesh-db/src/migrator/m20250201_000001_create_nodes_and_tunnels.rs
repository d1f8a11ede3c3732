//! Initial schema: nodes and the tunnels between them

use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Nodes::Table)
                    .if_not_exists()
                    .col(string(Nodes::Id).not_null().primary_key())
                    .col(string(Nodes::Name).not_null())
                    .col(string(Nodes::Address).not_null())
                    .col(integer(Nodes::Port).not_null().default(22))
                    .col(string(Nodes::Username).not_null())
                    .col(string_len(Nodes::AuthMethod, 16).not_null())
                    .col(text(Nodes::Secret).not_null())
                    .col(text_null(Nodes::Passphrase))
                    .col(
                        timestamp_with_time_zone(Nodes::CreatedAt)
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        // One node per SSH endpoint
        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_nodes_address_port")
                    .table(Nodes::Table)
                    .col(Nodes::Address)
                    .col(Nodes::Port)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Tunnels::Table)
                    .if_not_exists()
                    .col(string(Tunnels::Id).not_null().primary_key())
                    .col(string(Tunnels::Name).not_null())
                    .col(string_len(Tunnels::TunnelType, 16).not_null())
                    .col(string(Tunnels::LocalNodeId).not_null())
                    .col(string(Tunnels::RemoteNodeId).not_null())
                    .col(string(Tunnels::LocalIp).not_null())
                    .col(string(Tunnels::RemoteIp).not_null())
                    .col(
                        string_len(Tunnels::Status, 16)
                            .not_null()
                            .default("active"),
                    )
                    .col(
                        timestamp_with_time_zone(Tunnels::CreatedAt)
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_tunnels_local_node_id")
                            .from(Tunnels::Table, Tunnels::LocalNodeId)
                            .to(Nodes::Table, Nodes::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_tunnels_remote_node_id")
                            .from(Tunnels::Table, Tunnels::RemoteNodeId)
                            .to(Nodes::Table, Nodes::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_tunnels_local_node_id")
                    .table(Tunnels::Table)
                    .col(Tunnels::LocalNodeId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_tunnels_remote_node_id")
                    .table(Tunnels::Table)
                    .col(Tunnels::RemoteNodeId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Tunnels::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Nodes::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Nodes {
    Table,
    Id,
    Name,
    Address,
    Port,
    Username,
    AuthMethod,
    Secret,
    Passphrase,
    CreatedAt,
}

#[derive(DeriveIden)]
enum Tunnels {
    Table,
    Id,
    Name,
    TunnelType,
    LocalNodeId,
    RemoteNodeId,
    LocalIp,
    RemoteIp,
    Status,
    CreatedAt,
}
