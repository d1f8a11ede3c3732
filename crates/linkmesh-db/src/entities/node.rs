//! Node entity: a managed SSH endpoint and its credential

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// How the stored secret is used to authenticate
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, EnumIter, DeriveActiveEnum)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
pub enum AuthMethod {
    #[sea_orm(string_value = "password")]
    Password,

    /// `secret` holds a PEM private key
    #[sea_orm(string_value = "private_key")]
    PrivateKey,
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "nodes")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    pub name: String,

    /// IP literal or host name; unique together with `port`
    pub address: String,

    pub port: i32,

    pub username: String,

    pub auth_method: AuthMethod,

    /// Password or private key, depending on `auth_method`
    #[sea_orm(column_type = "Text")]
    #[serde(skip_serializing)]
    pub secret: String,

    /// Private key passphrase
    #[sea_orm(column_type = "Text", nullable)]
    #[serde(skip_serializing)]
    pub passphrase: Option<String>,

    pub created_at: ChronoDateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
