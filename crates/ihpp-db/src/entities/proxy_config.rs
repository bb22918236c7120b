//! ProxyConfig entity: an immutable snapshot of the settings a proxy
//! instance was started with

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "proxy_configs")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    /// Config file the settings were loaded from, or `cli-flags`
    pub source_path: String,

    /// Working directory of the process at registration time
    pub working_dir: String,

    /// JSON-encoded settings snapshot
    #[sea_orm(column_type = "Text")]
    pub config_json: String,

    /// SHA-256 of (source_path, working_dir, config_json), unique
    #[sea_orm(unique)]
    pub fingerprint: String,

    pub created_at: ChronoDateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Sessions captured while this config was serving
    #[sea_orm(has_many = "super::proxy_session::Entity")]
    ProxySession,
}

impl Related<super::proxy_session::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ProxySession.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
