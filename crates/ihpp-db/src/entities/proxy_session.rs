//! ProxySession entity for one captured proxy exchange

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "proxy_sessions")]
pub struct Model {
    /// Assigned by the database, increasing in capture order
    #[sea_orm(primary_key)]
    pub id: i32,

    /// Owning configuration
    pub config_id: String,

    pub request_method: String,

    #[sea_orm(column_type = "Text")]
    pub request_url: String,

    /// Response status code, if the upstream answered
    pub response_status: Option<i32>,

    pub created_at: ChronoDateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::proxy_config::Entity",
        from = "Column::ConfigId",
        to = "super::proxy_config::Column::Id",
        on_update = "Cascade",
        on_delete = "Cascade"
    )]
    ProxyConfig,
}

impl Related<super::proxy_config::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ProxyConfig.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
