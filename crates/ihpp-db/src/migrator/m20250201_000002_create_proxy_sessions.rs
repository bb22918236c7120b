//! Create the proxy_sessions table, cascading from proxy_configs

use sea_orm_migration::{prelude::*, schema::*};

use super::m20250201_000001_create_proxy_configs::ProxyConfig;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(ProxySession::Table)
                    .if_not_exists()
                    .col(pk_auto(ProxySession::Id))
                    .col(string_len(ProxySession::ConfigId, 36).not_null())
                    .col(string_len(ProxySession::RequestMethod, 16).not_null())
                    .col(text(ProxySession::RequestUrl).not_null())
                    .col(integer(ProxySession::ResponseStatus).null())
                    .col(
                        timestamp_with_time_zone(ProxySession::CreatedAt)
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_proxy_sessions_config_id")
                            .from(ProxySession::Table, ProxySession::ConfigId)
                            .to(ProxyConfig::Table, ProxyConfig::Id)
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
                    .name("idx_proxy_sessions_config_id")
                    .table(ProxySession::Table)
                    .col(ProxySession::ConfigId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(ProxySession::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum ProxySession {
    #[sea_orm(iden = "proxy_sessions")]
    Table,
    Id,
    ConfigId,
    RequestMethod,
    RequestUrl,
    ResponseStatus,
    CreatedAt,
}
