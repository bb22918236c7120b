//! Create the proxy_configs table

use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(ProxyConfig::Table)
                    .if_not_exists()
                    .col(string_len(ProxyConfig::Id, 36).not_null().primary_key())
                    .col(string(ProxyConfig::SourcePath).not_null())
                    .col(string(ProxyConfig::WorkingDir).not_null())
                    .col(text(ProxyConfig::ConfigJson).not_null())
                    .col(
                        string_len(ProxyConfig::Fingerprint, 64)
                            .not_null()
                            .unique_key(),
                    )
                    .col(
                        timestamp_with_time_zone(ProxyConfig::CreatedAt)
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_proxy_configs_created_at")
                    .table(ProxyConfig::Table)
                    .col(ProxyConfig::CreatedAt)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(ProxyConfig::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub(super) enum ProxyConfig {
    #[sea_orm(iden = "proxy_configs")]
    Table,
    Id,
    SourcePath,
    WorkingDir,
    ConfigJson,
    Fingerprint,
    CreatedAt,
}
