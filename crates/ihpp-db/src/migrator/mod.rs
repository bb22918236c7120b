//! Database migrations

use sea_orm_migration::prelude::*;

mod m20250201_000001_create_proxy_configs;
mod m20250201_000002_create_proxy_sessions;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20250201_000001_create_proxy_configs::Migration),
            Box::new(m20250201_000002_create_proxy_sessions::Migration),
        ]
    }
}
