//! Configuration store for the inspecting proxy
//!
//! Persists configuration snapshots and the proxy sessions captured under
//! them. Backed by SeaORM; SQLite for local use, Postgres also works.

pub mod entities;
pub mod error;
pub mod migrator;
pub mod store;

pub use error::StoreError;
pub use store::{ConfigStore, HistoryQuery, NewSession};

use sea_orm::{ConnectOptions, Database, DatabaseConnection, DbErr};
use sea_orm_migration::MigratorTrait;
use tracing::{debug, info};

/// Connect to the database at `url`
///
/// In-memory SQLite databases are per-connection, so the pool is pinned to
/// a single connection for them.
pub async fn connect(url: &str) -> Result<DatabaseConnection, DbErr> {
    let mut options = ConnectOptions::new(url.to_string());
    options.sqlx_logging(false);

    if url.contains(":memory:") {
        options.min_connections(1).max_connections(1);
    }

    debug!("Connecting to database: {}", url);
    Database::connect(options).await
}

/// Apply all pending migrations
pub async fn migrate(db: &DatabaseConnection) -> Result<(), DbErr> {
    migrator::Migrator::up(db, None).await?;
    info!("Database migrations applied");
    Ok(())
}
