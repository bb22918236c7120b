//! Configuration store access layer
//!
//! Config rows are content-addressed: the identity of a row is the SHA-256
//! fingerprint of its source path, working directory and settings JSON, so
//! repeated registrations of the same settings resolve to the same row.

use chrono::Utc;
use sea_orm::sea_query::{LikeExpr, OnConflict};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, NotSet, QueryFilter,
    QueryOrder, QuerySelect, Set, TransactionTrait,
};
use sha2::{Digest, Sha256};
use tracing::{debug, info};

use crate::entities::{proxy_config, proxy_session};
use crate::error::StoreError;

/// Minimum length of a history search term before it is applied
pub const MIN_SEARCH_LEN: usize = 3;

/// `LIKE` pattern matching `term` literally anywhere in a column
fn contains_pattern(term: &str) -> LikeExpr {
    let mut pattern = String::with_capacity(term.len() + 2);
    pattern.push('%');
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    LikeExpr::new(pattern).escape('\\')
}

/// Filters for listing configuration history
#[derive(Debug, Clone, Default)]
pub struct HistoryQuery {
    /// Substring matched against the settings JSON (e.g. a target URL)
    pub search: Option<String>,
    /// Maximum number of rows returned
    pub limit: Option<u64>,
}

/// A session captured by the proxy transport
#[derive(Debug, Clone)]
pub struct NewSession {
    pub config_id: String,
    pub request_method: String,
    pub request_url: String,
    pub response_status: Option<i32>,
}

/// Access to config snapshots and their sessions
#[derive(Debug, Clone)]
pub struct ConfigStore {
    db: DatabaseConnection,
}

impl ConfigStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    pub fn connection(&self) -> &DatabaseConnection {
        &self.db
    }

    /// Identity of a config row
    ///
    /// Each part is length-prefixed so that shifting bytes between parts
    /// cannot produce the same digest.
    pub fn fingerprint(source_path: &str, working_dir: &str, config_json: &str) -> String {
        let mut hasher = Sha256::new();
        for part in [source_path, working_dir, config_json] {
            hasher.update((part.len() as u64).to_be_bytes());
            hasher.update(part.as_bytes());
        }
        format!("{:x}", hasher.finalize())
    }

    /// Return the row for these settings, creating it on first sight
    pub async fn get_or_create(
        &self,
        source_path: &str,
        working_dir: &str,
        config_json: &str,
    ) -> Result<proxy_config::Model, StoreError> {
        let fingerprint = Self::fingerprint(source_path, working_dir, config_json);

        if let Some(existing) = self.find_by_fingerprint(&fingerprint).await? {
            debug!(config_id = %existing.id, "Reusing existing config row");
            return Ok(existing);
        }

        let row = proxy_config::ActiveModel {
            id: Set(uuid::Uuid::new_v4().to_string()),
            source_path: Set(source_path.to_string()),
            working_dir: Set(working_dir.to_string()),
            config_json: Set(config_json.to_string()),
            fingerprint: Set(fingerprint.clone()),
            created_at: Set(Utc::now()),
        };

        // A concurrent registration may have inserted the same fingerprint
        // between the lookup and here; the unique index makes that a no-op.
        let inserted = proxy_config::Entity::insert(row)
            .on_conflict(
                OnConflict::column(proxy_config::Column::Fingerprint)
                    .do_nothing()
                    .to_owned(),
            )
            .exec_without_returning(&self.db)
            .await?;

        let row = self
            .find_by_fingerprint(&fingerprint)
            .await?
            .ok_or_else(|| {
                StoreError::Persistence(DbErr::RecordNotFound(format!(
                    "config row with fingerprint {} vanished after insert",
                    fingerprint
                )))
            })?;

        if inserted > 0 {
            info!(
                config_id = %row.id,
                source_path = %row.source_path,
                "Created config row"
            );
        }

        Ok(row)
    }

    async fn find_by_fingerprint(
        &self,
        fingerprint: &str,
    ) -> Result<Option<proxy_config::Model>, StoreError> {
        Ok(proxy_config::Entity::find()
            .filter(proxy_config::Column::Fingerprint.eq(fingerprint))
            .one(&self.db)
            .await?)
    }

    /// All config rows ever created, newest first
    pub async fn list_history(
        &self,
        query: &HistoryQuery,
    ) -> Result<Vec<proxy_config::Model>, StoreError> {
        let mut select = proxy_config::Entity::find();

        if let Some(term) = query.search.as_deref().map(str::trim) {
            if term.chars().count() >= MIN_SEARCH_LEN {
                select =
                    select.filter(proxy_config::Column::ConfigJson.like(contains_pattern(term)));
            }
        }

        select = select
            .order_by_desc(proxy_config::Column::CreatedAt)
            .order_by_desc(proxy_config::Column::Id);

        if let Some(limit) = query.limit {
            select = select.limit(limit);
        }

        Ok(select.all(&self.db).await?)
    }

    pub async fn find_by_id(&self, id: &str) -> Result<Option<proxy_config::Model>, StoreError> {
        Ok(proxy_config::Entity::find_by_id(id.to_string())
            .one(&self.db)
            .await?)
    }

    /// Single row lookup, `NotFound` when absent
    pub async fn get_by_id(&self, id: &str) -> Result<proxy_config::Model, StoreError> {
        self.find_by_id(id)
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("config '{}'", id)))
    }

    /// Sessions owned by a config, in capture order
    pub async fn list_sessions(
        &self,
        config_id: &str,
    ) -> Result<Vec<proxy_session::Model>, StoreError> {
        Ok(proxy_session::Entity::find()
            .filter(proxy_session::Column::ConfigId.eq(config_id))
            .order_by_asc(proxy_session::Column::Id)
            .all(&self.db)
            .await?)
    }

    /// Persist a captured session; fails if the owning config does not exist
    pub async fn create_session(
        &self,
        session: NewSession,
    ) -> Result<proxy_session::Model, StoreError> {
        let row = proxy_session::ActiveModel {
            id: NotSet,
            config_id: Set(session.config_id),
            request_method: Set(session.request_method),
            request_url: Set(session.request_url),
            response_status: Set(session.response_status),
            created_at: Set(Utc::now()),
        };

        Ok(row.insert(&self.db).await?)
    }

    /// Delete a config and all of its sessions in one transaction
    ///
    /// Deleting an unknown id is a no-op. Returns the number of config rows
    /// removed.
    pub async fn delete_by_id(&self, id: &str) -> Result<u64, StoreError> {
        let txn = self.db.begin().await?;

        let sessions = proxy_session::Entity::delete_many()
            .filter(proxy_session::Column::ConfigId.eq(id))
            .exec(&txn)
            .await?;

        let configs = proxy_config::Entity::delete_by_id(id.to_string())
            .exec(&txn)
            .await?;

        txn.commit().await?;

        info!(
            config_id = %id,
            configs = configs.rows_affected,
            sessions = sessions.rows_affected,
            "Deleted config"
        );

        Ok(configs.rows_affected)
    }
}
