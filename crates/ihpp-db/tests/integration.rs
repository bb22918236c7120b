//! Integration tests for ihpp-db
//!
//! Tests store operations with real SQLite in-memory database

use ihpp_db::{
    connect, entities::proxy_config, entities::proxy_session, migrate, ConfigStore, HistoryQuery,
    NewSession, StoreError,
};
use sea_orm::{ColumnTrait, ConnectionTrait, EntityTrait, PaginatorTrait, QueryFilter};

/// Helper to create a migrated store
async fn setup_store() -> ConfigStore {
    let db = connect("sqlite::memory:")
        .await
        .expect("Failed to connect to in-memory database");

    migrate(&db).await.expect("Failed to run migrations");

    ConfigStore::new(db)
}

fn session(config_id: &str, url: &str) -> NewSession {
    NewSession {
        config_id: config_id.to_string(),
        request_method: "GET".to_string(),
        request_url: url.to_string(),
        response_status: Some(200),
    }
}

#[tokio::test]
async fn test_database_connection() {
    let db = connect("sqlite::memory:").await.expect("Failed to connect");

    let backend = db.get_database_backend();
    assert!(matches!(backend, sea_orm::DatabaseBackend::Sqlite));
}

#[tokio::test]
async fn test_migrations_run_successfully() {
    let db = connect("sqlite::memory:").await.expect("Failed to connect");

    let result = migrate(&db).await;
    assert!(result.is_ok());
}

#[tokio::test]
async fn test_get_or_create_is_idempotent() {
    let store = setup_store().await;

    let first = store
        .get_or_create("f1", "/a", r#"{"p":1}"#)
        .await
        .expect("Failed to create config");
    let second = store
        .get_or_create("f1", "/a", r#"{"p":1}"#)
        .await
        .expect("Failed to get config");

    assert_eq!(first.id, second.id);

    let count = proxy_config::Entity::find()
        .count(store.connection())
        .await
        .unwrap();
    assert_eq!(count, 1);
}

#[tokio::test]
async fn test_get_or_create_distinguishes_inputs() {
    let store = setup_store().await;

    let a = store.get_or_create("f1", "/a", r#"{"p":1}"#).await.unwrap();
    let b = store.get_or_create("f1", "/b", r#"{"p":1}"#).await.unwrap();
    let c = store.get_or_create("f2", "/a", r#"{"p":1}"#).await.unwrap();

    assert_ne!(a.id, b.id);
    assert_ne!(a.id, c.id);
    assert_eq!(a.source_path, "f1");
    assert_eq!(b.working_dir, "/b");
    assert_eq!(c.config_json, r#"{"p":1}"#);
}

#[tokio::test]
async fn test_history_and_sessions_scenario() {
    let store = setup_store().await;

    let a = store.get_or_create("f1", "/a", r#"{"p":1}"#).await.unwrap();
    store.get_or_create("f2", "/b", r#"{"p":2}"#).await.unwrap();

    let history = store.list_history(&HistoryQuery::default()).await.unwrap();
    assert_eq!(history.len(), 2);

    let sessions = store.list_sessions(&a.id).await.unwrap();
    assert!(sessions.is_empty());

    let created = store
        .create_session(session(&a.id, "/sessions-test"))
        .await
        .unwrap();

    let sessions = store.list_sessions(&a.id).await.unwrap();
    assert_eq!(sessions.len(), 1);
    assert_eq!(sessions[0].id, created.id);
    assert_eq!(sessions[0].request_url, "/sessions-test");
}

#[tokio::test]
async fn test_history_search_and_limit() {
    let store = setup_store().await;

    store
        .get_or_create("f1", "/a", r#"{"target":"http://alpha.local"}"#)
        .await
        .unwrap();
    store
        .get_or_create("f1", "/a", r#"{"target":"http://beta.local"}"#)
        .await
        .unwrap();

    let found = store
        .list_history(&HistoryQuery {
            search: Some("alpha".to_string()),
            limit: None,
        })
        .await
        .unwrap();
    assert_eq!(found.len(), 1);
    assert!(found[0].config_json.contains("alpha"));

    // Terms shorter than three characters are ignored
    let short = store
        .list_history(&HistoryQuery {
            search: Some("al".to_string()),
            limit: None,
        })
        .await
        .unwrap();
    assert_eq!(short.len(), 2);

    let limited = store
        .list_history(&HistoryQuery {
            search: None,
            limit: Some(1),
        })
        .await
        .unwrap();
    assert_eq!(limited.len(), 1);
}

#[tokio::test]
async fn test_get_by_id_not_found() {
    let store = setup_store().await;

    let result = store.get_by_id("missing").await;
    assert!(matches!(result, Err(StoreError::NotFound(_))));
}

#[tokio::test]
async fn test_delete_cascades_sessions_only_for_target() {
    let store = setup_store().await;

    let doomed = store.get_or_create("src-del", "cwd-del", r#"{"p":100}"#).await.unwrap();
    let kept = store.get_or_create("src-keep", "cwd-keep", r#"{"p":101}"#).await.unwrap();

    store.create_session(session(&doomed.id, "/to-be-deleted-1")).await.unwrap();
    store.create_session(session(&doomed.id, "/to-be-deleted-2")).await.unwrap();
    store.create_session(session(&kept.id, "/kept")).await.unwrap();

    let deleted = store.delete_by_id(&doomed.id).await.unwrap();
    assert_eq!(deleted, 1);

    assert!(store.find_by_id(&doomed.id).await.unwrap().is_none());

    let orphaned = proxy_session::Entity::find()
        .filter(proxy_session::Column::ConfigId.eq(doomed.id.clone()))
        .count(store.connection())
        .await
        .unwrap();
    assert_eq!(orphaned, 0);

    assert!(store.find_by_id(&kept.id).await.unwrap().is_some());
    assert_eq!(store.list_sessions(&kept.id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_delete_unknown_id_is_noop() {
    let store = setup_store().await;

    assert_eq!(store.delete_by_id("non-existent-id").await.unwrap(), 0);
    assert_eq!(store.delete_by_id("non-existent-id").await.unwrap(), 0);
}

#[tokio::test]
async fn test_session_requires_existing_config() {
    let store = setup_store().await;

    let result = store.create_session(session("no-such-config", "/x")).await;
    assert!(matches!(result, Err(StoreError::Persistence(_))));
}

#[tokio::test]
async fn test_history_search_is_literal() {
    let store = setup_store().await;

    store
        .get_or_create("f1", "/a", r#"{"target":"http://a_b.local"}"#)
        .await
        .unwrap();
    store
        .get_or_create("f1", "/a", r#"{"target":"http://axb.local"}"#)
        .await
        .unwrap();
    store
        .get_or_create("f1", "/a", r#"{"target":"http://100pct.local"}"#)
        .await
        .unwrap();

    let underscore = store
        .list_history(&HistoryQuery {
            search: Some("a_b".to_string()),
            limit: None,
        })
        .await
        .unwrap();
    assert_eq!(underscore.len(), 1);
    assert!(underscore[0].config_json.contains("a_b"));

    let percent = store
        .list_history(&HistoryQuery {
            search: Some("1%p".to_string()),
            limit: None,
        })
        .await
        .unwrap();
    assert!(percent.is_empty());
}

#[tokio::test]
async fn test_sessions_keep_capture_order() {
    let store = setup_store().await;
    let config = store.get_or_create("f1", "/a", r#"{"p":1}"#).await.unwrap();

    let urls: Vec<String> = (0..20).map(|i| format!("/req/{}", i)).collect();
    for url in &urls {
        store.create_session(session(&config.id, url)).await.unwrap();
    }

    let listed: Vec<String> = store
        .list_sessions(&config.id)
        .await
        .unwrap()
        .into_iter()
        .map(|s| s.request_url)
        .collect();
    assert_eq!(listed, urls);
}

#[tokio::test]
async fn test_concurrent_get_or_create_converges() {
    let dir = tempfile::tempdir().unwrap();
    let url = format!("sqlite://{}?mode=rwc", dir.path().join("ihpp.db").display());

    let db = connect(&url).await.expect("Failed to open database file");
    migrate(&db).await.expect("Failed to run migrations");
    let store = ConfigStore::new(db);

    let mut handles = Vec::new();
    for _ in 0..16 {
        let store = store.clone();
        handles.push(tokio::spawn(async move {
            store
                .get_or_create("ihpp.toml", "/srv", r#"{"listen":":8080"}"#)
                .await
        }));
    }

    let mut ids = Vec::new();
    for handle in handles {
        ids.push(handle.await.unwrap().unwrap().id);
    }

    assert!(ids.iter().all(|id| *id == ids[0]));

    let rows = proxy_config::Entity::find()
        .count(store.connection())
        .await
        .unwrap();
    assert_eq!(rows, 1);
}
