//! Registry of proxy instances live in this process
//!
//! Two collections are kept apart:
//! - the active map, keyed by config id, which mirrors real listening
//!   servers and is the only authority for "this config is active";
//! - the selected set, curated by the API and startup code, which decides
//!   what counts as "configured right now" and what gets exported.
//!
//! Entries are removed when their instance stops (`deregister`) and never
//! outlive the process.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, info, warn};

use crate::error::ControlError;
use crate::settings::ProxyEntry;

/// Liveness probe for a running proxy server
pub trait ServerHandle: Send + Sync + fmt::Debug {
    /// True while the server is still accepting connections
    fn is_serving(&self) -> bool;
}

/// Shared flag a transport flips when its server shuts down
#[derive(Debug, Clone)]
pub struct ServingFlag {
    serving: Arc<AtomicBool>,
}

impl ServingFlag {
    pub fn new() -> Self {
        Self {
            serving: Arc::new(AtomicBool::new(true)),
        }
    }

    pub fn shutdown(&self) {
        self.serving.store(false, Ordering::SeqCst);
    }
}

impl Default for ServingFlag {
    fn default() -> Self {
        Self::new()
    }
}

impl ServerHandle for ServingFlag {
    fn is_serving(&self) -> bool {
        self.serving.load(Ordering::SeqCst)
    }
}

/// A live proxy instance
#[derive(Debug, Clone)]
pub struct ActiveProxy {
    pub config_id: String,
    pub listen_addr: String,
    pub target_url: String,
    pub truncate_log_body: bool,
    pub started_at: DateTime<Utc>,
    pub handle: Arc<dyn ServerHandle>,
}

impl ActiveProxy {
    pub fn new(
        config_id: impl Into<String>,
        entry: &ProxyEntry,
        handle: Arc<dyn ServerHandle>,
    ) -> Self {
        Self {
            config_id: config_id.into(),
            listen_addr: entry.listen.clone(),
            target_url: entry.target.clone(),
            truncate_log_body: entry.truncate_log_body,
            started_at: Utc::now(),
            handle,
        }
    }

    pub fn is_serving(&self) -> bool {
        self.handle.is_serving()
    }

    /// The config-file record for this instance
    pub fn to_entry(&self) -> ProxyEntry {
        ProxyEntry {
            listen: self.listen_addr.clone(),
            target: self.target_url.clone(),
            truncate_log_body: self.truncate_log_body,
        }
    }
}

/// Proof that a config was not active when the guard was taken
///
/// While the guard lives no instance can be registered, so a mutation
/// performed under it cannot race with activation.
pub struct InactiveGuard<'a> {
    config_id: String,
    _active: RwLockReadGuard<'a, HashMap<String, ActiveProxy>>,
}

impl InactiveGuard<'_> {
    pub fn config_id(&self) -> &str {
        &self.config_id
    }
}

/// Exclusive hold on the active map for a pending activation
///
/// Deletes take `lock_inactive` first, so none can be in flight while this
/// guard lives. Callers check the config row still exists, then `register`.
pub struct ActivationGuard<'a> {
    active: RwLockWriteGuard<'a, HashMap<String, ActiveProxy>>,
}

impl ActivationGuard<'_> {
    /// Record a live instance, replacing any previous entry for its id
    pub fn register(mut self, proxy: ActiveProxy) -> Option<ActiveProxy> {
        let config_id = proxy.config_id.clone();
        let replaced = self.active.insert(config_id.clone(), proxy);

        if replaced.is_some() {
            info!(
                config_id = %config_id,
                "Re-registered active proxy (replaced previous instance)"
            );
        } else {
            info!(config_id = %config_id, "Registered active proxy");
        }

        replaced
    }
}

/// Process-wide registry of active and selected configurations
#[derive(Debug, Default)]
pub struct ActiveRegistry {
    active: RwLock<HashMap<String, ActiveProxy>>,
    selected: RwLock<Vec<String>>,
}

impl ActiveRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait out in-flight deletes and block new ones until the guard is
    /// consumed or dropped
    pub async fn begin_activation(&self) -> ActivationGuard<'_> {
        ActivationGuard {
            active: self.active.write().await,
        }
    }

    /// Record a live instance, replacing any previous entry for its id
    pub async fn register_active(&self, proxy: ActiveProxy) -> Option<ActiveProxy> {
        self.begin_activation().await.register(proxy)
    }

    /// Forget an instance after it stopped
    pub async fn deregister(&self, config_id: &str) -> Option<ActiveProxy> {
        let removed = self.active.write().await.remove(config_id);

        if removed.is_some() {
            info!(config_id = %config_id, "Deregistered active proxy");
        } else {
            warn!(config_id = %config_id, "Attempted to deregister unknown proxy");
        }

        removed
    }

    /// True iff an entry exists and its server is still serving
    pub async fn is_active(&self, config_id: &str) -> bool {
        self.active
            .read()
            .await
            .get(config_id)
            .map(ActiveProxy::is_serving)
            .unwrap_or(false)
    }

    pub async fn get_active_info(&self, config_id: &str) -> Option<ActiveProxy> {
        self.active.read().await.get(config_id).cloned()
    }

    /// Snapshot of tracked ids, in no particular order
    pub async fn list_active_ids(&self) -> Vec<String> {
        self.active.read().await.keys().cloned().collect()
    }

    /// Number of entries whose server is still serving
    pub async fn serving_count(&self) -> usize {
        self.active
            .read()
            .await
            .values()
            .filter(|proxy| proxy.is_serving())
            .count()
    }

    /// Hold off activation of `config_id` while the caller mutates it
    ///
    /// Fails with `Conflict` if the config is currently serving. The check
    /// and the returned guard share one lock acquisition.
    pub async fn lock_inactive(
        &self,
        config_id: &str,
    ) -> Result<InactiveGuard<'_>, ControlError> {
        let active = self.active.read().await;

        if active
            .get(config_id)
            .map(ActiveProxy::is_serving)
            .unwrap_or(false)
        {
            debug!(config_id = %config_id, "Config is active");
            return Err(ControlError::Conflict(config_id.to_string()));
        }

        Ok(InactiveGuard {
            config_id: config_id.to_string(),
            _active: active,
        })
    }

    /// Add an id to the selected set (no-op if already present)
    pub async fn add_selected(&self, config_id: &str) {
        let mut selected = self.selected.write().await;
        if !selected.iter().any(|id| id == config_id) {
            selected.push(config_id.to_string());
        }
    }

    pub async fn remove_selected(&self, config_id: &str) -> bool {
        let mut selected = self.selected.write().await;
        let before = selected.len();
        selected.retain(|id| id != config_id);
        selected.len() != before
    }

    pub async fn clear_selected(&self) {
        self.selected.write().await.clear();
    }

    /// Selected ids in insertion order
    pub async fn selected_ids(&self) -> Vec<String> {
        self.selected.read().await.clone()
    }

    /// Records for every selected config that has a serving instance
    pub async fn selected_serving_entries(&self) -> Vec<ProxyEntry> {
        let selected = self.selected.read().await;
        let active = self.active.read().await;

        selected
            .iter()
            .filter_map(|id| active.get(id))
            .filter(|proxy| proxy.is_serving())
            .map(ActiveProxy::to_entry)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn proxy(id: &str, listen: &str, handle: &ServingFlag) -> ActiveProxy {
        ActiveProxy::new(
            id,
            &ProxyEntry::new(listen, format!("http://upstream-{}", id)),
            Arc::new(handle.clone()),
        )
    }

    #[tokio::test]
    async fn test_register_and_query() {
        let registry = ActiveRegistry::new();
        let flag = ServingFlag::new();

        registry.register_active(proxy("cfg1", "127.0.0.1:8001", &flag)).await;

        assert!(registry.is_active("cfg1").await);
        assert!(!registry.is_active("cfg2").await);

        let info = registry.get_active_info("cfg1").await.unwrap();
        assert_eq!(info.listen_addr, "127.0.0.1:8001");
        assert_eq!(info.target_url, "http://upstream-cfg1");
        assert_eq!(registry.list_active_ids().await, vec!["cfg1".to_string()]);
    }

    #[tokio::test]
    async fn test_register_overwrites() {
        let registry = ActiveRegistry::new();
        let flag = ServingFlag::new();

        assert!(registry
            .register_active(proxy("cfg1", ":1", &flag))
            .await
            .is_none());
        let replaced = registry.register_active(proxy("cfg1", ":2", &flag)).await;

        assert_eq!(replaced.unwrap().listen_addr, ":1");
        assert_eq!(
            registry.get_active_info("cfg1").await.unwrap().listen_addr,
            ":2"
        );
    }

    #[tokio::test]
    async fn test_stopped_server_is_not_active() {
        let registry = ActiveRegistry::new();
        let flag = ServingFlag::new();

        registry.register_active(proxy("cfg1", ":1", &flag)).await;
        flag.shutdown();

        assert!(!registry.is_active("cfg1").await);
        assert_eq!(registry.serving_count().await, 0);
        // The entry is still tracked until deregistered
        assert!(registry.get_active_info("cfg1").await.is_some());

        assert!(registry.deregister("cfg1").await.is_some());
        assert!(registry.get_active_info("cfg1").await.is_none());
    }

    #[tokio::test]
    async fn test_lock_inactive_conflicts_when_serving() {
        let registry = ActiveRegistry::new();
        let flag = ServingFlag::new();

        registry.register_active(proxy("cfg1", ":1", &flag)).await;

        let result = registry.lock_inactive("cfg1").await;
        assert!(matches!(result, Err(ControlError::Conflict(ref id)) if id == "cfg1"));

        let guard = registry.lock_inactive("cfg2").await.unwrap();
        assert_eq!(guard.config_id(), "cfg2");
    }

    #[tokio::test]
    async fn test_lock_inactive_blocks_registration() {
        let registry = Arc::new(ActiveRegistry::new());
        let guard = registry.lock_inactive("cfg1").await.unwrap();

        let registering = {
            let registry = registry.clone();
            tokio::spawn(async move {
                let flag = ServingFlag::new();
                registry.register_active(proxy("cfg1", ":1", &flag)).await;
            })
        };

        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        assert!(!registering.is_finished());

        drop(guard);
        registering.await.unwrap();
        assert!(registry.is_active("cfg1").await);
    }

    #[tokio::test]
    async fn test_pending_activation_is_observed_by_deleter() {
        let registry = Arc::new(ActiveRegistry::new());
        let activation = registry.begin_activation().await;

        let deleting = {
            let registry = registry.clone();
            tokio::spawn(async move { registry.lock_inactive("cfg1").await.is_ok() })
        };

        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        assert!(!deleting.is_finished());

        let flag = ServingFlag::new();
        activation.register(proxy("cfg1", ":1", &flag));

        assert!(!deleting.await.unwrap());
    }

    #[tokio::test]
    async fn test_selected_set_is_separate_from_active() {
        let registry = ActiveRegistry::new();
        let flag = ServingFlag::new();

        registry.add_selected("a").await;
        registry.add_selected("b").await;
        registry.add_selected("a").await;
        assert_eq!(
            registry.selected_ids().await,
            vec!["a".to_string(), "b".to_string()]
        );
        assert!(!registry.is_active("a").await);

        registry.register_active(proxy("b", ":2", &flag)).await;
        registry.register_active(proxy("c", ":3", &flag)).await;

        // Only selected and serving configs are exported
        let entries = registry.selected_serving_entries().await;
        assert_eq!(entries, vec![ProxyEntry::new(":2", "http://upstream-b")]);

        assert!(registry.remove_selected("a").await);
        assert!(!registry.remove_selected("a").await);

        registry.clear_selected().await;
        assert!(registry.selected_ids().await.is_empty());
        assert!(registry.is_active("c").await);
    }
}
