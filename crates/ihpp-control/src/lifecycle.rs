//! Entry points the proxy transport calls as instances start and stop

use ihpp_db::entities::proxy_session;
use ihpp_db::{ConfigStore, NewSession};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::error::ControlError;
use crate::registrar::register_configuration;
use crate::registry::{ActiveProxy, ActiveRegistry, ServerHandle};
use crate::settings::ProxyEntry;
use crate::sysconfig::SysConfigHandle;

/// Ties the registrar, the active registry and session capture together
#[derive(Debug, Clone)]
pub struct ProxyLifecycle {
    store: Option<ConfigStore>,
    registry: Arc<ActiveRegistry>,
    sys_config: SysConfigHandle,
}

impl ProxyLifecycle {
    /// `store` is `None` when configuration tracking is disabled
    pub fn new(
        store: Option<ConfigStore>,
        registry: Arc<ActiveRegistry>,
        sys_config: SysConfigHandle,
    ) -> Self {
        Self {
            store,
            registry,
            sys_config,
        }
    }

    pub fn registry(&self) -> &Arc<ActiveRegistry> {
        &self.registry
    }

    /// Record a configuration and add it to the selected set without
    /// marking it active
    pub async fn proxy_configured(&self, entry: &ProxyEntry) -> Result<String, ControlError> {
        let config_id =
            register_configuration(self.store.as_ref(), &self.sys_config, entry).await?;

        if !config_id.is_empty() {
            self.registry.add_selected(&config_id).await;
        }

        Ok(config_id)
    }

    /// A proxy instance started serving `entry`
    ///
    /// Returns the config id, empty when tracking is disabled.
    pub async fn proxy_started(
        &self,
        entry: &ProxyEntry,
        handle: Arc<dyn ServerHandle>,
    ) -> Result<String, ControlError> {
        let config_id = self.proxy_configured(entry).await?;

        if config_id.is_empty() {
            debug!(listen = %entry.listen, "Configuration tracking disabled");
            return Ok(config_id);
        }

        self.activate(&config_id, entry, handle).await
    }

    /// Mark an already registered config active
    ///
    /// The row is re-checked while activation holds off deletes. If it was
    /// deleted since `proxy_configured`, the settings are registered again
    /// and the instance is recorded under the new id, which is returned.
    pub async fn activate(
        &self,
        config_id: &str,
        entry: &ProxyEntry,
        handle: Arc<dyn ServerHandle>,
    ) -> Result<String, ControlError> {
        let Some(store) = self.store.as_ref() else {
            return Ok(String::new());
        };

        let activation = self.registry.begin_activation().await;

        let active_id = if store.find_by_id(config_id).await?.is_some() {
            config_id.to_string()
        } else {
            let fresh = register_configuration(Some(store), &self.sys_config, entry).await?;
            warn!(
                config_id = %config_id,
                new_config_id = %fresh,
                "Config was deleted before activation, registered again"
            );
            fresh
        };

        activation.register(ActiveProxy::new(&active_id, entry, handle));

        if active_id != config_id {
            self.registry.remove_selected(config_id).await;
        }
        self.registry.add_selected(&active_id).await;

        Ok(active_id)
    }

    /// The instance for `config_id` stopped; its registry entry is dropped
    pub async fn proxy_stopped(&self, config_id: &str) -> Option<ActiveProxy> {
        self.registry.deregister(config_id).await
    }

    /// Persist a captured exchange under its configuration
    ///
    /// Returns `None` when tracking is disabled or no config id is known.
    pub async fn record_session(
        &self,
        config_id: &str,
        request_method: &str,
        request_url: &str,
        response_status: Option<u16>,
    ) -> Result<Option<proxy_session::Model>, ControlError> {
        let Some(store) = self.store.as_ref() else {
            return Ok(None);
        };
        if config_id.is_empty() {
            return Ok(None);
        }

        let session = store
            .create_session(NewSession {
                config_id: config_id.to_string(),
                request_method: request_method.to_uppercase(),
                request_url: request_url.to_string(),
                response_status: response_status.map(i32::from),
            })
            .await?;

        Ok(Some(session))
    }
}
