//! Writes the live proxy set back into the config file
//!
//! Only the `proxies` key is replaced; every other key is parsed into a
//! schemaless document and written back unchanged.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::error::ExportError;
use crate::registry::ActiveRegistry;
use crate::settings::ProxyEntry;
use crate::sysconfig::{ConfigFormat, SysConfigHandle};

const PROXIES_KEY: &str = "proxies";

/// Result of a successful export
#[derive(Debug, Clone)]
pub struct ExportOutcome {
    pub config_file: PathBuf,
    pub proxies: Vec<ProxyEntry>,
}

/// A config file parsed without a fixed schema
#[derive(Debug, Clone, PartialEq)]
enum ConfigDocument {
    Toml(toml::Table),
    Yaml(serde_yaml::Mapping),
}

impl ConfigDocument {
    fn parse(format: ConfigFormat, content: &str) -> Result<Self, String> {
        match format {
            ConfigFormat::Toml => content
                .parse::<toml::Table>()
                .map(ConfigDocument::Toml)
                .map_err(|e| e.to_string()),
            ConfigFormat::Yaml => {
                let value: serde_yaml::Value =
                    serde_yaml::from_str(content).map_err(|e| e.to_string())?;
                match value {
                    serde_yaml::Value::Mapping(mapping) => Ok(ConfigDocument::Yaml(mapping)),
                    // An empty file
                    serde_yaml::Value::Null => Ok(ConfigDocument::Yaml(Default::default())),
                    _ => Err("top level of the document is not a mapping".to_string()),
                }
            }
        }
    }

    fn set_proxies(&mut self, proxies: &[ProxyEntry]) -> Result<(), String> {
        match self {
            ConfigDocument::Toml(table) => {
                let value = toml::Value::try_from(proxies).map_err(|e| e.to_string())?;
                table.insert(PROXIES_KEY.to_string(), value);
            }
            ConfigDocument::Yaml(mapping) => {
                let value = serde_yaml::to_value(proxies).map_err(|e| e.to_string())?;
                mapping.insert(serde_yaml::Value::String(PROXIES_KEY.to_string()), value);
            }
        }
        Ok(())
    }

    fn render(&self) -> Result<String, String> {
        match self {
            ConfigDocument::Toml(table) => toml::to_string(table).map_err(|e| e.to_string()),
            ConfigDocument::Yaml(mapping) => {
                serde_yaml::to_string(mapping).map_err(|e| e.to_string())
            }
        }
    }
}

/// Exports selected, serving proxies to the current config file
///
/// Exports are serialized so that two runs cannot interleave their read
/// and write phases.
#[derive(Debug)]
pub struct ConfigExporter {
    registry: Arc<ActiveRegistry>,
    sys_config: SysConfigHandle,
    lock: Mutex<()>,
}

impl ConfigExporter {
    pub fn new(registry: Arc<ActiveRegistry>, sys_config: SysConfigHandle) -> Self {
        Self {
            registry,
            sys_config,
            lock: Mutex::new(()),
        }
    }

    pub async fn export_active_proxies(&self) -> Result<ExportOutcome, ExportError> {
        let _export = self.lock.lock().await;

        let path = self
            .sys_config
            .config_file()
            .ok_or(ExportError::NoConfigFile)?;

        let content = tokio::fs::read_to_string(&path)
            .await
            .map_err(|source| ExportError::Read {
                path: path.clone(),
                source,
            })?;

        let mut document = ConfigDocument::parse(ConfigFormat::from_path(&path), &content)
            .map_err(|message| ExportError::Parse {
                path: path.clone(),
                message,
            })?;

        let proxies = self.registry.selected_serving_entries().await;
        debug!(count = proxies.len(), "Collected serving proxies for export");

        let rendered = document
            .set_proxies(&proxies)
            .and_then(|_| document.render())
            .map_err(|message| ExportError::Serialize {
                path: path.clone(),
                message,
            })?;

        write_config(&path, &rendered).await?;

        self.sys_config.set_proxies(proxies.clone());

        info!(
            config_file = %path.display(),
            proxies = proxies.len(),
            "Exported active proxies to config file"
        );

        Ok(ExportOutcome {
            config_file: path,
            proxies,
        })
    }
}

// Direct overwrite; the whole document is rendered before the file is touched.
async fn write_config(path: &Path, content: &str) -> Result<(), ExportError> {
    tokio::fs::write(path, content)
        .await
        .map_err(|source| ExportError::Write {
            path: path.to_path_buf(),
            source,
        })
}
