//! System configuration: the typed view of the config file plus the
//! in-process mirror that readers share

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use crate::settings::ProxyEntry;

/// On-disk format of a config file, chosen by extension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Toml,
    Yaml,
}

impl ConfigFormat {
    /// `.yaml`/`.yml` are YAML, everything else is TOML
    pub fn from_path(path: &Path) -> Self {
        match path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_ascii_lowercase())
            .as_deref()
        {
            Some("yaml") | Some("yml") => ConfigFormat::Yaml,
            _ => ConfigFormat::Toml,
        }
    }
}

/// Typed view of the keys this process understands
///
/// Unknown keys in the file are ignored here; the exporter preserves them
/// when it rewrites the file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SysConfig {
    /// File the configuration was loaded from
    #[serde(default, skip_deserializing)]
    pub config_file: Option<PathBuf>,

    #[serde(default)]
    pub proxies: Vec<ProxyEntry>,

    /// Bind address of the REST API
    #[serde(default)]
    pub api_addr: Option<String>,

    /// Database URL for the configuration store
    #[serde(default)]
    pub database_url: Option<String>,
}

impl SysConfig {
    /// Load config from a specific file path
    pub fn load(path: &Path) -> Result<Self, String> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config file {}: {}", path.display(), e))?;

        let mut config = Self::parse(ConfigFormat::from_path(path), &content)
            .map_err(|e| format!("Failed to parse config file {}: {}", path.display(), e))?;
        config.config_file = Some(path.to_path_buf());
        Ok(config)
    }

    pub fn parse(format: ConfigFormat, content: &str) -> Result<Self, String> {
        match format {
            ConfigFormat::Toml => toml::from_str(content).map_err(|e| e.to_string()),
            ConfigFormat::Yaml => {
                if content.trim().is_empty() {
                    return Ok(Self::default());
                }
                serde_yaml::from_str(content).map_err(|e| e.to_string())
            }
        }
    }
}

/// Shared, lock-guarded mirror of the current system configuration
#[derive(Debug, Clone, Default)]
pub struct SysConfigHandle {
    inner: Arc<RwLock<SysConfig>>,
}

impl SysConfigHandle {
    pub fn new(config: SysConfig) -> Self {
        Self {
            inner: Arc::new(RwLock::new(config)),
        }
    }

    pub fn get(&self) -> SysConfig {
        self.inner
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn set(&self, config: SysConfig) {
        *self
            .inner
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = config;
    }

    pub fn config_file(&self) -> Option<PathBuf> {
        self.inner
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .config_file
            .clone()
    }

    pub fn set_proxies(&self, proxies: Vec<ProxyEntry>) {
        self.inner
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .proxies = proxies;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_from_extension() {
        assert_eq!(ConfigFormat::from_path(Path::new("a.yaml")), ConfigFormat::Yaml);
        assert_eq!(ConfigFormat::from_path(Path::new("a.YML")), ConfigFormat::Yaml);
        assert_eq!(ConfigFormat::from_path(Path::new("a.toml")), ConfigFormat::Toml);
        assert_eq!(ConfigFormat::from_path(Path::new("config")), ConfigFormat::Toml);
    }

    #[test]
    fn test_parse_toml_ignores_unknown_keys() {
        let toml = r#"
api_addr = "127.0.0.1:20000"
log_level = "debug"

[[proxies]]
listen = "127.0.0.1:20003"
target = "http://localhost:3000"
truncate_log_body = true

[ui]
theme = "dark"
"#;
        let config = SysConfig::parse(ConfigFormat::Toml, toml).unwrap();
        assert_eq!(config.api_addr.as_deref(), Some("127.0.0.1:20000"));
        assert_eq!(config.proxies.len(), 1);
        assert!(config.proxies[0].truncate_log_body);
        assert!(config.config_file.is_none());
    }

    #[test]
    fn test_parse_yaml() {
        let yaml = r#"
database_url: "sqlite://ihpp.db?mode=rwc"
proxies:
  - listen: "127.0.0.1:20003"
    target: "http://localhost:3000"
"#;
        let config = SysConfig::parse(ConfigFormat::Yaml, yaml).unwrap();
        assert_eq!(config.database_url.as_deref(), Some("sqlite://ihpp.db?mode=rwc"));
        assert_eq!(config.proxies[0].listen, "127.0.0.1:20003");
        assert!(!config.proxies[0].truncate_log_body);
    }

    #[test]
    fn test_empty_files_parse_to_default() {
        assert_eq!(SysConfig::parse(ConfigFormat::Toml, "").unwrap(), SysConfig::default());
        assert_eq!(SysConfig::parse(ConfigFormat::Yaml, "\n").unwrap(), SysConfig::default());
    }

    #[test]
    fn test_handle_updates_proxies() {
        let handle = SysConfigHandle::new(SysConfig {
            config_file: Some(PathBuf::from("/tmp/ihpp.toml")),
            ..Default::default()
        });

        handle.set_proxies(vec![ProxyEntry::new(":1", "http://a")]);

        let config = handle.get();
        assert_eq!(config.proxies.len(), 1);
        assert_eq!(handle.config_file(), Some(PathBuf::from("/tmp/ihpp.toml")));
    }
}
