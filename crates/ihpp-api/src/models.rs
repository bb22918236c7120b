use chrono::{DateTime, Utc};
use ihpp_control::{ProxyEntry, SysConfig};
use ihpp_db::entities::{proxy_config, proxy_session};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

/// Settings of one proxy instance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ProxySettings {
    /// Listen address
    pub listen: String,
    /// Upstream target URL
    pub target: String,
    /// Whether captured bodies are truncated
    pub truncate_log_body: bool,
}

impl From<ProxyEntry> for ProxySettings {
    fn from(entry: ProxyEntry) -> Self {
        Self {
            listen: entry.listen,
            target: entry.target,
            truncate_log_body: entry.truncate_log_body,
        }
    }
}

/// A stored configuration snapshot
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ConfigRow {
    /// Config identifier
    pub id: String,
    /// Config file path, or `cli-flags`
    pub source_path: String,
    /// Working directory at registration time
    pub working_dir: String,
    /// Raw settings snapshot as stored
    pub config_json: String,
    /// Decoded settings snapshot, null if the stored JSON does not decode
    pub parsed_config: Option<ProxySettings>,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

impl From<proxy_config::Model> for ConfigRow {
    fn from(row: proxy_config::Model) -> Self {
        let parsed_config = ProxyEntry::from_snapshot_json(&row.config_json)
            .ok()
            .map(ProxySettings::from);

        Self {
            id: row.id,
            source_path: row.source_path,
            working_dir: row.working_dir,
            config_json: row.config_json,
            parsed_config,
            created_at: row.created_at,
        }
    }
}

/// A selected configuration and whether it is serving traffic
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ActiveConfig {
    /// Config identifier
    pub id: String,
    /// Stored snapshot
    pub config_row: ConfigRow,
    /// True if a proxy server for this config is accepting connections
    pub is_proxyserver_active: bool,
}

/// A captured proxy session
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Session {
    /// Session identifier, increasing in capture order
    pub id: i32,
    /// Owning configuration
    pub config_id: String,
    /// HTTP method
    pub request_method: String,
    /// Request URL
    pub request_url: String,
    /// Response status code
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_status: Option<u16>,
    /// Capture timestamp
    pub created_at: DateTime<Utc>,
}

impl From<proxy_session::Model> for Session {
    fn from(row: proxy_session::Model) -> Self {
        Self {
            id: row.id,
            config_id: row.config_id,
            request_method: row.request_method,
            request_url: row.request_url,
            response_status: row.response_status.and_then(|s| u16::try_from(s).ok()),
            created_at: row.created_at,
        }
    }
}

/// History filters
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct HistoryParams {
    /// Search term matched against the settings (min. 3 characters)
    pub q: Option<String>,
    /// Maximum number of rows
    pub limit: Option<u64>,
}

/// Result of deleting a configuration
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DeleteConfigResponse {
    /// Config identifier
    pub id: String,
    /// Number of config rows removed (0 if it did not exist)
    pub deleted: u64,
}

/// Result of exporting active proxies to the config file
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ExportResponse {
    /// File that was rewritten
    pub config_file: String,
    /// Proxies now listed in the file
    pub proxies: Vec<ProxySettings>,
}

/// Current system configuration as seen by this process
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SysConfigResponse {
    /// Config file in use
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config_file: Option<String>,
    /// Configured proxies
    pub proxies: Vec<ProxySettings>,
    /// API bind address
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_addr: Option<String>,
    /// Database URL
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database_url: Option<String>,
}

impl From<SysConfig> for SysConfigResponse {
    fn from(config: SysConfig) -> Self {
        Self {
            config_file: config.config_file.map(|p| p.display().to_string()),
            proxies: config.proxies.into_iter().map(ProxySettings::from).collect(),
            api_addr: config.api_addr,
            database_url: config.database_url,
        }
    }
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    /// Service status
    pub status: String,
    /// Service version
    pub version: String,
    /// Number of proxy servers accepting connections
    pub active_proxies: usize,
}

/// Error response
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    /// Error message
    pub error: String,
    /// Error code
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}
