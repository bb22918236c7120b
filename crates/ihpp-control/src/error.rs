use ihpp_db::StoreError;
use std::path::PathBuf;
use thiserror::Error;

/// Errors from registering, tracking and deleting configurations
#[derive(Error, Debug)]
pub enum ControlError {
    /// The configuration has a live serving instance
    #[error("config '{0}' is active")]
    Conflict(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("failed to serialize settings snapshot: {0}")]
    Snapshot(#[from] serde_json::Error),
}

/// Errors from exporting active proxies to the config file
#[derive(Error, Debug)]
pub enum ExportError {
    #[error("no config file currently in use")]
    NoConfigFile,

    #[error("failed to read config file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {}: {message}", path.display())]
    Parse { path: PathBuf, message: String },

    #[error("failed to serialize config file {}: {message}", path.display())]
    Serialize { path: PathBuf, message: String },

    #[error("failed to write config file {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
