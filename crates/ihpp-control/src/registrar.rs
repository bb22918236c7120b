//! Records the settings a proxy instance starts with as a config row

use ihpp_db::ConfigStore;
use tracing::{info, warn};

use crate::error::ControlError;
use crate::settings::ProxyEntry;
use crate::sysconfig::SysConfigHandle;

/// Source path recorded when settings came from command-line flags
pub const CLI_FLAGS_SOURCE: &str = "cli-flags";

/// Register the configuration of a starting proxy instance
///
/// Returns the config id to link sessions and the active registry entry
/// to. Without a store, configuration tracking is disabled and an empty id
/// is returned.
pub async fn register_configuration(
    store: Option<&ConfigStore>,
    sys_config: &SysConfigHandle,
    entry: &ProxyEntry,
) -> Result<String, ControlError> {
    let Some(store) = store else {
        return Ok(String::new());
    };

    let source_path = sys_config
        .config_file()
        .map(|path| path.display().to_string())
        .unwrap_or_else(|| CLI_FLAGS_SOURCE.to_string());

    let working_dir = match std::env::current_dir() {
        Ok(dir) => dir.display().to_string(),
        Err(e) => {
            warn!(error = %e, "Could not determine current working directory");
            ".".to_string()
        }
    };

    let config_json = entry.to_snapshot_json()?;

    let row = store
        .get_or_create(&source_path, &working_dir, &config_json)
        .await?;

    info!(config_id = %row.id, listen = %entry.listen, "Configuration session initialized");
    Ok(row.id)
}
