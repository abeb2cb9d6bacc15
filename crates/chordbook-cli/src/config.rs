//! Locating and loading the CLI's configuration.

use std::env;
use std::path::{Path, PathBuf};

use chordbook_core::VersioningConfig;

use crate::error::CliError;

pub const DB_PATH_ENV: &str = "CHORDBOOK_DB";

/// Load the versioning config.
///
/// An explicit `--config` path must exist; the default location is optional.
pub fn load_config(cli_config_path: Option<&Path>) -> Result<VersioningConfig, CliError> {
    let config = match cli_config_path {
        Some(path) => {
            if !path.exists() {
                return Err(CliError::Config(format!(
                    "config file {} does not exist",
                    path.display()
                )));
            }
            VersioningConfig::load_from_path(path)?
        }
        None => match default_config_path() {
            Some(path) => VersioningConfig::load_from_path(&path)?,
            None => VersioningConfig::default(),
        },
    };
    tracing::debug!(
        "Versioning config: delta_ratio={} max_chain_depth={} device={}",
        config.delta_ratio,
        config.max_chain_depth,
        config.device_label
    );
    Ok(config)
}

pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("chordbook").join("config.json"))
}

pub fn resolve_db_path(cli_db_path: Option<PathBuf>) -> Result<PathBuf, CliError> {
    if let Some(path) = cli_db_path.or_else(|| env::var_os(DB_PATH_ENV).map(PathBuf::from)) {
        return Ok(path);
    }
    default_db_path()
}

pub fn default_db_path() -> Result<PathBuf, CliError> {
    dirs::data_dir()
        .map(|dir| dir.join("chordbook").join("chordbook.db"))
        .ok_or_else(|| CliError::Config("failed to resolve data directory".to_string()))
}
