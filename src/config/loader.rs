use std::path::{Path, PathBuf};

use tracing::debug;

use crate::args::{DEFAULT_CONFIG_JSON, DEFAULT_CONFIG_TOML};
use crate::error::{AppError, AppResult, ConfigError};

use super::types::ConfigFile;

/// Loads a configuration file from the provided path or default locations.
///
/// # Errors
///
/// Returns an error when the config file cannot be read or parsed.
pub fn load_config(path: Option<&str>) -> AppResult<Option<ConfigFile>> {
    if let Some(path) = path {
        let path = PathBuf::from(path);
        return Ok(Some(load_config_file(&path)?));
    }

    for candidate in [DEFAULT_CONFIG_TOML, DEFAULT_CONFIG_JSON] {
        let candidate = PathBuf::from(candidate);
        if candidate.exists() {
            debug!("Using default config {}", candidate.display());
            return Ok(Some(load_config_file(&candidate)?));
        }
    }

    Ok(None)
}

/// Reads one TOML or JSON config file, chosen by extension.
///
/// # Errors
///
/// Returns an error when the file cannot be read, has an unsupported
/// extension, or fails to parse.
pub fn load_config_file(path: &Path) -> AppResult<ConfigFile> {
    let content = std::fs::read_to_string(path).map_err(|err| {
        AppError::config(ConfigError::ReadConfig {
            path: path.to_path_buf(),
            source: err,
        })
    })?;
    match path.extension().and_then(|ext| ext.to_str()) {
        Some("toml") => toml::from_str(&content).map_err(|err| {
            AppError::config(ConfigError::ParseToml {
                path: path.to_path_buf(),
                source: err,
            })
        }),
        Some("json") => serde_json::from_str(&content).map_err(|err| {
            AppError::config(ConfigError::ParseJson {
                path: path.to_path_buf(),
                source: err,
            })
        }),
        Some(ext) => Err(AppError::config(ConfigError::UnsupportedExtension {
            ext: ext.to_owned(),
        })),
        None => Err(AppError::config(ConfigError::MissingExtension)),
    }
}
