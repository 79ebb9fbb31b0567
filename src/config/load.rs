use std::path::{Path, PathBuf};

use serde::de::Error as SerdeDeError;

use crate::app_dirs;

use super::defaults::MAX_BATCH_SIZE;
use super::{CONFIG_FILE_NAME, ConfigError, SyncConfig};

/// Environment variable overriding `remote.url`.
pub const REMOTE_URL_ENV: &str = "CAPSYNC_REMOTE_URL";
/// Environment variable overriding `remote.api_key`.
pub const API_KEY_ENV: &str = "CAPSYNC_API_KEY";
/// Environment variable overriding `remote.device.id`.
pub const DEVICE_ID_ENV: &str = "CAPSYNC_DEVICE_ID";

/// Values supplied on the command line; they win over file and environment.
#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub batch_size: Option<usize>,
    pub max_retries: Option<u32>,
    pub store_path: Option<PathBuf>,
}

/// Resolve the default configuration file path inside the app directory.
pub fn config_path() -> Result<PathBuf, ConfigError> {
    let dir = app_dirs::app_root_dir().map_err(map_app_dir_error)?;
    Ok(dir.join(CONFIG_FILE_NAME))
}

/// Load configuration from `explicit` or the default path, then apply
/// environment and command-line overrides.
///
/// A missing file yields defaults.
pub fn load(
    explicit: Option<&Path>,
    overrides: &ConfigOverrides,
) -> Result<SyncConfig, ConfigError> {
    let path = match explicit {
        Some(path) => path.to_path_buf(),
        None => config_path()?,
    };
    let mut config = load_from(&path)?;
    apply_env_overrides(&mut config, |key| std::env::var(key).ok());
    apply_overrides(&mut config, overrides);
    validate(&config)?;
    Ok(config)
}

/// Parse a TOML config file, returning defaults when it does not exist.
pub fn load_from(path: &Path) -> Result<SyncConfig, ConfigError> {
    if !path.exists() {
        tracing::debug!("No config file at {}; using defaults", path.display());
        return Ok(SyncConfig::default());
    }
    let bytes = std::fs::read(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let text = String::from_utf8(bytes).map_err(|source| ConfigError::ParseToml {
        path: path.to_path_buf(),
        source: SerdeDeError::custom(source),
    })?;
    let mut config: SyncConfig = toml::from_str(&text).map_err(|source| ConfigError::ParseToml {
        path: path.to_path_buf(),
        source,
    })?;
    normalize(&mut config);
    Ok(config)
}

pub(super) fn apply_env_overrides(
    config: &mut SyncConfig,
    lookup: impl Fn(&str) -> Option<String>,
) {
    let non_empty = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
    if let Some(url) = non_empty(REMOTE_URL_ENV) {
        config.remote.url = url;
    }
    if let Some(key) = non_empty(API_KEY_ENV) {
        config.remote.api_key = key;
    }
    if let Some(id) = non_empty(DEVICE_ID_ENV) {
        config.remote.device.id = id;
    }
}

pub(super) fn apply_overrides(config: &mut SyncConfig, overrides: &ConfigOverrides) {
    if let Some(batch_size) = overrides.batch_size {
        config.sync.batch_size = batch_size;
    }
    if let Some(max_retries) = overrides.max_retries {
        config.sync.max_retries = max_retries;
    }
    if let Some(store_path) = &overrides.store_path {
        config.sync.store_path = Some(store_path.clone());
    }
}

fn normalize(config: &mut SyncConfig) {
    config.remote.url = config.remote.url.trim().trim_end_matches('/').to_string();
    for ext in &mut config.payload.image_extensions {
        *ext = ext.trim_start_matches('.').to_ascii_lowercase();
    }
}

pub(super) fn validate(config: &SyncConfig) -> Result<(), ConfigError> {
    if config.sync.batch_size == 0 || config.sync.batch_size > MAX_BATCH_SIZE {
        return Err(ConfigError::InvalidValue {
            field: "sync.batch_size",
            reason: format!("must be between 1 and {MAX_BATCH_SIZE}"),
        });
    }
    if config.readiness.poll_interval_ms == 0 {
        return Err(ConfigError::InvalidValue {
            field: "readiness.poll_interval_ms",
            reason: "must be greater than zero".to_string(),
        });
    }
    Ok(())
}

fn map_app_dir_error(error: app_dirs::AppDirError) -> ConfigError {
    match error {
        app_dirs::AppDirError::NoBaseDir => ConfigError::NoConfigDir,
        app_dirs::AppDirError::CreateDir { path, source } => {
            ConfigError::CreateDir { path, source }
        }
    }
}
