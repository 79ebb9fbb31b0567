//! Runtime configuration: a TOML file in the app directory, environment
//! overrides for credentials, and command-line overrides on top.

mod defaults;
mod errors;
mod load;
mod types;

pub use errors::ConfigError;
pub use load::{
    API_KEY_ENV, ConfigOverrides, DEVICE_ID_ENV, REMOTE_URL_ENV, config_path, load, load_from,
};
pub use types::{
    DeviceIdentity, PayloadSettings, ReadinessSettings, RemoteSettings, SyncConfig, SyncSettings,
};

/// Config file name inside the app directory.
pub const CONFIG_FILE_NAME: &str = "capsync.toml";

impl SyncConfig {
    /// Fail with [`ConfigError::MissingRemote`] unless the remote store can be reached.
    pub fn require_remote(&self) -> Result<(), ConfigError> {
        let fields = self.remote.missing_fields();
        if fields.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::MissingRemote { fields })
        }
    }
}
