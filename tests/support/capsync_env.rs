use std::{
    path::PathBuf,
    sync::{Mutex, OnceLock},
};

use capsync::app_dirs::CONFIG_HOME_ENV;
use capsync::config::{API_KEY_ENV, DEVICE_ID_ENV, REMOTE_URL_ENV};

static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

const CLEARED: [&str; 3] = [REMOTE_URL_ENV, API_KEY_ENV, DEVICE_ID_ENV];

/// Points the app directory at `path` and hides remote credentials from the
/// environment until dropped.
pub struct CapsyncEnvGuard {
    previous: Vec<(&'static str, Option<String>)>,
    _lock: std::sync::MutexGuard<'static, ()>,
}

impl CapsyncEnvGuard {
    pub fn set_config_home(path: PathBuf) -> Self {
        let lock = ENV_LOCK
            .get_or_init(|| Mutex::new(()))
            .lock()
            .unwrap_or_else(|err| err.into_inner());
        let mut previous = vec![(CONFIG_HOME_ENV, std::env::var(CONFIG_HOME_ENV).ok())];
        // SAFETY: tests run under a global lock to prevent concurrent env mutations.
        unsafe {
            std::env::set_var(CONFIG_HOME_ENV, path);
        }
        for key in CLEARED {
            previous.push((key, std::env::var(key).ok()));
            // SAFETY: tests run under a global lock to prevent concurrent env mutations.
            unsafe {
                std::env::remove_var(key);
            }
        }
        Self {
            previous,
            _lock: lock,
        }
    }
}

impl Drop for CapsyncEnvGuard {
    fn drop(&mut self) {
        for (key, value) in self.previous.drain(..) {
            // SAFETY: tests run under a global lock to prevent concurrent env mutations.
            unsafe {
                match value {
                    Some(value) => std::env::set_var(key, value),
                    None => std::env::remove_var(key),
                }
            }
        }
    }
}
