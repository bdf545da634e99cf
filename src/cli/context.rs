use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use unveil::config::app_config::AppConfig;
use unveil::core::errors::Result;

static CONFIG_PATH: OnceLock<Option<PathBuf>> = OnceLock::new();
static GPG_OVERRIDE: OnceLock<Option<PathBuf>> = OnceLock::new();

/// Record the global `--config` and `--gpg` flags.
pub fn init(config: Option<&str>, gpg: Option<&str>) {
    let _ = CONFIG_PATH.set(config.map(PathBuf::from));
    let _ = GPG_OVERRIDE.set(gpg.map(PathBuf::from));
}

/// The explicit config path, if one was given.
pub fn config_path() -> Option<&'static Path> {
    CONFIG_PATH.get().and_then(|p| p.as_deref())
}

/// Load the configuration, applying command-line overrides.
pub fn load_config() -> Result<AppConfig> {
    let mut config = AppConfig::load(config_path())?;
    if let Some(gpg) = GPG_OVERRIDE.get().and_then(|p| p.clone()) {
        config.unveil.gpg_path = Some(gpg);
    }
    Ok(config)
}
