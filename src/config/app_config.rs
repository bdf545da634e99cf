use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::core::errors::{Result, UnveilError};

/// Current format version supported by this build of Unveil.
pub const CURRENT_FORMAT_VERSION: u32 = 1;

const DEFAULT_KEYSERVER: &str = "hkps://keys.openpgp.org";
const DEFAULT_CACHE_TTL_SECS: u64 = 600;

/// Top-level configuration read from `config.toml`.
///
/// Every section is optional; a missing file means all defaults.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub unveil: UnveilSection,
    #[serde(default)]
    pub cache: CacheSection,
    pub audit: Option<AuditSection>,
}

impl AppConfig {
    /// `<config dir>/unveil/config.toml`, if the platform has a config dir.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("unveil").join("config.toml"))
    }

    /// Load the configuration.
    ///
    /// An explicit path must exist. The default location may be absent,
    /// in which case defaults apply.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let path = match explicit {
            Some(path) => {
                if !path.exists() {
                    return Err(UnveilError::InvalidConfig {
                        detail: format!("{} not found", path.display()),
                    });
                }
                path.to_path_buf()
            }
            None => match Self::default_path() {
                Some(path) if path.exists() => path,
                _ => return Ok(Self::default()),
            },
        };

        let content = std::fs::read_to_string(&path)?;
        Self::parse(&content)
    }

    /// Parse and validate TOML text.
    pub fn parse(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content).map_err(|e| UnveilError::InvalidConfig {
            detail: format!("Failed to parse config.toml: {e}"),
        })?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.unveil.format_version > CURRENT_FORMAT_VERSION {
            return Err(UnveilError::InvalidConfig {
                detail: format!(
                    "config format version {} is newer than supported version {CURRENT_FORMAT_VERSION}.\n  \
                     Update unveil to read this configuration.",
                    self.unveil.format_version
                ),
            });
        }

        if self.unveil.keyring == KeyringKind::File && self.unveil.keyring_file.is_none() {
            return Err(UnveilError::InvalidConfig {
                detail: "keyring = \"file\" requires keyring_file".into(),
            });
        }

        if let Some(audit) = &self.audit {
            validate_simple_filename(&audit.log_file, "audit log file")?;
        }

        Ok(())
    }

    /// Directory for the audit log and default decrypted files.
    pub fn data_dir(&self) -> PathBuf {
        self.unveil.data_dir.clone().unwrap_or_else(|| {
            dirs::data_dir()
                .map(|d| d.join("unveil"))
                .unwrap_or_else(|| PathBuf::from(".unveil"))
        })
    }

    /// Root directory for decrypted files.
    pub fn output_dir(&self) -> PathBuf {
        self.unveil
            .output_dir
            .clone()
            .unwrap_or_else(|| self.data_dir().join("decrypted"))
    }

    pub fn gpg_path(&self) -> PathBuf {
        self.unveil
            .gpg_path
            .clone()
            .unwrap_or_else(|| PathBuf::from("gpg"))
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache.ttl_secs)
    }
}

/// Which secret keyring the probe consults.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyringKind {
    #[default]
    Gpg,
    File,
}

/// The `[unveil]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct UnveilSection {
    /// Format version for backward compatibility. Defaults to 1 if missing.
    #[serde(default = "default_format_version")]
    pub format_version: u32,
    pub data_dir: Option<PathBuf>,
    pub output_dir: Option<PathBuf>,
    #[serde(default = "default_true")]
    pub lookup_unknown_signers: bool,
    #[serde(default = "default_keyserver")]
    pub keyserver: String,
    pub gpg_path: Option<PathBuf>,
    #[serde(default)]
    pub keyring: KeyringKind,
    pub keyring_file: Option<PathBuf>,
}

impl Default for UnveilSection {
    fn default() -> Self {
        Self {
            format_version: default_format_version(),
            data_dir: None,
            output_dir: None,
            lookup_unknown_signers: true,
            keyserver: default_keyserver(),
            gpg_path: None,
            keyring: KeyringKind::Gpg,
            keyring_file: None,
        }
    }
}

fn default_format_version() -> u32 {
    1
}

fn default_true() -> bool {
    true
}

fn default_keyserver() -> String {
    DEFAULT_KEYSERVER.to_string()
}

/// The `[cache]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct CacheSection {
    /// Seconds a passphrase stays cached; 0 disables the cache.
    #[serde(default = "default_ttl")]
    pub ttl_secs: u64,
}

impl Default for CacheSection {
    fn default() -> Self {
        Self {
            ttl_secs: DEFAULT_CACHE_TTL_SECS,
        }
    }
}

fn default_ttl() -> u64 {
    DEFAULT_CACHE_TTL_SECS
}

/// The `[audit]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct AuditSection {
    pub enabled: bool,
    pub log_file: String,
}

/// Reject anything but a plain file name (no separators, no `..`).
pub fn validate_simple_filename(name: &str, what: &str) -> Result<()> {
    let bad = name.is_empty()
        || name == "."
        || name == ".."
        || name.contains(['/', '\\'])
        || Path::new(name).is_absolute();

    if bad {
        return Err(UnveilError::InvalidConfig {
            detail: format!("Invalid {what} '{name}': must be a plain file name"),
        });
    }
    Ok(())
}
