use std::path::PathBuf;
use std::process::Command;

use tracing::info;

use crate::core::errors::{Result, UnveilError};
use crate::core::models::key_id::KeyId;

/// Fetches public keys into the local gpg keyring with `--recv-keys`.
pub struct GpgKeyserver {
    gpg_path: PathBuf,
    keyserver: String,
}

impl GpgKeyserver {
    pub fn new(gpg_path: PathBuf, keyserver: impl Into<String>) -> Self {
        Self {
            gpg_path,
            keyserver: keyserver.into(),
        }
    }

    pub fn keyserver(&self) -> &str {
        &self.keyserver
    }

    fn args(&self, key_id: KeyId) -> Vec<String> {
        vec![
            "--batch".into(),
            "--keyserver".into(),
            self.keyserver.clone(),
            "--recv-keys".into(),
            key_id.to_string(),
        ]
    }

    /// Import `key_id` from the configured keyserver.
    pub fn fetch(&self, key_id: KeyId) -> Result<()> {
        info!(key = %key_id, keyserver = %self.keyserver, "fetching signer key");

        let output = Command::new(&self.gpg_path)
            .args(self.args(key_id))
            .output()
            .map_err(|e| UnveilError::EngineFailure {
                detail: format!("Failed to run {}: {e}", self.gpg_path.display()),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(UnveilError::EngineFailure {
                detail: format!(
                    "Key {key_id} could not be fetched from {}: {}",
                    self.keyserver,
                    stderr.trim()
                ),
            });
        }

        Ok(())
    }
}
