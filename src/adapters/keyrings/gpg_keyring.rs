use std::path::PathBuf;
use std::process::Command;

use tracing::debug;

use crate::core::errors::{Result, UnveilError};
use crate::core::models::key_id::KeyId;
use crate::core::traits::keyring::SecretKeyring;

/// Secret keys known to the local gpg installation.
///
/// Lists them with `gpg --with-colons --list-secret-keys` on every call,
/// so keys imported in the meantime are picked up.
pub struct GpgKeyring {
    gpg_path: PathBuf,
}

impl GpgKeyring {
    pub fn new(gpg_path: PathBuf) -> Self {
        Self { gpg_path }
    }
}

impl SecretKeyring for GpgKeyring {
    fn secret_key_ids(&self) -> Result<Vec<KeyId>> {
        let output = Command::new(&self.gpg_path)
            .args(["--batch", "--with-colons", "--list-secret-keys"])
            .output()
            .map_err(|e| UnveilError::EngineFailure {
                detail: format!("Failed to run {}: {e}", self.gpg_path.display()),
            })?;

        // gpg exits with 2 when the keyring is simply empty.
        if !output.status.success() && !output.stdout.is_empty() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(UnveilError::EngineFailure {
                detail: format!("gpg could not list secret keys: {}", stderr.trim()),
            });
        }

        let ids = parse_colon_listing(&String::from_utf8_lossy(&output.stdout));
        debug!(count = ids.len(), "secret keys listed");
        Ok(ids)
    }
}

/// Key IDs of `sec` and `ssb` records in a `--with-colons` listing.
fn parse_colon_listing(listing: &str) -> Vec<KeyId> {
    listing
        .lines()
        .filter_map(|line| {
            let mut fields = line.split(':');
            match fields.next()? {
                "sec" | "ssb" => fields.nth(3)?.parse().ok(),
                _ => None,
            }
        })
        .collect()
}
