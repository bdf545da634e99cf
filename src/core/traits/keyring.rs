use crate::core::errors::Result;
use crate::core::models::key_id::KeyId;

/// Read-only view of the local secret keyring.
pub trait SecretKeyring: Send + Sync {
    /// Key IDs of every secret key and subkey available locally.
    fn secret_key_ids(&self) -> Result<Vec<KeyId>>;

    fn has_secret_key(&self, key_id: KeyId) -> Result<bool> {
        Ok(self.secret_key_ids()?.contains(&key_id))
    }
}
