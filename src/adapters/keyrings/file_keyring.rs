use std::path::{Path, PathBuf};

use crate::core::errors::{Result, UnveilError};
use crate::core::models::key_id::KeyId;
use crate::core::traits::keyring::SecretKeyring;

/// One secret key listed in the keyring file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyringEntry {
    pub key_id: KeyId,
    pub label: Option<String>,
}

/// File-based view of the secret keys available on this machine.
///
/// Format: one 16-digit hex key ID per line, with optional `# label`
/// comments. Lines starting with `#` are ignored. Useful when the keys
/// live on a smartcard or in an agent that cannot be listed.
///
/// Example `secret-keys.txt`:
/// ```text
/// # work laptop
/// 8899AABBCCDDEEFF # alice@work
/// 0x1122334455667788
/// ```
#[derive(Clone)]
pub struct FileKeyring {
    path: PathBuf,
}

impl FileKeyring {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Return the file path this keyring reads from.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Parse a single line, if it names a key.
    fn parse_line(line: &str) -> Option<std::result::Result<KeyringEntry, String>> {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            return None;
        }

        let (key, label) = match trimmed.split_once('#') {
            Some((k, l)) => (k.trim(), Some(l.trim().to_string()).filter(|l| !l.is_empty())),
            None => (trimmed, None),
        };

        Some(
            key.parse::<KeyId>()
                .map(|key_id| KeyringEntry { key_id, label })
                .map_err(|_| key.to_string()),
        )
    }

    /// All entries, in file order.
    pub fn entries(&self) -> Result<Vec<KeyringEntry>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let content = std::fs::read_to_string(&self.path).map_err(|e| {
            UnveilError::StorageUnavailable {
                path: self.path.clone(),
                detail: Some(e.to_string()),
            }
        })?;

        content
            .lines()
            .enumerate()
            .filter_map(|(n, line)| Self::parse_line(line).map(|parsed| (n + 1, parsed)))
            .map(|(line_no, parsed)| {
                parsed.map_err(|bad| UnveilError::InvalidConfig {
                    detail: format!(
                        "{} line {line_no}: '{bad}' is not a 64-bit key ID",
                        self.path.display()
                    ),
                })
            })
            .collect()
    }

    /// Label of `key_id`, if the file gives one.
    pub fn label_for(&self, key_id: KeyId) -> Option<String> {
        self.entries()
            .ok()?
            .into_iter()
            .find(|e| e.key_id == key_id)
            .and_then(|e| e.label)
    }
}

impl SecretKeyring for FileKeyring {
    fn secret_key_ids(&self) -> Result<Vec<KeyId>> {
        Ok(self.entries()?.into_iter().map(|e| e.key_id).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keyring_with(content: &str) -> (tempfile::TempDir, FileKeyring) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("secret-keys.txt");
        std::fs::write(&path, content).unwrap();
        (dir, FileKeyring::new(path))
    }

    #[test]
    fn missing_file_is_empty_keyring() {
        let dir = tempfile::tempdir().unwrap();
        let keyring = FileKeyring::new(dir.path().join("absent.txt"));
        assert!(keyring.secret_key_ids().unwrap().is_empty());
    }

    #[test]
    fn lists_ids_and_labels() {
        let (_dir, keyring) =
            keyring_with("# header\n8899AABBCCDDEEFF # alice@work\n\n0x1122334455667788\n");

        let entries = keyring.entries().unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].key_id, KeyId::new(0x8899_AABB_CCDD_EEFF));
        assert_eq!(entries[0].label.as_deref(), Some("alice@work"));
        assert_eq!(entries[1].label, None);

        assert!(keyring.has_secret_key(KeyId::new(0x1122_3344_5566_7788)).unwrap());
        assert!(!keyring.has_secret_key(KeyId::new(1)).unwrap());
        assert_eq!(
            keyring.label_for(KeyId::new(0x8899_AABB_CCDD_EEFF)).as_deref(),
            Some("alice@work")
        );
    }

    #[test]
    fn bad_line_is_reported_with_line_number() {
        let (_dir, keyring) = keyring_with("8899AABBCCDDEEFF\nnot-a-key # oops\n");
        let err = keyring.secret_key_ids().unwrap_err();
        assert!(err.to_string().contains("line 2"));
        assert!(err.to_string().contains("not-a-key"));
    }

    #[test]
    fn parse_line_skips_comments() {
        assert!(FileKeyring::parse_line("# this is a comment").is_none());
        assert!(FileKeyring::parse_line("").is_none());
        assert!(FileKeyring::parse_line("  ").is_none());
    }
}
