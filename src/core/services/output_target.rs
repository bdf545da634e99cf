use std::path::{Path, PathBuf};

/// Extensions dropped from an encrypted file's name.
const ENCRYPTED_EXTENSIONS: [&str; 3] = ["asc", "gpg", "pgp"];

/// Fallback name when the input has no usable file name.
const FALLBACK_NAME: &str = "decrypted";

/// Where a decrypted copy of `input` goes by default: the input's file
/// name minus a trailing `.asc`/`.gpg`/`.pgp`, inside `output_dir`.
pub fn default_output_path(input: &Path, output_dir: &Path) -> PathBuf {
    let Some(name) = input.file_name().and_then(|n| n.to_str()) else {
        return output_dir.join(FALLBACK_NAME);
    };

    let stripped = Path::new(name)
        .extension()
        .and_then(|ext| ext.to_str())
        .filter(|ext| ENCRYPTED_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        .and_then(|ext| name.strip_suffix(ext))
        .and_then(|rest| rest.strip_suffix('.'))
        .unwrap_or(name);

    if stripped.is_empty() {
        output_dir.join(FALLBACK_NAME)
    } else {
        output_dir.join(stripped)
    }
}
