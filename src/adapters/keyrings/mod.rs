pub mod file_keyring;
pub mod gpg_keyring;
