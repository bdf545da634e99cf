//! Decrypt and verify OpenPGP payloads whose key is not known up front.
//!
//! [`core`] holds the probe, credential resolution and the decryption
//! state machine; [`adapters`] supplies gpg-backed and terminal
//! collaborators; [`config`] loads `config.toml`.

pub mod adapters;
pub mod config;
pub mod core;
