pub mod audit_helpers;
pub mod crypto_helpers;
pub mod decrypt;
pub mod log;
pub mod probe;
