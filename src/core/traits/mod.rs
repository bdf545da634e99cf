pub mod audit;
pub mod crypto_engine;
pub mod keyring;
pub mod passphrase_cache;
pub mod prompts;
