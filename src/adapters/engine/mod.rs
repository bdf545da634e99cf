pub mod gpg_engine;
