pub mod gpg_keyserver;
