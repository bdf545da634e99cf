use std::collections::HashMap;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use secrecy::{ExposeSecret, SecretString};

use crate::core::models::credential::{Credential, CredentialTarget};
use crate::core::traits::passphrase_cache::PassphraseCache;

/// Process-local passphrase cache with a fixed time-to-live.
///
/// Shared between attempts behind an `Arc`; entries expire `ttl` after
/// they were stored. A zero TTL disables caching.
pub struct MemoryCache {
    ttl: Duration,
    entries: Mutex<HashMap<CredentialTarget, (SecretString, Instant)>>,
}

impl MemoryCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Remember `passphrase` for `target`, replacing any earlier entry.
    pub fn insert(&self, target: CredentialTarget, passphrase: SecretString) {
        if self.ttl.is_zero() {
            return;
        }
        self.entries.lock().insert(target, (passphrase, Instant::now()));
    }

    pub fn len(&self) -> usize {
        self.purge_expired();
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn purge_expired(&self) {
        let ttl = self.ttl;
        self.entries
            .lock()
            .retain(|_, (_, stored)| stored.elapsed() < ttl);
    }
}

impl PassphraseCache for MemoryCache {
    fn get(&self, target: &CredentialTarget) -> Option<Credential> {
        let mut entries = self.entries.lock();
        let lookup = entries.get(target).map(|(passphrase, stored)| {
            (stored.elapsed() < self.ttl)
                .then(|| SecretString::from(passphrase.expose_secret().to_owned()))
        });

        match lookup {
            Some(Some(passphrase)) => Some(Credential::cached(*target, passphrase)),
            Some(None) => {
                entries.remove(target);
                None
            }
            None => None,
        }
    }
}
