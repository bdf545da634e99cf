use std::sync::Arc;

use tracing::debug;

use crate::core::models::credential::{Credential, CredentialTarget};
use crate::core::models::probe_result::ProbeResult;
use crate::core::suspension::Suspension;
use crate::core::traits::passphrase_cache::PassphraseCache;
use crate::core::traits::prompts::{PassphrasePrompt, PassphraseReply};

/// What the orchestrator has to do before it can dispatch.
#[derive(Debug)]
pub enum Resolution {
    /// Signed-only payloads carry nothing to unlock.
    NotNeeded,
    Ready(Credential),
    /// Nothing cached; collect a passphrase for this target.
    Suspend(CredentialTarget),
}

/// Finds the credential a classified payload needs, from the cache or
/// from the user.
pub struct CredentialResolver {
    cache: Arc<dyn PassphraseCache>,
    prompt: Arc<dyn PassphrasePrompt>,
}

impl CredentialResolver {
    pub fn new(cache: Arc<dyn PassphraseCache>, prompt: Arc<dyn PassphrasePrompt>) -> Self {
        Self { cache, prompt }
    }

    /// Synchronous half: never prompts.
    pub fn resolve(&self, probe: &ProbeResult) -> Resolution {
        let Some(target) = probe.credential_target() else {
            return Resolution::NotNeeded;
        };

        match self.cache.get(&target) {
            Some(credential) => {
                debug!(%target, "using cached passphrase");
                Resolution::Ready(credential)
            }
            None => Resolution::Suspend(target),
        }
    }

    /// Open the passphrase collection suspension for `target`.
    pub fn collect(&self, target: CredentialTarget) -> Suspension<PassphraseReply> {
        debug!(%target, "asking for passphrase");
        self.prompt.request(target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::key_id::KeyId;
    use crate::core::models::probe_result::MalformedReason;
    use secrecy::{ExposeSecret, SecretString};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct OneEntry(CredentialTarget);

    impl PassphraseCache for OneEntry {
        fn get(&self, target: &CredentialTarget) -> Option<Credential> {
            (*target == self.0).then(|| Credential::cached(*target, SecretString::from("cached")))
        }
    }

    #[derive(Default)]
    struct CountingPrompt(AtomicUsize);

    impl PassphrasePrompt for CountingPrompt {
        fn request(&self, _target: CredentialTarget) -> Suspension<PassphraseReply> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Suspension::ready(PassphraseReply::Cancelled)
        }
    }

    const KEY: KeyId = KeyId::new(0xFEED_FACE_CAFE_BEEF);

    fn resolver(cached: CredentialTarget) -> (CredentialResolver, Arc<CountingPrompt>) {
        let prompt = Arc::new(CountingPrompt::default());
        let resolver = CredentialResolver::new(Arc::new(OneEntry(cached)), prompt.clone());
        (resolver, prompt)
    }

    #[test]
    fn signed_only_needs_nothing() {
        let (resolver, _) = resolver(CredentialTarget::Symmetric);
        assert!(matches!(
            resolver.resolve(&ProbeResult::SignedOnly),
            Resolution::NotNeeded
        ));
        assert!(matches!(
            resolver.resolve(&ProbeResult::Malformed(MalformedReason::Unrecognized)),
            Resolution::NotNeeded
        ));
    }

    #[test]
    fn cached_key_is_ready_without_prompting() {
        let (resolver, prompt) = resolver(CredentialTarget::SecretKey(KEY));
        match resolver.resolve(&ProbeResult::AsymmetricRequiresKey(KEY)) {
            Resolution::Ready(c) => {
                assert_eq!(c.passphrase().expose_secret(), "cached");
                assert_eq!(c.target(), CredentialTarget::SecretKey(KEY));
            }
            other => panic!("expected Ready, got {other:?}"),
        }
        assert_eq!(prompt.0.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn uncached_symmetric_suspends() {
        let (resolver, _) = resolver(CredentialTarget::SecretKey(KEY));
        assert!(matches!(
            resolver.resolve(&ProbeResult::Symmetric),
            Resolution::Suspend(CredentialTarget::Symmetric)
        ));
    }

    #[test]
    fn wildcard_key_resolves_as_symmetric() {
        let (resolver, _) = resolver(CredentialTarget::Symmetric);
        assert!(matches!(
            resolver.resolve(&ProbeResult::AsymmetricRequiresKey(KeyId::NONE)),
            Resolution::Ready(_)
        ));
    }

    #[tokio::test]
    async fn collect_goes_through_prompt() {
        let (resolver, prompt) = resolver(CredentialTarget::Symmetric);
        let reply = resolver.collect(CredentialTarget::Symmetric).resumed().await;
        assert!(matches!(reply, PassphraseReply::Cancelled));
        assert_eq!(prompt.0.load(Ordering::SeqCst), 1);
    }
}
