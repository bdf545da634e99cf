use std::sync::Arc;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};

use unveil::core::models::credential::Credential;
use unveil::core::models::outcome::EngineResponse;
use unveil::core::models::request::DecryptionRequest;
use unveil::core::traits::crypto_engine::{CryptoEngine, EngineError};

use crate::cli::output;

/// Wraps an engine and shows a spinner on stderr while it runs.
pub struct ProgressEngine {
    inner: Arc<dyn CryptoEngine>,
}

impl ProgressEngine {
    pub fn new(inner: Arc<dyn CryptoEngine>) -> Self {
        Self { inner }
    }

    fn spinner(&self, request: &DecryptionRequest) -> ProgressBar {
        if output::is_quiet() {
            return ProgressBar::hidden();
        }

        let bar = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::with_template("  {spinner} {msg}") {
            bar.set_style(style);
        }
        let verb = if request.signed_only {
            "Verifying"
        } else {
            "Decrypting"
        };
        bar.set_message(format!("{verb} with {}...", self.inner.name()));
        bar.enable_steady_tick(Duration::from_millis(100));
        bar
    }
}

impl CryptoEngine for ProgressEngine {
    fn execute(
        &self,
        request: &DecryptionRequest,
        credential: Option<Credential>,
    ) -> Result<EngineResponse, EngineError> {
        let bar = self.spinner(request);
        let result = self.inner.execute(request, credential);
        bar.finish_and_clear();
        result
    }

    fn name(&self) -> &str {
        self.inner.name()
    }
}
