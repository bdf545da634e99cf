use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::credential::CredentialTarget;
use super::payload::{DecryptTarget, PayloadKind};

/// Re-readable input handed to the engine.
#[derive(Debug, Clone)]
pub enum DispatchInput {
    Bytes(Arc<[u8]>),
    File(PathBuf),
}

impl DispatchInput {
    pub fn file_path(&self) -> Option<&Path> {
        match self {
            Self::File(path) => Some(path),
            Self::Bytes(_) => None,
        }
    }
}

/// Everything the engine needs for one dispatch.
///
/// Built once per dispatch and shared read-only with the worker.
#[derive(Debug, Clone)]
pub struct DecryptionRequest {
    pub input: DispatchInput,
    pub kind: PayloadKind,
    pub target: DecryptTarget,
    /// Present iff `target` is `File`.
    pub output_path: Option<PathBuf>,
    /// Absent for signed-only payloads.
    pub credential_target: Option<CredentialTarget>,
    pub signed_only: bool,
    pub lookup_unknown_signer: bool,
    pub want_binary_output: bool,
    pub assume_symmetric: bool,
}

impl DecryptionRequest {
    pub fn is_file_target(&self) -> bool {
        self.target == DecryptTarget::File
    }
}
