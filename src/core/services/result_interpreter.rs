use crate::core::errors::FailureReason;
use crate::core::models::outcome::{
    DecryptedOutput, DecryptionOutcome, EngineOutput, EngineResponse, SignatureInfo,
    SignatureReport, SignatureStatus, SignatureVerdict,
};
use crate::core::models::payload::DecryptTarget;
use crate::core::models::request::DecryptionRequest;
use crate::core::traits::crypto_engine::EngineError;

/// Map a raw engine response onto the caller-visible outcome.
///
/// Pure: no I/O, no suspension. An unknown signer only becomes
/// `UnknownSigner` when the request still allows a keyserver lookup;
/// otherwise it is a successful decryption with status `SignerUnknown`.
pub fn interpret(
    request: &DecryptionRequest,
    raw: Result<EngineResponse, EngineError>,
) -> DecryptionOutcome {
    let response = match raw {
        Ok(response) => response,
        Err(e) => return failure(e),
    };

    match &response.signature {
        Some(report)
            if report.verdict == SignatureVerdict::MissingKey && request.lookup_unknown_signer =>
        {
            return DecryptionOutcome::UnknownSigner {
                signer: report.key_id,
            };
        }
        _ => {}
    }

    DecryptionOutcome::Ok {
        output: shape_output(request, response.output),
        signature: response.signature.map(signature_info),
    }
}

fn failure(error: EngineError) -> DecryptionOutcome {
    let (reason, detail) = match error {
        EngineError::NoSecretKey { detail } => (FailureReason::NoSecretKeyAvailable, detail),
        EngineError::NoContainer { detail } => (FailureReason::NoRecognizedEncryption, detail),
        EngineError::BadPassphrase { detail } => (FailureReason::BadPassphrase, detail),
        EngineError::Failed { detail } => (FailureReason::EngineFailure, detail),
    };
    DecryptionOutcome::Failed {
        reason,
        detail: (!detail.is_empty()).then_some(detail),
    }
}

fn shape_output(request: &DecryptionRequest, output: EngineOutput) -> DecryptedOutput {
    match (output, request.target) {
        (EngineOutput::File(path), _) => DecryptedOutput::File(path),
        (EngineOutput::Bytes(bytes), DecryptTarget::Message) if !request.want_binary_output => {
            DecryptedOutput::Text(String::from_utf8_lossy(&bytes).into_owned())
        }
        (EngineOutput::Bytes(bytes), _) => DecryptedOutput::Bytes(bytes),
    }
}

fn signature_info(report: SignatureReport) -> SignatureInfo {
    let status = match report.verdict {
        SignatureVerdict::Good => SignatureStatus::Verified,
        SignatureVerdict::Bad => SignatureStatus::Invalid,
        SignatureVerdict::MissingKey => SignatureStatus::SignerUnknown,
    };
    SignatureInfo {
        signer: report.key_id,
        user_id: report.user_id,
        status,
    }
}
