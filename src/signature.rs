use base64::{engine::general_purpose::STANDARD as B64, Engine as _};
use ed25519_dalek::{Signature, Verifier, VerifyingKey};

use crate::error::ApiError;

/// Maximum clock skew tolerated between the signed timestamp and server time.
/// Bounds replay risk without persistent nonce storage; part of the wire
/// contract (clients must sign fresh timestamps).
pub const MAX_TIMESTAMP_SKEW_MS: u64 = 5 * 60 * 1000;

/// Reject timestamps outside the freshness window, regardless of whether the
/// signature itself would verify.
pub fn check_freshness(timestamp_ms: u64, now_ms: u64) -> Result<(), ApiError> {
    let skew = now_ms.abs_diff(timestamp_ms);
    if skew > MAX_TIMESTAMP_SKEW_MS {
        return Err(ApiError::Authentication(format!(
            "timestamp outside freshness window ({} ms skew)",
            skew
        )));
    }
    Ok(())
}

/// Decode a base64 Ed25519 public key (32 bytes).
pub fn decode_public_key(public_key_b64: &str) -> Result<VerifyingKey, ApiError> {
    let bytes = B64
        .decode(public_key_b64.trim())
        .map_err(|_| ApiError::Authentication("public key is not valid base64".into()))?;
    let arr: [u8; 32] = bytes
        .try_into()
        .map_err(|_| ApiError::Authentication("public key must be 32 bytes".into()))?;
    VerifyingKey::from_bytes(&arr)
        .map_err(|_| ApiError::Authentication("invalid Ed25519 public key".into()))
}

/// Verify an Ed25519 signature (base64, 64 bytes) over the UTF-8 bytes of the
/// canonical message. The caller must have recomputed `canonical_message`
/// from the fields it is about to persist, never from client-supplied hashes.
pub fn verify(
    public_key_b64: &str,
    canonical_message: &str,
    signature_b64: &str,
) -> Result<(), ApiError> {
    let key = decode_public_key(public_key_b64)?;

    let sig_bytes = B64
        .decode(signature_b64.trim())
        .map_err(|_| ApiError::Authentication("signature is not valid base64".into()))?;
    let sig_arr: [u8; 64] = sig_bytes
        .try_into()
        .map_err(|_| ApiError::Authentication("signature must be 64 bytes".into()))?;
    let signature = Signature::from_bytes(&sig_arr);

    key.verify(canonical_message.as_bytes(), &signature)
        .map_err(|_| ApiError::Authentication("signature verification failed".into()))
}
