use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};

use atp_core::codec::base64url_encode;
use atp_core::{EngineError, EngineResult};

/// Sign `payload` (the domain-separated signing bytes) and return the
/// base64url-encoded 64-byte signature.
pub fn sign(signing_key: &SigningKey, payload: &[u8]) -> String {
    let signature: Signature = signing_key.sign(payload);
    base64url_encode(&signature.to_bytes())
}

/// Verify `sig_b64` over `payload` under `public_key`. A hard reject on any
/// failure, no malleability allowance.
pub fn verify(public_key: &VerifyingKey, payload: &[u8], sig_b64: &str, fingerprint: &str) -> EngineResult<()> {
    let sig_bytes = atp_core::codec::base64url_decode(sig_b64).map_err(|_| EngineError::CryptoFailure {
        fingerprint: fingerprint.to_string(),
    })?;
    let sig_array: [u8; 64] = sig_bytes
        .as_slice()
        .try_into()
        .map_err(|_| EngineError::CryptoFailure {
            fingerprint: fingerprint.to_string(),
        })?;
    let signature = Signature::from_bytes(&sig_array);
    public_key
        .verify(payload, &signature)
        .map_err(|_| EngineError::CryptoFailure {
            fingerprint: fingerprint.to_string(),
        })
}
