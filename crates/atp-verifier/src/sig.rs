use ed25519_dalek::VerifyingKey;

use atp_core::codec::{base64url_decode, encode_for_signing, DocumentFormat};
use atp_core::{Document, EngineError, EngineResult, SignatureObject};

fn decode_verifying_key(public_key_b64: &str) -> EngineResult<VerifyingKey> {
    let bytes = base64url_decode(public_key_b64)?;
    let array: [u8; 32] = bytes
        .as_slice()
        .try_into()
        .map_err(|_| EngineError::CodecError(format!("public key {public_key_b64:?} is not 32 bytes")))?;
    VerifyingKey::from_bytes(&array).map_err(|e| EngineError::CodecError(format!("invalid public key: {e}")))
}

/// Verify `sig` over `doc` (encoded in `format`) under `public_key_b64`.
pub fn verify_signature(
    doc: &Document,
    format: DocumentFormat,
    public_key_b64: &str,
    sig: &SignatureObject,
) -> EngineResult<()> {
    let payload = encode_for_signing(doc, format)?;
    let verifying_key = decode_verifying_key(public_key_b64)?;
    atp_crypto::verify(&verifying_key, &payload, &sig.sig, sig.f.as_str())
}
