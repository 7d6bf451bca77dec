use ed25519_dalek::{SigningKey, VerifyingKey};
use rand::rngs::OsRng;

use atp_core::codec::base64url_encode;
use atp_core::{Algorithm, Fingerprint, KeyObject};

use crate::fingerprint::fingerprint_of;
use crate::sign::sign as sign_payload;

/// An Ed25519 keypair plus its derived fingerprint. The secret scalar lives
/// only inside `ed25519_dalek::SigningKey`, which zeroizes itself on drop.
pub struct KeyPair {
    signing_key: SigningKey,
    fingerprint: Fingerprint,
}

impl KeyPair {
    /// Generate a fresh Ed25519 keypair from the OS CSPRNG.
    pub fn generate() -> Self {
        let signing_key = SigningKey::generate(&mut OsRng);
        let fingerprint = fingerprint_of(Algorithm::Ed25519, signing_key.verifying_key().as_bytes());
        Self {
            signing_key,
            fingerprint,
        }
    }

    /// Restore a keypair from a raw 32-byte secret scalar (e.g. loaded from
    /// a key file).
    pub fn from_secret_bytes(bytes: &[u8; 32]) -> Self {
        let signing_key = SigningKey::from_bytes(bytes);
        let fingerprint = fingerprint_of(Algorithm::Ed25519, signing_key.verifying_key().as_bytes());
        Self {
            signing_key,
            fingerprint,
        }
    }

    pub fn signing_key(&self) -> &SigningKey {
        &self.signing_key
    }

    pub fn verifying_key(&self) -> &VerifyingKey {
        self.signing_key.as_ref()
    }

    pub fn fingerprint(&self) -> &Fingerprint {
        &self.fingerprint
    }

    /// This keypair's public key as an ATP `KeyObject`.
    pub fn key_object(&self) -> KeyObject {
        KeyObject {
            t: Algorithm::Ed25519,
            p: base64url_encode(self.signing_key.verifying_key().as_bytes()),
        }
    }

    /// Sign `payload` (already domain-separated) and return the base64url
    /// signature text.
    pub fn sign(&self, payload: &[u8]) -> String {
        sign_payload(&self.signing_key, payload)
    }

    /// Raw secret scalar bytes, for persistence to a key file.
    pub fn secret_bytes(&self) -> [u8; 32] {
        self.signing_key.to_bytes()
    }
}

impl std::fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "KeyPair {{ fingerprint: {:?} }}", self.fingerprint)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_keys_have_distinct_fingerprints() {
        let a = KeyPair::generate();
        let b = KeyPair::generate();
        assert_ne!(a.fingerprint().as_str(), b.fingerprint().as_str());
    }

    #[test]
    fn restoring_from_secret_bytes_preserves_fingerprint() {
        let original = KeyPair::generate();
        let restored = KeyPair::from_secret_bytes(&original.secret_bytes());
        assert_eq!(original.fingerprint().as_str(), restored.fingerprint().as_str());
    }
}
