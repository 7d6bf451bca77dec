use sha2::{Digest, Sha256, Sha384};

use atp_core::{codec::base64url_encode, Algorithm, Fingerprint};

/// `base64url(SHA256(pubkey))` for Ed25519, `base64url(SHA384(pubkey))` for
/// the PQ placeholder algorithms. The 43-vs-64-character length is itself a
/// signal for which hash was used.
pub fn fingerprint_of(algorithm: Algorithm, public_key: &[u8]) -> Fingerprint {
    let digest = if algorithm.is_post_quantum() {
        Sha384::digest(public_key).to_vec()
    } else {
        Sha256::digest(public_key).to_vec()
    };
    Fingerprint::new(base64url_encode(&digest))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ed25519_fingerprint_is_43_chars() {
        let fp = fingerprint_of(Algorithm::Ed25519, &[0u8; 32]);
        assert_eq!(fp.as_str().len(), 43);
    }

    #[test]
    fn pq_placeholder_fingerprint_is_64_chars() {
        let fp = fingerprint_of(Algorithm::Dilithium, &[0u8; 32]);
        assert_eq!(fp.as_str().len(), 64);
    }

    #[test]
    fn fingerprint_is_deterministic() {
        let a = fingerprint_of(Algorithm::Ed25519, b"same key");
        let b = fingerprint_of(Algorithm::Ed25519, b"same key");
        assert_eq!(a.as_str(), b.as_str());
    }
}
