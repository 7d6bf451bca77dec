use serde::{Deserialize, Serialize};
use std::fmt;

use crate::constants::DEFAULT_CHAIN_ID;
use crate::error::EngineError;

/// Unix-seconds timestamp. Advisory; block height is authoritative for
/// ordering (see [`crate::document`]).
pub type UnixSeconds = i64;

// ── TxId ──────────────────────────────────────────────────────────────────────

/// A 64-hex-character Bitcoin transaction id. Never a file path: construction
/// always runs through [`TxId::parse`], which rejects anything that isn't
/// exactly 64 lowercase hex characters.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TxId(String);

impl TxId {
    pub fn parse(s: &str) -> Result<Self, EngineError> {
        if s.len() == 64 && s.bytes().all(|b| b.is_ascii_hexdigit() && !b.is_ascii_uppercase()) {
            Ok(Self(s.to_string()))
        } else {
            Err(EngineError::InvalidInput(format!(
                "chain reference id {s:?} is not a 64-character lowercase hex txid"
            )))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for TxId {
    type Error = EngineError;
    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s)
    }
}

impl From<TxId> for String {
    fn from(id: TxId) -> String {
        id.0
    }
}

impl fmt::Display for TxId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for TxId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TxId({}…)", &self.0[..8])
    }
}

// ── Fingerprint ───────────────────────────────────────────────────────────────

/// `base64url(hash(public_key))`: 43 characters for SHA-256 (non-PQ
/// algorithms), 64 for SHA-384 (PQ placeholders). Computed by `atp-crypto`;
/// this crate only carries the value.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Wrap an already-computed base64url fingerprint string.
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fingerprint({})", self.0)
    }
}

// ── ChainRef ──────────────────────────────────────────────────────────────────

/// A CAIP-2 network identifier paired with a transaction id: the only shape
/// a cross-document pointer may take.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, Debug)]
pub struct ChainRef {
    pub net: String,
    pub id: TxId,
}

impl ChainRef {
    pub fn mainnet(id: TxId) -> Self {
        Self {
            net: DEFAULT_CHAIN_ID.to_string(),
            id,
        }
    }
}

impl fmt::Display for ChainRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.net, self.id)
    }
}

/// The recurring `{f, ref}` shape: a fingerprint paired with the chain
/// reference that anchors the identity owning it. Used for `target`
/// (supersession, revocation) and `from`/`to` (attestation).
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, Debug)]
pub struct PartyRef {
    pub f: Fingerprint,
    #[serde(rename = "ref")]
    pub r#ref: ChainRef,
}

// ── Algorithm ─────────────────────────────────────────────────────────────────

/// Signature algorithms recognized by the schema. Only `Ed25519` is
/// implemented by `atp-crypto`; the PQ placeholders exist so the schema and
/// fingerprint-length convention (64 vs 43 chars) are already in place for a
/// future algorithm upgrade `super` document.
#[derive(Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Debug)]
#[serde(rename_all = "lowercase")]
pub enum Algorithm {
    Ed25519,
    Dilithium,
    Falcon,
}

impl Algorithm {
    /// PQ placeholder algorithms fingerprint with SHA-384 instead of SHA-256.
    pub fn is_post_quantum(self) -> bool {
        matches!(self, Algorithm::Dilithium | Algorithm::Falcon)
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Algorithm::Ed25519 => "ed25519",
            Algorithm::Dilithium => "dilithium",
            Algorithm::Falcon => "falcon",
        };
        write!(f, "{s}")
    }
}

// ── Key / signature objects ──────────────────────────────────────────────────

/// `{t: algorithm, p: public_key_base64url}`.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, Debug)]
pub struct KeyObject {
    pub t: Algorithm,
    pub p: String,
}

/// `{f: fingerprint, sig: base64url(bytes)}`.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, Debug)]
pub struct SignatureObject {
    pub f: Fingerprint,
    pub sig: String,
}
