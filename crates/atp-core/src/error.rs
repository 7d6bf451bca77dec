use thiserror::Error;

/// The taxonomy of failures the engine can report. Every fallible operation
/// in `atp-*` returns one of these, never a bare string or a panic.
#[derive(Debug, Error)]
pub enum EngineError {
    // ── Input validation ─────────────────────────────────────────────────────
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("document of {size} bytes exceeds the {max}-byte limit")]
    DocumentTooLarge { size: usize, max: usize },

    // ── Schema ───────────────────────────────────────────────────────────────
    #[error("schema violation: {0}")]
    SchemaViolation(String),

    // ── Codec ────────────────────────────────────────────────────────────────
    #[error("codec error: {0}")]
    CodecError(String),

    // ── Crypto ───────────────────────────────────────────────────────────────
    #[error("signature verification failed for fingerprint {fingerprint}")]
    CryptoFailure { fingerprint: String },

    #[error("fingerprint mismatch: expected {expected}, found {found}")]
    FingerprintMismatch { expected: String, found: String },

    // ── Resolution ───────────────────────────────────────────────────────────
    #[error("invalid reference: {0}")]
    InvalidReference(String),

    #[error("no inscription envelope found in transaction witness")]
    NoInscription,

    #[error("unresolvable reference {reference}: {reason}")]
    UnresolvableReference { reference: String, reason: String },

    #[error("chain state violation: {0}")]
    ChainStateViolation(String),

    // ── Network ──────────────────────────────────────────────────────────────
    #[error("network unavailable: {0}")]
    NetworkUnavailable(String),

    #[error(
        "explorer inconsistency for fingerprint {fingerprint}: explorer claimed {claimed}, node computed {actual}"
    )]
    ExplorerInconsistency {
        fingerprint: String,
        claimed: String,
        actual: String,
    },

    #[error("explorer: resource not found: {0}")]
    ExplorerNotFound(String),

    #[error("explorer: client error: {0}")]
    ExplorerClient(String),

    #[error("explorer: unavailable: {0}")]
    ExplorerUnavailable(String),

    // ── Authorization ────────────────────────────────────────────────────────
    #[error("signer {signer} not authorized for target {target}")]
    NotAuthorized { signer: String, target: String },
}

pub type EngineResult<T> = Result<T, EngineError>;
