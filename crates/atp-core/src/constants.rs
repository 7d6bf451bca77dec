//! ─── Agent Trust Protocol constants ─────────────────────────────────────────
//!
//! Protocol version: 1.0
//! Trust anchor:     Bitcoin mainnet (bip122:000000000019d6689c085ae165831e93)

/// Protocol version carried by every document's `v` field.
pub const ATP_VERSION: &str = "1.0";

/// Domain-separator prefix prepended to every signing payload. Common across
/// all seven document variants: `t` is already inside the signed body, so a
/// per-type separator would be redundant (see DESIGN.md).
pub const DOMAIN_SEPARATOR: &[u8] = b"ATP-v1.0:";

/// Maximum encoded document size, in bytes. Enforced by both the codec's
/// `encode_document` and the verifier's size gate.
pub const MAX_DOCUMENT_SIZE: usize = 16_384;

/// Default CAIP-2 chain identifier for chain references: Bitcoin mainnet.
pub const DEFAULT_CHAIN_ID: &str = "bip122:000000000019d6689c085ae165831e93";

/// Inscription content-type tag for canonical-JSON documents.
pub const CONTENT_TYPE_JSON: &str = "application/atp.v1+json";

/// Inscription content-type tag for canonical-CBOR documents.
pub const CONTENT_TYPE_CBOR: &str = "application/atp.v1+cbor";

/// Allowed drift, in seconds, between a document's `ts` and the verifier's
/// clock before a (non-fatal) timestamp warning is raised.
pub const TIMESTAMP_DRIFT_TOLERANCE_SECS: i64 = 2 * 60 * 60;

/// Maximum length, in bytes, of an Identity document's `n` field.
pub const MAX_NAME_LEN: usize = 64;

/// Minimum length of an Identity document's `n` field.
pub const MIN_NAME_LEN: usize = 1;

/// Maximum pushdata chunk size inside an inscription envelope body.
pub const MAX_ENVELOPE_CHUNK: usize = 520;

/// Ordinals-style marker string identifying an inscription envelope.
pub const ENVELOPE_MARKER: &str = "ord";
