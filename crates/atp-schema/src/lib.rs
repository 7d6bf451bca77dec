//! Structural validation of the seven ATP document variants, plus the
//! cross-field constraints beyond plain typing: name charset, version
//! match, unique key arrays, supersession's two-signature rule, receipt's
//! multi-party rules. Unknown fields are already stripped for us by
//! `serde`'s default behavior when deserializing into a known struct.

use std::collections::HashSet;

use atp_core::{
    constants::{ATP_VERSION, MAX_NAME_LEN, MIN_NAME_LEN},
    Document, EngineError, EngineResult, IdentityDoc, ReceiptDoc, SupersessionDoc,
};

/// Name charset: ASCII letters, digits, space, underscore, hyphen, dot. This
/// ASCII-only subset precludes Unicode-homoglyph impersonation of a name.
fn is_valid_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, ' ' | '_' | '-' | '.')
}

fn validate_name(n: &str) -> EngineResult<()> {
    if n.chars().count() < MIN_NAME_LEN || n.chars().count() > MAX_NAME_LEN {
        return Err(EngineError::SchemaViolation(format!(
            "name must be {MIN_NAME_LEN}-{MAX_NAME_LEN} characters, got {}",
            n.chars().count()
        )));
    }
    if !n.chars().all(is_valid_name_char) {
        return Err(EngineError::SchemaViolation(format!(
            "name {n:?} contains characters outside [a-zA-Z0-9 _.-]"
        )));
    }
    Ok(())
}

fn validate_version(v: &str) -> EngineResult<()> {
    if v != ATP_VERSION {
        return Err(EngineError::SchemaViolation(format!(
            "unsupported document version {v:?}, expected {ATP_VERSION:?}"
        )));
    }
    Ok(())
}

fn validate_unique_keys(keys: &[atp_core::KeyObject]) -> EngineResult<()> {
    if keys.is_empty() {
        return Err(EngineError::SchemaViolation("k must contain at least one key".into()));
    }
    let mut seen = HashSet::new();
    for key in keys {
        if !seen.insert(&key.p) {
            return Err(EngineError::SchemaViolation(format!(
                "duplicate public key {} in k",
                key.p
            )));
        }
    }
    Ok(())
}

fn validate_identity(doc: &IdentityDoc) -> EngineResult<()> {
    validate_version(&doc.v)?;
    validate_name(&doc.n)?;
    validate_unique_keys(&doc.k)?;
    Ok(())
}

fn validate_supersession(doc: &SupersessionDoc) -> EngineResult<()> {
    validate_version(&doc.v)?;
    validate_name(&doc.n)?;
    validate_unique_keys(&doc.k)?;
    if doc.s.len() != 2 {
        return Err(EngineError::SchemaViolation(format!(
            "supersession s must have exactly 2 signatures, got {}",
            doc.s.len()
        )));
    }
    Ok(())
}

fn validate_receipt(doc: &ReceiptDoc) -> EngineResult<()> {
    validate_version(&doc.v)?;
    if doc.p.len() < 2 {
        return Err(EngineError::SchemaViolation(format!(
            "receipt p must have at least 2 parties, got {}",
            doc.p.len()
        )));
    }
    let mut seen = HashSet::new();
    for party in &doc.p {
        if !seen.insert(party.f.as_str()) {
            return Err(EngineError::SchemaViolation(format!(
                "duplicate fingerprint {} in receipt p (no self-dealing)",
                party.f
            )));
        }
    }
    if doc.s.len() != doc.p.len() {
        return Err(EngineError::SchemaViolation(format!(
            "receipt s must have one slot per party: {} slots for {} parties",
            doc.s.len(),
            doc.p.len()
        )));
    }
    Ok(())
}

/// Validate a document against its variant's structural and cross-field
/// rules. Chain-reference shape (`TxId::parse`) is already enforced at
/// deserialization time by `atp-core`'s `TryFrom<String>` impl, so it never
/// needs to be re-checked here.
pub fn validate(doc: &Document) -> EngineResult<()> {
    match doc {
        Document::Identity(d) => validate_identity(d),
        Document::Supersession(d) => validate_supersession(d),
        Document::Revocation(d) => validate_version(&d.v),
        Document::Attestation(d) => validate_version(&d.v),
        Document::AttestationRevocation(d) => validate_version(&d.v),
        Document::Heartbeat(d) => validate_version(&d.v),
        Document::Receipt(d) => validate_receipt(d),
    }
}
