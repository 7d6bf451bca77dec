//! Deterministic JSON/CBOR encoding and the domain-separated signing payload.
//!
//! Canonical JSON relies on `serde_json::Map` being backed by a `BTreeMap`
//! (true whenever the `preserve_order` feature is off, which this workspace
//! never enables): every object, at every nesting depth, serializes with its
//! keys sorted lexicographically for free. Canonical CBOR walks the same
//! sorted `serde_json::Value` and re-encodes it, converting the handful of
//! binary-bearing fields (`p`, `f`, `sig`) from base64url text to CBOR byte
//! strings as it goes.

use base64::Engine;
use ciborium::value::{Integer, Value as CborValue};
use serde_json::Value as JsonValue;

use crate::constants::{DOMAIN_SEPARATOR, MAX_DOCUMENT_SIZE};
use crate::document::Document;
use crate::error::{EngineError, EngineResult};

/// Wire format a document is encoded in.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum DocumentFormat {
    Json,
    Cbor,
}

impl DocumentFormat {
    pub fn from_content_type(content_type: &str) -> Option<Self> {
        match content_type {
            crate::constants::CONTENT_TYPE_JSON => Some(Self::Json),
            crate::constants::CONTENT_TYPE_CBOR => Some(Self::Cbor),
            _ => None,
        }
    }

    pub fn content_type(self) -> &'static str {
        match self {
            DocumentFormat::Json => crate::constants::CONTENT_TYPE_JSON,
            DocumentFormat::Cbor => crate::constants::CONTENT_TYPE_CBOR,
        }
    }
}

pub fn base64url_decode(s: &str) -> Result<Vec<u8>, EngineError> {
    base64::engine::general_purpose::URL_SAFE_NO_PAD
        .decode(s)
        .map_err(|e| EngineError::CodecError(format!("invalid base64url: {e}")))
}

pub fn base64url_encode(bytes: &[u8]) -> String {
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes)
}

/// Field names the codec treats as binary: carried as base64url text in
/// canonical JSON, as CBOR byte strings on the wire.
fn is_binary_field(key: &str) -> bool {
    matches!(key, "p" | "f" | "sig")
}

/// Remove the `s` signature field from a document's JSON value, producing
/// the bytes that get domain-separated and signed.
fn strip_signature(mut value: JsonValue) -> JsonValue {
    if let Some(obj) = value.as_object_mut() {
        obj.remove("s");
    }
    value
}

fn document_to_value(doc: &Document) -> EngineResult<JsonValue> {
    serde_json::to_value(doc).map_err(|e| EngineError::CodecError(format!("encoding document: {e}")))
}

fn value_to_document(value: JsonValue) -> EngineResult<Document> {
    serde_json::from_value(value).map_err(|e| EngineError::CodecError(format!("decoding document: {e}")))
}

/// Canonical JSON bytes for a document's JSON value: compact, keys sorted at
/// every level by construction (see module docs).
fn canonical_json_bytes(value: &JsonValue) -> EngineResult<Vec<u8>> {
    serde_json::to_vec(value).map_err(|e| EngineError::CodecError(format!("canonical JSON: {e}")))
}

fn json_to_cbor(value: &JsonValue) -> CborValue {
    match value {
        JsonValue::Null => CborValue::Null,
        JsonValue::Bool(b) => CborValue::Bool(*b),
        JsonValue::Number(n) => {
            if let Some(i) = n.as_i64() {
                CborValue::Integer(Integer::from(i))
            } else if let Some(u) = n.as_u64() {
                CborValue::Integer(Integer::from(u))
            } else {
                CborValue::Float(n.as_f64().unwrap_or(0.0))
            }
        }
        JsonValue::String(s) => CborValue::Text(s.clone()),
        JsonValue::Array(items) => CborValue::Array(items.iter().map(json_to_cbor).collect()),
        JsonValue::Object(map) => {
            let entries = map
                .iter()
                .map(|(k, v)| {
                    let cv = if is_binary_field(k) {
                        match v.as_str().map(base64url_decode) {
                            Some(Ok(bytes)) => CborValue::Bytes(bytes),
                            _ => json_to_cbor(v),
                        }
                    } else {
                        json_to_cbor(v)
                    };
                    (CborValue::Text(k.clone()), cv)
                })
                .collect();
            CborValue::Map(entries)
        }
    }
}

fn cbor_to_json(value: &CborValue) -> JsonValue {
    match value {
        CborValue::Null => JsonValue::Null,
        CborValue::Bool(b) => JsonValue::Bool(*b),
        CborValue::Integer(i) => {
            let as_i128: i128 = (*i).into();
            if let Ok(i) = i64::try_from(as_i128) {
                JsonValue::Number(i.into())
            } else if let Ok(u) = u64::try_from(as_i128) {
                JsonValue::Number(u.into())
            } else {
                JsonValue::Null
            }
        }
        CborValue::Float(f) => serde_json::Number::from_f64(*f)
            .map(JsonValue::Number)
            .unwrap_or(JsonValue::Null),
        CborValue::Text(s) => JsonValue::String(s.clone()),
        CborValue::Bytes(bytes) => JsonValue::String(base64url_encode(bytes)),
        CborValue::Array(items) => JsonValue::Array(items.iter().map(cbor_to_json).collect()),
        CborValue::Map(entries) => {
            let mut map = serde_json::Map::new();
            for (k, v) in entries {
                if let CborValue::Text(key) = k {
                    map.insert(key.clone(), cbor_to_json(v));
                }
            }
            JsonValue::Object(map)
        }
        _ => JsonValue::Null,
    }
}

fn canonical_cbor_bytes(value: &JsonValue) -> EngineResult<Vec<u8>> {
    let cbor_value = json_to_cbor(value);
    let mut buf = Vec::new();
    ciborium::ser::into_writer(&cbor_value, &mut buf)
        .map_err(|e| EngineError::CodecError(format!("canonical CBOR: {e}")))?;
    Ok(buf)
}

/// Encode a document in canonical form for inscription. Refuses to emit more
/// than [`MAX_DOCUMENT_SIZE`] bytes.
pub fn encode_document(doc: &Document, format: DocumentFormat) -> EngineResult<Vec<u8>> {
    let value = document_to_value(doc)?;
    let bytes = match format {
        DocumentFormat::Json => canonical_json_bytes(&value)?,
        DocumentFormat::Cbor => canonical_cbor_bytes(&value)?,
    };
    if bytes.len() > MAX_DOCUMENT_SIZE {
        return Err(EngineError::DocumentTooLarge {
            size: bytes.len(),
            max: MAX_DOCUMENT_SIZE,
        });
    }
    Ok(bytes)
}

/// Decode a document from its canonical encoding, normalizing CBOR binary
/// fields back to the base64url-text JSON shape before schema validation
/// sees them.
pub fn decode_document(bytes: &[u8], format: DocumentFormat) -> EngineResult<Document> {
    if bytes.len() > MAX_DOCUMENT_SIZE {
        return Err(EngineError::DocumentTooLarge {
            size: bytes.len(),
            max: MAX_DOCUMENT_SIZE,
        });
    }
    let value = match format {
        DocumentFormat::Json => {
            serde_json::from_slice(bytes).map_err(|e| EngineError::CodecError(format!("JSON decode: {e}")))?
        }
        DocumentFormat::Cbor => {
            let cbor_value: CborValue = ciborium::de::from_reader(bytes)
                .map_err(|e| EngineError::CodecError(format!("CBOR decode: {e}")))?;
            cbor_to_json(&cbor_value)
        }
    };
    value_to_document(value)
}

/// `"ATP-v1.0:" || canonical_encoding(doc − s)`: the exact byte string an
/// Ed25519 signer consumes. Identical prefix for every document type;
/// `t` inside the signed body is what prevents cross-type replay.
pub fn encode_for_signing(doc: &Document, format: DocumentFormat) -> EngineResult<Vec<u8>> {
    let value = strip_signature(document_to_value(doc)?);
    let body = match format {
        DocumentFormat::Json => canonical_json_bytes(&value)?,
        DocumentFormat::Cbor => canonical_cbor_bytes(&value)?,
    };
    let mut payload = Vec::with_capacity(DOMAIN_SEPARATOR.len() + body.len());
    payload.extend_from_slice(DOMAIN_SEPARATOR);
    payload.extend_from_slice(&body);
    Ok(payload)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{HeartbeatDoc};
    use crate::types::{ChainRef, Fingerprint, SignatureObject, TxId};

    fn sample_heartbeat() -> Document {
        Document::Heartbeat(HeartbeatDoc {
            v: "1.0".into(),
            ts: Some(1_700_000_000),
            f: Fingerprint::new("Zm9v"),
            r#ref: ChainRef::mainnet(TxId::parse(&"a".repeat(64)).unwrap()),
            seq: 7,
            msg: Some("hi".into()),
            s: SignatureObject {
                f: Fingerprint::new("Zm9v"),
                sig: base64url_encode(&[1, 2, 3, 4]),
            },
        })
    }

    #[test]
    fn canonical_json_is_deterministic_across_runs() {
        let doc = sample_heartbeat();
        let a = encode_document(&doc, DocumentFormat::Json).unwrap();
        let b = encode_document(&doc, DocumentFormat::Json).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn json_cbor_round_trip_preserves_document() {
        let doc = sample_heartbeat();
        let cbor = encode_document(&doc, DocumentFormat::Cbor).unwrap();
        let decoded = decode_document(&cbor, DocumentFormat::Cbor).unwrap();
        assert_eq!(decoded, doc);
    }

    #[test]
    fn signing_payload_starts_with_domain_separator() {
        let doc = sample_heartbeat();
        let payload = encode_for_signing(&doc, DocumentFormat::Json).unwrap();
        assert!(payload.starts_with(DOMAIN_SEPARATOR));
        assert!(!String::from_utf8_lossy(&payload).contains("\"s\":"));
    }

    #[test]
    fn json_and_cbor_signing_payloads_differ() {
        let doc = sample_heartbeat();
        let json_payload = encode_for_signing(&doc, DocumentFormat::Json).unwrap();
        let cbor_payload = encode_for_signing(&doc, DocumentFormat::Cbor).unwrap();
        assert_ne!(json_payload, cbor_payload);
    }

    #[test]
    fn oversize_document_is_rejected() {
        let mut doc = sample_heartbeat();
        if let Document::Heartbeat(ref mut hb) = doc {
            hb.msg = Some("x".repeat(MAX_DOCUMENT_SIZE));
        }
        let err = encode_document(&doc, DocumentFormat::Json).unwrap_err();
        assert!(matches!(err, EngineError::DocumentTooLarge { .. }));
    }
}
