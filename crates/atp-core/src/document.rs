use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::types::{ChainRef, Fingerprint, KeyObject, PartyRef, SignatureObject};

/// Structured metadata: a mapping from collection name (`links`, `wallets`,
/// `keys`, …) to an ordered list of `[key, value]` pairs.
pub type Metadata = BTreeMap<String, Vec<(String, String)>>;

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, Debug)]
#[serde(rename_all = "kebab-case")]
pub enum SupersessionReason {
    KeyRotation,
    AlgorithmUpgrade,
    KeyCompromised,
    MetadataUpdate,
    KeyAddition,
    KeyRemoval,
}

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, Debug)]
#[serde(rename_all = "kebab-case")]
pub enum RevocationReason {
    KeyCompromised,
    Defunct,
}

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, Debug)]
#[serde(rename_all = "lowercase")]
pub enum AttestationRevocationReason {
    Retracted,
    Fraudulent,
    Expired,
    Error,
}

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, Debug)]
#[serde(rename_all = "lowercase")]
pub enum ReceiptOutcome {
    Completed,
    Partial,
    Cancelled,
    Disputed,
}

/// Genesis: binds a name to one or more public keys.
#[derive(Clone, PartialEq, Serialize, Deserialize, Debug)]
pub struct IdentityDoc {
    pub v: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ts: Option<i64>,
    pub n: String,
    pub k: Vec<KeyObject>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub m: Option<Metadata>,
    pub s: SignatureObject,
}

/// Key rotation, algorithm upgrade, key-compromised, metadata-update,
/// key-addition, or key-removal, linking a new identity state to the old one.
#[derive(Clone, PartialEq, Serialize, Deserialize, Debug)]
pub struct SupersessionDoc {
    pub v: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ts: Option<i64>,
    pub target: PartyRef,
    pub n: String,
    pub k: Vec<KeyObject>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub m: Option<Metadata>,
    pub reason: SupersessionReason,
    /// Exactly two: old-identity signer first, new-identity signer second.
    pub s: Vec<SignatureObject>,
}

/// The "poison pill": permanently kills a supersession chain.
#[derive(Clone, PartialEq, Serialize, Deserialize, Debug)]
pub struct RevocationDoc {
    pub v: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ts: Option<i64>,
    pub target: PartyRef,
    pub reason: RevocationReason,
    pub s: SignatureObject,
}

/// One identity vouching for another.
#[derive(Clone, PartialEq, Serialize, Deserialize, Debug)]
pub struct AttestationDoc {
    pub v: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ts: Option<i64>,
    pub from: PartyRef,
    pub to: PartyRef,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ctx: Option<String>,
    /// Valid-not-after: Unix-seconds expiry.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vna: Option<i64>,
    pub s: SignatureObject,
}

/// Retracts a specific attestation.
#[derive(Clone, PartialEq, Serialize, Deserialize, Debug)]
pub struct AttestationRevocationDoc {
    pub v: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ts: Option<i64>,
    #[serde(rename = "ref")]
    pub r#ref: ChainRef,
    pub reason: AttestationRevocationReason,
    pub s: SignatureObject,
}

/// Proof of liveness with a monotonically increasing sequence number.
#[derive(Clone, PartialEq, Serialize, Deserialize, Debug)]
pub struct HeartbeatDoc {
    pub v: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ts: Option<i64>,
    pub f: Fingerprint,
    #[serde(rename = "ref")]
    pub r#ref: ChainRef,
    pub seq: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub msg: Option<String>,
    pub s: SignatureObject,
}

/// One party in a multi-party receipt.
#[derive(Clone, PartialEq, Serialize, Deserialize, Debug)]
pub struct ReceiptParty {
    pub f: Fingerprint,
    #[serde(rename = "ref")]
    pub r#ref: ChainRef,
    pub role: String,
}

/// The exchange being recorded by a receipt.
#[derive(Clone, PartialEq, Serialize, Deserialize, Debug)]
pub struct ReceiptExchange {
    #[serde(rename = "type")]
    pub r#type: String,
    pub sum: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub val: Option<i64>,
}

/// Multi-party record of an exchange, co-signed.
#[derive(Clone, PartialEq, Serialize, Deserialize, Debug)]
pub struct ReceiptDoc {
    pub v: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ts: Option<i64>,
    pub p: Vec<ReceiptParty>,
    pub ex: ReceiptExchange,
    pub out: ReceiptOutcome,
    /// One slot per party, same order as `p`. `None` until that party signs.
    pub s: Vec<Option<SignatureObject>>,
}

/// The seven ATP document variants, discriminated by `t`. A closed tagged
/// union dispatched by pattern matching, never by runtime polymorphism.
#[derive(Clone, PartialEq, Serialize, Deserialize, Debug)]
#[serde(tag = "t")]
pub enum Document {
    #[serde(rename = "id")]
    Identity(IdentityDoc),
    #[serde(rename = "super")]
    Supersession(SupersessionDoc),
    #[serde(rename = "revoke")]
    Revocation(RevocationDoc),
    #[serde(rename = "att")]
    Attestation(AttestationDoc),
    #[serde(rename = "att-revoke")]
    AttestationRevocation(AttestationRevocationDoc),
    #[serde(rename = "hb")]
    Heartbeat(HeartbeatDoc),
    #[serde(rename = "rcpt")]
    Receipt(ReceiptDoc),
}

impl Document {
    /// The short tag (`id`, `super`, …) identifying this document's variant.
    pub fn tag(&self) -> &'static str {
        match self {
            Document::Identity(_) => "id",
            Document::Supersession(_) => "super",
            Document::Revocation(_) => "revoke",
            Document::Attestation(_) => "att",
            Document::AttestationRevocation(_) => "att-revoke",
            Document::Heartbeat(_) => "hb",
            Document::Receipt(_) => "rcpt",
        }
    }

    pub fn version(&self) -> &str {
        match self {
            Document::Identity(d) => &d.v,
            Document::Supersession(d) => &d.v,
            Document::Revocation(d) => &d.v,
            Document::Attestation(d) => &d.v,
            Document::AttestationRevocation(d) => &d.v,
            Document::Heartbeat(d) => &d.v,
            Document::Receipt(d) => &d.v,
        }
    }

    pub fn timestamp(&self) -> Option<i64> {
        match self {
            Document::Identity(d) => d.ts,
            Document::Supersession(d) => d.ts,
            Document::Revocation(d) => d.ts,
            Document::Attestation(d) => d.ts,
            Document::AttestationRevocation(d) => d.ts,
            Document::Heartbeat(d) => d.ts,
            Document::Receipt(d) => d.ts,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Algorithm;

    #[test]
    fn tag_round_trips_through_serde() {
        let doc = Document::Heartbeat(HeartbeatDoc {
            v: "1.0".into(),
            ts: Some(1_700_000_000),
            f: Fingerprint::new("abc"),
            r#ref: ChainRef::mainnet(crate::types::TxId::parse(&"a".repeat(64)).unwrap()),
            seq: 1,
            msg: None,
            s: SignatureObject {
                f: Fingerprint::new("abc"),
                sig: "sig".into(),
            },
        });
        assert_eq!(doc.tag(), "hb");
        let value = serde_json::to_value(&doc).unwrap();
        assert_eq!(value["t"], "hb");
        let back: Document = serde_json::from_value(value).unwrap();
        assert_eq!(back, doc);
    }

    #[test]
    fn algorithm_serializes_lowercase() {
        let key = KeyObject {
            t: Algorithm::Ed25519,
            p: "pubkey".into(),
        };
        let value = serde_json::to_value(&key).unwrap();
        assert_eq!(value["t"], "ed25519");
    }
}
