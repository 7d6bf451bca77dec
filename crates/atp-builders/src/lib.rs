//! Constructs each of the seven ATP document variants: build the unsigned
//! body, validate it, sign it with the owner's key, attach the signature
//! object(s), and hand back the finished, schema-valid document.

use atp_core::codec::{encode_document, encode_for_signing, DocumentFormat};
use atp_core::{
    constants::TIMESTAMP_DRIFT_TOLERANCE_SECS, AttestationDoc, AttestationRevocationDoc,
    AttestationRevocationReason, ChainRef, Document, EngineError, EngineResult, HeartbeatDoc, IdentityDoc, KeyObject,
    Metadata, PartyRef, ReceiptDoc, ReceiptExchange, ReceiptOutcome, ReceiptParty, RevocationDoc, RevocationReason,
    SignatureObject, SupersessionDoc, SupersessionReason,
};
use atp_crypto::KeyPair;

/// Placeholder signature used while constructing the unsigned body. The
/// codec strips the whole `s` field before signing, so its contents never
/// matter, only its presence where the schema expects one.
fn placeholder_sig() -> SignatureObject {
    SignatureObject {
        f: atp_core::Fingerprint::new(""),
        sig: String::new(),
    }
}

/// Builders enforce timestamp currency: a document being built now must
/// carry a `ts` within the drift tolerance of the builder's clock.
fn require_fresh_timestamp(ts: i64) -> EngineResult<()> {
    let now = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0);
    if (now - ts).abs() > TIMESTAMP_DRIFT_TOLERANCE_SECS {
        return Err(EngineError::InvalidInput(format!(
            "timestamp {ts} is not within {TIMESTAMP_DRIFT_TOLERANCE_SECS}s of now ({now})"
        )));
    }
    Ok(())
}

fn sign_with(doc: &Document, format: DocumentFormat, keypair: &KeyPair) -> EngineResult<SignatureObject> {
    let payload = encode_for_signing(doc, format)?;
    Ok(SignatureObject {
        f: keypair.fingerprint().clone(),
        sig: keypair.sign(&payload),
    })
}

/// Re-validate and emit the canonical bytes for a finished, signed document.
pub fn finalize(doc: &Document, format: DocumentFormat) -> EngineResult<Vec<u8>> {
    atp_schema::validate(doc)?;
    encode_document(doc, format)
}

pub fn build_identity(
    keypair: &KeyPair,
    name: impl Into<String>,
    keys: Vec<KeyObject>,
    metadata: Option<Metadata>,
    ts: i64,
    format: DocumentFormat,
) -> EngineResult<Document> {
    require_fresh_timestamp(ts)?;
    let unsigned = Document::Identity(IdentityDoc {
        v: atp_core::constants::ATP_VERSION.to_string(),
        ts: Some(ts),
        n: name.into(),
        k: keys,
        m: metadata,
        s: placeholder_sig(),
    });
    atp_schema::validate(&unsigned)?;

    let sig = sign_with(&unsigned, format, keypair)?;
    let Document::Identity(mut doc) = unsigned else {
        unreachable!()
    };
    doc.s = sig;
    Ok(Document::Identity(doc))
}

#[allow(clippy::too_many_arguments)]
pub fn build_supersession(
    old_keypair: &KeyPair,
    new_keypair: &KeyPair,
    target: PartyRef,
    name: impl Into<String>,
    new_keys: Vec<KeyObject>,
    metadata: Option<Metadata>,
    reason: SupersessionReason,
    ts: i64,
    format: DocumentFormat,
) -> EngineResult<Document> {
    require_fresh_timestamp(ts)?;
    let unsigned = Document::Supersession(SupersessionDoc {
        v: atp_core::constants::ATP_VERSION.to_string(),
        ts: Some(ts),
        target,
        n: name.into(),
        k: new_keys,
        m: metadata,
        reason,
        s: vec![placeholder_sig(), placeholder_sig()],
    });
    atp_schema::validate(&unsigned)?;

    let old_sig = sign_with(&unsigned, format, old_keypair)?;
    let new_sig = sign_with(&unsigned, format, new_keypair)?;
    let Document::Supersession(mut doc) = unsigned else {
        unreachable!()
    };
    doc.s = vec![old_sig, new_sig];
    Ok(Document::Supersession(doc))
}

pub fn build_revocation(
    keypair: &KeyPair,
    target: PartyRef,
    reason: RevocationReason,
    ts: i64,
    format: DocumentFormat,
) -> EngineResult<Document> {
    require_fresh_timestamp(ts)?;
    let unsigned = Document::Revocation(RevocationDoc {
        v: atp_core::constants::ATP_VERSION.to_string(),
        ts: Some(ts),
        target,
        reason,
        s: placeholder_sig(),
    });
    atp_schema::validate(&unsigned)?;

    let sig = sign_with(&unsigned, format, keypair)?;
    let Document::Revocation(mut doc) = unsigned else {
        unreachable!()
    };
    doc.s = sig;
    Ok(Document::Revocation(doc))
}

#[allow(clippy::too_many_arguments)]
pub fn build_attestation(
    keypair: &KeyPair,
    from: PartyRef,
    to: PartyRef,
    ctx: Option<String>,
    valid_not_after: Option<i64>,
    ts: i64,
    format: DocumentFormat,
) -> EngineResult<Document> {
    require_fresh_timestamp(ts)?;
    let unsigned = Document::Attestation(AttestationDoc {
        v: atp_core::constants::ATP_VERSION.to_string(),
        ts: Some(ts),
        from,
        to,
        ctx,
        vna: valid_not_after,
        s: placeholder_sig(),
    });
    atp_schema::validate(&unsigned)?;

    let sig = sign_with(&unsigned, format, keypair)?;
    let Document::Attestation(mut doc) = unsigned else {
        unreachable!()
    };
    doc.s = sig;
    Ok(Document::Attestation(doc))
}

pub fn build_attestation_revocation(
    keypair: &KeyPair,
    reference: ChainRef,
    reason: AttestationRevocationReason,
    ts: i64,
    format: DocumentFormat,
) -> EngineResult<Document> {
    require_fresh_timestamp(ts)?;
    let unsigned = Document::AttestationRevocation(AttestationRevocationDoc {
        v: atp_core::constants::ATP_VERSION.to_string(),
        ts: Some(ts),
        r#ref: reference,
        reason,
        s: placeholder_sig(),
    });
    atp_schema::validate(&unsigned)?;

    let sig = sign_with(&unsigned, format, keypair)?;
    let Document::AttestationRevocation(mut doc) = unsigned else {
        unreachable!()
    };
    doc.s = sig;
    Ok(Document::AttestationRevocation(doc))
}

pub fn build_heartbeat(
    keypair: &KeyPair,
    reference: ChainRef,
    seq: u64,
    msg: Option<String>,
    ts: i64,
    format: DocumentFormat,
) -> EngineResult<Document> {
    require_fresh_timestamp(ts)?;
    let unsigned = Document::Heartbeat(HeartbeatDoc {
        v: atp_core::constants::ATP_VERSION.to_string(),
        ts: Some(ts),
        f: keypair.fingerprint().clone(),
        r#ref: reference,
        seq,
        msg,
        s: placeholder_sig(),
    });
    atp_schema::validate(&unsigned)?;

    let sig = sign_with(&unsigned, format, keypair)?;
    let Document::Heartbeat(mut doc) = unsigned else {
        unreachable!()
    };
    doc.s = sig;
    Ok(Document::Heartbeat(doc))
}

/// Build a receipt with only `initiator_index`'s signature slot populated;
/// every other party's slot is `None` until they countersign.
pub fn build_receipt(
    keypair: &KeyPair,
    initiator_index: usize,
    parties: Vec<ReceiptParty>,
    exchange: ReceiptExchange,
    outcome: ReceiptOutcome,
    ts: i64,
    format: DocumentFormat,
) -> EngineResult<Document> {
    require_fresh_timestamp(ts)?;
    let slots = vec![None; parties.len()];
    let unsigned = Document::Receipt(ReceiptDoc {
        v: atp_core::constants::ATP_VERSION.to_string(),
        ts: Some(ts),
        p: parties,
        ex: exchange,
        out: outcome,
        s: slots,
    });
    atp_schema::validate(&unsigned)?;

    let sig = sign_with(&unsigned, format, keypair)?;
    let Document::Receipt(mut doc) = unsigned else {
        unreachable!()
    };
    *doc
        .s
        .get_mut(initiator_index)
        .ok_or_else(|| EngineError::InvalidInput(format!("party index {initiator_index} out of range")))? =
        Some(sig);
    Ok(Document::Receipt(doc))
}

/// Add `signer`'s countersignature to an existing receipt at `party_index`.
pub fn countersign_receipt(
    keypair: &KeyPair,
    doc: Document,
    party_index: usize,
    format: DocumentFormat,
) -> EngineResult<Document> {
    let Document::Receipt(mut receipt) = doc else {
        return Err(EngineError::InvalidInput("countersign target is not a receipt".into()));
    };
    let sig = sign_with(&Document::Receipt(receipt.clone()), format, keypair)?;
    *receipt
        .s
        .get_mut(party_index)
        .ok_or_else(|| EngineError::InvalidInput(format!("party index {party_index} out of range")))? = Some(sig);
    Ok(Document::Receipt(receipt))
}

#[cfg(test)]
mod tests {
    use super::*;
    use atp_core::Algorithm;

    fn now() -> i64 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_secs() as i64
    }

    #[test]
    fn identity_builds_and_verifies() {
        let kp = KeyPair::generate();
        let doc = build_identity(&kp, "Shrike", vec![kp.key_object()], None, now(), DocumentFormat::Json).unwrap();
        finalize(&doc, DocumentFormat::Json).unwrap();
    }

    #[test]
    fn stale_timestamp_is_rejected() {
        let kp = KeyPair::generate();
        let stale = now() - 3 * 60 * 60;
        let err = build_identity(&kp, "Shrike", vec![kp.key_object()], None, stale, DocumentFormat::Json)
            .unwrap_err();
        assert!(matches!(err, EngineError::InvalidInput(_)));
    }

    #[test]
    fn supersession_carries_two_distinct_signatures() {
        let old_kp = KeyPair::generate();
        let new_kp = KeyPair::generate();
        let target = PartyRef {
            f: old_kp.fingerprint().clone(),
            r#ref: ChainRef::mainnet(atp_core::TxId::parse(&"a".repeat(64)).unwrap()),
        };
        let doc = build_supersession(
            &old_kp,
            &new_kp,
            target,
            "Shrike",
            vec![new_kp.key_object()],
            None,
            SupersessionReason::KeyRotation,
            now(),
            DocumentFormat::Json,
        )
        .unwrap();
        finalize(&doc, DocumentFormat::Json).unwrap();
        let Document::Supersession(s) = doc else { unreachable!() };
        assert_ne!(s.s[0].sig, s.s[1].sig);
        assert_eq!(s.k[0].t, Algorithm::Ed25519);
    }

    #[test]
    fn receipt_countersign_populates_second_slot() {
        let initiator = KeyPair::generate();
        let counterparty = KeyPair::generate();
        let parties = vec![
            ReceiptParty {
                f: initiator.fingerprint().clone(),
                r#ref: ChainRef::mainnet(atp_core::TxId::parse(&"a".repeat(64)).unwrap()),
                role: "buyer".into(),
            },
            ReceiptParty {
                f: counterparty.fingerprint().clone(),
                r#ref: ChainRef::mainnet(atp_core::TxId::parse(&"b".repeat(64)).unwrap()),
                role: "seller".into(),
            },
        ];
        let exchange = ReceiptExchange {
            r#type: "swap".into(),
            sum: 100,
            val: None,
        };
        let initiated = build_receipt(
            &initiator,
            0,
            parties,
            exchange,
            ReceiptOutcome::Completed,
            now(),
            DocumentFormat::Json,
        )
        .unwrap();

        let countersigned = countersign_receipt(&counterparty, initiated, 1, DocumentFormat::Json).unwrap();
        finalize(&countersigned, DocumentFormat::Json).unwrap();
        let Document::Receipt(r) = countersigned else { unreachable!() };
        assert!(r.s[0].is_some());
        assert!(r.s[1].is_some());
    }
}
