use atp_core::codec::DocumentFormat;
use atp_core::{constants, ChainRef, Document, EngineError, EngineResult, SignatureObject, TxId};
use atp_explorer::ExplorerClient;
use atp_resolver::Resolver;

use crate::report::VerificationReport;
use crate::sig::verify_signature;

/// Size, schema, version, and timestamp checks common to every variant.
fn verify_common(doc: &Document, format: DocumentFormat, report: &mut VerificationReport) -> EngineResult<()> {
    let encoded = atp_core::codec::encode_document(doc, format)?;
    if encoded.len() > constants::MAX_DOCUMENT_SIZE {
        return Err(EngineError::DocumentTooLarge {
            size: encoded.len(),
            max: constants::MAX_DOCUMENT_SIZE,
        });
    }
    atp_schema::validate(doc)?;

    if doc.version() != constants::ATP_VERSION {
        return Err(EngineError::SchemaViolation(format!(
            "unsupported version {:?}",
            doc.version()
        )));
    }

    report_timestamp_drift(doc, report);
    Ok(())
}

fn report_timestamp_drift(doc: &Document, report: &mut VerificationReport) {
    let Some(ts) = doc.timestamp() else { return };
    let now = current_unix_time();
    if (now - ts).abs() > constants::TIMESTAMP_DRIFT_TOLERANCE_SECS {
        report.warn(format!("timestamp {ts} drifts more than 2h from verifier clock {now}"));
    }
}

fn current_unix_time() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

/// Walk `chain_fingerprint`'s supersession chain via the Explorer, trying
/// `sig` under each historical key in turn. Every Explorer-claimed entry is
/// re-fetched from the node and schema-validated before it is trusted; a
/// claimed fingerprint that disagrees with the node's own inscription is
/// fatal ([`EngineError::ExplorerInconsistency`]), not merely skipped.
/// Succeeds on the first entry whose key validates `sig`.
async fn verify_via_chain_walk(
    doc: &Document,
    format: DocumentFormat,
    resolver: &Resolver,
    explorer: &ExplorerClient,
    chain_fingerprint: &str,
    sig: &SignatureObject,
    report: &mut VerificationReport,
) -> EngineResult<()> {
    let record = explorer.identity_chain(chain_fingerprint).await?;

    for entry in &record.entries {
        let txid = TxId::parse(&entry.txid)
            .map_err(|_| EngineError::InvalidReference(format!("explorer chain entry txid {:?}", entry.txid)))?;
        let resolved = resolver.fetch_doc(&ChainRef::mainnet(txid)).await?;
        atp_schema::validate(&resolved.doc)?;

        let key = match &resolved.doc {
            Document::Identity(id) => id.k.first(),
            Document::Supersession(s) => s.k.first(),
            _ => continue,
        };
        let Some(key) = key else { continue };

        let public_key = atp_core::codec::base64url_decode(&key.p)?;
        let actual = atp_crypto::fingerprint_of(key.t, &public_key);
        if actual.as_str() != entry.fingerprint {
            return Err(EngineError::ExplorerInconsistency {
                fingerprint: chain_fingerprint.to_string(),
                claimed: entry.fingerprint.clone(),
                actual: actual.as_str().to_string(),
            });
        }

        if sig.f.as_str() == entry.fingerprint && verify_signature(doc, format, &key.p, sig).is_ok() {
            report.warn("signer authorized via Explorer-walked supersession chain, not the document's directly resolved key");
            return Ok(());
        }
    }

    Err(EngineError::NotAuthorized {
        signer: sig.f.as_str().to_string(),
        target: chain_fingerprint.to_string(),
    })
}

/// Verify a document against its variant-specific rules, given the resolver
/// used to look up any referenced identities and, optionally, an Explorer
/// used to walk a supersession chain for poison-pill authorization
/// (`revoke`/`att-revoke` signed by a historical rather than current key).
/// Chain-state ordering (first-seen-wins, revocation terminality, heartbeat
/// replay) is not this function's job, see [`crate::chain::ChainTracker`]
/// for that, driven by the caller in block order.
pub async fn verify(
    doc: &Document,
    format: DocumentFormat,
    resolver: &Resolver,
    explorer: Option<&ExplorerClient>,
) -> EngineResult<VerificationReport> {
    let mut report = VerificationReport::new();
    verify_common(doc, format, &mut report)?;

    match doc {
        Document::Identity(d) => {
            let key = d
                .k
                .iter()
                .find(|k| {
                    let Ok(pk) = atp_core::codec::base64url_decode(&k.p) else {
                        return false;
                    };
                    atp_crypto::fingerprint_of(k.t, &pk).as_str() == d.s.f.as_str()
                })
                .ok_or_else(|| EngineError::FingerprintMismatch {
                    expected: d.s.f.as_str().to_string(),
                    found: "none of k".to_string(),
                })?;
            verify_signature(doc, format, &key.p, &d.s)?;
        }

        Document::Attestation(d) => {
            let resolved = resolver.resolve_identity(&d.from.r#ref).await?;
            if resolved.fingerprint.as_str() != d.from.f.as_str() {
                return Err(EngineError::FingerprintMismatch {
                    expected: d.from.f.as_str().to_string(),
                    found: resolved.fingerprint.as_str().to_string(),
                });
            }
            verify_signature(doc, format, &resolved.key.p, &d.s)?;
        }

        Document::Heartbeat(d) => {
            let resolved = resolver.resolve_identity(&d.r#ref).await?;
            if resolved.fingerprint.as_str() != d.f.as_str() {
                return Err(EngineError::FingerprintMismatch {
                    expected: d.f.as_str().to_string(),
                    found: resolved.fingerprint.as_str().to_string(),
                });
            }
            verify_signature(doc, format, &resolved.key.p, &d.s)?;
        }

        Document::Supersession(d) => {
            let old_identity = resolver.resolve_identity(&d.target.r#ref).await?;
            if old_identity.fingerprint.as_str() != d.target.f.as_str() {
                return Err(EngineError::FingerprintMismatch {
                    expected: d.target.f.as_str().to_string(),
                    found: old_identity.fingerprint.as_str().to_string(),
                });
            }
            let old_sig = d
                .s
                .first()
                .ok_or_else(|| EngineError::SchemaViolation("supersession missing old-key signature".into()))?;
            verify_signature(doc, format, &old_identity.key.p, old_sig)?;

            let new_key = d
                .k
                .first()
                .ok_or_else(|| EngineError::SchemaViolation("supersession has no new keys".into()))?;
            let new_sig = d
                .s
                .get(1)
                .ok_or_else(|| EngineError::SchemaViolation("supersession missing new-key signature".into()))?;
            verify_signature(doc, format, &new_key.p, new_sig)?;
        }

        Document::Revocation(d) => {
            let resolved = resolver.resolve_identity(&d.target.r#ref).await?;
            if d.s.f.as_str() == resolved.fingerprint.as_str() {
                verify_signature(doc, format, &resolved.key.p, &d.s)?;
            } else if let Some(explorer) = explorer {
                verify_via_chain_walk(doc, format, resolver, explorer, d.target.f.as_str(), &d.s, &mut report).await?;
            } else {
                report.warn("revocation signer is not the resolved target key; full chain-walk verification requires an Explorer");
                return Err(EngineError::NotAuthorized {
                    signer: d.s.f.as_str().to_string(),
                    target: d.target.f.as_str().to_string(),
                });
            }
        }

        Document::AttestationRevocation(d) => {
            let attestation_resolved = resolver.fetch_doc(&d.r#ref).await?;
            let Document::Attestation(att) = &attestation_resolved.doc else {
                return Err(EngineError::SchemaViolation(format!(
                    "att-revoke ref does not point to an attestation (found {:?})",
                    attestation_resolved.doc.tag()
                )));
            };
            let attestor = resolver.resolve_identity(&att.from.r#ref).await?;
            if d.s.f.as_str() == attestor.fingerprint.as_str() {
                verify_signature(doc, format, &attestor.key.p, &d.s)?;
            } else if let Some(explorer) = explorer {
                verify_via_chain_walk(doc, format, resolver, explorer, att.from.f.as_str(), &d.s, &mut report).await?;
            } else {
                report.warn(
                    "attestation-revocation signer is not the ref'd attestor's current key; full chain-walk requires an Explorer",
                );
                return Err(EngineError::NotAuthorized {
                    signer: d.s.f.as_str().to_string(),
                    target: attestor.fingerprint.as_str().to_string(),
                });
            }
        }

        Document::Receipt(d) => {
            for (party, slot) in d.p.iter().zip(d.s.iter()) {
                let Some(sig) = slot else { continue };
                let resolved = resolver.resolve_identity(&party.r#ref).await?;
                if resolved.fingerprint.as_str() != party.f.as_str() {
                    return Err(EngineError::FingerprintMismatch {
                        expected: party.f.as_str().to_string(),
                        found: resolved.fingerprint.as_str().to_string(),
                    });
                }
                verify_signature(doc, format, &resolved.key.p, sig)?;
            }
        }
    }

    Ok(report)
}
