//! Resolves a [`ChainRef`] to the document it anchors, by talking directly
//! to a Bitcoin node's JSON-RPC interface. The node is the primary source of
//! truth; chain walking beyond a single reference belongs to `atp-verifier`
//! and the explorer client, never here.

use atp_core::codec::{decode_document, DocumentFormat};
use atp_core::{ChainRef, Document, EngineError, EngineResult, Fingerprint, KeyObject};

/// A document as fetched from the node, paired with the wire format it was
/// inscribed in. The format must travel with the document: the signing
/// payload, and therefore signature verification, differs between the
/// JSON and CBOR encodings of otherwise-identical content.
#[derive(Clone, Debug)]
pub struct ResolvedDocument {
    pub doc: Document,
    pub format: DocumentFormat,
}

/// An identity resolved from the chain: its first key plus that key's
/// computed fingerprint.
#[derive(Clone, Debug)]
pub struct ResolvedIdentity {
    pub key: KeyObject,
    pub fingerprint: Fingerprint,
}

/// Connection details for the Bitcoin node backing a resolver.
#[derive(Clone, Debug)]
pub struct ResolverConfig {
    pub url: String,
    pub rpc_user: String,
    pub rpc_password: String,
    pub timeout_secs: u64,
}

impl ResolverConfig {
    pub fn new(url: impl Into<String>, rpc_user: impl Into<String>, rpc_password: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            rpc_user: rpc_user.into(),
            rpc_password: rpc_password.into(),
            timeout_secs: 30,
        }
    }
}

/// Thin hand-rolled JSON-RPC 2.0 client over `reqwest`, matching the
/// node-facing wallet client's shape rather than pulling in a full RPC
/// framework for a single method.
pub struct Resolver {
    config: ResolverConfig,
    client: reqwest::Client,
}

impl Resolver {
    pub fn new(config: ResolverConfig) -> EngineResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| EngineError::NetworkUnavailable(format!("building http client: {e}")))?;
        Ok(Self { config, client })
    }

    async fn call(&self, method: &str, params: serde_json::Value) -> EngineResult<serde_json::Value> {
        let body = serde_json::json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params,
            "id": 1,
        });

        let resp = self
            .client
            .post(&self.config.url)
            .basic_auth(&self.config.rpc_user, Some(&self.config.rpc_password))
            .json(&body)
            .send()
            .await
            .map_err(|e| EngineError::NetworkUnavailable(format!("connecting to node at {}: {e}", self.config.url)))?;

        let json: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| EngineError::NetworkUnavailable(format!("parsing RPC response: {e}")))?;

        if let Some(err) = json.get("error").filter(|e| !e.is_null()) {
            return Err(EngineError::NetworkUnavailable(format!("RPC error: {err}")));
        }

        Ok(json["result"].clone())
    }

    /// Fetch the raw document (unvalidated) anchored by `reference`.
    ///
    /// 1. Assert the txid is well-formed.
    /// 2. `getrawtransaction(txid, verbose=true)`.
    /// 3. Parse an inscription envelope out of the first input's witness.
    /// 4. Decode the payload per its content-type tag.
    pub async fn fetch_doc(&self, reference: &ChainRef) -> EngineResult<ResolvedDocument> {
        let txid = reference.id.as_str();

        let result = self
            .call("getrawtransaction", serde_json::json!([txid, true]))
            .await?;

        let witness_hex: Vec<String> = result
            .get("vin")
            .and_then(|v| v.as_array())
            .and_then(|vin| vin.first())
            .and_then(|input| input.get("txinwitness"))
            .and_then(|w| serde_json::from_value(w.clone()).ok())
            .ok_or_else(|| EngineError::UnresolvableReference {
                reference: reference.to_string(),
                reason: "transaction has no witness data".into(),
            })?;

        let mut witness = bitcoin::Witness::new();
        for hex_elem in &witness_hex {
            let bytes = hex::decode(hex_elem)
                .map_err(|e| EngineError::CodecError(format!("decoding witness hex: {e}")))?;
            witness.push(bytes);
        }

        let parsed = atp_envelope::parse_witness(&witness)?;

        let format = DocumentFormat::from_content_type(&parsed.content_type).ok_or_else(|| {
            EngineError::UnresolvableReference {
                reference: reference.to_string(),
                reason: format!("unrecognized content type {:?}", parsed.content_type),
            }
        })?;

        let doc = decode_document(&parsed.body, format)?;
        Ok(ResolvedDocument { doc, format })
    }

    /// Resolve `reference` to an identity: schema-validate the fetched
    /// document, require it to be an `id` or `super` variant, and return its
    /// first key along with that key's computed fingerprint.
    pub async fn resolve_identity(&self, reference: &ChainRef) -> EngineResult<ResolvedIdentity> {
        let resolved = self.fetch_doc(reference).await?;
        let doc = &resolved.doc;
        atp_schema::validate(doc)?;

        let key = match doc {
            Document::Identity(d) => d.k.first(),
            Document::Supersession(d) => d.k.first(),
            _ => {
                return Err(EngineError::UnresolvableReference {
                    reference: reference.to_string(),
                    reason: format!("document tag {:?} is not an identity-bearing variant", doc.tag()),
                })
            }
        };

        let key = key
            .ok_or_else(|| EngineError::UnresolvableReference {
                reference: reference.to_string(),
                reason: "identity document has no keys".into(),
            })?
            .clone();

        let public_key = atp_core::codec::base64url_decode(&key.p)?;
        let fingerprint = atp_crypto::fingerprint_of(key.t, &public_key);
        Ok(ResolvedIdentity { key, fingerprint })
    }
}
