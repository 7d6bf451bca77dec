//! End-to-end tests wiring together builders, the envelope codec, and the
//! verifier against a mock Bitcoin node.
//!
//! The mock node answers `getrawtransaction` by looking a txid up in an
//! in-memory map of inscribed scripts, mirroring the real node's witness
//! shape closely enough for the resolver to parse it.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use jsonrpsee::server::{Server, ServerHandle};
use jsonrpsee::types::ErrorObjectOwned;
use jsonrpsee::RpcModule;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use atp_core::codec::DocumentFormat;
use atp_core::{ChainRef, Document, PartyRef, RevocationReason, SupersessionReason, TxId};
use atp_crypto::KeyPair;
use atp_explorer::ExplorerClient;
use atp_resolver::{Resolver, ResolverConfig};

async fn spawn_mock_node(scripts: HashMap<String, bitcoin::ScriptBuf>) -> (SocketAddr, ServerHandle) {
    let scripts = Arc::new(scripts);
    let server = Server::builder().build("127.0.0.1:0").await.expect("bind mock node");
    let addr = server.local_addr().expect("mock node local addr");

    let mut module = RpcModule::new(());
    module
        .register_method("getrawtransaction", move |params, _, _| {
            let (txid, _verbose): (String, bool) = params.parse().expect("getrawtransaction params");
            match scripts.get(&txid) {
                Some(script) => {
                    let witness_hex = hex::encode(script.as_bytes());
                    Ok(serde_json::json!({ "vin": [{ "txinwitness": [witness_hex] }] }))
                }
                None => Err(ErrorObjectOwned::owned(-5, "No such transaction", None::<()>)),
            }
        })
        .expect("register getrawtransaction");

    let handle = server.start(module);
    (addr, handle)
}

/// A minimal GET-only HTTP/1.1 responder standing in for an Explorer
/// instance: no routing framework exists in this workspace for a single
/// test-only REST server, so requests are parsed by hand, same spirit as
/// `spawn_mock_node`'s hand-rolled JSON-RPC method above.
async fn spawn_mock_explorer(routes: HashMap<String, serde_json::Value>) -> (SocketAddr, JoinHandle<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind mock explorer");
    let addr = listener.local_addr().expect("mock explorer local addr");
    let routes = Arc::new(routes);

    let handle = tokio::spawn(async move {
        loop {
            let Ok((mut stream, _)) = listener.accept().await else {
                break;
            };
            let routes = routes.clone();
            tokio::spawn(async move {
                let mut buf = vec![0u8; 4096];
                let n = stream.read(&mut buf).await.unwrap_or(0);
                let request = String::from_utf8_lossy(&buf[..n]);
                let path = request
                    .lines()
                    .next()
                    .and_then(|line| line.split_whitespace().nth(1))
                    .unwrap_or("/")
                    .to_string();

                let response = match routes.get(&path) {
                    Some(json) => {
                        let body = json.to_string();
                        format!(
                            "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                            body.len(),
                            body
                        )
                    }
                    None => "HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\nConnection: close\r\n\r\n".to_string(),
                };
                let _ = stream.write_all(response.as_bytes()).await;
            });
        }
    });

    (addr, handle)
}

fn explorer_for(addr: SocketAddr) -> ExplorerClient {
    ExplorerClient::new(format!("http://{addr}"))
}

fn txid(byte: u8) -> TxId {
    TxId::parse(&hex::encode([byte; 32])).unwrap()
}

fn inscribe(doc: &Document, format: DocumentFormat) -> bitcoin::ScriptBuf {
    let bytes = atp_builders::finalize(doc, format).expect("finalize document");
    atp_envelope::build(&bytes, format.content_type()).expect("build envelope")
}

fn resolver_for(addr: SocketAddr) -> Resolver {
    Resolver::new(ResolverConfig::new(format!("http://{addr}"), "user", "pass")).expect("build resolver")
}

#[tokio::test]
async fn attestation_verifies_against_a_resolved_identity() {
    let owner = KeyPair::generate();
    let identity_ref = ChainRef::mainnet(txid(0xA1));
    let identity = atp_builders::build_identity(
        &owner,
        "Shrike",
        vec![owner.key_object()],
        None,
        now(),
        DocumentFormat::Json,
    )
    .unwrap();

    let attestor = KeyPair::generate();
    let attestor_ref = ChainRef::mainnet(txid(0xB2));
    let attestor_identity =
        atp_builders::build_identity(&attestor, "Corvid", vec![attestor.key_object()], None, now(), DocumentFormat::Json)
            .unwrap();

    let attestation = atp_builders::build_attestation(
        &attestor,
        PartyRef {
            f: attestor.fingerprint().clone(),
            r#ref: attestor_ref.clone(),
        },
        PartyRef {
            f: owner.fingerprint().clone(),
            r#ref: identity_ref.clone(),
        },
        Some("code-review".into()),
        None,
        now(),
        DocumentFormat::Json,
    )
    .unwrap();

    let mut scripts = HashMap::new();
    scripts.insert(identity_ref.id.as_str().to_string(), inscribe(&identity, DocumentFormat::Json));
    scripts.insert(
        attestor_ref.id.as_str().to_string(),
        inscribe(&attestor_identity, DocumentFormat::Json),
    );
    let (addr, _handle) = spawn_mock_node(scripts).await;
    let resolver = resolver_for(addr);

    let report = atp_verifier::verify(&attestation, DocumentFormat::Json, &resolver, None)
        .await
        .expect("attestation should verify");
    assert!(report.is_clean());
}

#[tokio::test]
async fn tampered_signature_is_rejected() {
    let owner = KeyPair::generate();
    let mut identity =
        atp_builders::build_identity(&owner, "Shrike", vec![owner.key_object()], None, now(), DocumentFormat::Json)
            .unwrap();
    if let Document::Identity(ref mut d) = identity {
        d.n = "Tampered".to_string();
    }

    let resolver = resolver_for("127.0.0.1:1".parse().unwrap());
    let err = atp_verifier::verify(&identity, DocumentFormat::Json, &resolver, None)
        .await
        .unwrap_err();
    assert!(matches!(err, atp_core::EngineError::CryptoFailure { .. }));
}

#[tokio::test]
async fn supersession_resolves_old_key_and_verifies_both_signatures() {
    let old_kp = KeyPair::generate();
    let new_kp = KeyPair::generate();
    let identity_ref = ChainRef::mainnet(txid(0xC3));
    let identity = atp_builders::build_identity(
        &old_kp,
        "Shrike",
        vec![old_kp.key_object()],
        None,
        now(),
        DocumentFormat::Json,
    )
    .unwrap();

    let supersession = atp_builders::build_supersession(
        &old_kp,
        &new_kp,
        PartyRef {
            f: old_kp.fingerprint().clone(),
            r#ref: identity_ref.clone(),
        },
        "Shrike",
        vec![new_kp.key_object()],
        None,
        SupersessionReason::KeyRotation,
        now(),
        DocumentFormat::Json,
    )
    .unwrap();

    let mut scripts = HashMap::new();
    scripts.insert(identity_ref.id.as_str().to_string(), inscribe(&identity, DocumentFormat::Json));
    let (addr, _handle) = spawn_mock_node(scripts).await;
    let resolver = resolver_for(addr);

    let report = atp_verifier::verify(&supersession, DocumentFormat::Json, &resolver, None)
        .await
        .expect("supersession should verify");
    assert!(report.is_clean());
}

#[tokio::test]
async fn revocation_by_a_historical_key_verifies_via_explorer_chain_walk() {
    let genesis_kp = KeyPair::generate();
    let rotated_kp = KeyPair::generate();
    let genesis_ref = ChainRef::mainnet(txid(0xD1));
    let rotation_ref = ChainRef::mainnet(txid(0xD2));

    let genesis_identity = atp_builders::build_identity(
        &genesis_kp,
        "Shrike",
        vec![genesis_kp.key_object()],
        None,
        now(),
        DocumentFormat::Json,
    )
    .unwrap();

    let rotation = atp_builders::build_supersession(
        &genesis_kp,
        &rotated_kp,
        PartyRef {
            f: genesis_kp.fingerprint().clone(),
            r#ref: genesis_ref.clone(),
        },
        "Shrike",
        vec![rotated_kp.key_object()],
        None,
        SupersessionReason::KeyRotation,
        now(),
        DocumentFormat::Json,
    )
    .unwrap();

    // Signed by the genesis key, which the rotation above already retired.
    let revocation = atp_builders::build_revocation(
        &genesis_kp,
        PartyRef {
            f: rotated_kp.fingerprint().clone(),
            r#ref: rotation_ref.clone(),
        },
        RevocationReason::KeyCompromised,
        now(),
        DocumentFormat::Json,
    )
    .unwrap();

    let mut scripts = HashMap::new();
    scripts.insert(genesis_ref.id.as_str().to_string(), inscribe(&genesis_identity, DocumentFormat::Json));
    scripts.insert(rotation_ref.id.as_str().to_string(), inscribe(&rotation, DocumentFormat::Json));
    let (node_addr, _node_handle) = spawn_mock_node(scripts).await;
    let resolver = resolver_for(node_addr);

    let chain_record = serde_json::json!({
        "entries": [
            { "fingerprint": genesis_kp.fingerprint().as_str(), "txid": genesis_ref.id.as_str(), "block_height": 100, "block_index": 0 },
            { "fingerprint": rotated_kp.fingerprint().as_str(), "txid": rotation_ref.id.as_str(), "block_height": 101, "block_index": 0 },
        ],
        "revocation_txid": null,
    });
    let mut routes = HashMap::new();
    routes.insert(
        format!("/identity/{}/chain", rotated_kp.fingerprint().as_str()),
        chain_record,
    );
    let (explorer_addr, _explorer_handle) = spawn_mock_explorer(routes).await;
    let explorer = explorer_for(explorer_addr);

    let report = atp_verifier::verify(&revocation, DocumentFormat::Json, &resolver, Some(&explorer))
        .await
        .expect("revocation by a historical chain key should verify via the Explorer walk");
    assert!(!report.is_clean(), "chain-walked authorization should be flagged, not silent");
}

#[tokio::test]
async fn revocation_by_a_historical_key_without_explorer_is_not_authorized() {
    let genesis_kp = KeyPair::generate();
    let rotated_kp = KeyPair::generate();
    let rotation_ref = ChainRef::mainnet(txid(0xE1));

    let rotation = atp_builders::build_supersession(
        &genesis_kp,
        &rotated_kp,
        PartyRef {
            f: genesis_kp.fingerprint().clone(),
            r#ref: ChainRef::mainnet(txid(0xE0)),
        },
        "Shrike",
        vec![rotated_kp.key_object()],
        None,
        SupersessionReason::KeyRotation,
        now(),
        DocumentFormat::Json,
    )
    .unwrap();

    let revocation = atp_builders::build_revocation(
        &genesis_kp,
        PartyRef {
            f: rotated_kp.fingerprint().clone(),
            r#ref: rotation_ref.clone(),
        },
        RevocationReason::KeyCompromised,
        now(),
        DocumentFormat::Json,
    )
    .unwrap();

    let mut scripts = HashMap::new();
    scripts.insert(rotation_ref.id.as_str().to_string(), inscribe(&rotation, DocumentFormat::Json));
    let (node_addr, _node_handle) = spawn_mock_node(scripts).await;
    let resolver = resolver_for(node_addr);

    let err = atp_verifier::verify(&revocation, DocumentFormat::Json, &resolver, None)
        .await
        .unwrap_err();
    assert!(matches!(err, atp_core::EngineError::NotAuthorized { .. }));
}

fn now() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_secs() as i64
}
