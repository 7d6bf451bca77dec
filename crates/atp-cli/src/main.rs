//! atp-cli
//!
//! Command-line front end for the Agent Trust Protocol engine. Builds,
//! signs, and verifies the seven document variants; manages per-fingerprint
//! key files; resolves chain references via a Bitcoin node.
//!
//! Usage:
//!   atp identity create   --name <name>
//!   atp identity show     --fingerprint <fp>
//!   atp identity inscribe --file <doc.json> [--content-type json|cbor]
//!   atp key import        --secret-hex <64-hex>
//!   atp key list
//!   atp key export        --fingerprint <fp>
//!   atp key delete        --fingerprint <fp>
//!   atp attest            --from-fp <fp> --from-ref <txid> --to-fp <fp> --to-ref <txid>
//!   atp att-revoke        --fp <fp> --ref <txid> --reason <reason>
//!   atp heartbeat         --fp <fp> --ref <txid> --seq <n>
//!   atp supersede         --old-fp <fp> --new-fp <fp> --target-ref <txid> --name <name> --reason <reason>
//!   atp revoke            --fp <fp> --target-ref <txid> --reason <reason>
//!   atp receipt create    --initiator-fp <fp> --party <fp:ref:role> --party <fp:ref:role> --type <s> --sum <n> --outcome <o>
//!   atp receipt countersign --signer-fp <fp> --file <doc.json> --index <n>
//!   atp verify            <file-or-txid>

use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use tracing::info;

use atp_core::codec::DocumentFormat;
use atp_core::{
    AttestationRevocationReason, ChainRef, Document, Fingerprint, PartyRef, ReceiptExchange, ReceiptOutcome,
    ReceiptParty, RevocationReason, SupersessionReason, TxId,
};
use atp_crypto::KeyPair;
use atp_explorer::ExplorerClient;
use atp_resolver::{Resolver, ResolverConfig};

mod chainstate;
mod keyfile;

#[derive(Parser, Debug)]
#[command(name = "atp", version, about = "Agent Trust Protocol engine CLI")]
struct Args {
    /// Directory holding per-fingerprint key files.
    #[arg(long, global = true, default_value = "~/.atp/keys")]
    keys_dir: PathBuf,

    /// Bitcoin node RPC endpoint, for commands that resolve chain references.
    #[arg(long, global = true, default_value = "http://127.0.0.1:8332")]
    rpc: String,

    #[arg(long, global = true, default_value = "")]
    rpc_user: String,

    #[arg(long, global = true, default_value = "")]
    rpc_pass: String,

    /// Explorer base URL, for `verify`'s Explorer-assisted supersession-chain
    /// walk (poison-pill revocation by a historical key). Omit to fall back
    /// to direct-resolution-only verification.
    #[arg(long, global = true)]
    explorer: Option<String>,

    /// Where `verify` persists chain-tracker state (first-seen-wins,
    /// revocation terminality, heartbeat replay) between invocations.
    #[arg(long, global = true, default_value = "~/.atp/chain-state.json")]
    state_file: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    Identity {
        #[command(subcommand)]
        action: IdentityAction,
    },
    Key {
        #[command(subcommand)]
        action: KeyAction,
    },
    Attest {
        #[arg(long)]
        from_fp: String,
        #[arg(long)]
        from_ref: String,
        #[arg(long)]
        to_fp: String,
        #[arg(long)]
        to_ref: String,
        #[arg(long)]
        ctx: Option<String>,
        #[arg(long)]
        vna: Option<i64>,
    },
    AttRevoke {
        #[arg(long)]
        fp: String,
        #[arg(long)]
        r#ref: String,
        #[arg(long)]
        reason: String,
    },
    Heartbeat {
        #[arg(long)]
        fp: String,
        #[arg(long)]
        r#ref: String,
        #[arg(long)]
        seq: u64,
        #[arg(long)]
        msg: Option<String>,
    },
    Supersede {
        #[arg(long)]
        old_fp: String,
        #[arg(long)]
        new_fp: String,
        #[arg(long)]
        target_ref: String,
        #[arg(long)]
        name: String,
        #[arg(long)]
        reason: String,
    },
    Revoke {
        #[arg(long)]
        fp: String,
        #[arg(long)]
        target_ref: String,
        #[arg(long)]
        reason: String,
    },
    Receipt {
        #[command(subcommand)]
        action: ReceiptAction,
    },
    Verify {
        file_or_txid: String,
    },
}

#[derive(Subcommand, Debug)]
enum IdentityAction {
    Create {
        #[arg(long)]
        name: String,
    },
    Show {
        #[arg(long)]
        fingerprint: String,
    },
    Inscribe {
        #[arg(long)]
        file: PathBuf,
        #[arg(long, default_value = "json")]
        content_type: String,
    },
}

#[derive(Subcommand, Debug)]
enum KeyAction {
    Import {
        #[arg(long)]
        secret_hex: String,
    },
    List,
    Export {
        #[arg(long)]
        fingerprint: String,
    },
    Delete {
        #[arg(long)]
        fingerprint: String,
    },
}

#[derive(Subcommand, Debug)]
enum ReceiptAction {
    Create {
        #[arg(long)]
        initiator_fp: String,
        /// `fingerprint:txid:role`, repeatable, initiator included.
        #[arg(long = "party")]
        parties: Vec<String>,
        #[arg(long = "type")]
        exchange_type: String,
        #[arg(long)]
        sum: i64,
        #[arg(long)]
        outcome: String,
    },
    Countersign {
        #[arg(long)]
        signer_fp: String,
        #[arg(long)]
        file: PathBuf,
        #[arg(long)]
        index: usize,
    },
}

fn now() -> i64 {
    chrono::Utc::now().timestamp()
}

fn expand_tilde(path: &Path) -> PathBuf {
    if let Ok(stripped) = path.strip_prefix("~") {
        if let Ok(home) = std::env::var("HOME").or_else(|_| std::env::var("USERPROFILE")) {
            return PathBuf::from(home).join(stripped);
        }
    }
    path.to_path_buf()
}

fn parse_txid(s: &str) -> anyhow::Result<TxId> {
    TxId::parse(s).map_err(|e| anyhow::anyhow!("{e}"))
}

fn parse_reason<T>(s: &str) -> anyhow::Result<T>
where
    T: serde::de::DeserializeOwned,
{
    serde_json::from_value(serde_json::Value::String(s.to_string())).context("unrecognized reason")
}

fn print_document(doc: &Document) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(doc)?);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_env_filter("warn,atp_cli=info").init();

    let args = Args::parse();
    let keys_dir = expand_tilde(&args.keys_dir);

    match args.command {
        Command::Identity { action } => cmd_identity(action, &keys_dir),
        Command::Key { action } => cmd_key(action, &keys_dir),
        Command::Attest {
            from_fp,
            from_ref,
            to_fp,
            to_ref,
            ctx,
            vna,
        } => cmd_attest(&keys_dir, from_fp, from_ref, to_fp, to_ref, ctx, vna),
        Command::AttRevoke { fp, r#ref, reason } => cmd_att_revoke(&keys_dir, fp, r#ref, reason),
        Command::Heartbeat { fp, r#ref, seq, msg } => cmd_heartbeat(&keys_dir, fp, r#ref, seq, msg),
        Command::Supersede {
            old_fp,
            new_fp,
            target_ref,
            name,
            reason,
        } => cmd_supersede(&keys_dir, old_fp, new_fp, target_ref, name, reason),
        Command::Revoke { fp, target_ref, reason } => cmd_revoke(&keys_dir, fp, target_ref, reason),
        Command::Receipt { action } => cmd_receipt(action, &keys_dir),
        Command::Verify { file_or_txid } => {
            let state_file = expand_tilde(&args.state_file);
            cmd_verify(
                &file_or_txid,
                &args.rpc,
                &args.rpc_user,
                &args.rpc_pass,
                args.explorer.as_deref(),
                &state_file,
            )
            .await
        }
    }
}

fn cmd_identity(action: IdentityAction, keys_dir: &Path) -> anyhow::Result<()> {
    match action {
        IdentityAction::Create { name } => {
            let kp = KeyPair::generate();
            let path = keyfile::save(keys_dir, &kp)?;
            let doc = atp_builders::build_identity(&kp, name, vec![kp.key_object()], None, now(), DocumentFormat::Json)?;
            info!(fingerprint = %kp.fingerprint(), "generated identity keypair");
            println!("Fingerprint: {}", kp.fingerprint());
            println!("Keyfile:     {}", path.display());
            print_document(&doc)
        }
        IdentityAction::Show { fingerprint } => {
            let kp = keyfile::load(keys_dir, &fingerprint)?;
            println!("Fingerprint: {}", kp.fingerprint());
            println!("Public key:  {}", kp.key_object().p);
            Ok(())
        }
        IdentityAction::Inscribe { file, content_type } => {
            let json = std::fs::read_to_string(&file).with_context(|| format!("reading {}", file.display()))?;
            let doc: Document = serde_json::from_str(&json).context("parsing document JSON")?;
            let format = match content_type.as_str() {
                "json" => DocumentFormat::Json,
                "cbor" => DocumentFormat::Cbor,
                other => bail!("unknown content type {other:?}, expected json or cbor"),
            };
            let bytes = atp_builders::finalize(&doc, format)?;
            let script = atp_envelope::build(&bytes, format.content_type())?;
            println!("{}", hex::encode(script.as_bytes()));
            Ok(())
        }
    }
}

fn cmd_key(action: KeyAction, keys_dir: &Path) -> anyhow::Result<()> {
    match action {
        KeyAction::Import { secret_hex } => {
            let bytes = hex::decode(&secret_hex).context("decoding secret hex")?;
            let secret: [u8; 32] = bytes
                .as_slice()
                .try_into()
                .map_err(|_| anyhow::anyhow!("secret must be 32 bytes (64 hex chars)"))?;
            let kp = KeyPair::from_secret_bytes(&secret);
            let path = keyfile::save(keys_dir, &kp)?;
            println!("Imported fingerprint {} -> {}", kp.fingerprint(), path.display());
            Ok(())
        }
        KeyAction::List => {
            for fingerprint in keyfile::list(keys_dir)? {
                println!("{fingerprint}");
            }
            Ok(())
        }
        KeyAction::Export { fingerprint } => {
            println!("{}", keyfile::export_json(keys_dir, &fingerprint)?);
            Ok(())
        }
        KeyAction::Delete { fingerprint } => {
            keyfile::delete(keys_dir, &fingerprint)?;
            println!("Deleted {fingerprint}");
            Ok(())
        }
    }
}

fn cmd_attest(
    keys_dir: &Path,
    from_fp: String,
    from_ref: String,
    to_fp: String,
    to_ref: String,
    ctx: Option<String>,
    vna: Option<i64>,
) -> anyhow::Result<()> {
    let kp = keyfile::load(keys_dir, &from_fp)?;
    let from = PartyRef {
        f: kp.fingerprint().clone(),
        r#ref: ChainRef::mainnet(parse_txid(&from_ref)?),
    };
    let to = PartyRef {
        f: Fingerprint::new(to_fp),
        r#ref: ChainRef::mainnet(parse_txid(&to_ref)?),
    };
    let doc = atp_builders::build_attestation(&kp, from, to, ctx, vna, now(), DocumentFormat::Json)?;
    print_document(&doc)
}

fn cmd_att_revoke(keys_dir: &Path, fp: String, r#ref: String, reason: String) -> anyhow::Result<()> {
    let kp = keyfile::load(keys_dir, &fp)?;
    let reference = ChainRef::mainnet(parse_txid(&r#ref)?);
    let reason: AttestationRevocationReason = parse_reason(&reason)?;
    let doc = atp_builders::build_attestation_revocation(&kp, reference, reason, now(), DocumentFormat::Json)?;
    print_document(&doc)
}

fn cmd_heartbeat(keys_dir: &Path, fp: String, r#ref: String, seq: u64, msg: Option<String>) -> anyhow::Result<()> {
    let kp = keyfile::load(keys_dir, &fp)?;
    let reference = ChainRef::mainnet(parse_txid(&r#ref)?);
    let doc = atp_builders::build_heartbeat(&kp, reference, seq, msg, now(), DocumentFormat::Json)?;
    print_document(&doc)
}

fn cmd_supersede(
    keys_dir: &Path,
    old_fp: String,
    new_fp: String,
    target_ref: String,
    name: String,
    reason: String,
) -> anyhow::Result<()> {
    let old_kp = keyfile::load(keys_dir, &old_fp)?;
    let new_kp = keyfile::load(keys_dir, &new_fp)?;
    let target = PartyRef {
        f: old_kp.fingerprint().clone(),
        r#ref: ChainRef::mainnet(parse_txid(&target_ref)?),
    };
    let reason: SupersessionReason = parse_reason(&reason)?;
    let doc = atp_builders::build_supersession(
        &old_kp,
        &new_kp,
        target,
        name,
        vec![new_kp.key_object()],
        None,
        reason,
        now(),
        DocumentFormat::Json,
    )?;
    print_document(&doc)
}

fn cmd_revoke(keys_dir: &Path, fp: String, target_ref: String, reason: String) -> anyhow::Result<()> {
    let kp = keyfile::load(keys_dir, &fp)?;
    let target = PartyRef {
        f: kp.fingerprint().clone(),
        r#ref: ChainRef::mainnet(parse_txid(&target_ref)?),
    };
    let reason: RevocationReason = parse_reason(&reason)?;
    let doc = atp_builders::build_revocation(&kp, target, reason, now(), DocumentFormat::Json)?;
    print_document(&doc)
}

fn cmd_receipt(action: ReceiptAction, keys_dir: &Path) -> anyhow::Result<()> {
    match action {
        ReceiptAction::Create {
            initiator_fp,
            parties,
            exchange_type,
            sum,
            outcome,
        } => {
            let kp = keyfile::load(keys_dir, &initiator_fp)?;
            let mut parsed_parties = Vec::new();
            for raw in &parties {
                let mut fields = raw.splitn(3, ':');
                let fp = fields.next().context("party missing fingerprint")?;
                let txid = fields.next().context("party missing ref txid")?;
                let role = fields.next().context("party missing role")?;
                parsed_parties.push(ReceiptParty {
                    f: Fingerprint::new(fp),
                    r#ref: ChainRef::mainnet(parse_txid(txid)?),
                    role: role.to_string(),
                });
            }
            let initiator_index = parsed_parties
                .iter()
                .position(|p| p.f.as_str() == kp.fingerprint().as_str())
                .context("initiator fingerprint not found among --party entries")?;
            let exchange = ReceiptExchange {
                r#type: exchange_type,
                sum,
                val: None,
            };
            let outcome: ReceiptOutcome = parse_reason(&outcome)?;
            let doc = atp_builders::build_receipt(
                &kp,
                initiator_index,
                parsed_parties,
                exchange,
                outcome,
                now(),
                DocumentFormat::Json,
            )?;
            print_document(&doc)
        }
        ReceiptAction::Countersign { signer_fp, file, index } => {
            let kp = keyfile::load(keys_dir, &signer_fp)?;
            let json = std::fs::read_to_string(&file).with_context(|| format!("reading {}", file.display()))?;
            let doc: Document = serde_json::from_str(&json).context("parsing document JSON")?;
            let countersigned = atp_builders::countersign_receipt(&kp, doc, index, DocumentFormat::Json)?;
            print_document(&countersigned)
        }
    }
}

/// The stable key a chain's events accumulate under across invocations. With
/// an Explorer configured, an intermediate or rotated fingerprint resolves
/// back to its genesis; without one, each fingerprint tracks itself and a
/// `verify` run can only catch replay within what it's directly handed.
async fn chain_key_for(fingerprint: &str, explorer: Option<&ExplorerClient>) -> String {
    if let Some(explorer) = explorer {
        if let Ok(state) = explorer.identity_state(fingerprint).await {
            return state.genesis_fingerprint;
        }
    }
    fingerprint.to_string()
}

fn record_chain_event(tracker: &mut atp_verifier::ChainTracker, chain_key: &str, doc: &Document) -> anyhow::Result<()> {
    match doc {
        Document::Identity(d) => {
            if !tracker.record_identity(chain_key, d.s.f.as_str()) {
                bail!("stale duplicate identity for chain {chain_key}");
            }
        }
        Document::Supersession(d) => {
            let new_sig = d.s.get(1).context("supersession missing new-key signature")?;
            if !tracker
                .record_supersession(chain_key, d.target.f.as_str(), new_sig.f.as_str())
                .map_err(|e| anyhow::anyhow!("{e}"))?
            {
                bail!("stale supersession for chain {chain_key}: old state already rotated");
            }
        }
        Document::Revocation(_) => {
            tracker.record_revocation(chain_key).map_err(|e| anyhow::anyhow!("{e}"))?;
        }
        Document::Heartbeat(d) => {
            if !tracker
                .record_heartbeat(chain_key, d.seq)
                .map_err(|e| anyhow::anyhow!("{e}"))?
            {
                bail!("duplicate heartbeat seq {} replayed for chain {chain_key}", d.seq);
            }
        }
        Document::Attestation(_) | Document::AttestationRevocation(_) | Document::Receipt(_) => {}
    }
    Ok(())
}

async fn cmd_verify(
    file_or_txid: &str,
    rpc: &str,
    rpc_user: &str,
    rpc_pass: &str,
    explorer_url: Option<&str>,
    state_file: &Path,
) -> anyhow::Result<()> {
    let is_txid = file_or_txid.len() == 64 && file_or_txid.bytes().all(|b| b.is_ascii_hexdigit());

    let resolver = Resolver::new(ResolverConfig::new(rpc, rpc_user, rpc_pass))?;
    let explorer = explorer_url.map(ExplorerClient::new);

    let (doc, format) = if is_txid {
        let reference = ChainRef::mainnet(parse_txid(file_or_txid)?);
        let resolved = resolver.fetch_doc(&reference).await?;
        (resolved.doc, resolved.format)
    } else {
        let json = std::fs::read_to_string(file_or_txid).with_context(|| format!("reading {file_or_txid}"))?;
        (
            serde_json::from_str(&json).context("parsing document JSON")?,
            DocumentFormat::Json,
        )
    };

    match atp_verifier::verify(&doc, format, &resolver, explorer.as_ref()).await {
        Ok(report) => {
            println!("OK: {} verified", doc.tag());
            for warning in &report.warnings {
                println!("warning: {warning}");
            }

            if let Some(fingerprint) = chain_fingerprint(&doc) {
                let chain_key = chain_key_for(&fingerprint, explorer.as_ref()).await;
                let mut tracker = chainstate::load(state_file)?;
                match record_chain_event(&mut tracker, &chain_key, &doc) {
                    Ok(()) => chainstate::save(state_file, &tracker)?,
                    Err(e) => {
                        eprintln!("FAILED: {e}");
                        std::process::exit(1);
                    }
                }
            }
            Ok(())
        }
        Err(e) => {
            eprintln!("FAILED: {e}");
            std::process::exit(1);
        }
    }
}

/// The fingerprint a document's chain-tracker event should be filed under,
/// for variants [`ChainTracker`](atp_verifier::ChainTracker) has state for.
fn chain_fingerprint(doc: &Document) -> Option<String> {
    match doc {
        Document::Identity(d) => Some(d.s.f.as_str().to_string()),
        Document::Supersession(d) => Some(d.target.f.as_str().to_string()),
        Document::Revocation(d) => Some(d.target.f.as_str().to_string()),
        Document::Heartbeat(d) => Some(d.f.as_str().to_string()),
        Document::Attestation(_) | Document::AttestationRevocation(_) | Document::Receipt(_) => None,
    }
}
