//! Per-fingerprint key file persistence: one JSON object per file, mode
//! 0600, under a per-user keys directory.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use serde::{Deserialize, Serialize};

use atp_core::codec::base64url_encode;
use atp_crypto::KeyPair;

#[derive(Serialize, Deserialize)]
struct KeyFile {
    #[serde(rename = "type")]
    key_type: String,
    fingerprint: String,
    #[serde(rename = "publicKey")]
    public_key: String,
    #[serde(rename = "privateKey")]
    private_key: String,
}

fn path_for(keys_dir: &Path, fingerprint: &str) -> PathBuf {
    keys_dir.join(format!("{fingerprint}.json"))
}

/// Persist `keypair` under `keys_dir`, creating the directory if needed and
/// restricting the file to owner read/write only.
pub fn save(keys_dir: &Path, keypair: &KeyPair) -> anyhow::Result<PathBuf> {
    fs::create_dir_all(keys_dir).with_context(|| format!("creating keys directory {}", keys_dir.display()))?;

    let file = KeyFile {
        key_type: "ed25519".to_string(),
        fingerprint: keypair.fingerprint().as_str().to_string(),
        public_key: base64url_encode(keypair.verifying_key().as_bytes()),
        private_key: base64url_encode(&keypair.secret_bytes()),
    };

    let path = path_for(keys_dir, &file.fingerprint);
    let json = serde_json::to_string_pretty(&file)?;
    fs::write(&path, json).with_context(|| format!("writing keyfile {}", path.display()))?;
    set_owner_only(&path)?;
    Ok(path)
}

pub fn load(keys_dir: &Path, fingerprint: &str) -> anyhow::Result<KeyPair> {
    let path = path_for(keys_dir, fingerprint);
    let json = fs::read_to_string(&path).with_context(|| format!("reading keyfile {}", path.display()))?;
    let file: KeyFile = serde_json::from_str(&json).context("parsing keyfile, is it a valid ATP keyfile?")?;

    let secret = atp_core::codec::base64url_decode(&file.private_key)?;
    let secret: [u8; 32] = secret
        .as_slice()
        .try_into()
        .map_err(|_| anyhow::anyhow!("keyfile private key is not 32 bytes"))?;
    let keypair = KeyPair::from_secret_bytes(&secret);

    if keypair.fingerprint().as_str() != file.fingerprint {
        bail!(
            "keyfile {} is corrupt: stored fingerprint {} does not match derived fingerprint {}",
            path.display(),
            file.fingerprint,
            keypair.fingerprint()
        );
    }
    Ok(keypair)
}

/// List the fingerprints of every key file under `keys_dir`.
pub fn list(keys_dir: &Path) -> anyhow::Result<Vec<String>> {
    if !keys_dir.exists() {
        return Ok(Vec::new());
    }
    let mut fingerprints = Vec::new();
    for entry in fs::read_dir(keys_dir).with_context(|| format!("reading {}", keys_dir.display()))? {
        let entry = entry?;
        if let Some(name) = entry.path().file_stem().and_then(|s| s.to_str()) {
            if entry.path().extension().and_then(|e| e.to_str()) == Some("json") {
                fingerprints.push(name.to_string());
            }
        }
    }
    fingerprints.sort();
    Ok(fingerprints)
}

pub fn export_json(keys_dir: &Path, fingerprint: &str) -> anyhow::Result<String> {
    let path = path_for(keys_dir, fingerprint);
    fs::read_to_string(&path).with_context(|| format!("reading keyfile {}", path.display()))
}

pub fn delete(keys_dir: &Path, fingerprint: &str) -> anyhow::Result<()> {
    let path = path_for(keys_dir, fingerprint);
    fs::remove_file(&path).with_context(|| format!("deleting keyfile {}", path.display()))
}

#[cfg(unix)]
fn set_owner_only(path: &Path) -> anyhow::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    let mut perms = fs::metadata(path)?.permissions();
    perms.set_mode(0o600);
    fs::set_permissions(path, perms)?;
    Ok(())
}

#[cfg(not(unix))]
fn set_owner_only(_path: &Path) -> anyhow::Result<()> {
    Ok(())
}
