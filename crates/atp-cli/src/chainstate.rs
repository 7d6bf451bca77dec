//! Persisted [`ChainTracker`] state: one JSON file recording block-ordered
//! identity-chain events (`id`, `super`, `revoke`, `hb`) across successive
//! `atp verify` invocations. Without this file on disk, first-seen-wins and
//! revocation-terminality would only ever see the single document each
//! invocation is handed, never the history around it.

use std::fs;
use std::path::Path;

use anyhow::Context;
use atp_verifier::ChainTracker;

pub fn load(path: &Path) -> anyhow::Result<ChainTracker> {
    if !path.exists() {
        return Ok(ChainTracker::new());
    }
    let json = fs::read_to_string(path).with_context(|| format!("reading chain state {}", path.display()))?;
    serde_json::from_str(&json).with_context(|| format!("parsing chain state {}", path.display()))
}

pub fn save(path: &Path, tracker: &ChainTracker) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).with_context(|| format!("creating {}", parent.display()))?;
    }
    let json = serde_json::to_string_pretty(tracker).context("serializing chain state")?;
    fs::write(path, json).with_context(|| format!("writing chain state {}", path.display()))
}
