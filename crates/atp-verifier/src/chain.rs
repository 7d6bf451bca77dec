//! Tracks identity-chain state across a sequence of block-ordered events.
//!
//! The tracker assumes its caller feeds events in block order (height, then
//! intra-block index); it has no notion of time or block height itself,
//! only "what came before what I'm looking at now". That mirrors the
//! consensus layer's finality tracker: a small `HashMap` of per-key state,
//! mutated one event at a time, with no retries and no background state.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use atp_core::{EngineError, EngineResult};

#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub enum ChainStatus {
    Active,
    Revoked,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
struct ChainState {
    current_fingerprint: String,
    depth: u64,
    status: ChainStatus,
    seen_heartbeat_seqs: HashSet<u64>,
}

/// Per-identity-chain state, keyed by the chain's genesis fingerprint.
/// Serializable so a caller can persist it to disk between invocations, the
/// only way block-ordered events actually accumulate across separate CLI
/// runs.
#[derive(Default, Serialize, Deserialize)]
pub struct ChainTracker {
    chains: HashMap<String, ChainState>,
}

impl ChainTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(&self, chain_key: &str) -> Option<ChainStatus> {
        self.chains.get(chain_key).map(|c| c.status)
    }

    pub fn current_fingerprint(&self, chain_key: &str) -> Option<&str> {
        self.chains.get(chain_key).map(|c| c.current_fingerprint.as_str())
    }

    pub fn depth(&self, chain_key: &str) -> u64 {
        self.chains.get(chain_key).map(|c| c.depth).unwrap_or(0)
    }

    /// Record a genesis `id` document. Returns `true` if this is the first
    /// identity seen for `chain_key`; a second `id` for an already-tracked
    /// chain is a stale duplicate and is ignored (`false`), not an error.
    pub fn record_identity(&mut self, chain_key: &str, fingerprint: &str) -> bool {
        if self.chains.contains_key(chain_key) {
            return false;
        }
        self.chains.insert(
            chain_key.to_string(),
            ChainState {
                current_fingerprint: fingerprint.to_string(),
                depth: 1,
                status: ChainStatus::Active,
                seen_heartbeat_seqs: HashSet::new(),
            },
        );
        true
    }

    /// Record a `super` document rotating `chain_key`'s current key from
    /// `old_fingerprint` to `new_fingerprint`. A revoked chain rejects every
    /// further rotation. A rotation whose `old_fingerprint` no longer
    /// matches the chain's current key is a stale duplicate (another
    /// rotation off the same old state already won) and is ignored.
    pub fn record_supersession(
        &mut self,
        chain_key: &str,
        old_fingerprint: &str,
        new_fingerprint: &str,
    ) -> EngineResult<bool> {
        let state = self
            .chains
            .get_mut(chain_key)
            .ok_or_else(|| EngineError::ChainStateViolation(format!("no known chain for {chain_key}")))?;

        if state.status == ChainStatus::Revoked {
            return Err(EngineError::ChainStateViolation(format!(
                "chain {chain_key} is revoked; supersession rejected"
            )));
        }
        if state.current_fingerprint != old_fingerprint {
            return Ok(false);
        }
        state.current_fingerprint = new_fingerprint.to_string();
        state.depth += 1;
        Ok(true)
    }

    /// Record a `revoke` document poisoning `chain_key`. Idempotent: a
    /// chain already revoked stays revoked.
    pub fn record_revocation(&mut self, chain_key: &str) -> EngineResult<()> {
        let state = self
            .chains
            .get_mut(chain_key)
            .ok_or_else(|| EngineError::ChainStateViolation(format!("no known chain for {chain_key}")))?;
        state.status = ChainStatus::Revoked;
        Ok(())
    }

    /// Record a heartbeat's sequence number. Returns `true` if `seq` is new
    /// for this chain, `false` if it is a replay of a previously accepted
    /// sequence number. Fails if the chain is revoked.
    pub fn record_heartbeat(&mut self, chain_key: &str, seq: u64) -> EngineResult<bool> {
        let state = self
            .chains
            .get_mut(chain_key)
            .ok_or_else(|| EngineError::ChainStateViolation(format!("no known chain for {chain_key}")))?;

        if state.status == ChainStatus::Revoked {
            return Err(EngineError::ChainStateViolation(format!(
                "chain {chain_key} is revoked; heartbeat rejected"
            )));
        }
        Ok(state.seen_heartbeat_seqs.insert(seq))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chain_rotation_tracks_current_fingerprint_and_depth() {
        let mut tracker = ChainTracker::new();
        assert!(tracker.record_identity("A", "A"));
        assert!(tracker.record_supersession("A", "A", "B").unwrap());
        assert!(tracker.record_supersession("A", "B", "C").unwrap());
        assert_eq!(tracker.current_fingerprint("A"), Some("C"));
        assert_eq!(tracker.depth("A"), 3);
    }

    #[test]
    fn revocation_is_terminal_for_future_supersessions_and_heartbeats() {
        let mut tracker = ChainTracker::new();
        tracker.record_identity("A", "A");
        tracker.record_supersession("A", "A", "B").unwrap();
        tracker.record_supersession("A", "B", "C").unwrap();
        tracker.record_revocation("A").unwrap();

        assert!(tracker.record_supersession("A", "C", "D").is_err());
        assert!(tracker.record_heartbeat("A", 1).is_err());
    }

    #[test]
    fn duplicate_heartbeat_sequence_is_rejected_as_replay() {
        let mut tracker = ChainTracker::new();
        tracker.record_identity("A", "A");
        assert!(tracker.record_heartbeat("A", 5).unwrap());
        assert!(!tracker.record_heartbeat("A", 5).unwrap());
    }

    #[test]
    fn second_identity_for_same_chain_key_is_a_stale_duplicate() {
        let mut tracker = ChainTracker::new();
        assert!(tracker.record_identity("A", "A"));
        assert!(!tracker.record_identity("A", "A-prime"));
        assert_eq!(tracker.current_fingerprint("A"), Some("A"));
    }

    #[test]
    fn stale_supersession_off_an_already_superseded_state_is_ignored() {
        let mut tracker = ChainTracker::new();
        tracker.record_identity("A", "A");
        assert!(tracker.record_supersession("A", "A", "B").unwrap());
        // a second super off the same old state A -> B2 loses to the first
        assert!(!tracker.record_supersession("A", "A", "B2").unwrap());
        assert_eq!(tracker.current_fingerprint("A"), Some("B"));
    }
}
