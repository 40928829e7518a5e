// Materialized follower state and its version bookkeeping

use serde::{Deserialize, Serialize};

use crate::event::ActorKey;

/// In-memory materialization of a follower's read model.
///
/// `version` is the highest event version applied; 0 means no events have
/// been applied yet. `doing_version` is always `version` or `version + 1`:
/// it steps ahead while an event is being applied and catches up once the
/// apply commits, so a failed apply is visible in the bookkeeping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FollowerState<K, S> {
    pub key: K,
    pub version: u64,
    pub doing_version: u64,
    pub payload: S,
}

impl<K: ActorKey, S> FollowerState<K, S> {
    /// Fresh state for a key with no event history.
    pub fn new(key: K, payload: S) -> Self {
        Self {
            key,
            version: 0,
            doing_version: 0,
            payload,
        }
    }

    /// Mark the next event as in flight.
    pub fn begin_apply(&mut self) {
        self.doing_version = self.version + 1;
    }

    /// Commit an applied event, advancing to its version.
    pub fn commit_apply(&mut self, version: u64) {
        self.version = version;
        self.doing_version = version;
    }

    /// Advance directly to a version, used after a concurrently applied
    /// page where per-event bookkeeping is skipped.
    pub fn advance_to(&mut self, version: u64) {
        self.version = version;
        self.doing_version = version;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_state_starts_at_version_zero() {
        let state = FollowerState::new("k1".to_string(), 0u64);
        assert_eq!(state.version, 0);
        assert_eq!(state.doing_version, 0);
    }

    #[test]
    fn apply_bookkeeping_keeps_doing_version_within_one() {
        let mut state = FollowerState::new("k1".to_string(), 0u64);

        state.begin_apply();
        assert_eq!(state.doing_version, state.version + 1);

        state.commit_apply(1);
        assert_eq!(state.version, 1);
        assert_eq!(state.doing_version, 1);

        state.advance_to(7);
        assert_eq!(state.version, 7);
        assert_eq!(state.doing_version, 7);
    }
}
