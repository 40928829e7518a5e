// Tunables for the follower lifecycle

use serde::{Deserialize, Serialize};

/// Configuration for a follower's replay and snapshot behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FollowerOptions {
    /// When false, snapshots are never written and state is rebuilt from
    /// the full log on each activation.
    pub save_snapshot: bool,

    /// Persist a snapshot once `state.version - snapshot_version` reaches
    /// this interval.
    pub snapshot_version_interval: u64,

    /// On deactivation, persist only if at least this many events were
    /// applied since the last snapshot.
    pub snapshot_min_version_interval: u64,

    /// Page size for event log scans.
    pub events_per_read: u64,

    /// Replay the whole log beyond the snapshot during activation instead
    /// of deferring to the first delivery.
    pub fully_active: bool,

    /// Apply the events of one page concurrently. Handlers must be
    /// commutative within a page when this is set.
    pub concurrent_events: bool,
}

impl Default for FollowerOptions {
    fn default() -> Self {
        Self {
            save_snapshot: true,
            snapshot_version_interval: 500,
            snapshot_min_version_interval: 1,
            events_per_read: 2000,
            fully_active: false,
            concurrent_events: false,
        }
    }
}

impl FollowerOptions {
    pub fn with_save_snapshot(mut self, save_snapshot: bool) -> Self {
        self.save_snapshot = save_snapshot;
        self
    }

    pub fn with_snapshot_version_interval(mut self, interval: u64) -> Self {
        self.snapshot_version_interval = interval;
        self
    }

    pub fn with_snapshot_min_version_interval(mut self, interval: u64) -> Self {
        self.snapshot_min_version_interval = interval;
        self
    }

    pub fn with_events_per_read(mut self, events_per_read: u64) -> Self {
        self.events_per_read = events_per_read;
        self
    }

    pub fn with_fully_active(mut self, fully_active: bool) -> Self {
        self.fully_active = fully_active;
        self
    }

    pub fn with_concurrent_events(mut self, concurrent_events: bool) -> Self {
        self.concurrent_events = concurrent_events;
        self
    }
}
