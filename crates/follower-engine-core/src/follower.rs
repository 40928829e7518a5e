// Follower (read-model) actor lifecycle: activation, replay, delivery,
// snapshotting, deactivation

use std::fmt::Debug;
use std::sync::Arc;

use async_trait::async_trait;
use futures_util::future::try_join_all;
use tokio::sync::Mutex;

use crate::error::{FollowerError, FollowerResult};
use crate::event::{ActorKey, MessageEnvelope, SequencedEvent};
use crate::options::FollowerOptions;
use crate::registry::TypeRegistry;
use crate::state::FollowerState;
use crate::store::{EventStore, StateStore};

/// User-supplied behavior of a follower: how to build fresh state and how
/// an event mutates it.
///
/// `on_event_delivered` must be deterministic for replay to converge, and
/// commutative within a page when `concurrent_events` is enabled.
#[async_trait]
pub trait FollowerHandler: Send + Sync + 'static {
    type Key: ActorKey;
    type Event: Debug + Send + Sync + 'static;
    type Payload: Clone + Send + Sync + 'static;

    /// Fresh payload for a key that has no snapshot yet.
    fn create_payload(&self, key: &Self::Key) -> Self::Payload;

    /// Apply one event to the materialized payload.
    async fn on_event_delivered(
        &self,
        payload: &mut Self::Payload,
        event: &SequencedEvent<Self::Key, Self::Event>,
    ) -> FollowerResult<()>;

    /// Invoked just before a snapshot is persisted.
    async fn on_save_snapshot(
        &self,
        _state: &mut FollowerState<Self::Key, Self::Payload>,
    ) -> FollowerResult<()> {
        Ok(())
    }

    /// Invoked after a snapshot has been persisted.
    async fn on_saved_snapshot(&self) -> FollowerResult<()> {
        Ok(())
    }
}

/// Stores a follower activation reads through. Passed in explicitly; the
/// runtime holds no process-global services besides the type registry.
pub struct FollowerDeps<H: FollowerHandler> {
    pub event_store: Arc<dyn EventStore<H::Key, H::Event>>,
    pub state_store: Arc<dyn StateStore<H::Key, H::Payload>>,
}

impl<H: FollowerHandler> FollowerDeps<H> {
    pub fn new(
        event_store: Arc<dyn EventStore<H::Key, H::Event>>,
        state_store: Arc<dyn StateStore<H::Key, H::Payload>>,
    ) -> Self {
        Self {
            event_store,
            state_store,
        }
    }
}

impl<H: FollowerHandler> Clone for FollowerDeps<H> {
    fn clone(&self) -> Self {
        Self {
            event_store: Arc::clone(&self.event_store),
            state_store: Arc::clone(&self.state_store),
        }
    }
}

/// A per-key read-model actor that materializes state by replaying its
/// event log, applies newly delivered events in version order, and
/// periodically persists snapshots.
///
/// One activation owns the state exclusively; the hosting platform is
/// expected to serialize deliveries per key. `concurrent_events` only
/// relaxes ordering within a replayed page, never across pages.
pub struct Follower<H: FollowerHandler> {
    key: H::Key,
    handler: Arc<H>,
    deps: FollowerDeps<H>,
    options: FollowerOptions,
    state: Mutex<FollowerState<H::Key, H::Payload>>,
    snapshot_version: u64,
    no_snapshot: bool,
    last_event_time: i64,
}

impl<H: FollowerHandler> Follower<H> {
    /// Materialize an activation for `key`: read the latest snapshot (or
    /// create fresh state), then optionally replay the rest of the log.
    pub async fn activate(
        key: H::Key,
        handler: Arc<H>,
        deps: FollowerDeps<H>,
        options: FollowerOptions,
    ) -> FollowerResult<Self> {
        let snapshot = deps.state_store.get(&key).await.map_err(|error| {
            FollowerError::ActivationError {
                message: format!("snapshot read failed for key {}: {}", key, error),
            }
        })?;

        let (state, no_snapshot) = match snapshot {
            Some(state) => (state, false),
            None => (
                FollowerState::new(key.clone(), handler.create_payload(&key)),
                true,
            ),
        };
        let snapshot_version = state.version;
        tracing::debug!(
            key = %key,
            version = state.version,
            no_snapshot,
            "follower activating"
        );

        let mut follower = Self {
            key,
            handler,
            deps,
            options,
            state: Mutex::new(state),
            snapshot_version,
            no_snapshot,
            last_event_time: 0,
        };

        if follower.options.fully_active {
            follower.full_active().await?;
        }
        Ok(follower)
    }

    pub fn key(&self) -> &H::Key {
        &self.key
    }

    /// Version of the last persisted snapshot.
    pub fn snapshot_version(&self) -> u64 {
        self.snapshot_version
    }

    /// Timestamp (unix ms) of the most recently applied event, 0 before
    /// the first apply of this activation.
    pub fn last_event_time(&self) -> i64 {
        self.last_event_time
    }

    /// A copy of the current materialized state.
    pub async fn state(&self) -> FollowerState<H::Key, H::Payload> {
        self.state.lock().await.clone()
    }

    /// Replay every event beyond the snapshot, page by page, before the
    /// follower is considered ready.
    async fn full_active(&mut self) -> FollowerResult<()> {
        loop {
            let start = self.state.get_mut().version;
            let take = self.options.events_per_read;
            let page = self
                .deps
                .event_store
                .get_list(&self.key, start, start + take)
                .await?;

            if self.options.concurrent_events {
                self.apply_page_concurrent(&page).await?;
            } else {
                for event in &page {
                    self.apply_ordered(event).await?;
                }
            }
            self.save_snapshot(false).await?;

            if (page.len() as u64) < take {
                break;
            }
        }
        Ok(())
    }

    /// Accept a serialized envelope, decode it, and route event payloads to
    /// `tell`. Non-event and unregistered payloads are dropped.
    pub async fn tell_bytes(&mut self, bytes: &[u8]) -> FollowerResult<()> {
        let envelope = MessageEnvelope::decode(bytes)?;
        match TypeRegistry::global().decode(&envelope.type_name, &envelope.bytes) {
            None => {
                tracing::info!(
                    key = %self.key,
                    type_name = %envelope.type_name,
                    "dropping message with unregistered type"
                );
                Ok(())
            }
            Some(Err(error)) => Err(error),
            Some(Ok(decoded)) => {
                match decoded.downcast::<SequencedEvent<H::Key, H::Event>>() {
                    Ok(event) => self.tell(*event).await,
                    Err(_) => {
                        tracing::info!(
                            key = %self.key,
                            type_name = %envelope.type_name,
                            "dropping non-event payload"
                        );
                        Ok(())
                    }
                }
            }
        }
    }

    /// Deliver one event, filling any version gap from the log first.
    pub async fn tell(&mut self, event: SequencedEvent<H::Key, H::Event>) -> FollowerResult<()> {
        let result = self.handle_event(&event).await;
        if let Err(error) = &result {
            tracing::error!(
                key = %self.key,
                version = event.base.version,
                payload = ?event.payload,
                error = %error,
                "event delivery failed"
            );
        }
        result
    }

    async fn handle_event(
        &mut self,
        event: &SequencedEvent<H::Key, H::Event>,
    ) -> FollowerResult<()> {
        let incoming = event.base.version;
        let current = self.state.get_mut().version;

        if incoming == current + 1 {
            self.apply_ordered(event).await?;
        } else if incoming > current + 1 {
            self.fill_gap(current, incoming).await?;
            let reached = self.state.get_mut().version;
            if incoming == reached + 1 {
                // The log did not contain the incoming event yet; it is
                // applied here exactly once.
                self.apply_ordered(event).await?;
            } else if incoming > reached {
                return Err(FollowerError::VersionConflict {
                    key: self.key.to_string(),
                    incoming,
                    current: reached,
                });
            }
            // incoming <= reached: the gap fill already covered it.
        }
        // incoming <= current: stale delivery, absorbed without error.

        self.save_snapshot(false).await
    }

    /// Read `(from_exclusive, to_inclusive]` from the log and apply in
    /// version order.
    async fn fill_gap(&mut self, from_exclusive: u64, to_inclusive: u64) -> FollowerResult<()> {
        let page = self
            .deps
            .event_store
            .get_list(&self.key, from_exclusive, to_inclusive)
            .await?;
        tracing::debug!(
            key = %self.key,
            from = from_exclusive,
            to = to_inclusive,
            fetched = page.len(),
            "filling version gap from event log"
        );
        for event in &page {
            self.apply_ordered(event).await?;
        }
        Ok(())
    }

    async fn apply_ordered(
        &mut self,
        event: &SequencedEvent<H::Key, H::Event>,
    ) -> FollowerResult<()> {
        let handler = Arc::clone(&self.handler);
        let state = self.state.get_mut();
        state.begin_apply();
        handler.on_event_delivered(&mut state.payload, event).await?;
        state.commit_apply(event.base.version);
        self.last_event_time = event.base.timestamp;
        Ok(())
    }

    /// Apply a page with one task per event, then advance version and
    /// timestamp from the page's last event. Events within the page are
    /// unordered relative to each other.
    async fn apply_page_concurrent(
        &mut self,
        page: &[SequencedEvent<H::Key, H::Event>],
    ) -> FollowerResult<()> {
        let Some(last) = page.last() else {
            return Ok(());
        };

        let handler = Arc::clone(&self.handler);
        let state = &self.state;
        let applies = page.iter().map(|event| {
            let handler = Arc::clone(&handler);
            async move {
                let mut guard = state.lock().await;
                handler.on_event_delivered(&mut guard.payload, event).await
            }
        });
        try_join_all(applies).await?;

        let state = self.state.get_mut();
        state.advance_to(last.base.version);
        self.last_event_time = last.base.timestamp;
        Ok(())
    }

    /// Persist the state when the configured interval has been reached, or
    /// unconditionally when forced. Save failures are logged and re-raised.
    pub async fn save_snapshot(&mut self, force: bool) -> FollowerResult<()> {
        if !self.options.save_snapshot {
            return Ok(());
        }
        let version = self.state.get_mut().version;
        if !force && version - self.snapshot_version < self.options.snapshot_version_interval {
            return Ok(());
        }

        let result = self.write_snapshot().await;
        if let Err(error) = &result {
            tracing::error!(
                key = %self.key,
                version,
                error = %error,
                "snapshot save failed"
            );
        }
        result
    }

    async fn write_snapshot(&mut self) -> FollowerResult<()> {
        let handler = Arc::clone(&self.handler);
        let snapshot = {
            let state = self.state.get_mut();
            handler.on_save_snapshot(state).await?;
            state.clone()
        };

        if self.no_snapshot {
            self.deps.state_store.insert(&snapshot).await?;
            self.no_snapshot = false;
        } else {
            self.deps.state_store.update(&snapshot).await?;
        }
        self.snapshot_version = snapshot.version;
        self.handler.on_saved_snapshot().await?;
        Ok(())
    }

    /// Persist a final snapshot if enough has happened since the last one,
    /// then let the activation go.
    pub async fn deactivate(&mut self) -> FollowerResult<()> {
        let version = self.state.get_mut().version;
        if version - self.snapshot_version >= self.options.snapshot_min_version_interval {
            self.save_snapshot(true).await?;
        }
        tracing::debug!(key = %self.key, version, "follower deactivated");
        Ok(())
    }
}
