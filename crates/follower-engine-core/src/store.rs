// Persistence contracts for the event log and state snapshots, plus the
// in-memory implementations used for tests and embedded deployments

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::{FollowerError, FollowerResult};
use crate::event::{ActorKey, SequencedEvent};
use crate::state::FollowerState;

/// Read access to a per-key event log.
#[async_trait]
pub trait EventStore<K: ActorKey, E>: Send + Sync {
    /// Events with version in `(start_exclusive, end_inclusive]`, ascending
    /// by version.
    async fn get_list(
        &self,
        key: &K,
        start_exclusive: u64,
        end_inclusive: u64,
    ) -> FollowerResult<Vec<SequencedEvent<K, E>>>;
}

/// Persistence for the latest materialized state per key.
#[async_trait]
pub trait StateStore<K: ActorKey, S>: Send + Sync {
    async fn get(&self, key: &K) -> FollowerResult<Option<FollowerState<K, S>>>;

    /// Errors on duplicate key.
    async fn insert(&self, state: &FollowerState<K, S>) -> FollowerResult<()>;

    /// Last-writer-wins per key. Version ordering is the caller's job.
    async fn update(&self, state: &FollowerState<K, S>) -> FollowerResult<()>;
}

/// Event log held in process memory.
pub struct InMemoryEventStore<K: ActorKey, E> {
    events: RwLock<HashMap<K, Vec<SequencedEvent<K, E>>>>,
}

impl<K: ActorKey, E: Clone + Send + Sync> InMemoryEventStore<K, E> {
    pub fn new() -> Self {
        Self {
            events: RwLock::new(HashMap::new()),
        }
    }

    /// Append an event to the log. Versions must arrive strictly ascending
    /// per key.
    pub async fn append(&self, event: SequencedEvent<K, E>) -> FollowerResult<()> {
        let mut events = self.events.write().await;
        let log = events.entry(event.key.clone()).or_default();
        if let Some(last) = log.last() {
            if event.base.version <= last.base.version {
                return Err(FollowerError::StorageError {
                    message: format!(
                        "event version {} is not ahead of log head {} for key {}",
                        event.base.version, last.base.version, event.key
                    ),
                });
            }
        }
        log.push(event);
        Ok(())
    }

    pub async fn len(&self, key: &K) -> usize {
        let events = self.events.read().await;
        events.get(key).map(|log| log.len()).unwrap_or(0)
    }
}

impl<K: ActorKey, E: Clone + Send + Sync> Default for InMemoryEventStore<K, E> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<K: ActorKey, E: Clone + Send + Sync> EventStore<K, E> for InMemoryEventStore<K, E> {
    async fn get_list(
        &self,
        key: &K,
        start_exclusive: u64,
        end_inclusive: u64,
    ) -> FollowerResult<Vec<SequencedEvent<K, E>>> {
        let events = self.events.read().await;
        let page = events
            .get(key)
            .map(|log| {
                log.iter()
                    .filter(|event| {
                        event.base.version > start_exclusive && event.base.version <= end_inclusive
                    })
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        Ok(page)
    }
}

/// Snapshot store held in process memory. Tracks write counts so tests can
/// observe snapshot save behavior.
pub struct InMemoryStateStore<K: ActorKey, S> {
    states: RwLock<HashMap<K, FollowerState<K, S>>>,
    inserts: AtomicU64,
    updates: AtomicU64,
}

impl<K: ActorKey, S: Clone + Send + Sync> InMemoryStateStore<K, S> {
    pub fn new() -> Self {
        Self {
            states: RwLock::new(HashMap::new()),
            inserts: AtomicU64::new(0),
            updates: AtomicU64::new(0),
        }
    }

    pub fn insert_count(&self) -> u64 {
        self.inserts.load(Ordering::SeqCst)
    }

    pub fn update_count(&self) -> u64 {
        self.updates.load(Ordering::SeqCst)
    }
}

impl<K: ActorKey, S: Clone + Send + Sync> Default for InMemoryStateStore<K, S> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<K: ActorKey, S: Clone + Send + Sync> StateStore<K, S> for InMemoryStateStore<K, S> {
    async fn get(&self, key: &K) -> FollowerResult<Option<FollowerState<K, S>>> {
        let states = self.states.read().await;
        Ok(states.get(key).cloned())
    }

    async fn insert(&self, state: &FollowerState<K, S>) -> FollowerResult<()> {
        let mut states = self.states.write().await;
        if states.contains_key(&state.key) {
            return Err(FollowerError::StorageError {
                message: format!("snapshot already exists for key {}", state.key),
            });
        }
        states.insert(state.key.clone(), state.clone());
        self.inserts.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn update(&self, state: &FollowerState<K, S>) -> FollowerResult<()> {
        let mut states = self.states.write().await;
        states.insert(state.key.clone(), state.clone());
        self.updates.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::SequencedEvent;

    #[tokio::test]
    async fn get_list_pages_by_exclusive_start() {
        let store = InMemoryEventStore::new();
        for version in 1..=5u64 {
            store
                .append(SequencedEvent::new("k".to_string(), version, version))
                .await
                .unwrap();
        }

        let page = store.get_list(&"k".to_string(), 2, 4).await.unwrap();
        let versions: Vec<u64> = page.iter().map(|e| e.base.version).collect();
        assert_eq!(versions, vec![3, 4]);
    }

    #[tokio::test]
    async fn append_rejects_stale_versions() {
        let store = InMemoryEventStore::new();
        store
            .append(SequencedEvent::new("k".to_string(), 1, 0u64))
            .await
            .unwrap();
        let result = store
            .append(SequencedEvent::new("k".to_string(), 1, 0u64))
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn state_insert_errors_on_duplicate() {
        let store = InMemoryStateStore::new();
        let state = FollowerState::new("k".to_string(), 0u64);
        store.insert(&state).await.unwrap();
        assert!(store.insert(&state).await.is_err());
        assert_eq!(store.insert_count(), 1);
    }
}
