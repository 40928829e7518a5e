// PostgreSQL-backed event log

use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use follower_engine_core::{
    ActorKey, EventBase, EventStore, FollowerError, FollowerResult, SequencedEvent,
};

use crate::config::StorageConfig;
use crate::pool::{build_pool, checkout, PgPool};
use crate::schema::follower_events;

#[derive(Debug, Clone, Queryable, Insertable, Selectable)]
#[diesel(table_name = follower_events)]
struct EventRecord {
    actor_key: String,
    version: i64,
    payload: Value,
    occurred_ms: i64,
    recorded_at: DateTime<Utc>,
}

/// Append-only event log in PostgreSQL, one row per (key, version).
pub struct PostgresEventStore<K, E> {
    pool: Arc<PgPool>,
    _marker: PhantomData<fn() -> (K, E)>,
}

impl<K, E> PostgresEventStore<K, E>
where
    K: ActorKey,
    E: Serialize + DeserializeOwned + Send + Sync + 'static,
{
    pub fn new(config: &StorageConfig) -> FollowerResult<Self> {
        Ok(Self::from_pool(build_pool(config)?))
    }

    /// Share an existing pool with the other stores.
    pub fn from_pool(pool: Arc<PgPool>) -> Self {
        Self {
            pool,
            _marker: PhantomData,
        }
    }

    /// Append one event to the log. The composite primary key rejects a
    /// second row for the same (key, version).
    pub async fn append(&self, event: &SequencedEvent<K, E>) -> FollowerResult<()> {
        let record = EventRecord {
            actor_key: event.key.to_string(),
            version: event.base.version as i64,
            payload: serde_json::to_value(&event.payload)?,
            occurred_ms: event.base.timestamp,
            recorded_at: Utc::now(),
        };

        let mut conn = checkout(&self.pool)?;
        diesel::insert_into(follower_events::table)
            .values(&record)
            .execute(&mut conn)
            .map_err(|error| FollowerError::StorageError {
                message: format!("failed to insert event: {}", error),
            })?;
        Ok(())
    }

    fn record_to_event(&self, key: &K, record: EventRecord) -> FollowerResult<SequencedEvent<K, E>> {
        let payload: E =
            serde_json::from_value(record.payload).map_err(|error| {
                FollowerError::SerializationError {
                    message: format!(
                        "failed to deserialize event v{} for key {}: {}",
                        record.version, record.actor_key, error
                    ),
                }
            })?;
        Ok(SequencedEvent {
            key: key.clone(),
            base: EventBase::with_timestamp(record.version as u64, record.occurred_ms),
            payload,
        })
    }
}

#[async_trait]
impl<K, E> EventStore<K, E> for PostgresEventStore<K, E>
where
    K: ActorKey,
    E: Serialize + DeserializeOwned + Send + Sync + 'static,
{
    async fn get_list(
        &self,
        key: &K,
        start_exclusive: u64,
        end_inclusive: u64,
    ) -> FollowerResult<Vec<SequencedEvent<K, E>>> {
        let mut conn = checkout(&self.pool)?;

        let records: Vec<EventRecord> = follower_events::table
            .filter(follower_events::actor_key.eq(key.to_string()))
            .filter(follower_events::version.gt(start_exclusive as i64))
            .filter(follower_events::version.le(end_inclusive as i64))
            .order(follower_events::version.asc())
            .load(&mut conn)
            .map_err(|error| FollowerError::StorageError {
                message: format!("failed to load events: {}", error),
            })?;

        records
            .into_iter()
            .map(|record| self.record_to_event(key, record))
            .collect()
    }
}
