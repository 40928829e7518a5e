// PostgreSQL-backed snapshot store

use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use follower_engine_core::{ActorKey, FollowerError, FollowerResult, FollowerState, StateStore};

use crate::config::StorageConfig;
use crate::pool::{build_pool, checkout, PgPool};
use crate::schema::follower_snapshots;

#[derive(Debug, Clone, Queryable, Insertable, Selectable)]
#[diesel(table_name = follower_snapshots)]
struct SnapshotRecord {
    actor_key: String,
    version: i64,
    doing_version: i64,
    payload: Value,
    taken_at: DateTime<Utc>,
}

/// Latest materialized state per key, one row per actor.
pub struct PostgresStateStore<K, S> {
    pool: Arc<PgPool>,
    _marker: PhantomData<fn() -> (K, S)>,
}

impl<K, S> PostgresStateStore<K, S>
where
    K: ActorKey,
    S: Serialize + DeserializeOwned + Clone + Send + Sync + 'static,
{
    pub fn new(config: &StorageConfig) -> FollowerResult<Self> {
        Ok(Self::from_pool(build_pool(config)?))
    }

    pub fn from_pool(pool: Arc<PgPool>) -> Self {
        Self {
            pool,
            _marker: PhantomData,
        }
    }

    fn state_to_record(&self, state: &FollowerState<K, S>) -> FollowerResult<SnapshotRecord> {
        Ok(SnapshotRecord {
            actor_key: state.key.to_string(),
            version: state.version as i64,
            doing_version: state.doing_version as i64,
            payload: serde_json::to_value(&state.payload)?,
            taken_at: Utc::now(),
        })
    }
}

#[async_trait]
impl<K, S> StateStore<K, S> for PostgresStateStore<K, S>
where
    K: ActorKey,
    S: Serialize + DeserializeOwned + Clone + Send + Sync + 'static,
{
    async fn get(&self, key: &K) -> FollowerResult<Option<FollowerState<K, S>>> {
        let mut conn = checkout(&self.pool)?;

        let record: Option<SnapshotRecord> = follower_snapshots::table
            .filter(follower_snapshots::actor_key.eq(key.to_string()))
            .first(&mut conn)
            .optional()
            .map_err(|error| FollowerError::StorageError {
                message: format!("failed to load snapshot: {}", error),
            })?;

        match record {
            Some(record) => {
                let payload: S = serde_json::from_value(record.payload).map_err(|error| {
                    FollowerError::SerializationError {
                        message: format!(
                            "failed to deserialize snapshot for key {}: {}",
                            record.actor_key, error
                        ),
                    }
                })?;
                Ok(Some(FollowerState {
                    key: key.clone(),
                    version: record.version as u64,
                    doing_version: record.doing_version as u64,
                    payload,
                }))
            }
            None => Ok(None),
        }
    }

    async fn insert(&self, state: &FollowerState<K, S>) -> FollowerResult<()> {
        let record = self.state_to_record(state)?;
        let mut conn = checkout(&self.pool)?;

        diesel::insert_into(follower_snapshots::table)
            .values(&record)
            .execute(&mut conn)
            .map_err(|error| FollowerError::StorageError {
                message: format!("failed to insert snapshot: {}", error),
            })?;
        Ok(())
    }

    async fn update(&self, state: &FollowerState<K, S>) -> FollowerResult<()> {
        let record = self.state_to_record(state)?;
        let mut conn = checkout(&self.pool)?;

        diesel::update(
            follower_snapshots::table
                .filter(follower_snapshots::actor_key.eq(&record.actor_key)),
        )
        .set((
            follower_snapshots::version.eq(record.version),
            follower_snapshots::doing_version.eq(record.doing_version),
            follower_snapshots::payload.eq(&record.payload),
            follower_snapshots::taken_at.eq(record.taken_at),
        ))
        .execute(&mut conn)
        .map_err(|error| FollowerError::StorageError {
            message: format!("failed to update snapshot: {}", error),
        })?;
        Ok(())
    }
}
