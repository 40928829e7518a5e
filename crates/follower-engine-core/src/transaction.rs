// Transactional commit log model and backend contract

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::error::{FollowerError, FollowerResult};

/// Lifecycle stage of a unit-scoped commit record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransactionStatus {
    Persisted,
    Committed,
    Rolledback,
}

impl TransactionStatus {
    pub fn as_i32(self) -> i32 {
        match self {
            TransactionStatus::Persisted => 0,
            TransactionStatus::Committed => 1,
            TransactionStatus::Rolledback => 2,
        }
    }

    pub fn from_i32(value: i32) -> FollowerResult<Self> {
        match value {
            0 => Ok(TransactionStatus::Persisted),
            1 => Ok(TransactionStatus::Committed),
            2 => Ok(TransactionStatus::Rolledback),
            other => Err(FollowerError::SerializationError {
                message: format!("unknown transaction status {}", other),
            }),
        }
    }
}

/// A unit-scoped commit record carrying its payload and status.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Commit<I> {
    pub transaction_id: i64,
    pub data: I,
    pub status: TransactionStatus,
}

impl<I> Commit<I> {
    pub fn new(transaction_id: i64, data: I, status: TransactionStatus) -> Self {
        Self {
            transaction_id,
            data,
            status,
        }
    }
}

/// The serialized row form of a commit awaiting append.
///
/// `(unit_name, transaction_id)` is the uniqueness key of the log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppendRequest {
    pub unit_name: String,
    pub transaction_id: i64,
    pub data: String,
    pub status: TransactionStatus,
}

/// Backend contract the append coalescer writes through.
///
/// `append_batch` must be all-or-nothing; `append_one` is a single atomic
/// row write where a duplicate key reports `Ok(false)` instead of failing.
#[async_trait]
pub trait TransactionStore: Send + Sync {
    async fn append_batch(&self, rows: &[AppendRequest]) -> FollowerResult<()>;

    async fn append_one(&self, row: &AppendRequest) -> FollowerResult<bool>;

    async fn delete(&self, unit_name: &str, transaction_id: i64) -> FollowerResult<()>;

    async fn get_rows(&self, unit_name: &str) -> FollowerResult<Vec<AppendRequest>>;

    async fn update_status(
        &self,
        unit_name: &str,
        transaction_id: i64,
        status: TransactionStatus,
    ) -> FollowerResult<bool>;
}

/// Commit log held in process memory, with write counters so tests can
/// observe how many transactional round-trips a batch took.
pub struct InMemoryTransactionStore {
    rows: RwLock<HashMap<(String, i64), (String, TransactionStatus)>>,
    bulk_commits: AtomicU64,
    single_inserts: AtomicU64,
}

impl InMemoryTransactionStore {
    pub fn new() -> Self {
        Self {
            rows: RwLock::new(HashMap::new()),
            bulk_commits: AtomicU64::new(0),
            single_inserts: AtomicU64::new(0),
        }
    }

    pub fn bulk_commit_count(&self) -> u64 {
        self.bulk_commits.load(Ordering::SeqCst)
    }

    pub fn single_insert_count(&self) -> u64 {
        self.single_inserts.load(Ordering::SeqCst)
    }

    pub async fn row_count(&self) -> usize {
        self.rows.read().await.len()
    }
}

impl Default for InMemoryTransactionStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TransactionStore for InMemoryTransactionStore {
    async fn append_batch(&self, rows: &[AppendRequest]) -> FollowerResult<()> {
        let mut table = self.rows.write().await;
        let mut batch_keys = std::collections::HashSet::new();
        for row in rows {
            let key = (row.unit_name.clone(), row.transaction_id);
            if table.contains_key(&key) || !batch_keys.insert(key) {
                return Err(FollowerError::StorageError {
                    message: format!(
                        "bulk append aborted: duplicate key ({}, {})",
                        row.unit_name, row.transaction_id
                    ),
                });
            }
        }
        for row in rows {
            table.insert(
                (row.unit_name.clone(), row.transaction_id),
                (row.data.clone(), row.status),
            );
        }
        self.bulk_commits.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn append_one(&self, row: &AppendRequest) -> FollowerResult<bool> {
        let mut table = self.rows.write().await;
        let key = (row.unit_name.clone(), row.transaction_id);
        if table.contains_key(&key) {
            return Ok(false);
        }
        table.insert(key, (row.data.clone(), row.status));
        self.single_inserts.fetch_add(1, Ordering::SeqCst);
        Ok(true)
    }

    async fn delete(&self, unit_name: &str, transaction_id: i64) -> FollowerResult<()> {
        let mut table = self.rows.write().await;
        table.remove(&(unit_name.to_string(), transaction_id));
        Ok(())
    }

    async fn get_rows(&self, unit_name: &str) -> FollowerResult<Vec<AppendRequest>> {
        let table = self.rows.read().await;
        let mut rows: Vec<AppendRequest> = table
            .iter()
            .filter(|((unit, _), _)| unit == unit_name)
            .map(|((unit, transaction_id), (data, status))| AppendRequest {
                unit_name: unit.clone(),
                transaction_id: *transaction_id,
                data: data.clone(),
                status: *status,
            })
            .collect();
        rows.sort_by_key(|row| row.transaction_id);
        Ok(rows)
    }

    async fn update_status(
        &self,
        unit_name: &str,
        transaction_id: i64,
        status: TransactionStatus,
    ) -> FollowerResult<bool> {
        let mut table = self.rows.write().await;
        match table.get_mut(&(unit_name.to_string(), transaction_id)) {
            Some(entry) => {
                entry.1 = status;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(unit: &str, transaction_id: i64) -> AppendRequest {
        AppendRequest {
            unit_name: unit.to_string(),
            transaction_id,
            data: "{}".to_string(),
            status: TransactionStatus::Persisted,
        }
    }

    #[test]
    fn status_round_trips_through_i32() {
        for status in [
            TransactionStatus::Persisted,
            TransactionStatus::Committed,
            TransactionStatus::Rolledback,
        ] {
            assert_eq!(TransactionStatus::from_i32(status.as_i32()).unwrap(), status);
        }
        assert!(TransactionStatus::from_i32(9).is_err());
    }

    #[tokio::test]
    async fn bulk_append_is_all_or_nothing() {
        let store = InMemoryTransactionStore::new();
        store.append_one(&row("unit-a", 2)).await.unwrap();

        let result = store
            .append_batch(&[row("unit-a", 1), row("unit-a", 2), row("unit-a", 3)])
            .await;
        assert!(result.is_err());
        assert_eq!(store.row_count().await, 1);
        assert_eq!(store.bulk_commit_count(), 0);
    }

    #[tokio::test]
    async fn append_one_reports_duplicates_as_false() {
        let store = InMemoryTransactionStore::new();
        assert!(store.append_one(&row("unit-a", 1)).await.unwrap());
        assert!(!store.append_one(&row("unit-a", 1)).await.unwrap());
        assert_eq!(store.row_count().await, 1);
    }

    #[tokio::test]
    async fn update_status_reports_missing_rows() {
        let store = InMemoryTransactionStore::new();
        store.append_one(&row("unit-a", 1)).await.unwrap();

        assert!(store
            .update_status("unit-a", 1, TransactionStatus::Committed)
            .await
            .unwrap());
        assert!(!store
            .update_status("unit-a", 9, TransactionStatus::Committed)
            .await
            .unwrap());

        let rows = store.get_rows("unit-a").await.unwrap();
        assert_eq!(rows[0].status, TransactionStatus::Committed);
    }
}
