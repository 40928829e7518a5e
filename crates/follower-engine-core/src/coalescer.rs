// Batched transactional append front for the commit log

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::channel::{AsyncItem, BatchChannel};
use crate::error::{FollowerError, FollowerResult};
use crate::serializer::Serializer;
use crate::transaction::{AppendRequest, Commit, TransactionStatus, TransactionStore};

/// Tunables for the append coalescer.
#[derive(Debug, Clone)]
pub struct CommitLogConfig {
    /// Bounded queue capacity; producers suspend when it fills.
    pub queue_capacity: usize,

    /// Upper bound on how many waiting appends one transaction covers.
    pub max_batch_size: usize,
}

impl Default for CommitLogConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 4096,
            max_batch_size: 1000,
        }
    }
}

/// Funnels per-unit commit appends from many producers into bulk
/// transactional writes, degrading to per-row inserts when the bulk
/// transaction aborts.
///
/// `append` resolves to `true` when the row was persisted by this call and
/// `false` when `(unit_name, transaction_id)` had already been appended.
pub struct CommitLog<S: Serializer> {
    store: Arc<dyn TransactionStore>,
    serializer: S,
    channel: BatchChannel<AppendRequest, bool>,
}

impl<S: Serializer> CommitLog<S> {
    pub fn new(
        store: Arc<dyn TransactionStore>,
        serializer: S,
        config: CommitLogConfig,
    ) -> FollowerResult<Self> {
        let channel = BatchChannel::new(config.queue_capacity, config.max_batch_size);
        let flush_store = Arc::clone(&store);
        channel.bind_consumer(move |batch| flush_batch(Arc::clone(&flush_store), batch));
        channel.activate_consumer()?;
        Ok(Self {
            store,
            serializer,
            channel,
        })
    }

    /// Append a commit for a unit, waiting for the batch it lands in to be
    /// written out.
    pub async fn append<I: Serialize + Send + Sync>(
        &self,
        unit_name: &str,
        commit: &Commit<I>,
    ) -> FollowerResult<bool> {
        let request = AppendRequest {
            unit_name: unit_name.to_string(),
            transaction_id: commit.transaction_id,
            data: self.serializer.to_text(&commit.data)?,
            status: commit.status,
        };
        let (item, completion) = AsyncItem::new(request);
        self.channel.write(item).await?;
        completion.await.map_err(|_| FollowerError::ChannelError {
            message: "append dropped before completion".to_string(),
        })?
    }

    pub async fn get_list<I: DeserializeOwned>(
        &self,
        unit_name: &str,
    ) -> FollowerResult<Vec<Commit<I>>> {
        let rows = self.store.get_rows(unit_name).await?;
        rows.into_iter()
            .map(|row| {
                Ok(Commit {
                    transaction_id: row.transaction_id,
                    data: self.serializer.from_text(&row.data)?,
                    status: row.status,
                })
            })
            .collect()
    }

    pub async fn delete(&self, unit_name: &str, transaction_id: i64) -> FollowerResult<()> {
        self.store.delete(unit_name, transaction_id).await
    }

    pub async fn update_status(
        &self,
        unit_name: &str,
        transaction_id: i64,
        status: TransactionStatus,
    ) -> FollowerResult<bool> {
        self.store
            .update_status(unit_name, transaction_id, status)
            .await
    }
}

/// Write one batch out: bulk transaction first, per-row fallback on abort.
///
/// Order within the batch is preserved on both paths, and a duplicate key
/// during fallback resolves that item to `false` rather than failing it.
async fn flush_batch(store: Arc<dyn TransactionStore>, batch: Vec<AsyncItem<AppendRequest, bool>>) {
    if batch.is_empty() {
        return;
    }

    let rows: Vec<AppendRequest> = batch.iter().map(|item| item.input().clone()).collect();
    match store.append_batch(&rows).await {
        Ok(()) => {
            for item in batch {
                item.complete(true);
            }
        }
        Err(error) => {
            tracing::warn!(
                batch_len = batch.len(),
                error = %error,
                "bulk append aborted, retrying rows individually"
            );
            for item in batch {
                match store.append_one(item.input()).await {
                    Ok(appended) => item.complete(appended),
                    Err(error) => item.fail(error),
                }
            }
        }
    }
}
