// Tests for the batched transactional append coalescer

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use follower_engine_core::{
    AppendRequest, Commit, CommitLog, CommitLogConfig, InMemoryTransactionStore, JsonSerializer,
    Serializer, TransactionStatus, TransactionStore,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct OrderPlaced {
    order_id: String,
    total_cents: i64,
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("follower_engine_core=debug")
        .with_test_writer()
        .try_init();
}

fn commit(transaction_id: i64) -> Commit<OrderPlaced> {
    Commit::new(
        transaction_id,
        OrderPlaced {
            order_id: format!("order-{transaction_id}"),
            total_cents: transaction_id * 100,
        },
        TransactionStatus::Persisted,
    )
}

fn commit_log(store: Arc<InMemoryTransactionStore>) -> CommitLog<JsonSerializer> {
    CommitLog::new(
        store as Arc<dyn TransactionStore>,
        JsonSerializer,
        CommitLogConfig::default(),
    )
    .unwrap()
}

// On a current-thread runtime the three producers all enqueue before the
// consumer task gets polled, so the batch is deterministic.
#[tokio::test]
async fn batch_of_distinct_appends_commits_in_one_transaction() {
    init_tracing();
    let store = Arc::new(InMemoryTransactionStore::new());
    let log = commit_log(Arc::clone(&store));

    let (c1, c2, c3) = (commit(1), commit(2), commit(3));
    let (a, b, c) = tokio::join!(
        log.append("unit-a", &c1),
        log.append("unit-a", &c2),
        log.append("unit-a", &c3),
    );

    assert!(a.unwrap());
    assert!(b.unwrap());
    assert!(c.unwrap());
    assert_eq!(store.bulk_commit_count(), 1);
    assert_eq!(store.single_insert_count(), 0);
    assert_eq!(store.row_count().await, 3);
}

#[tokio::test]
async fn duplicate_in_batch_falls_back_to_single_rows() {
    init_tracing();
    let store = Arc::new(InMemoryTransactionStore::new());
    // Seed the row the middle append will collide with.
    store
        .append_one(&AppendRequest {
            unit_name: "unit-a".to_string(),
            transaction_id: 2,
            data: JsonSerializer.to_text(&commit(2).data).unwrap(),
            status: TransactionStatus::Persisted,
        })
        .await
        .unwrap();

    let log = commit_log(Arc::clone(&store));
    let (c1, c2, c3) = (commit(1), commit(2), commit(3));
    let (a, b, c) = tokio::join!(
        log.append("unit-a", &c1),
        log.append("unit-a", &c2),
        log.append("unit-a", &c3),
    );

    assert!(a.unwrap());
    assert!(!b.unwrap(), "duplicate append must resolve to false");
    assert!(c.unwrap());
    assert_eq!(store.bulk_commit_count(), 0);
    assert_eq!(store.row_count().await, 3);
}

#[tokio::test]
async fn repeated_transaction_id_persists_exactly_once() {
    let store = Arc::new(InMemoryTransactionStore::new());
    let log = commit_log(Arc::clone(&store));

    let (c1, c2, c3, c4) = (commit(7), commit(7), commit(7), commit(7));
    let results = tokio::join!(
        log.append("unit-a", &c1),
        log.append("unit-a", &c2),
        log.append("unit-a", &c3),
        log.append("unit-a", &c4),
    );
    let appended = [results.0, results.1, results.2, results.3]
        .into_iter()
        .map(|r| r.unwrap())
        .filter(|appended| *appended)
        .count();

    assert_eq!(appended, 1);
    assert_eq!(store.row_count().await, 1);
}

#[tokio::test]
async fn get_list_round_trips_commit_fields() {
    let store = Arc::new(InMemoryTransactionStore::new());
    let log = commit_log(Arc::clone(&store));

    let first = commit(1);
    let second = Commit::new(
        2,
        OrderPlaced {
            order_id: "order-2".to_string(),
            total_cents: 250,
        },
        TransactionStatus::Committed,
    );
    log.append("unit-a", &first).await.unwrap();
    log.append("unit-a", &second).await.unwrap();
    log.append("unit-b", &commit(9)).await.unwrap();

    let commits: Vec<Commit<OrderPlaced>> = log.get_list("unit-a").await.unwrap();
    assert_eq!(commits, vec![first, second]);
}

#[tokio::test]
async fn update_status_and_delete_pass_through() {
    let store = Arc::new(InMemoryTransactionStore::new());
    let log = commit_log(Arc::clone(&store));

    log.append("unit-a", &commit(1)).await.unwrap();

    assert!(log
        .update_status("unit-a", 1, TransactionStatus::Committed)
        .await
        .unwrap());
    let commits: Vec<Commit<OrderPlaced>> = log.get_list("unit-a").await.unwrap();
    assert_eq!(commits[0].status, TransactionStatus::Committed);

    log.delete("unit-a", 1).await.unwrap();
    assert_eq!(store.row_count().await, 0);

    assert!(!log
        .update_status("unit-a", 1, TransactionStatus::Rolledback)
        .await
        .unwrap());
}

#[tokio::test]
async fn bounded_queue_drains_under_sustained_producers() {
    let store = Arc::new(InMemoryTransactionStore::new());
    let log = Arc::new(
        CommitLog::new(
            Arc::clone(&store) as Arc<dyn TransactionStore>,
            JsonSerializer,
            CommitLogConfig {
                queue_capacity: 2,
                max_batch_size: 2,
            },
        )
        .unwrap(),
    );

    let mut tasks = Vec::new();
    for transaction_id in 0..32 {
        let log = Arc::clone(&log);
        tasks.push(tokio::spawn(async move {
            log.append("unit-a", &commit(transaction_id)).await
        }));
    }
    for task in tasks {
        assert!(task.await.unwrap().unwrap());
    }
    assert_eq!(store.row_count().await, 32);
}
