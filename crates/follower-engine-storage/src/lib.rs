//! # Follower Engine Storage
//!
//! PostgreSQL implementations of the follower engine's persistence
//! contracts, built on Diesel with r2d2 connection pooling:
//! - [`PostgresEventStore`]: the append-only per-key event log
//! - [`PostgresStateStore`]: the latest snapshot per key
//! - [`PostgresTransactionStore`]: the unit-scoped commit log the append
//!   coalescer writes through, with duplicate-key detection
//!
//! Event payloads and snapshots are stored as JSONB; commit-log data is a
//! text column. Composite primary keys carry the uniqueness guarantees,
//! so no separate index setup is required for correctness.

#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod config;
pub mod event_store;
pub mod pool;
pub mod schema;
pub mod state_store;
pub mod transaction_store;

pub use config::StorageConfig;
pub use event_store::PostgresEventStore;
pub use pool::{build_pool, PgPool};
pub use state_store::PostgresStateStore;
pub use transaction_store::PostgresTransactionStore;
