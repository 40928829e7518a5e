//! # Follower Engine Core
//!
//! This crate provides the core primitives of an event-sourced follower
//! (read-model) actor runtime:
//! - Follower lifecycle: activation, snapshot load, log replay, in-order
//!   event delivery, snapshot save policy, deactivation save policy
//! - Event and state model with per-key version bookkeeping
//! - Abstract `EventStore` / `StateStore` persistence contracts plus
//!   in-memory implementations
//! - A bounded MPSC coalescing channel with per-item completion
//! - A batched transactional append coalescer with single-row fallback
//!
//! ## Core Concepts
//!
//! - **Follower**: a per-key actor that materializes state by replaying an
//!   event log, hosted by an external virtual-actor platform
//! - **FollowerHandler**: user behavior, fresh state construction and the
//!   effect of each event
//! - **CommitLog**: funnels per-unit commit appends from many producers
//!   into bulk transactional writes
//!
//! ## Examples
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use async_trait::async_trait;
//! use follower_engine_core::{
//!     EventStore, Follower, FollowerDeps, FollowerHandler, FollowerOptions,
//!     FollowerResult, InMemoryEventStore, InMemoryStateStore, SequencedEvent,
//!     StateStore,
//! };
//!
//! struct Counter;
//!
//! #[async_trait]
//! impl FollowerHandler for Counter {
//!     type Key = String;
//!     type Event = u64;
//!     type Payload = u64;
//!
//!     fn create_payload(&self, _key: &String) -> u64 {
//!         0
//!     }
//!
//!     async fn on_event_delivered(
//!         &self,
//!         payload: &mut u64,
//!         event: &SequencedEvent<String, u64>,
//!     ) -> FollowerResult<()> {
//!         *payload += event.payload;
//!         Ok(())
//!     }
//! }
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> FollowerResult<()> {
//! let events = Arc::new(InMemoryEventStore::new());
//! let states = Arc::new(InMemoryStateStore::new());
//! let deps = FollowerDeps::new(
//!     Arc::clone(&events) as Arc<dyn EventStore<String, u64>>,
//!     states as Arc<dyn StateStore<String, u64>>,
//! );
//!
//! let mut follower = Follower::activate(
//!     "counter-1".to_string(),
//!     Arc::new(Counter),
//!     deps,
//!     FollowerOptions::default(),
//! )
//! .await?;
//!
//! follower
//!     .tell(SequencedEvent::new("counter-1".to_string(), 1, 5))
//!     .await?;
//! assert_eq!(follower.state().await.payload, 5);
//! # Ok(())
//! # }
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod channel;
pub mod coalescer;
pub mod error;
pub mod event;
pub mod follower;
pub mod options;
pub mod registry;
pub mod serializer;
pub mod state;
pub mod store;
pub mod transaction;

// Re-export commonly used types
pub use channel::{AsyncItem, BatchChannel};
pub use coalescer::{CommitLog, CommitLogConfig};
pub use error::{FollowerError, FollowerResult};
pub use event::{ActorKey, EventBase, MessageEnvelope, SequencedEvent};
pub use follower::{Follower, FollowerDeps, FollowerHandler};
pub use options::FollowerOptions;
pub use registry::TypeRegistry;
pub use serializer::{JsonSerializer, Serializer};
pub use state::FollowerState;
pub use store::{EventStore, InMemoryEventStore, InMemoryStateStore, StateStore};
pub use transaction::{
    AppendRequest, Commit, InMemoryTransactionStore, TransactionStatus, TransactionStore,
};
