// Event model and wire envelope for follower delivery

use std::fmt::Display;
use std::hash::Hash;

use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::FollowerResult;

/// Identifier of a per-key entity. Opaque to the runtime; it only needs to
/// be comparable, hashable, and printable for store lookups and logging.
pub trait ActorKey: Clone + Eq + Hash + Display + Send + Sync + 'static {}

impl<T> ActorKey for T where T: Clone + Eq + Hash + Display + Send + Sync + 'static {}

/// Version and time bookkeeping attached to every event.
///
/// `version` is strictly monotonic per key, starting at 1. `timestamp` is
/// unix milliseconds at the time the event was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventBase {
    pub version: u64,
    pub timestamp: i64,
}

impl EventBase {
    pub fn new(version: u64) -> Self {
        Self {
            version,
            timestamp: Utc::now().timestamp_millis(),
        }
    }

    pub fn with_timestamp(version: u64, timestamp: i64) -> Self {
        Self { version, timestamp }
    }
}

/// A domain event bound to the key of the entity it belongs to.
///
/// The runtime only reads `base`; `payload` is interpreted by the
/// follower's handler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SequencedEvent<K, E> {
    pub key: K,
    pub base: EventBase,
    pub payload: E,
}

impl<K, E> SequencedEvent<K, E> {
    pub fn new(key: K, version: u64, payload: E) -> Self {
        Self {
            key,
            base: EventBase::new(version),
            payload,
        }
    }

    pub fn version(&self) -> u64 {
        self.base.version
    }
}

/// Outer wire framing for `tell(bytes)` delivery.
///
/// `type_name` resolves to a registered decoder; `bytes` decode under that
/// type. The envelope itself travels bincode-framed so opaque payload bytes
/// survive intact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageEnvelope {
    pub type_name: String,
    pub bytes: Vec<u8>,
}

impl MessageEnvelope {
    /// Wrap a value for the wire: JSON payload bytes inside a bincode frame.
    pub fn wrap<T: Serialize>(type_name: &str, value: &T) -> FollowerResult<Vec<u8>> {
        let envelope = MessageEnvelope {
            type_name: type_name.to_string(),
            bytes: serde_json::to_vec(value)?,
        };
        Ok(bincode::serialize(&envelope)?)
    }

    pub fn decode(bytes: &[u8]) -> FollowerResult<Self> {
        Ok(bincode::deserialize(bytes)?)
    }

    /// Decode the inner payload directly, bypassing the registry. Senders
    /// and tests use this; followers resolve through the registry instead.
    pub fn open<T: DeserializeOwned>(&self) -> FollowerResult<T> {
        Ok(serde_json::from_slice(&self.bytes)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Deposited {
        amount: i64,
    }

    #[test]
    fn event_base_versions_are_carried_through() {
        let event = SequencedEvent::new("acct-1".to_string(), 3, Deposited { amount: 10 });
        assert_eq!(event.version(), 3);
        assert!(event.base.timestamp > 0);
    }

    #[test]
    fn envelope_round_trips_payload_bytes() {
        let event = SequencedEvent::new("acct-1".to_string(), 1, Deposited { amount: 25 });
        let wire = MessageEnvelope::wrap("deposited", &event).unwrap();

        let envelope = MessageEnvelope::decode(&wire).unwrap();
        assert_eq!(envelope.type_name, "deposited");

        let decoded: SequencedEvent<String, Deposited> = envelope.open().unwrap();
        assert_eq!(decoded, event);
    }
}
