// Process-wide registry resolving wire type names to payload decoders

use std::any::Any;
use std::collections::HashMap;
use std::sync::RwLock;

use once_cell::sync::Lazy;
use serde::de::DeserializeOwned;

use crate::error::{FollowerError, FollowerResult};

type Decoder = Box<dyn Fn(&[u8]) -> FollowerResult<Box<dyn Any + Send>> + Send + Sync>;

static GLOBAL_REGISTRY: Lazy<TypeRegistry> = Lazy::new(TypeRegistry::new);

/// Maps wire `type_name`s to decoders for the concrete payload types.
///
/// Read-mostly: populate it during process startup, before the first
/// envelope is delivered.
pub struct TypeRegistry {
    decoders: RwLock<HashMap<String, Decoder>>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self {
            decoders: RwLock::new(HashMap::new()),
        }
    }

    /// The process-wide registry followers resolve against.
    pub fn global() -> &'static TypeRegistry {
        &GLOBAL_REGISTRY
    }

    /// Register a decoder for `type_name`. Later registrations under the
    /// same name replace earlier ones.
    pub fn register<T>(&self, type_name: &str)
    where
        T: DeserializeOwned + Send + 'static,
    {
        let decoder: Decoder = Box::new(|bytes| {
            let value: T = serde_json::from_slice(bytes)?;
            Ok(Box::new(value) as Box<dyn Any + Send>)
        });
        let mut decoders = self
            .decoders
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        decoders.insert(type_name.to_string(), decoder);
    }

    pub fn contains(&self, type_name: &str) -> bool {
        let decoders = self
            .decoders
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        decoders.contains_key(type_name)
    }

    /// Decode payload bytes under the type registered for `type_name`.
    ///
    /// Returns `None` when the name is unknown, so callers can treat the
    /// payload as a non-event message and drop it.
    pub fn decode(&self, type_name: &str, bytes: &[u8]) -> Option<FollowerResult<Box<dyn Any + Send>>> {
        let decoders = self
            .decoders
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        decoders.get(type_name).map(|decoder| {
            decoder(bytes).map_err(|error| FollowerError::SerializationError {
                message: format!("failed to decode payload of type '{}': {}", type_name, error),
            })
        })
    }
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Ping {
        seq: u32,
    }

    #[test]
    fn registered_types_decode_and_downcast() {
        let registry = TypeRegistry::new();
        registry.register::<Ping>("ping");
        assert!(registry.contains("ping"));

        let bytes = serde_json::to_vec(&Ping { seq: 9 }).unwrap();
        let decoded = registry.decode("ping", &bytes).unwrap().unwrap();
        let ping = decoded.downcast::<Ping>().ok().unwrap();
        assert_eq!(*ping, Ping { seq: 9 });
    }

    #[test]
    fn unknown_type_name_resolves_to_none() {
        let registry = TypeRegistry::new();
        assert!(registry.decode("missing", b"{}").is_none());
    }

    #[test]
    fn malformed_bytes_surface_decode_error() {
        let registry = TypeRegistry::new();
        registry.register::<Ping>("ping");
        let result = registry.decode("ping", b"not json").unwrap();
        assert!(result.is_err());
    }
}
