// Payload serialization used by the append coalescer and wire helpers

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::FollowerResult;

/// Byte and text serialization for event payloads and transaction-log data.
///
/// The text variant exists because the transaction log stores its `data`
/// column as a string; everything else travels as bytes.
pub trait Serializer: Send + Sync + 'static {
    fn to_bytes<T: Serialize>(&self, value: &T) -> FollowerResult<Vec<u8>>;

    fn from_bytes<T: DeserializeOwned>(&self, bytes: &[u8]) -> FollowerResult<T>;

    fn to_text<T: Serialize>(&self, value: &T) -> FollowerResult<String>;

    fn from_text<T: DeserializeOwned>(&self, text: &str) -> FollowerResult<T>;
}

/// JSON serializer backed by serde_json.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonSerializer;

impl Serializer for JsonSerializer {
    fn to_bytes<T: Serialize>(&self, value: &T) -> FollowerResult<Vec<u8>> {
        Ok(serde_json::to_vec(value)?)
    }

    fn from_bytes<T: DeserializeOwned>(&self, bytes: &[u8]) -> FollowerResult<T> {
        Ok(serde_json::from_slice(bytes)?)
    }

    fn to_text<T: Serialize>(&self, value: &T) -> FollowerResult<String> {
        Ok(serde_json::to_string(value)?)
    }

    fn from_text<T: DeserializeOwned>(&self, text: &str) -> FollowerResult<T> {
        Ok(serde_json::from_str(text)?)
    }
}
