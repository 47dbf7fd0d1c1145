//! Payload encoding collaborators.
//!
//! The queue never interprets payload bytes. A [`PayloadSerializer`] turns
//! producer payloads into blobs on insert and back on batch retrieval.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::marker::PhantomData;

/// Encodes payloads to blobs and decodes them back.
///
/// Implementations must round-trip: `deserialize(serialize(p)) == p`.
pub trait PayloadSerializer: Send + Sync {
    type Payload;
    type Error: std::error::Error;

    fn serialize(&self, payload: &Self::Payload) -> Result<Vec<u8>, Self::Error>;

    fn deserialize(&self, blob: &[u8]) -> Result<Self::Payload, Self::Error>;
}

/// JSON serializer backed by serde_json.
///
/// Defaults to untyped [`serde_json::Value`] payloads.
pub struct JsonSerializer<T = serde_json::Value> {
    _payload: PhantomData<fn() -> T>,
}

impl<T> JsonSerializer<T> {
    pub fn new() -> Self {
        Self {
            _payload: PhantomData,
        }
    }
}

impl<T> Default for JsonSerializer<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> std::fmt::Debug for JsonSerializer<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JsonSerializer").finish()
    }
}

impl<T> PayloadSerializer for JsonSerializer<T>
where
    T: Serialize + DeserializeOwned,
{
    type Payload = T;
    type Error = serde_json::Error;

    fn serialize(&self, payload: &T) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(payload)
    }

    fn deserialize(&self, blob: &[u8]) -> Result<T, serde_json::Error> {
        serde_json::from_slice(blob)
    }
}
