//! Binary serialization of session attribute maps

use serde_json::Value;
use std::collections::{BTreeMap, HashMap};

use crate::error::SessionError;

/// Attribute map as stored on a session
pub type Attributes = HashMap<String, Value>;

/// Stateless serializer for the attribute blob.
///
/// One instance is built up front and shared by every converter that needs it.
pub trait AttributeSerializer: Send + Sync + 'static {
    /// Serialize an attribute map to bytes
    fn serialize(&self, attributes: &Attributes) -> Result<Vec<u8>, SessionError>;

    /// Deserialize bytes produced by [`AttributeSerializer::serialize`]
    fn deserialize(&self, bytes: &[u8]) -> Result<Attributes, SessionError>;
}

/// Default serializer: UTF-8 JSON bytes with keys in sorted order
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonAttributeSerializer;

impl AttributeSerializer for JsonAttributeSerializer {
    fn serialize(&self, attributes: &Attributes) -> Result<Vec<u8>, SessionError> {
        let sorted: BTreeMap<&String, &Value> = attributes.iter().collect();
        serde_json::to_vec(&sorted).map_err(|e| SessionError::SerializationError(e.to_string()))
    }

    fn deserialize(&self, bytes: &[u8]) -> Result<Attributes, SessionError> {
        serde_json::from_slice(bytes).map_err(|e| SessionError::DeserializationError(e.to_string()))
    }
}
