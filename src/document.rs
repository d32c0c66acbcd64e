//! Persisted session document layout

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// JSON object as stored in the backend
pub type JsonObject = Map<String, Value>;

/// Prefix reserved for fields written by the converter
pub const RESERVED_PREFIX: &str = "_";

/// Document id as projected into query results
pub const ID: &str = "_id";
/// Creation time, epoch milliseconds
pub const CREATION_TIME: &str = "_created";
/// Last access time, epoch milliseconds
pub const LAST_ACCESSED_TIME: &str = "_accessed";
/// Max inactive interval, seconds
pub const MAX_INTERVAL: &str = "_interval";
/// Resolved principal name
pub const PRINCIPAL: &str = "_principal";
/// Expiration time, epoch milliseconds
pub const EXPIRE_AT: &str = "_expireAt";
/// Serialized attribute blob, base64 text
pub const ATTRIBUTES: &str = "_attr";

/// One physical document per session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionDocument {
    /// Document key, equal to the session id
    pub id: String,
    /// Backend TTL in seconds; 0 means the backend never expires it
    pub expiry: u32,
    /// Document body
    pub content: JsonObject,
}

impl SessionDocument {
    pub fn new<S: Into<String>>(id: S, expiry: u32, content: JsonObject) -> Self {
        Self {
            id: id.into(),
            expiry,
            content,
        }
    }

    /// Content with the id projected under [`ID`], as returned by queries
    pub fn projected(&self) -> JsonObject {
        let mut row = self.content.clone();
        row.insert(ID.to_string(), Value::String(self.id.clone()));
        row
    }
}
