//! In-memory document bucket
//!
//! This is primarily for development and testing.
//! For production, use RedisBucket or another persistent backend.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::{DocumentBackend, EqualityQuery, IndexDefinition};
use crate::document::{JsonObject, SessionDocument};
use crate::error::SessionError;

struct StoredDocument {
    document: SessionDocument,
    expires_at: Option<Instant>,
}

impl StoredDocument {
    fn is_live(&self, now: Instant) -> bool {
        match self.expires_at {
            Some(exp) => exp > now,
            None => true,
        }
    }
}

/// In-memory document bucket
///
/// Warning: This backend is not suitable for production use because:
/// - Documents are lost on server restart
/// - Documents are not shared across multiple server instances
/// - Queries scan every document; indexes are only recorded
pub struct MemoryBucket {
    documents: Arc<RwLock<HashMap<String, StoredDocument>>>,
    indexes: Arc<RwLock<HashMap<String, IndexDefinition>>>,
}

impl MemoryBucket {
    /// Create a new memory bucket
    pub fn new() -> Self {
        Self {
            documents: Arc::new(RwLock::new(HashMap::new())),
            indexes: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Drop documents whose TTL has passed
    pub fn cleanup_expired(&self) {
        let now = Instant::now();
        self.documents.write().retain(|_, stored| stored.is_live(now));
    }

    /// Number of live documents
    pub fn len(&self) -> usize {
        self.cleanup_expired();
        self.documents.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Get an index definition by name
    pub fn index(&self, name: &str) -> Option<IndexDefinition> {
        self.indexes.read().get(name).cloned()
    }
}

impl Default for MemoryBucket {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for MemoryBucket {
    fn clone(&self) -> Self {
        Self {
            documents: Arc::clone(&self.documents),
            indexes: Arc::clone(&self.indexes),
        }
    }
}

#[async_trait]
impl DocumentBackend for MemoryBucket {
    async fn get(&self, id: &str) -> Result<Option<SessionDocument>, SessionError> {
        let documents = self.documents.read();

        match documents.get(id) {
            Some(stored) if stored.is_live(Instant::now()) => Ok(Some(stored.document.clone())),
            _ => Ok(None),
        }
    }

    async fn upsert(&self, document: &SessionDocument) -> Result<(), SessionError> {
        let expires_at = match document.expiry {
            0 => None,
            secs => Some(Instant::now() + Duration::from_secs(u64::from(secs))),
        };

        let stored = StoredDocument {
            document: document.clone(),
            expires_at,
        };

        self.documents.write().insert(document.id.clone(), stored);
        Ok(())
    }

    async fn remove(&self, id: &str) -> Result<(), SessionError> {
        self.documents.write().remove(id);
        Ok(())
    }

    async fn query(&self, query: &EqualityQuery) -> Result<Vec<JsonObject>, SessionError> {
        let now = Instant::now();
        let documents = self.documents.read();

        Ok(documents
            .values()
            .filter(|stored| stored.is_live(now) && query.matches(&stored.document.content))
            .map(|stored| {
                let mut row = stored.document.content.clone();
                row.insert(
                    query.id_field.clone(),
                    serde_json::Value::String(stored.document.id.clone()),
                );
                row
            })
            .collect())
    }

    async fn create_index(&self, index: &IndexDefinition) -> Result<bool, SessionError> {
        let mut indexes = self.indexes.write();
        if indexes.contains_key(&index.name) {
            return Ok(false);
        }
        indexes.insert(index.name.clone(), index.clone());
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn document(id: &str, expiry: u32, principal: &str) -> SessionDocument {
        let content = json!({ "type": "session", "_principal": principal });
        SessionDocument::new(id, expiry, content.as_object().unwrap().clone())
    }

    #[tokio::test]
    async fn test_memory_bucket_basic() {
        let bucket = MemoryBucket::new();

        bucket.upsert(&document("test-id", 3600, "alice")).await.unwrap();

        let retrieved = bucket.get("test-id").await.unwrap();
        assert!(retrieved.is_some());
        assert_eq!(retrieved.unwrap().content["_principal"], json!("alice"));

        bucket.remove("test-id").await.unwrap();
        assert!(bucket.get("test-id").await.unwrap().is_none());

        // Removing again is fine
        bucket.remove("test-id").await.unwrap();
    }

    #[tokio::test]
    async fn test_memory_bucket_no_expiry() {
        let bucket = MemoryBucket::new();
        bucket.upsert(&document("forever", 0, "alice")).await.unwrap();
        assert!(bucket.get("forever").await.unwrap().is_some());
        assert_eq!(bucket.len(), 1);
    }

    #[tokio::test]
    async fn test_memory_bucket_query() {
        let bucket = MemoryBucket::new();
        bucket.upsert(&document("a", 3600, "alice")).await.unwrap();
        bucket.upsert(&document("b", 3600, "alice")).await.unwrap();
        bucket.upsert(&document("c", 3600, "bob")).await.unwrap();

        let query = EqualityQuery::new("_id").and_eq("_principal", "alice");
        let mut ids: Vec<String> = bucket
            .query(&query)
            .await
            .unwrap()
            .into_iter()
            .map(|row| row["_id"].as_str().unwrap().to_string())
            .collect();
        ids.sort();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_create_index_is_idempotent() {
        let bucket = MemoryBucket::new();
        let index = IndexDefinition::new("idx", vec!["type".to_string()]);
        assert!(bucket.create_index(&index).await.unwrap());
        assert!(!bucket.create_index(&index).await.unwrap());
        assert_eq!(bucket.index("idx"), Some(index));
    }
}
