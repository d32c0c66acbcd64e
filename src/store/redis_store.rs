//! Redis document bucket
//!
//! Storage layout:
//! - Document: `prefix + "doc:" + id`, JSON of the [`SessionDocument`], TTL = document expiry
//! - Index entry: `prefix + "idx:" + field + ":" + json(value)`, a set of document ids
//! - Index definitions: hash `prefix + "indexes"`, index name -> JSON definition
//!
//! Index sets are not expired with their documents. Queries drop members whose
//! document is gone.

use async_trait::async_trait;
use parking_lot::RwLock;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use serde_json::Value;
use std::collections::BTreeSet;
use std::sync::Arc;

use super::{DocumentBackend, EqualityQuery, IndexDefinition};
use crate::document::{JsonObject, SessionDocument};
use crate::error::SessionError;

/// Redis-backed document bucket
///
/// # Example
///
/// ```rust,ignore
/// use session_docstore::RedisBucket;
///
/// let client = redis::Client::open("redis://127.0.0.1/")?;
/// let bucket = RedisBucket::new(client).await?;
/// ```
pub struct RedisBucket {
    conn: Arc<ConnectionManager>,
    prefix: String,
    indexes: Arc<RwLock<Vec<IndexDefinition>>>,
}

impl RedisBucket {
    /// Create a new Redis bucket with the default prefix ("sess:")
    pub async fn new(client: redis::Client) -> Result<Self, SessionError> {
        Self::with_prefix(client, "sess:").await
    }

    /// Create a new Redis bucket from a connection string
    pub async fn from_url(url: &str) -> Result<Self, SessionError> {
        let client = redis::Client::open(url)
            .map_err(|e| SessionError::StoreError(format!("Failed to create Redis client: {}", e)))?;
        Self::new(client).await
    }

    /// Create a new Redis bucket with custom prefix
    pub async fn with_prefix(client: redis::Client, prefix: &str) -> Result<Self, SessionError> {
        let conn = ConnectionManager::new(client).await?;
        let bucket = Self::from_connection_manager(conn).with_custom_prefix(prefix);
        bucket.load_indexes().await?;
        Ok(bucket)
    }

    /// Create a new Redis bucket from an existing connection manager.
    ///
    /// Index definitions are not loaded; call [`RedisBucket::load_indexes`].
    pub fn from_connection_manager(conn: ConnectionManager) -> Self {
        Self {
            conn: Arc::new(conn),
            prefix: "sess:".to_string(),
            indexes: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Build with custom prefix
    pub fn with_custom_prefix(mut self, prefix: &str) -> Self {
        self.prefix = prefix.to_string();
        self
    }

    /// Reload index definitions from Redis
    pub async fn load_indexes(&self) -> Result<(), SessionError> {
        let mut conn = (*self.conn).clone();
        let raw: Vec<String> = conn.hvals(self.indexes_key()).await?;

        let mut definitions = Vec::with_capacity(raw.len());
        for json in raw {
            let definition: IndexDefinition = serde_json::from_str(&json).map_err(|e| {
                SessionError::StoreError(format!("Invalid index definition: {}", e))
            })?;
            definitions.push(definition);
        }

        *self.indexes.write() = definitions;
        Ok(())
    }

    fn make_key(&self, id: &str) -> String {
        format!("{}doc:{}", self.prefix, id)
    }

    fn index_key(&self, field: &str, value: &Value) -> String {
        format!("{}idx:{}:{}", self.prefix, field, value)
    }

    fn indexes_key(&self) -> String {
        format!("{}indexes", self.prefix)
    }

    /// Index set keys a document belongs to
    fn index_entries(&self, indexes: &[IndexDefinition], content: &JsonObject) -> BTreeSet<String> {
        indexes
            .iter()
            .filter(|index| index.covers(content))
            .flat_map(|index| index.fields.iter())
            .filter_map(|field| match content.get(field) {
                None | Some(Value::Null) => None,
                Some(value) => Some(self.index_key(field, value)),
            })
            .collect()
    }

    async fn fetch(
        &self,
        conn: &mut ConnectionManager,
        id: &str,
    ) -> Result<Option<SessionDocument>, SessionError> {
        let data: Option<String> = conn.get(self.make_key(id)).await?;

        match data {
            Some(json) => {
                let document = serde_json::from_str(&json).map_err(|e| {
                    SessionError::StoreError(format!("Invalid document '{}': {}", id, e))
                })?;
                Ok(Some(document))
            }
            None => Ok(None),
        }
    }

    async fn fetch_many(
        &self,
        conn: &mut ConnectionManager,
        ids: &[String],
    ) -> Result<Vec<(String, Option<SessionDocument>)>, SessionError> {
        if ids.is_empty() {
            return Ok(vec![]);
        }

        let keys: Vec<String> = ids.iter().map(|id| self.make_key(id)).collect();
        let values: Vec<Option<String>> = conn.mget(&keys).await?;

        parse_documents(ids, values)
    }

    async fn all_ids(&self, conn: &mut ConnectionManager) -> Result<Vec<String>, SessionError> {
        let pattern = format!("{}doc:*", self.prefix);
        let keys: Vec<String> = redis::cmd("KEYS")
            .arg(&pattern)
            .query_async(conn)
            .await?;

        let prefix_len = self.prefix.len() + "doc:".len();
        Ok(keys.into_iter().map(|k| k[prefix_len..].to_string()).collect())
    }
}

/// Pair `MGET` replies with their ids. A nil reply means the document is
/// gone; a reply that fails to parse is an error.
fn parse_documents(
    ids: &[String],
    values: Vec<Option<String>>,
) -> Result<Vec<(String, Option<SessionDocument>)>, SessionError> {
    ids.iter()
        .cloned()
        .zip(values)
        .map(|(id, json)| match json {
            Some(json) => match serde_json::from_str::<SessionDocument>(&json) {
                Ok(document) => Ok((id, Some(document))),
                Err(e) => Err(SessionError::StoreError(format!(
                    "Invalid document '{}': {}",
                    id, e
                ))),
            },
            None => Ok((id, None)),
        })
        .collect()
}

/// Pick the query condition whose index set can answer the query.
///
/// A partial index only holds documents matching its predicate, so it is
/// usable only when the query pins the predicate field to the same value.
fn index_condition<'a>(
    indexes: &[IndexDefinition],
    query: &'a EqualityQuery,
) -> Option<&'a (String, Value)> {
    query.conditions.iter().find(|(field, _)| {
        indexes.iter().any(|index| {
            index.fields.iter().any(|f| f == field)
                && index.predicate.as_ref().map_or(true, |predicate| {
                    query.conditions.iter().any(|condition| condition == predicate)
                })
        })
    })
}

impl Clone for RedisBucket {
    fn clone(&self) -> Self {
        Self {
            conn: Arc::clone(&self.conn),
            prefix: self.prefix.clone(),
            indexes: Arc::clone(&self.indexes),
        }
    }
}

#[async_trait]
impl DocumentBackend for RedisBucket {
    async fn get(&self, id: &str) -> Result<Option<SessionDocument>, SessionError> {
        let mut conn = (*self.conn).clone();
        self.fetch(&mut conn, id).await
    }

    async fn upsert(&self, document: &SessionDocument) -> Result<(), SessionError> {
        let key = self.make_key(&document.id);
        let mut conn = (*self.conn).clone();
        let indexes = self.indexes.read().clone();

        let new_entries = self.index_entries(&indexes, &document.content);
        if !indexes.is_empty() {
            if let Some(previous) = self.fetch(&mut conn, &document.id).await? {
                for stale in self
                    .index_entries(&indexes, &previous.content)
                    .difference(&new_entries)
                {
                    conn.srem::<_, _, ()>(stale, &document.id).await?;
                }
            }
        }

        let json = serde_json::to_string(document)?;
        if document.expiry > 0 {
            conn.set_ex::<_, _, ()>(&key, &json, u64::from(document.expiry))
                .await?;
        } else {
            conn.set::<_, _, ()>(&key, &json).await?;
        }

        for entry in &new_entries {
            conn.sadd::<_, _, ()>(entry, &document.id).await?;
        }

        Ok(())
    }

    async fn remove(&self, id: &str) -> Result<(), SessionError> {
        let mut conn = (*self.conn).clone();
        let indexes = self.indexes.read().clone();

        if !indexes.is_empty() {
            if let Some(previous) = self.fetch(&mut conn, id).await? {
                for entry in self.index_entries(&indexes, &previous.content) {
                    conn.srem::<_, _, ()>(entry, id).await?;
                }
            }
        }

        conn.del::<_, ()>(self.make_key(id)).await?;
        Ok(())
    }

    async fn query(&self, query: &EqualityQuery) -> Result<Vec<JsonObject>, SessionError> {
        let mut conn = (*self.conn).clone();
        let indexes = self.indexes.read().clone();

        let indexed = index_condition(&indexes, query);

        let (ids, set_key) = match indexed {
            Some((field, value)) => {
                let set_key = self.index_key(field, value);
                let ids: Vec<String> = conn.smembers(&set_key).await?;
                (ids, Some(set_key))
            }
            None => {
                tracing::debug!("No index covers query, scanning all documents");
                (self.all_ids(&mut conn).await?, None)
            }
        };

        let mut rows = Vec::new();
        for (id, document) in self.fetch_many(&mut conn, &ids).await? {
            match document {
                Some(document) => {
                    if query.matches(&document.content) {
                        let mut row = document.content;
                        row.insert(query.id_field.clone(), Value::String(document.id));
                        rows.push(row);
                    }
                }
                None => {
                    if let Some(set_key) = &set_key {
                        conn.srem::<_, _, ()>(set_key, &id).await?;
                    }
                }
            }
        }

        Ok(rows)
    }

    async fn create_index(&self, index: &IndexDefinition) -> Result<bool, SessionError> {
        let mut conn = (*self.conn).clone();
        let json = serde_json::to_string(index)?;

        let created: bool = conn.hset_nx(self.indexes_key(), &index.name, &json).await?;
        self.load_indexes().await?;

        if created {
            // Backfill documents written before the index existed
            let ids = self.all_ids(&mut conn).await?;
            for (id, document) in self.fetch_many(&mut conn, &ids).await? {
                if let Some(document) = document {
                    for entry in self.index_entries(std::slice::from_ref(index), &document.content) {
                        conn.sadd::<_, _, ()>(entry, &id).await?;
                    }
                }
            }
        }

        Ok(created)
    }
}

#[cfg(test)]
mod tests {
    // Ignored tests require a running Redis instance
    // Run with: cargo test --features redis-store -- --ignored

    use super::*;
    use serde_json::json;

    fn document(id: &str, principal: &str) -> SessionDocument {
        let content = json!({ "type": "session", "_principal": principal });
        SessionDocument::new(id, 3600, content.as_object().unwrap().clone())
    }

    fn principal_index() -> IndexDefinition {
        IndexDefinition::new(
            "sessions_index",
            vec!["type".to_string(), "_principal".to_string()],
        )
        .with_predicate("type", "session")
    }

    #[test]
    fn test_parse_documents_missing_entry() {
        let ids = vec!["a".to_string(), "b".to_string()];
        let json = serde_json::to_string(&document("a", "alice")).unwrap();

        let parsed = parse_documents(&ids, vec![Some(json), None]).unwrap();
        assert_eq!(parsed[0], ("a".to_string(), Some(document("a", "alice"))));
        assert_eq!(parsed[1], ("b".to_string(), None));
    }

    #[test]
    fn test_parse_documents_corrupt_entry_fails() {
        let ids = vec!["a".to_string(), "b".to_string()];
        let json = serde_json::to_string(&document("a", "alice")).unwrap();

        let result = parse_documents(&ids, vec![Some(json), Some("{not json".to_string())]);
        match result {
            Err(SessionError::StoreError(msg)) => assert!(msg.contains("'b'")),
            other => panic!("expected StoreError, got {:?}", other),
        }
    }

    #[test]
    fn test_partial_index_needs_predicate_condition() {
        let indexes = vec![principal_index()];

        let unconstrained = EqualityQuery::new("_id").and_eq("_principal", "alice");
        assert_eq!(index_condition(&indexes, &unconstrained), None);

        let other_type = EqualityQuery::new("_id")
            .and_eq("type", "cart")
            .and_eq("_principal", "alice");
        assert_eq!(index_condition(&indexes, &other_type), None);

        let constrained = EqualityQuery::new("_id")
            .and_eq("type", "session")
            .and_eq("_principal", "alice");
        assert_eq!(
            index_condition(&indexes, &constrained),
            Some(&("type".to_string(), json!("session")))
        );
    }

    #[test]
    fn test_full_index_is_always_usable() {
        let indexes = vec![IndexDefinition::new(
            "principal_index",
            vec!["_principal".to_string()],
        )];
        let query = EqualityQuery::new("_id").and_eq("_principal", "alice");
        assert_eq!(
            index_condition(&indexes, &query),
            Some(&("_principal".to_string(), json!("alice")))
        );
        assert_eq!(index_condition(&[], &query), None);
    }

    #[tokio::test]
    #[ignore]
    async fn test_redis_bucket_basic() {
        let client = redis::Client::open("redis://127.0.0.1/").unwrap();
        let bucket = RedisBucket::with_prefix(client, "test-basic:").await.unwrap();

        bucket.upsert(&document("test-id", "alice")).await.unwrap();

        let retrieved = bucket.get("test-id").await.unwrap();
        assert_eq!(retrieved, Some(document("test-id", "alice")));

        bucket.remove("test-id").await.unwrap();
        assert!(bucket.get("test-id").await.unwrap().is_none());
    }

    #[tokio::test]
    #[ignore]
    async fn test_redis_bucket_index_query() {
        let client = redis::Client::open("redis://127.0.0.1/").unwrap();
        let bucket = RedisBucket::with_prefix(client, "test-query:").await.unwrap();

        let index = principal_index();
        bucket.create_index(&index).await.unwrap();
        assert!(!bucket.create_index(&index).await.unwrap());

        bucket.upsert(&document("a", "alice")).await.unwrap();
        bucket.upsert(&document("b", "alice")).await.unwrap();
        // Principal changes move the document between index sets
        bucket.upsert(&document("b", "bob")).await.unwrap();

        let query = EqualityQuery::new("_id").and_eq("_principal", "alice");
        let rows = bucket.query(&query).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["_id"], json!("a"));

        bucket.remove("a").await.unwrap();
        bucket.remove("b").await.unwrap();
    }

    #[tokio::test]
    #[ignore]
    async fn test_redis_bucket_corrupt_document_kept_in_index() {
        let client = redis::Client::open("redis://127.0.0.1/").unwrap();
        let bucket = RedisBucket::with_prefix(client.clone(), "test-corrupt:")
            .await
            .unwrap();
        bucket.create_index(&principal_index()).await.unwrap();
        bucket.upsert(&document("a", "alice")).await.unwrap();

        let mut conn = client.get_multiplexed_async_connection().await.unwrap();
        conn.set::<_, _, ()>("test-corrupt:doc:a", "{not json")
            .await
            .unwrap();

        let query = EqualityQuery::new("_id")
            .and_eq("type", "session")
            .and_eq("_principal", "alice");
        assert!(matches!(
            bucket.query(&query).await,
            Err(SessionError::StoreError(_))
        ));

        let set_key = bucket.index_key("_principal", &json!("alice"));
        let members: Vec<String> = conn.smembers(&set_key).await.unwrap();
        assert_eq!(members, vec!["a".to_string()]);

        let type_key = bucket.index_key("type", &json!("session"));
        conn.del::<_, ()>(&["test-corrupt:doc:a", set_key.as_str(), type_key.as_str()])
            .await
            .unwrap();
    }
}
