//! Document backend trait

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::document::{JsonObject, SessionDocument};
use crate::error::SessionError;

/// Equality query over top-level document fields.
///
/// Every condition must hold. Each result row is the document content with
/// the document id projected under `id_field`.
#[derive(Debug, Clone, PartialEq)]
pub struct EqualityQuery {
    pub conditions: Vec<(String, Value)>,
    pub id_field: String,
}

impl EqualityQuery {
    pub fn new<S: Into<String>>(id_field: S) -> Self {
        Self {
            conditions: Vec::new(),
            id_field: id_field.into(),
        }
    }

    /// Add a `field == value` condition
    pub fn and_eq<S: Into<String>>(mut self, field: S, value: impl Into<Value>) -> Self {
        self.conditions.push((field.into(), value.into()));
        self
    }

    /// Check a document body against every condition
    pub fn matches(&self, content: &JsonObject) -> bool {
        self.conditions
            .iter()
            .all(|(field, value)| content.get(field) == Some(value))
    }
}

/// Secondary index over one or more fields, optionally partial
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexDefinition {
    pub name: String,
    pub fields: Vec<String>,
    /// Only documents where `field == value` are indexed
    pub predicate: Option<(String, Value)>,
}

impl IndexDefinition {
    pub fn new<S: Into<String>>(name: S, fields: Vec<String>) -> Self {
        Self {
            name: name.into(),
            fields,
            predicate: None,
        }
    }

    pub fn with_predicate<S: Into<String>>(mut self, field: S, value: impl Into<Value>) -> Self {
        self.predicate = Some((field.into(), value.into()));
        self
    }

    /// Whether a document body falls under this index's predicate
    pub fn covers(&self, content: &JsonObject) -> bool {
        match &self.predicate {
            Some((field, value)) => content.get(field) == Some(value),
            None => true,
        }
    }
}

/// Key-value document store with equality queries and index management
#[async_trait]
pub trait DocumentBackend: Send + Sync + 'static {
    /// Get a document by key
    ///
    /// Returns None if the document doesn't exist or its TTL has passed
    async fn get(&self, id: &str) -> Result<Option<SessionDocument>, SessionError>;

    /// Insert or replace a document, applying its TTL
    async fn upsert(&self, document: &SessionDocument) -> Result<(), SessionError>;

    /// Remove a document. Removing a missing key is not an error.
    async fn remove(&self, id: &str) -> Result<(), SessionError>;

    /// Run an equality query
    async fn query(&self, query: &EqualityQuery) -> Result<Vec<JsonObject>, SessionError>;

    /// Create an index if it doesn't exist.
    ///
    /// Returns true if it was created, false if it already existed.
    async fn create_index(&self, index: &IndexDefinition) -> Result<bool, SessionError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_query_matches_all_conditions() {
        let query = EqualityQuery::new("_id")
            .and_eq("_principal", "alice")
            .and_eq("type", "session");

        let content = json!({ "type": "session", "_principal": "alice" });
        assert!(query.matches(content.as_object().unwrap()));

        let content = json!({ "type": "other", "_principal": "alice" });
        assert!(!query.matches(content.as_object().unwrap()));

        let content = json!({ "type": "session" });
        assert!(!query.matches(content.as_object().unwrap()));
    }
}
