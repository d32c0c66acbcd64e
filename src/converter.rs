//! Conversion between [`Session`] and [`SessionDocument`]
//!
//! Document layout, in insertion order:
//!
//! | field                 | value                                   |
//! |-----------------------|-----------------------------------------|
//! | `<type name>`         | type value                              |
//! | `_created`            | creation time, epoch millis             |
//! | `_accessed`           | last access time, epoch millis          |
//! | `_interval`           | max inactive interval, seconds          |
//! | `_principal`          | resolved principal or null              |
//! | `_expireAt`           | expiration time, epoch millis           |
//! | `_attr`               | base64 of the serialized attribute map  |
//! | `<attribute name>`    | string attributes, literal mode only    |

use base64::{engine::general_purpose::STANDARD, Engine};
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::sync::Arc;

use crate::document::{
    JsonObject, SessionDocument, ATTRIBUTES, CREATION_TIME, EXPIRE_AT, ID, LAST_ACCESSED_TIME,
    MAX_INTERVAL, PRINCIPAL, RESERVED_PREFIX,
};
use crate::error::SessionError;
use crate::principal::extract_principal;
use crate::serializer::{AttributeSerializer, Attributes};
use crate::session::Session;

/// Maps sessions to documents and back
///
/// The backend TTL written on each document is the converter's
/// `max_expiration_time`, a configuration-level ceiling. It does not follow
/// the session's own interval, so a session with a longer (or negative)
/// interval can still be dropped by the backend once the ceiling passes.
/// Expiration is always decided by `expire_at`; the TTL only bounds how long
/// abandoned documents linger.
#[derive(Clone)]
pub struct SessionConverter {
    serializer: Arc<dyn AttributeSerializer>,
    type_name: String,
    type_value: String,
    max_expiration_time: u32,
    keep_string_as_literal: bool,
}

impl SessionConverter {
    pub fn new<N: Into<String>, V: Into<String>>(
        serializer: Arc<dyn AttributeSerializer>,
        type_name: N,
        type_value: V,
        max_expiration_time: u32,
        keep_string_as_literal: bool,
    ) -> Self {
        Self {
            serializer,
            type_name: type_name.into(),
            type_value: type_value.into(),
            max_expiration_time,
            keep_string_as_literal,
        }
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn type_value(&self) -> &str {
        &self.type_value
    }

    pub fn max_expiration_time(&self) -> u32 {
        self.max_expiration_time
    }

    pub fn keeps_string_as_literal(&self) -> bool {
        self.keep_string_as_literal
    }

    /// Keys that may be mirrored as top-level fields
    fn is_literal_key(&self, key: &str) -> bool {
        !key.starts_with(RESERVED_PREFIX) && key != self.type_name
    }

    /// Attributes written as top-level fields instead of into the blob
    fn is_literal(&self, key: &str, value: &Value) -> bool {
        self.keep_string_as_literal && value.is_string() && self.is_literal_key(key)
    }

    /// Encode a session into a document
    pub fn to_document(&self, session: &Session) -> Result<SessionDocument, SessionError> {
        let mut content = JsonObject::new();
        content.insert(self.type_name.clone(), Value::String(self.type_value.clone()));
        content.insert(
            CREATION_TIME.to_string(),
            Value::from(session.creation_time().timestamp_millis()),
        );
        content.insert(
            LAST_ACCESSED_TIME.to_string(),
            Value::from(session.last_accessed_time().timestamp_millis()),
        );
        content.insert(
            MAX_INTERVAL.to_string(),
            Value::from(session.max_inactive_interval()),
        );
        content.insert(
            PRINCIPAL.to_string(),
            extract_principal(session.attributes()).map_or(Value::Null, Value::String),
        );
        content.insert(
            EXPIRE_AT.to_string(),
            Value::from(session.expire_at().timestamp_millis()),
        );
        content.insert(
            ATTRIBUTES.to_string(),
            Value::String(self.serialize_attributes(session)?),
        );

        if self.keep_string_as_literal {
            let mut literals: Vec<(&String, &Value)> = session
                .attributes()
                .iter()
                .filter(|(key, value)| self.is_literal(key, value))
                .collect();
            literals.sort_by(|a, b| a.0.cmp(b.0));
            for (key, value) in literals {
                content.insert(key.clone(), value.clone());
            }
        }

        Ok(SessionDocument::new(
            session.id(),
            self.max_expiration_time,
            content,
        ))
    }

    /// Decode a full document; the id comes from the document key
    pub fn from_document(&self, document: &SessionDocument) -> Result<Session, SessionError> {
        self.decode(&document.content, document.id.clone())
    }

    /// Decode a bare field set, such as a query row; the id comes from `_id`
    pub fn from_object(&self, object: &JsonObject) -> Result<Session, SessionError> {
        let id = match object.get(ID) {
            None | Some(Value::Null) => return Err(SessionError::MissingField(ID.to_string())),
            Some(value) => value
                .as_str()
                .ok_or_else(|| SessionError::InvalidField(ID.to_string()))?,
        };
        self.decode(object, id.to_string())
    }

    fn decode(&self, content: &JsonObject, id: String) -> Result<Session, SessionError> {
        let interval = required_i64(content, MAX_INTERVAL)?;

        let mut session = Session::with_id(id, interval);
        session.set_creation_time(required_millis(content, CREATION_TIME)?);
        session.set_last_accessed_time(required_millis(content, LAST_ACCESSED_TIME)?);
        // Persisted value wins over last access + interval
        session.set_expire_at(required_millis(content, EXPIRE_AT)?);

        for (key, value) in self.deserialize_attributes(content.get(ATTRIBUTES))? {
            session.set_attribute(key, value);
        }

        if self.keep_string_as_literal {
            for (key, value) in content {
                if value.is_string() && self.is_literal_key(key) {
                    session.set_attribute(key.clone(), value.clone());
                }
            }
        }

        Ok(session)
    }

    fn serialize_attributes(&self, session: &Session) -> Result<String, SessionError> {
        let attributes: Attributes = session
            .attributes()
            .iter()
            .filter(|(key, value)| !self.is_literal(key, value))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();
        let bytes = self.serializer.serialize(&attributes)?;
        Ok(STANDARD.encode(bytes))
    }

    fn deserialize_attributes(&self, blob: Option<&Value>) -> Result<Attributes, SessionError> {
        match blob {
            None | Some(Value::Null) => Ok(Attributes::new()),
            Some(Value::String(text)) => {
                let bytes = STANDARD.decode(text).map_err(|e| {
                    SessionError::DeserializationError(format!("invalid attribute blob: {}", e))
                })?;
                self.serializer.deserialize(&bytes)
            }
            Some(_) => Err(SessionError::DeserializationError(
                "attribute blob is not a string".to_string(),
            )),
        }
    }
}

fn required_i64(content: &JsonObject, field: &str) -> Result<i64, SessionError> {
    match content.get(field) {
        None | Some(Value::Null) => Err(SessionError::MissingField(field.to_string())),
        Some(value) => value
            .as_i64()
            .ok_or_else(|| SessionError::InvalidField(field.to_string())),
    }
}

fn required_millis(content: &JsonObject, field: &str) -> Result<DateTime<Utc>, SessionError> {
    let millis = required_i64(content, field)?;
    DateTime::from_timestamp_millis(millis)
        .ok_or_else(|| SessionError::InvalidField(field.to_string()))
}
