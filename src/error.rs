//! Session error types

use std::fmt;

/// Errors that can occur during session operations
#[derive(Debug)]
pub enum SessionError {
    /// Error from the document backend
    StoreError(String),
    /// The attribute map could not be serialized
    SerializationError(String),
    /// The serialized attribute blob could not be decoded
    DeserializationError(String),
    /// A required document field is absent
    MissingField(String),
    /// A document field is present but has the wrong type
    InvalidField(String),
    /// A lifecycle notification could not be delivered
    NotificationDelivery(String),
    /// Redis error (when redis-store feature is enabled)
    #[cfg(feature = "redis-store")]
    RedisError(redis::RedisError),
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionError::StoreError(msg) => write!(f, "Session store error: {}", msg),
            SessionError::SerializationError(msg) => write!(f, "Serialization error: {}", msg),
            SessionError::DeserializationError(msg) => {
                write!(f, "Deserialization error: {}", msg)
            }
            SessionError::MissingField(field) => {
                write!(f, "Session document is missing field '{}'", field)
            }
            SessionError::InvalidField(field) => {
                write!(f, "Session document field '{}' has an invalid value", field)
            }
            SessionError::NotificationDelivery(msg) => {
                write!(f, "Failed to deliver session event: {}", msg)
            }
            #[cfg(feature = "redis-store")]
            SessionError::RedisError(e) => write!(f, "Redis error: {}", e),
        }
    }
}

impl std::error::Error for SessionError {}

#[cfg(feature = "redis-store")]
impl From<redis::RedisError> for SessionError {
    fn from(err: redis::RedisError) -> Self {
        SessionError::RedisError(err)
    }
}

impl From<serde_json::Error> for SessionError {
    fn from(err: serde_json::Error) -> Self {
        SessionError::SerializationError(err.to_string())
    }
}
