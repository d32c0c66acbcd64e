//! Session entity with derived expiration time

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use uuid::Uuid;

use crate::config::DEFAULT_INACTIVE_INTERVAL;

/// Truncate to whole milliseconds, the precision documents are stored with
fn truncate_millis(time: DateTime<Utc>) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(time.timestamp_millis()).unwrap_or(time)
}

/// Server-side session
///
/// `expire_at` is always `last_accessed_time + max_inactive_interval`; it is
/// recomputed whenever either side changes. The only exception is
/// [`Session::set_expire_at`], which restores a persisted value.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    id: String,
    creation_time: DateTime<Utc>,
    last_accessed_time: DateTime<Utc>,
    max_inactive_interval: i64,
    expire_at: DateTime<Utc>,
    attributes: HashMap<String, Value>,
}

impl Default for Session {
    fn default() -> Self {
        Self::new(DEFAULT_INACTIVE_INTERVAL)
    }
}

impl Session {
    /// Create a session with a fresh id
    pub fn new(max_inactive_interval: i64) -> Self {
        Self::with_id(Uuid::new_v4().to_string(), max_inactive_interval)
    }

    /// Create a session with the given id
    pub fn with_id<S: Into<String>>(id: S, max_inactive_interval: i64) -> Self {
        let now = truncate_millis(Utc::now());
        let mut session = Self {
            id: id.into(),
            creation_time: now,
            last_accessed_time: now,
            max_inactive_interval,
            expire_at: now,
            attributes: HashMap::new(),
        };
        session.set_last_accessed_time(now);
        session
    }

    /// Get the session ID
    pub fn id(&self) -> &str {
        &self.id
    }

    pub(crate) fn set_id(&mut self, id: String) {
        self.id = id;
    }

    /// Assign a new random id, keeping all attributes
    pub fn change_session_id(&mut self) -> &str {
        self.id = Uuid::new_v4().to_string();
        &self.id
    }

    pub fn creation_time(&self) -> DateTime<Utc> {
        self.creation_time
    }

    /// Overwrite the creation time (used when restoring a persisted session)
    pub fn set_creation_time(&mut self, creation_time: DateTime<Utc>) {
        self.creation_time = truncate_millis(creation_time);
    }

    pub fn last_accessed_time(&self) -> DateTime<Utc> {
        self.last_accessed_time
    }

    /// Set the last access time and recompute `expire_at`
    pub fn set_last_accessed_time(&mut self, last_accessed_time: DateTime<Utc>) {
        self.last_accessed_time = truncate_millis(last_accessed_time);
        self.recompute_expire_at();
    }

    /// Mark the session as accessed now
    pub fn touch(&mut self) {
        self.set_last_accessed_time(Utc::now());
    }

    /// Max inactive interval in seconds; negative means never expires
    pub fn max_inactive_interval(&self) -> i64 {
        self.max_inactive_interval
    }

    /// Set the max inactive interval in seconds and recompute `expire_at`
    pub fn set_max_inactive_interval(&mut self, secs: i64) {
        self.max_inactive_interval = secs;
        self.recompute_expire_at();
    }

    pub fn expire_at(&self) -> DateTime<Utc> {
        self.expire_at
    }

    /// Restore a persisted expiration time verbatim.
    ///
    /// The persisted value is authoritative even when it disagrees with the
    /// current interval. Any later access-time or interval change recomputes it.
    pub fn set_expire_at(&mut self, expire_at: DateTime<Utc>) {
        self.expire_at = truncate_millis(expire_at);
    }

    fn recompute_expire_at(&mut self) {
        self.expire_at = truncate_millis(
            Duration::try_seconds(self.max_inactive_interval)
                .and_then(|interval| self.last_accessed_time.checked_add_signed(interval))
                .unwrap_or(DateTime::<Utc>::MAX_UTC),
        );
    }

    /// Check if the session has expired
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    /// Check expiration against an explicit clock
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.max_inactive_interval >= 0 && now > self.expire_at
    }

    /// Get a typed attribute value
    pub fn get<T: for<'de> Deserialize<'de>>(&self, key: &str) -> Option<T> {
        self.attributes
            .get(key)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    /// Get the raw attribute value
    pub fn attribute(&self, key: &str) -> Option<&Value> {
        self.attributes.get(key)
    }

    /// Set an attribute. A value serializing to `null` removes the key.
    pub fn set<T: Serialize>(&mut self, key: &str, value: T) {
        if let Ok(v) = serde_json::to_value(value) {
            self.set_attribute(key, v);
        }
    }

    /// Set a raw attribute value. `Value::Null` removes the key.
    pub fn set_attribute<S: Into<String>>(&mut self, key: S, value: Value) {
        let key = key.into();
        if value.is_null() {
            self.attributes.remove(&key);
        } else {
            self.attributes.insert(key, value);
        }
    }

    /// Remove an attribute
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.attributes.remove(key)
    }

    /// Check if an attribute exists
    pub fn contains(&self, key: &str) -> bool {
        self.attributes.contains_key(key)
    }

    pub fn attribute_names(&self) -> impl Iterator<Item = &str> {
        self.attributes.keys().map(String::as_str)
    }

    pub fn attributes(&self) -> &HashMap<String, Value> {
        &self.attributes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_expire_at_follows_last_access() {
        let mut session = Session::new(1800);
        assert_eq!(
            session.expire_at(),
            session.last_accessed_time() + Duration::seconds(1800)
        );

        let later = session.last_accessed_time() + Duration::seconds(60);
        session.set_last_accessed_time(later);
        assert_eq!(session.expire_at(), later + Duration::seconds(1800));

        session.set_max_inactive_interval(60);
        assert_eq!(session.expire_at(), later + Duration::seconds(60));
    }

    #[test]
    fn test_is_expired() {
        let session = Session::new(10);
        let at_expiry = session.expire_at();
        assert!(!session.is_expired());
        assert!(!session.is_expired_at(at_expiry));
        assert!(session.is_expired_at(at_expiry + Duration::milliseconds(1)));
    }

    #[test]
    fn test_negative_interval_never_expires() {
        let session = Session::new(-1);
        let far_future = session.last_accessed_time() + Duration::days(365 * 100);
        assert!(!session.is_expired_at(far_future));
    }

    #[test]
    fn test_saturated_expire_at_has_millisecond_precision() {
        let session = Session::new(i64::MAX);
        assert_eq!(session.expire_at().timestamp_subsec_nanos() % 1_000_000, 0);
        assert!(!session.is_expired());
    }

    #[test]
    fn test_timestamps_have_millisecond_precision() {
        let session = Session::new(1800);
        assert_eq!(session.creation_time().timestamp_subsec_nanos() % 1_000_000, 0);
        assert_eq!(session.creation_time(), session.last_accessed_time());
    }

    #[test]
    fn test_attributes() {
        let mut session = Session::default();
        session.set("views", 3);
        session.set("user", "alice");
        assert_eq!(session.get::<i32>("views"), Some(3));
        assert_eq!(session.get::<String>("user"), Some("alice".to_string()));

        session.set_attribute("user", Value::Null);
        assert!(!session.contains("user"));
        assert_eq!(session.remove("views"), Some(json!(3)));
        assert_eq!(session.attribute_names().count(), 0);
    }

    #[test]
    fn test_change_session_id_keeps_attributes() {
        let mut session = Session::default();
        session.set("user", "alice");
        let old_id = session.id().to_string();
        let new_id = session.change_session_id().to_string();
        assert_ne!(old_id, new_id);
        assert_eq!(session.id(), new_id);
        assert_eq!(session.get::<String>("user"), Some("alice".to_string()));
    }
}
