//! Session repository configuration

use std::sync::Arc;
use std::time::Duration;

use crate::converter::SessionConverter;
use crate::serializer::JsonAttributeSerializer;

/// Default max inactive interval in seconds (30 minutes)
pub const DEFAULT_INACTIVE_INTERVAL: i64 = 1800;

/// Default name of the type discriminator field
pub const DEFAULT_TYPE_NAME: &str = "type";

/// Default value of the type discriminator field
pub const DEFAULT_TYPE_VALUE: &str = "session";

/// Default name of the secondary index over `(type, principal)`
pub const DEFAULT_INDEX_NAME: &str = "sessions_index";

/// Default for literal string mode
pub const DEFAULT_KEEP_STRING_AS_LITERAL: bool = false;

/// Configuration for the session repository
#[derive(Clone, Debug)]
pub struct SessionConfig {
    /// Interval applied to newly created sessions, in seconds (default: 1800).
    /// A negative value means sessions never expire.
    pub max_inactive_interval: i64,

    /// Name of the type discriminator field (default: "type")
    pub type_name: String,

    /// Value of the type discriminator field (default: "session")
    pub type_value: String,

    /// Whether string attributes are mirrored as top-level document fields
    /// (default: false)
    pub keep_string_as_literal: bool,

    /// Name of the secondary index created at startup (default: "sessions_index")
    pub index_name: String,

    /// Backend TTL written on every document, in seconds.
    /// When None, the max inactive interval is used.
    pub max_expiration_time: Option<u32>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_inactive_interval: DEFAULT_INACTIVE_INTERVAL,
            type_name: DEFAULT_TYPE_NAME.to_string(),
            type_value: DEFAULT_TYPE_VALUE.to_string(),
            keep_string_as_literal: DEFAULT_KEEP_STRING_AS_LITERAL,
            index_name: DEFAULT_INDEX_NAME.to_string(),
            max_expiration_time: None,
        }
    }
}

impl SessionConfig {
    /// Create a configuration with all defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the max inactive interval in seconds (default: 1800)
    pub fn with_max_inactive_interval(mut self, secs: i64) -> Self {
        self.max_inactive_interval = secs;
        self
    }

    /// Set the max inactive interval from Duration
    pub fn with_max_inactive_interval_duration(mut self, duration: Duration) -> Self {
        self.max_inactive_interval = i64::try_from(duration.as_secs()).unwrap_or(i64::MAX);
        self
    }

    /// Set the type discriminator field name (default: "type")
    pub fn with_type_name<S: Into<String>>(mut self, name: S) -> Self {
        self.type_name = name.into();
        self
    }

    /// Set the type discriminator value (default: "session")
    pub fn with_type_value<S: Into<String>>(mut self, value: S) -> Self {
        self.type_value = value.into();
        self
    }

    /// Set literal string mode (default: false)
    pub fn with_keep_string_as_literal(mut self, keep: bool) -> Self {
        self.keep_string_as_literal = keep;
        self
    }

    /// Set the secondary index name (default: "sessions_index")
    pub fn with_index_name<S: Into<String>>(mut self, name: S) -> Self {
        self.index_name = name.into();
        self
    }

    /// Override the backend TTL ceiling in seconds
    pub fn with_max_expiration_time(mut self, secs: impl Into<Option<u32>>) -> Self {
        self.max_expiration_time = secs.into();
        self
    }

    /// Backend TTL ceiling in seconds. 0 means no backend-side expiry.
    pub fn backend_ttl(&self) -> u32 {
        match self.max_expiration_time {
            Some(ttl) => ttl,
            None if self.max_inactive_interval <= 0 => 0,
            None => u32::try_from(self.max_inactive_interval).unwrap_or(u32::MAX),
        }
    }

    /// Build the default converter for this configuration
    pub fn converter(&self) -> SessionConverter {
        SessionConverter::new(
            Arc::new(JsonAttributeSerializer),
            self.type_name.clone(),
            self.type_value.clone(),
            self.backend_ttl(),
            self.keep_string_as_literal,
        )
    }
}
