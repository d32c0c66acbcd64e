//! # session-docstore
//!
//! Server-side HTTP session persistence on top of a document database.
//!
//! Every session is stored as one document keyed by its id. The document
//! carries the session timestamps, its max inactive interval, a derived
//! principal name for secondary lookup, and the attribute map serialized into
//! an opaque blob. A web framework drives the lifecycle through the
//! [`SessionRepository`] trait.
//!
//! ## Features
//!
//! - **Lazy expiration**: expired sessions are removed the moment they are read
//! - **Principal lookup**: find every session of a user through a secondary index
//! - **Literal string mode**: mirror string attributes as queryable document fields
//! - **Pluggable backends**: in-memory, Redis, or any [`DocumentBackend`]
//! - **Lifecycle events**: created, expired and deleted notifications
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use session_docstore::{
//!     DocumentSessionRepository, MemoryBucket, SessionConfig, SessionRepository,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), session_docstore::SessionError> {
//!     let config = SessionConfig::new()
//!         .with_max_inactive_interval(3600)
//!         .with_keep_string_as_literal(true);
//!     let repository = DocumentSessionRepository::new(MemoryBucket::new(), config);
//!     repository.ensure_index().await?;
//!
//!     let mut session = repository.create_session();
//!     session.set("PRINCIPAL_NAME_INDEX_NAME", "alice");
//!     repository.save(&session).await?;
//!
//!     let sessions = repository.find_by_principal_name("alice").await?;
//!     assert_eq!(sessions.len(), 1);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod converter;
pub mod document;
pub mod error;
pub mod event;
pub mod principal;
pub mod repository;
pub mod serializer;
pub mod session;
pub mod store;

pub use config::SessionConfig;
pub use converter::SessionConverter;
pub use document::SessionDocument;
pub use error::SessionError;
pub use event::{BroadcastEventSink, EventSink, NoopEventSink, SessionEvent, TracingEventSink};
pub use principal::{
    Authenticated, Authentication, SecurityContext, PRINCIPAL_NAME_INDEX_NAME,
    SECURITY_CONTEXT_ATTRIBUTE,
};
pub use repository::{DocumentSessionRepository, SessionRepository};
pub use serializer::{AttributeSerializer, JsonAttributeSerializer};
pub use session::Session;
pub use store::{DocumentBackend, EqualityQuery, IndexDefinition, MemoryBucket};

#[cfg(feature = "redis-store")]
pub use store::RedisBucket;
