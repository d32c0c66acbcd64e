//! Session repository over a document backend

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

use crate::config::SessionConfig;
use crate::converter::SessionConverter;
use crate::document::{ID, PRINCIPAL};
use crate::error::SessionError;
use crate::event::{EventSink, NoopEventSink, SessionEvent};
use crate::principal::PRINCIPAL_NAME_INDEX_NAME;
use crate::session::Session;
use crate::store::{DocumentBackend, EqualityQuery, IndexDefinition};

/// Interface a web session framework calls into
#[async_trait]
pub trait SessionRepository: Send + Sync + 'static {
    /// Create a new, unsaved session with the default interval
    fn create_session(&self) -> Session;

    /// Persist a session. Last writer wins.
    async fn save(&self, session: &Session) -> Result<(), SessionError>;

    /// Load a session. Expired sessions are deleted and reported as missing.
    async fn find_by_id(&self, id: &str) -> Result<Option<Session>, SessionError>;

    /// Delete a session. Deleting a missing id is a no-op.
    async fn delete_by_id(&self, id: &str) -> Result<(), SessionError>;

    /// Find sessions by a secondary index, keyed by session id
    async fn find_by_index_name_and_index_value(
        &self,
        index_name: &str,
        index_value: &str,
    ) -> Result<HashMap<String, Session>, SessionError>;

    /// Find all sessions of a principal, keyed by session id
    async fn find_by_principal_name(
        &self,
        principal: &str,
    ) -> Result<HashMap<String, Session>, SessionError> {
        self.find_by_index_name_and_index_value(PRINCIPAL_NAME_INDEX_NAME, principal)
            .await
    }
}

/// [`SessionRepository`] storing one document per session
pub struct DocumentSessionRepository<B: DocumentBackend> {
    backend: Arc<B>,
    converter: SessionConverter,
    config: SessionConfig,
    events: Arc<dyn EventSink>,
}

impl<B: DocumentBackend> DocumentSessionRepository<B> {
    /// Create a repository with the converter built from `config`
    pub fn new(backend: B, config: SessionConfig) -> Self {
        Self {
            backend: Arc::new(backend),
            converter: config.converter(),
            config,
            events: Arc::new(NoopEventSink),
        }
    }

    /// Deliver lifecycle events to `sink`
    pub fn with_event_sink<E: EventSink>(mut self, sink: E) -> Self {
        self.events = Arc::new(sink);
        self
    }

    /// Replace the converter, e.g. to plug in another attribute serializer
    pub fn with_converter(mut self, converter: SessionConverter) -> Self {
        self.converter = converter;
        self
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Make sure the `(type, principal)` index exists.
    ///
    /// Returns true if it had to be created.
    pub async fn ensure_index(&self) -> Result<bool, SessionError> {
        let index = IndexDefinition::new(
            self.config.index_name.clone(),
            vec![self.converter.type_name().to_string(), PRINCIPAL.to_string()],
        )
        .with_predicate(
            self.converter.type_name(),
            self.converter.type_value(),
        );

        let created = self.backend.create_index(&index).await?;
        if created {
            tracing::warn!(
                "The index '{}' does not exist, it will be created automatically",
                index.name
            );
        } else {
            tracing::info!(
                "The index '{}' already exists. Whenever the document type name or value \
                 changes, this index must be recreated",
                index.name
            );
        }
        Ok(created)
    }

    fn publish(&self, event: SessionEvent) {
        if let Err(e) = self.events.publish(&event) {
            tracing::error!(
                session_id = %event.session().id(),
                "Error publishing session {} event: {}",
                event.kind(),
                e
            );
        }
    }
}

impl<B: DocumentBackend> Clone for DocumentSessionRepository<B> {
    fn clone(&self) -> Self {
        Self {
            backend: Arc::clone(&self.backend),
            converter: self.converter.clone(),
            config: self.config.clone(),
            events: Arc::clone(&self.events),
        }
    }
}

#[async_trait]
impl<B: DocumentBackend> SessionRepository for DocumentSessionRepository<B> {
    fn create_session(&self) -> Session {
        let session = Session::new(self.config.max_inactive_interval);
        self.publish(SessionEvent::Created(session.clone()));
        session
    }

    async fn save(&self, session: &Session) -> Result<(), SessionError> {
        let document = self.converter.to_document(session)?;
        self.backend.upsert(&document).await
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<Session>, SessionError> {
        let document = match self.backend.get(id).await? {
            Some(document) => document,
            None => return Ok(None),
        };

        let session = self.converter.from_document(&document)?;
        if session.is_expired() {
            tracing::debug!(session_id = %id, "Session expired, removing");
            self.publish(SessionEvent::Expired(session));
            self.backend.remove(id).await?;
            return Ok(None);
        }

        Ok(Some(session))
    }

    async fn delete_by_id(&self, id: &str) -> Result<(), SessionError> {
        let document = match self.backend.get(id).await? {
            Some(document) => document,
            None => return Ok(()),
        };

        match self.converter.from_document(&document) {
            Ok(session) => self.publish(SessionEvent::Deleted(session)),
            Err(e) => tracing::warn!(session_id = %id, "Deleting undecodable session: {}", e),
        }

        self.backend.remove(id).await
    }

    async fn find_by_index_name_and_index_value(
        &self,
        index_name: &str,
        index_value: &str,
    ) -> Result<HashMap<String, Session>, SessionError> {
        if index_name != PRINCIPAL_NAME_INDEX_NAME {
            tracing::debug!("Unsupported session index '{}'", index_name);
            return Ok(HashMap::new());
        }

        let query = EqualityQuery::new(ID)
            .and_eq(PRINCIPAL, index_value)
            .and_eq(self.converter.type_name(), self.converter.type_value());

        let mut sessions = HashMap::new();
        for row in self.backend.query(&query).await? {
            let session = self.converter.from_object(&row)?;
            if session.is_expired() {
                continue;
            }
            sessions.insert(session.id().to_string(), session);
        }
        Ok(sessions)
    }
}
