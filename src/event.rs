//! Session lifecycle notifications

use tokio::sync::broadcast;

use crate::error::SessionError;
use crate::session::Session;

/// Lifecycle notification published by the repository
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// A new session was created (not yet persisted)
    Created(Session),
    /// A stored session was found expired on read and removed
    Expired(Session),
    /// A stored session was deleted explicitly
    Deleted(Session),
}

impl SessionEvent {
    pub fn session(&self) -> &Session {
        match self {
            SessionEvent::Created(s) | SessionEvent::Expired(s) | SessionEvent::Deleted(s) => s,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            SessionEvent::Created(_) => "created",
            SessionEvent::Expired(_) => "expired",
            SessionEvent::Deleted(_) => "deleted",
        }
    }
}

/// Receiver of lifecycle notifications.
///
/// Delivery is fire-and-forget from the repository's point of view: errors
/// are logged and dropped.
pub trait EventSink: Send + Sync + 'static {
    fn publish(&self, event: &SessionEvent) -> Result<(), SessionError>;
}

/// Discards every event
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopEventSink;

impl EventSink for NoopEventSink {
    fn publish(&self, _event: &SessionEvent) -> Result<(), SessionError> {
        Ok(())
    }
}

/// Logs every event at debug level
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingEventSink;

impl EventSink for TracingEventSink {
    fn publish(&self, event: &SessionEvent) -> Result<(), SessionError> {
        tracing::debug!(session_id = %event.session().id(), "Session {}", event.kind());
        Ok(())
    }
}

/// Fans events out to any number of subscribers
#[derive(Debug, Clone)]
pub struct BroadcastEventSink {
    tx: broadcast::Sender<SessionEvent>,
}

impl BroadcastEventSink {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.tx.subscribe()
    }
}

impl EventSink for BroadcastEventSink {
    fn publish(&self, event: &SessionEvent) -> Result<(), SessionError> {
        self.tx
            .send(event.clone())
            .map(|_| ())
            .map_err(|_| SessionError::NotificationDelivery("no subscribers".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_broadcast_sink() {
        let sink = BroadcastEventSink::new(8);
        let session = Session::default();

        // Nobody listening yet
        assert!(matches!(
            sink.publish(&SessionEvent::Created(session.clone())),
            Err(SessionError::NotificationDelivery(_))
        ));

        let mut rx = sink.subscribe();
        sink.publish(&SessionEvent::Deleted(session.clone())).unwrap();
        let received = rx.try_recv().unwrap();
        assert_eq!(received.kind(), "deleted");
        assert_eq!(received.session().id(), session.id());
    }
}
