//! In-memory session repository walkthrough
//!
//! Run with: cargo run --example basic

use session_docstore::{
    BroadcastEventSink, DocumentBackend, DocumentSessionRepository, MemoryBucket,
    SecurityContext, SessionConfig, SessionError, SessionRepository, SECURITY_CONTEXT_ATTRIBUTE,
};

#[tokio::main]
async fn main() -> Result<(), SessionError> {
    tracing_subscriber::fmt::init();

    let events = BroadcastEventSink::new(16);
    let mut rx = events.subscribe();

    let config = SessionConfig::new()
        .with_max_inactive_interval(1800)
        .with_keep_string_as_literal(true);
    let repository =
        DocumentSessionRepository::new(MemoryBucket::new(), config).with_event_sink(events);
    repository.ensure_index().await?;

    let mut session = repository.create_session();
    session.set(SECURITY_CONTEXT_ATTRIBUTE, SecurityContext::authenticated("alice"));
    session.set("theme", "dark");
    session.set("views", 1);
    repository.save(&session).await?;

    if let Some(document) = repository.backend().get(session.id()).await? {
        println!("Stored document: {}", serde_json::Value::Object(document.content));
    }

    if let Some(mut loaded) = repository.find_by_id(session.id()).await? {
        let views: i32 = loaded.get("views").unwrap_or(0);
        loaded.set("views", views + 1);
        loaded.touch();
        repository.save(&loaded).await?;
        println!("Session {} expires at {}", loaded.id(), loaded.expire_at());
    }

    let sessions = repository.find_by_principal_name("alice").await?;
    println!("alice has {} session(s)", sessions.len());

    repository.delete_by_id(session.id()).await?;

    while let Ok(event) = rx.try_recv() {
        println!("event: {} {}", event.kind(), event.session().id());
    }

    Ok(())
}
