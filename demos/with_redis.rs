//! Redis-backed session repository
//!
//! Requires a Redis server. Point REDIS_URL at it (default: redis://127.0.0.1/).
//!
//! Run with: cargo run --example with_redis

use session_docstore::{
    DocumentSessionRepository, RedisBucket, SessionConfig, SessionError, SessionRepository,
    TracingEventSink, PRINCIPAL_NAME_INDEX_NAME,
};

#[tokio::main]
async fn main() -> Result<(), SessionError> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .init();

    let url = std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1/".to_string());
    let bucket = RedisBucket::from_url(&url).await?;

    let config = SessionConfig::new()
        .with_type_value("web-session")
        .with_max_expiration_time(86400);
    let repository =
        DocumentSessionRepository::new(bucket, config).with_event_sink(TracingEventSink);
    repository.ensure_index().await?;

    for device in ["laptop", "phone"] {
        let mut session = repository.create_session();
        session.set(PRINCIPAL_NAME_INDEX_NAME, "alice");
        session.set("device", device);
        repository.save(&session).await?;
    }

    let sessions = repository.find_by_principal_name("alice").await?;
    for (id, session) in &sessions {
        let device: Option<String> = session.get("device");
        println!("{} -> {:?}, expires at {}", id, device, session.expire_at());
    }

    // Sign alice out everywhere
    for id in sessions.keys() {
        repository.delete_by_id(id).await?;
    }

    Ok(())
}
