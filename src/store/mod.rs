//! Document backend implementations

mod memory;
mod traits;

pub use memory::MemoryBucket;
pub use traits::{DocumentBackend, EqualityQuery, IndexDefinition};

#[cfg(feature = "redis-store")]
mod redis_store;

#[cfg(feature = "redis-store")]
pub use redis_store::RedisBucket;
