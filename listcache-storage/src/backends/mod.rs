//! Cache store backends.

mod memory;
#[cfg(feature = "redis-backend")]
mod redis;

pub use memory::InMemoryListingCache;
#[cfg(feature = "redis-backend")]
pub use self::redis::{redact_url, RedisListingCache, RedisSettings};
