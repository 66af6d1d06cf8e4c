//! Record store collaborators
//!
//! The consumer only needs unconditional `set`; `get` is a raw key lookup used
//! by the lookup mode and by tests. Neither operation versions or expires
//! entries.

mod memory;
mod redis_store;
mod sentinel;

pub use self::memory::MemoryRecordStore;
pub use self::redis_store::RedisRecordStore;
pub use self::sentinel::{parse_sentinel_endpoints, SentinelConfig};

use crate::error::Result;
use async_trait::async_trait;

/// Key-value store addressed by customer id
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Overwrite `key` with `value` (last write wins)
    async fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Raw lookup of `key`
    async fn get(&self, key: &str) -> Result<Option<String>>;
}
