//! Durable known-image store.
//!
//! The store is the single source of truth for "has this content been seen".
//! It needs four individually atomic primitives:
//! - **Set membership** test and add, used by the dedup protocol.
//! - **Map get / set** by field, used by the resolution protocol.
//!
//! Backends:
//! - [`RedisStore`] (feature `redis`): shared across service instances.
//! - [`MemoryStore`]: process-local, for development and tests.

mod memory;
#[cfg(feature = "redis")]
mod redis;

pub use memory::MemoryStore;
#[cfg(feature = "redis")]
pub use self::redis::RedisStore;

use async_trait::async_trait;

/// Store errors
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Store connection error: {0}")]
    Connection(String),

    #[error("Store command error: {0}")]
    Command(String),

    #[error("Store operation timed out after {0} ms")]
    Timeout(u64),
}

/// Key-value backend holding the known-image set and the resolution map.
///
/// Implementations must be thread-safe and each method must be a single
/// atomic operation on the backend. Check-then-act sequences across two
/// calls are not atomic and callers must tolerate that.
#[async_trait]
pub trait KnownStore: Send + Sync {
    /// Whether `member` is in the set stored at `set`.
    async fn is_member(&self, set: &str, member: &str) -> Result<bool, StoreError>;

    /// Add `member` to the set stored at `set`. Idempotent.
    async fn add_member(&self, set: &str, member: &str) -> Result<(), StoreError>;

    /// Read `field` of the map stored at `map`.
    async fn get_field(&self, map: &str, field: &str) -> Result<Option<String>, StoreError>;

    /// Write `field` of the map stored at `map`, overwriting any previous value.
    async fn set_field(&self, map: &str, field: &str, value: &str) -> Result<(), StoreError>;

    /// Round-trip to the backend. Used by the readiness check.
    async fn ping(&self) -> Result<(), StoreError>;

    /// Short backend name for logs and readiness output.
    fn backend_name(&self) -> &'static str;
}
