//! Shared counter store subsystem.
//!
//! # Data Flow
//! ```text
//! Admission gate:
//!     → KeySpace (ratelimit:<client>, failcount:<client>, jail:<client>)
//!     → CounterStore (get / increment_with_expiry / set_with_expiry / delete / ttl)
//!     → memory.rs (single process) or redis.rs (shared across instances)
//! ```
//!
//! # Design Decisions
//! - The store is the only authority for windows, failures and bans
//! - Every mutation is a single-key atomic operation; no multi-key transactions
//! - Expiry is attached when a counter is created and is never extended by
//!   later increments (fixed windows)
//! - Errors surface to callers; adapters never swallow them

pub mod clock;
pub mod memory;
#[cfg(feature = "redis-store")]
pub mod redis;

use std::fmt::Debug;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

pub use clock::{Clock, MockClock, SystemClock};
pub use memory::InMemoryStore;
#[cfg(feature = "redis-store")]
pub use self::redis::RedisStore;

/// Errors returned by counter store adapters.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The store could not be reached or rejected the command.
    #[error("counter store unavailable: {0}")]
    Unavailable(String),

    /// A key held a value that is not an integer counter.
    #[error("malformed value stored under {key}")]
    Malformed { key: String },
}

/// Atomic key-value counter store shared by every gateway instance.
///
/// Implementations must be linearizable per key: concurrent
/// `increment_with_expiry` calls on one key observe distinct results.
#[async_trait]
pub trait CounterStore: Send + Sync + Debug {
    /// Read a live value, `None` when absent or expired.
    async fn get(&self, key: &str) -> Result<Option<i64>, StoreError>;

    /// Overwrite `key` with `value`, expiring after `ttl`.
    async fn set_with_expiry(&self, key: &str, value: i64, ttl: Duration) -> Result<(), StoreError>;

    /// Atomically add one to `key` and return the new count.
    ///
    /// A missing or expired key starts at zero and receives `ttl` as its
    /// lifetime. An existing key keeps its original expiry.
    async fn increment_with_expiry(&self, key: &str, ttl: Duration) -> Result<i64, StoreError>;

    /// Remove `key`. Removing an absent key is not an error.
    async fn delete(&self, key: &str) -> Result<(), StoreError>;

    /// Remaining lifetime of `key`, `None` when absent.
    async fn ttl(&self, key: &str) -> Result<Option<Duration>, StoreError>;
}

/// Builds the store keys used for one client identity.
#[derive(Debug, Clone, Default)]
pub struct KeySpace {
    prefix: String,
}

impl KeySpace {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self { prefix: prefix.into() }
    }

    pub fn rate_window(&self, client: &str) -> String {
        format!("{}ratelimit:{}", self.prefix, client)
    }

    pub fn failures(&self, client: &str) -> String {
        format!("{}failcount:{}", self.prefix, client)
    }

    pub fn jail(&self, client: &str) -> String {
        format!("{}jail:{}", self.prefix, client)
    }
}
