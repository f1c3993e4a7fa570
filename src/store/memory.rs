//! In-process counter store.
//!
//! Backed by a sharded `DashMap`. Each operation holds at most one shard
//! lock for its duration, so per-key operations are atomic. Expired entries
//! are dropped lazily on access and in bulk by `purge_expired`.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;

use crate::store::clock::{Clock, SystemClock};
use crate::store::{CounterStore, StoreError};

#[derive(Debug, Clone, Copy)]
struct Entry {
    value: i64,
    expires_at: Instant,
}

/// Counter store living inside the gateway process.
#[derive(Debug)]
pub struct InMemoryStore {
    entries: DashMap<String, Entry>,
    clock: Arc<dyn Clock>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: DashMap::new(),
            clock,
        }
    }

    /// Drop every expired entry, returning how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = self.clock.now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.expires_at > now);
        before.saturating_sub(self.entries.len())
    }

    /// Number of entries currently held, expired or not.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn live(&self, key: &str) -> Option<Entry> {
        let now = self.clock.now();
        let entry = self.entries.get(key).map(|e| *e)?;
        if entry.expires_at > now {
            Some(entry)
        } else {
            self.entries.remove_if(key, |_, e| e.expires_at <= now);
            None
        }
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CounterStore for InMemoryStore {
    async fn get(&self, key: &str) -> Result<Option<i64>, StoreError> {
        Ok(self.live(key).map(|e| e.value))
    }

    async fn set_with_expiry(&self, key: &str, value: i64, ttl: Duration) -> Result<(), StoreError> {
        let expires_at = self.clock.now() + ttl;
        self.entries.insert(key.to_string(), Entry { value, expires_at });
        Ok(())
    }

    async fn increment_with_expiry(&self, key: &str, ttl: Duration) -> Result<i64, StoreError> {
        let now = self.clock.now();
        let fresh = Entry {
            value: 0,
            expires_at: now + ttl,
        };

        let mut entry = self.entries.entry(key.to_string()).or_insert(fresh);
        if entry.expires_at <= now {
            *entry = fresh;
        }
        entry.value += 1;
        Ok(entry.value)
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.entries.remove(key);
        Ok(())
    }

    async fn ttl(&self, key: &str) -> Result<Option<Duration>, StoreError> {
        let now = self.clock.now();
        Ok(self.live(key).map(|e| e.expires_at.saturating_duration_since(now)))
    }
}
