//! Expiring key-value entries backing authorization codes.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;
use keygate_auth::AuthResult;
use keygate_auth::storage::KeyValueStore;

/// A stored value with TTL support.
#[derive(Clone, Debug)]
struct Entry {
    value: String,
    stored_at: Instant,
    ttl: Duration,
}

impl Entry {
    fn is_expired(&self) -> bool {
        self.stored_at.elapsed() > self.ttl
    }
}

/// A [`KeyValueStore`] held in a `DashMap`.
///
/// Expired entries are invisible to readers and dropped lazily, or in bulk
/// by [`purge_expired`](Self::purge_expired). A delete takes the entry out
/// of its shard in one step, so exactly one of several concurrent deletes of
/// the same key reports `true`.
#[derive(Debug, Default)]
pub struct InMemoryKeyValueStore {
    entries: DashMap<String, Entry>,
}

impl InMemoryKeyValueStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entries, expired ones included.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drops every expired entry and returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired());
        before.saturating_sub(self.entries.len())
    }
}

#[async_trait]
impl KeyValueStore for InMemoryKeyValueStore {
    async fn set(&self, key: &str, value: String, ttl: Duration) -> AuthResult<()> {
        self.entries.insert(
            key.to_string(),
            Entry {
                value,
                stored_at: Instant::now(),
                ttl,
            },
        );
        Ok(())
    }

    async fn get(&self, key: &str) -> AuthResult<Option<String>> {
        let value = match self.entries.get(key) {
            Some(entry) if !entry.is_expired() => Some(entry.value.clone()),
            Some(entry) => {
                drop(entry);
                self.entries.remove_if(key, |_, e| e.is_expired());
                None
            }
            None => None,
        };
        Ok(value)
    }

    async fn delete(&self, key: &str) -> AuthResult<bool> {
        Ok(self
            .entries
            .remove(key)
            .is_some_and(|(_, entry)| !entry.is_expired()))
    }
}
