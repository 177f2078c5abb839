use async_trait::async_trait;
use dashmap::mapref::entry::Entry as MapEntry;
use dashmap::DashMap;
use jiff::{SignedDuration, Timestamp};
use portkey_core::{ttl_secs, Clock, KeyValueStore, Result, StorageError, SystemClock};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::trace;

#[derive(Debug, Clone)]
struct Entry {
    value: String,
    expire_at: Option<Timestamp>,
}

impl Entry {
    fn is_expired(&self, now: Timestamp) -> bool {
        self.expire_at.is_some_and(|expire_at| now >= expire_at)
    }
}

/// How many times each store operation has been called.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OpCounts {
    pub set: u64,
    pub get: u64,
    pub delete: u64,
    pub keys: u64,
    pub incr: u64,
}

impl OpCounts {
    /// Total number of calls across all operations.
    pub fn total(&self) -> u64 {
        self.set + self.get + self.delete + self.keys + self.incr
    }
}

#[derive(Debug, Default)]
struct Counters {
    set: AtomicU64,
    get: AtomicU64,
    delete: AtomicU64,
    keys: AtomicU64,
    incr: AtomicU64,
}

/// In-memory [`KeyValueStore`] backed by a [`DashMap`].
///
/// Expired keys are dropped lazily when they are next touched, the same way
/// Redis treats passive expiry. Every call is counted so tests can assert
/// whether a code path reached the store at all.
#[derive(Debug)]
pub struct InMemoryStore<C = SystemClock> {
    entries: DashMap<String, Entry>,
    calls: Counters,
    clock: C,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::with_clock(SystemClock)
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Clock> InMemoryStore<C> {
    /// Creates a store whose TTLs are measured against `clock`.
    pub fn with_clock(clock: C) -> Self {
        Self {
            entries: DashMap::new(),
            calls: Counters::default(),
            clock,
        }
    }

    /// Snapshot of the per-operation call counts.
    pub fn ops(&self) -> OpCounts {
        OpCounts {
            set: self.calls.set.load(Ordering::Relaxed),
            get: self.calls.get.load(Ordering::Relaxed),
            delete: self.calls.delete.load(Ordering::Relaxed),
            keys: self.calls.keys.load(Ordering::Relaxed),
            incr: self.calls.incr.load(Ordering::Relaxed),
        }
    }

    /// Number of keys held, including expired ones not yet collected.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// TTLs are rounded to whole seconds the same way [`RedisStore`] rounds
    /// them, so a key never outlives or undercuts its Redis counterpart.
    ///
    /// [`RedisStore`]: crate::RedisStore
    fn expire_at(&self, ttl: Option<Duration>) -> Option<Timestamp> {
        let secs = i64::try_from(ttl_secs(ttl?)).unwrap_or(i64::MAX);
        let ttl = SignedDuration::from_secs(secs);
        Some(
            self.clock
                .now()
                .checked_add(ttl)
                .unwrap_or(Timestamp::MAX),
        )
    }
}

#[async_trait]
impl<C: Clock + 'static> KeyValueStore for InMemoryStore<C> {
    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<()> {
        self.calls.set.fetch_add(1, Ordering::Relaxed);
        trace!(key = %key, ttl = ?ttl, "set");

        let entry = Entry {
            value: value.to_owned(),
            expire_at: self.expire_at(ttl),
        };
        self.entries.insert(key.to_owned(), entry);
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        self.calls.get.fetch_add(1, Ordering::Relaxed);
        trace!(key = %key, "get");

        let Some(entry) = self.entries.get(key) else {
            return Ok(None);
        };

        if entry.is_expired(self.clock.now()) {
            drop(entry);
            self.entries
                .remove_if(key, |_, e| e.is_expired(self.clock.now()));
            return Ok(None);
        }

        Ok(Some(entry.value.clone()))
    }

    async fn delete(&self, key: &str) -> Result<u64> {
        self.calls.delete.fetch_add(1, Ordering::Relaxed);
        trace!(key = %key, "delete");

        let now = self.clock.now();
        Ok(match self.entries.remove(key) {
            Some((_, entry)) if !entry.is_expired(now) => 1,
            _ => 0,
        })
    }

    async fn keys(&self, prefix: &str) -> Result<Vec<String>> {
        self.calls.keys.fetch_add(1, Ordering::Relaxed);
        trace!(prefix = %prefix, "keys");

        let now = self.clock.now();
        self.entries.retain(|_, entry| !entry.is_expired(now));
        Ok(self
            .entries
            .iter()
            .filter(|item| item.key().starts_with(prefix))
            .map(|item| item.key().clone())
            .collect())
    }

    async fn incr(&self, key: &str) -> Result<i64> {
        self.calls.incr.fetch_add(1, Ordering::Relaxed);
        trace!(key = %key, "incr");

        let now = self.clock.now();
        match self.entries.entry(key.to_owned()) {
            MapEntry::Occupied(mut occupied) => {
                let entry = occupied.get_mut();
                let current = if entry.is_expired(now) {
                    entry.expire_at = None;
                    0
                } else {
                    entry.value.parse::<i64>().map_err(|_| {
                        StorageError::InvalidData(format!(
                            "value at '{key}' is not an integer"
                        ))
                    })?
                };
                let next = current.checked_add(1).ok_or_else(|| {
                    StorageError::InvalidData(format!("increment of '{key}' would overflow"))
                })?;
                entry.value = next.to_string();
                Ok(next)
            }
            MapEntry::Vacant(vacant) => {
                vacant.insert(Entry {
                    value: "1".to_owned(),
                    expire_at: None,
                });
                Ok(1)
            }
        }
    }
}
