use crate::{Counters, Namespace};
use portkey_cache::LruCache;
use portkey_core::{Clock, KeyValueStore, Result, SystemClock};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, trace, warn};

/// Short-link records with a local cache in front of the backing store.
///
/// The store is the source of truth. The cache is only written after a store
/// call succeeded, so a failed write or read never leaves it holding data the
/// store does not have. Cache keys are the bare record keys; store keys are
/// scoped by the [`Namespace`].
pub struct Records<S, C = SystemClock> {
    store: Arc<S>,
    cache: LruCache<String, C>,
    namespace: Namespace,
    counters: Counters<S>,
}

impl<S: KeyValueStore, C: Clock> Records<S, C> {
    pub fn new(store: Arc<S>, cache: LruCache<String, C>, namespace: Namespace) -> Self {
        let counters = Counters::new(Arc::clone(&store), &namespace);
        Self {
            store,
            cache,
            namespace,
            counters,
        }
    }

    /// Stores `value` under `key`, then caches it.
    ///
    /// Bumps the minted counter in the background once the write succeeded.
    pub async fn put(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<()> {
        trace!(key = %key, ttl = ?ttl, "Storing record");

        self.store
            .set(&self.namespace.key(key), value, ttl)
            .await
            .inspect_err(|e| warn!(key = %key, error = %e, "Failed to store record"))?;

        self.cache.insert(key, value.to_owned());
        self.counters.record_minted();
        debug!(key = %key, "Stored record");
        Ok(())
    }

    /// Looks `key` up in the cache, then in the store.
    ///
    /// A value read from the store is cached on the way out. `Ok(None)` means
    /// the store answered and has no such key; store failures, timeouts
    /// included, come back as errors.
    pub async fn get(&self, key: &str) -> Result<Option<String>> {
        if let Some(value) = self.cache.fetch(key) {
            debug!(key = %key, "Cache hit");
            return Ok(Some(value));
        }

        trace!(key = %key, "Cache miss, reading store");
        let value = self
            .store
            .get(&self.namespace.key(key))
            .await
            .inspect_err(|e| warn!(key = %key, error = %e, "Failed to read record"))?;

        match value {
            Some(value) => {
                self.cache.insert(key, value.clone());
                Ok(Some(value))
            }
            None => {
                debug!(key = %key, "Record not found");
                Ok(None)
            }
        }
    }

    /// Deletes `key` from the store and, if it was there, from the cache.
    ///
    /// Returns whether the store held the key.
    pub async fn delete(&self, key: &str) -> Result<bool> {
        trace!(key = %key, "Deleting record");

        let removed = self
            .store
            .delete(&self.namespace.key(key))
            .await
            .inspect_err(|e| warn!(key = %key, error = %e, "Failed to delete record"))?;

        if removed > 0 {
            self.cache.remove(key);
            debug!(key = %key, "Deleted record");
        }
        Ok(removed > 0)
    }

    /// Every record key in this namespace, without the namespace prefix.
    ///
    /// Internal keys such as the counters are left out.
    pub async fn list_keys(&self) -> Result<Vec<String>> {
        let keys = self.store.keys(self.namespace.prefix()).await?;
        Ok(keys
            .iter()
            .filter_map(|key| self.namespace.strip(key))
            .filter(|key| !self.namespace.is_internal(key))
            .map(str::to_owned)
            .collect())
    }

    /// Counts a served redirect without waiting for the store.
    pub fn record_redirect(&self) {
        self.counters.record_redirect();
    }

    /// Waits up to `timeout` for background counter updates to land.
    pub async fn drain(&self, timeout: Duration) -> bool {
        self.counters.drain(timeout).await
    }

    pub fn counters(&self) -> &Counters<S> {
        &self.counters
    }

    pub fn cache(&self) -> &LruCache<String, C> {
        &self.cache
    }

    pub fn namespace(&self) -> &Namespace {
        &self.namespace
    }
}

impl<S, C> fmt::Debug for Records<S, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Records")
            .field("namespace", &self.namespace)
            .field("cache", &self.cache)
            .finish_non_exhaustive()
    }
}
