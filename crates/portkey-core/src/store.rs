use crate::error::Result;
use async_trait::async_trait;
use std::time::Duration;

/// The networked key-value store that holds short-link records and counters.
///
/// Keys are passed through verbatim; namespacing is the caller's job.
#[async_trait]
pub trait KeyValueStore: Send + Sync + 'static {
    /// Stores `value` under `key`, replacing any previous value.
    ///
    /// With `ttl` set the key disappears after that long; `None` keeps it
    /// until deleted.
    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<()>;

    /// Returns `Ok(None)` if the key does not exist or has expired.
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Deletes the key and returns how many keys were removed (0 or 1).
    async fn delete(&self, key: &str) -> Result<u64>;

    /// Lists every live key starting with `prefix`, prefix included.
    async fn keys(&self, prefix: &str) -> Result<Vec<String>>;

    /// Atomically increments the integer stored at `key` and returns the new
    /// value. A missing key counts as 0.
    async fn incr(&self, key: &str) -> Result<i64>;
}

/// Whole seconds a key written with `ttl` lives for.
///
/// Rounds up, with a floor of one second so a short TTL never turns into
/// "no expiry". Every store applies TTLs at this granularity.
pub fn ttl_secs(ttl: Duration) -> u64 {
    let secs = ttl.as_secs() + u64::from(ttl.subsec_nanos() > 0);
    secs.max(1)
}

#[async_trait]
impl<S: KeyValueStore + ?Sized> KeyValueStore for std::sync::Arc<S> {
    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<()> {
        (**self).set(key, value, ttl).await
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        (**self).get(key).await
    }

    async fn delete(&self, key: &str) -> Result<u64> {
        (**self).delete(key).await
    }

    async fn keys(&self, prefix: &str) -> Result<Vec<String>> {
        (**self).keys(prefix).await
    }

    async fn incr(&self, key: &str) -> Result<i64> {
        (**self).incr(key).await
    }
}
