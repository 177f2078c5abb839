use async_trait::async_trait;
use portkey_core::{ttl_secs, KeyValueStore, Result, StorageError};
use redis::aio::MultiplexedConnection;
use redis::{AsyncCommands, RedisResult};
use std::future::Future;
use std::time::Duration;
use tracing::{debug, info, trace, warn};

/// Keys requested per SCAN round trip.
const SCAN_BATCH: usize = 512;

/// A Redis-backed [`KeyValueStore`].
///
/// Every command is bounded by the deadline given to [`connect`](Self::connect);
/// a command that misses it fails with [`StorageError::Timeout`] and is never
/// reported as a missing key.
#[derive(Debug, Clone)]
pub struct RedisStore {
    conn: MultiplexedConnection,
    timeout: Duration,
}

fn map_redis_error(operation: &str, err: redis::RedisError) -> StorageError {
    let message = format!("{operation}: {err}");
    if err.is_timeout() || message.to_ascii_lowercase().contains("timed out") {
        StorageError::Timeout(message)
    } else if err.is_connection_refusal() || err.is_connection_dropped() || err.is_io_error() {
        StorageError::Unavailable(message)
    } else {
        StorageError::Operation(message)
    }
}

impl RedisStore {
    /// Connects to the server at `url` and checks it answers a PING.
    ///
    /// `timeout` bounds the connection attempt and, afterwards, every
    /// individual command.
    pub async fn connect(url: &str, timeout: Duration) -> Result<Self> {
        let client = redis::Client::open(url)
            .map_err(|e| StorageError::Unavailable(format!("invalid redis url: {e}")))?;

        let conn = match tokio::time::timeout(timeout, client.get_multiplexed_async_connection())
            .await
        {
            Ok(Ok(conn)) => conn,
            Ok(Err(e)) => {
                warn!(error = %e, "Failed to connect to Redis");
                return Err(StorageError::Unavailable(format!(
                    "failed to connect to redis: {e}"
                )));
            }
            Err(_) => {
                warn!(?timeout, "Redis connection attempt timed out");
                return Err(StorageError::Timeout(format!(
                    "connect: no connection within {timeout:?}"
                )));
            }
        };

        let store = Self::new(conn, timeout);
        let mut conn = store.conn.clone();
        store
            .run("ping", async move {
                redis::cmd("PING").query_async::<String>(&mut conn).await
            })
            .await?;

        info!(?timeout, "Connected to Redis");
        Ok(store)
    }

    /// Wraps an existing connection.
    pub fn new(conn: MultiplexedConnection, timeout: Duration) -> Self {
        Self { conn, timeout }
    }

    async fn run<T, F>(&self, operation: &str, command: F) -> Result<T>
    where
        F: Future<Output = RedisResult<T>>,
    {
        match tokio::time::timeout(self.timeout, command).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => {
                warn!(operation, error = %e, "Redis command failed");
                Err(map_redis_error(operation, e))
            }
            Err(_) => {
                warn!(operation, timeout = ?self.timeout, "Redis command timed out");
                Err(StorageError::Timeout(format!(
                    "{operation}: no reply within {:?}",
                    self.timeout
                )))
            }
        }
    }
}

#[async_trait]
impl KeyValueStore for RedisStore {
    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<()> {
        trace!(key = %key, ttl = ?ttl, "Writing key to Redis");

        let mut conn = self.conn.clone();
        match ttl {
            Some(ttl) => {
                self.run("set", conn.set_ex::<_, _, ()>(key, value, ttl_secs(ttl)))
                    .await?
            }
            None => self.run("set", conn.set::<_, _, ()>(key, value)).await?,
        }

        debug!(key = %key, "Stored key in Redis");
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        trace!(key = %key, "Reading key from Redis");

        let mut conn = self.conn.clone();
        let value = self
            .run("get", conn.get::<_, Option<String>>(key))
            .await?;

        match &value {
            Some(_) => debug!(key = %key, "Key found in Redis"),
            None => trace!(key = %key, "Key not in Redis"),
        }
        Ok(value)
    }

    async fn delete(&self, key: &str) -> Result<u64> {
        trace!(key = %key, "Deleting key from Redis");

        let mut conn = self.conn.clone();
        let removed = self.run("del", conn.del::<_, u64>(key)).await?;

        debug!(key = %key, removed, "Deleted key from Redis");
        Ok(removed)
    }

    async fn keys(&self, prefix: &str) -> Result<Vec<String>> {
        trace!(prefix = %prefix, "Scanning Redis keys");

        let pattern = format!("{prefix}*");
        let mut conn = self.conn.clone();
        let mut cursor: u64 = 0;
        let mut keys = Vec::new();

        loop {
            let (next, batch) = self
                .run(
                    "scan",
                    redis::cmd("SCAN")
                        .arg(cursor)
                        .arg("MATCH")
                        .arg(&pattern)
                        .arg("COUNT")
                        .arg(SCAN_BATCH)
                        .query_async::<(u64, Vec<String>)>(&mut conn),
                )
                .await?;
            keys.extend(batch);
            if next == 0 {
                break;
            }
            cursor = next;
        }

        // SCAN may return a key more than once across iterations.
        keys.sort_unstable();
        keys.dedup();

        debug!(prefix = %prefix, count = keys.len(), "Scanned Redis keys");
        Ok(keys)
    }

    async fn incr(&self, key: &str) -> Result<i64> {
        trace!(key = %key, "Incrementing Redis counter");

        let mut conn = self.conn.clone();
        self.run("incr", conn.incr::<_, _, i64>(key, 1)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn connect_rejects_malformed_url() {
        let err = RedisStore::connect("not a url", Duration::from_millis(100))
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::Unavailable(_)));
    }
}
