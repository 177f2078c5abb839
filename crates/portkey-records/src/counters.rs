use crate::Namespace;
use portkey_core::{KeyValueStore, Result, StorageError};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tracing::{debug, trace, warn};

const MINTED: &str = "count_urls_set";
const REDIRECTS: &str = "count_served_redirects";

/// Increments spawned but not finished yet.
#[derive(Debug, Default)]
struct InFlight {
    count: AtomicUsize,
    idle: Notify,
}

impl InFlight {
    fn start(&self) {
        self.count.fetch_add(1, Ordering::AcqRel);
    }

    fn finish(&self) {
        if self.count.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.idle.notify_waiters();
        }
    }

    async fn wait_idle(&self) {
        loop {
            let idle = self.idle.notified();
            if self.count.load(Ordering::Acquire) == 0 {
                return;
            }
            idle.await;
        }
    }
}

/// Usage totals kept in the backing store.
///
/// Increments are fire-and-forget: they are spawned onto the current Tokio
/// runtime and never block or fail the request that triggered them. A lost
/// increment is logged and otherwise ignored. Short-lived processes can call
/// [`drain`](Self::drain) before exiting so pending increments are not cut
/// off by runtime shutdown.
pub struct Counters<S> {
    store: Arc<S>,
    minted_key: String,
    redirects_key: String,
    in_flight: Arc<InFlight>,
}

impl<S> Clone for Counters<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            minted_key: self.minted_key.clone(),
            redirects_key: self.redirects_key.clone(),
            in_flight: Arc::clone(&self.in_flight),
        }
    }
}

impl<S: KeyValueStore> Counters<S> {
    pub fn new(store: Arc<S>, namespace: &Namespace) -> Self {
        Self {
            store,
            minted_key: namespace.internal_key(MINTED),
            redirects_key: namespace.internal_key(REDIRECTS),
            in_flight: Arc::default(),
        }
    }

    /// Counts one more code minted.
    pub fn record_minted(&self) {
        self.spawn_incr(&self.minted_key);
    }

    /// Counts one more redirect served.
    pub fn record_redirect(&self) {
        self.spawn_incr(&self.redirects_key);
    }

    /// Total codes ever minted in this namespace.
    pub async fn minted(&self) -> Result<i64> {
        self.read(&self.minted_key).await
    }

    /// Total redirects ever served in this namespace.
    pub async fn redirects(&self) -> Result<i64> {
        self.read(&self.redirects_key).await
    }

    /// Sets both totals back to zero.
    pub async fn reset(&self) -> Result<()> {
        self.store.set(&self.minted_key, "0", None).await?;
        self.store.set(&self.redirects_key, "0", None).await
    }

    /// Waits up to `timeout` for spawned increments to finish.
    ///
    /// Returns `false` if some were still running when the time ran out.
    pub async fn drain(&self, timeout: Duration) -> bool {
        let drained = tokio::time::timeout(timeout, self.in_flight.wait_idle())
            .await
            .is_ok();
        if !drained {
            debug!(
                pending = self.in_flight.count.load(Ordering::Acquire),
                "Counter increments still pending"
            );
        }
        drained
    }

    async fn read(&self, key: &str) -> Result<i64> {
        match self.store.get(key).await? {
            None => Ok(0),
            Some(raw) => raw.parse().map_err(|_| {
                StorageError::InvalidData(format!("counter '{key}' holds non-integer '{raw}'"))
            }),
        }
    }

    fn spawn_incr(&self, key: &str) {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!(counter = %key, "No async runtime, dropping counter increment");
            return;
        };

        let store = Arc::clone(&self.store);
        let in_flight = Arc::clone(&self.in_flight);
        let key = key.to_owned();
        in_flight.start();
        runtime.spawn(async move {
            match store.incr(&key).await {
                Ok(total) => trace!(counter = %key, total, "Incremented counter"),
                Err(e) => warn!(counter = %key, error = %e, "Failed to increment counter"),
            }
            in_flight.finish();
        });
    }
}
