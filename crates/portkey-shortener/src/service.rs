use crate::error::{Result, ShortenerError};
use crate::validate::{validate_code, validate_lookup_code, validate_url};
use portkey_core::{Clock, KeyValueStore, StorageError, SystemClock};
use portkey_generator::{CodePool, CodeSpace, Generator, RandomCodes};
use portkey_records::Records;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::OnceLock;
use std::time::Duration;
use tracing::{debug, info, warn};
use typed_builder::TypedBuilder;

/// Default lifetime of a short link when the caller gives none.
pub const DEFAULT_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Random candidates tried before a mint gives up.
pub const DEFAULT_MAX_ATTEMPTS: usize = 32;

#[derive(Debug, Clone, TypedBuilder)]
pub struct ShortenerSettings {
    /// The codes this service mints from.
    pub space: CodeSpace,
    /// Applied when a mint or set carries no TTL. `None` keeps links forever.
    #[builder(default = Some(DEFAULT_TTL))]
    pub default_ttl: Option<Duration>,
    /// Bound on rejection sampling while no pool has been built.
    #[builder(default = DEFAULT_MAX_ATTEMPTS)]
    pub max_attempts: usize,
}

/// Usage totals plus the state of the pre-built pool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Stats {
    pub minted: i64,
    pub redirects: i64,
    /// Codes left in the pool, or `None` if no pool has been built.
    pub pool_remaining: Option<usize>,
}

/// Mints, resolves and deletes short links.
///
/// Codes come from the shuffled [`CodePool`] once
/// [`build_pool`](Self::build_pool) has run. Until then the service draws
/// random candidates from the same code space and keeps the first one the
/// store does not know, giving up after `max_attempts` tries. Custom codes
/// set after the pool was built are taken out of it, so a mint never
/// overwrites them.
pub struct ShortenerService<S, C = SystemClock> {
    records: Records<S, C>,
    space: CodeSpace,
    random: RandomCodes,
    pool: OnceLock<CodePool>,
    default_ttl: Option<Duration>,
    max_attempts: usize,
}

impl<S: KeyValueStore, C: Clock> ShortenerService<S, C> {
    pub fn new(records: Records<S, C>, settings: ShortenerSettings) -> Self {
        Self {
            records,
            random: RandomCodes::new(&settings.space),
            space: settings.space,
            pool: OnceLock::new(),
            default_ttl: settings.default_ttl,
            max_attempts: settings.max_attempts.max(1),
        }
    }

    pub fn records(&self) -> &Records<S, C> {
        &self.records
    }

    /// Stores `url` under a freshly minted code and returns the code.
    pub async fn mint(&self, url: &str, ttl: Option<Duration>) -> Result<String> {
        validate_url(url)?;

        let pool = self.pool.get();
        let code = match pool {
            Some(pool) => pool.next().ok_or_else(|| {
                warn!("Code pool exhausted");
                ShortenerError::Exhausted(format!(
                    "all {} codes have been issued",
                    self.space.size()
                ))
            })?,
            None => self.sample_unused().await?,
        };

        if let Err(e) = self
            .records
            .put(&code, url, ttl.or(self.default_ttl))
            .await
        {
            if let Some(pool) = pool {
                return_unwritten(pool, code, &e);
            }
            return Err(e.into());
        }
        info!(code = %code, "Minted short code");
        Ok(code)
    }

    /// Stores `url` under a caller-chosen code, replacing any previous target.
    pub async fn set(&self, code: &str, url: &str, ttl: Option<Duration>) -> Result<()> {
        validate_code(code)?;
        validate_url(url)?;

        let reserved_from = self
            .pool
            .get()
            .filter(|pool| self.space.contains(code) && pool.reserve(code));

        if let Err(e) = self
            .records
            .put(code, url, ttl.or(self.default_ttl))
            .await
        {
            if let Some(pool) = reserved_from {
                return_unwritten(pool, code.to_owned(), &e);
            }
            return Err(e.into());
        }
        info!(code = %code, "Stored custom short code");
        Ok(())
    }

    /// Returns the target of `code` and counts the redirect.
    pub async fn resolve(&self, code: &str) -> Result<String> {
        validate_lookup_code(code)?;

        match self.records.get(code).await? {
            Some(url) => {
                self.records.record_redirect();
                debug!(code = %code, "Resolved short code");
                Ok(url)
            }
            None => Err(ShortenerError::NotFound(code.to_string())),
        }
    }

    /// Deletes `code`; returns whether it existed.
    pub async fn delete(&self, code: &str) -> Result<bool> {
        validate_lookup_code(code)?;
        Ok(self.records.delete(code).await?)
    }

    pub async fn stats(&self) -> Result<Stats> {
        let counters = self.records.counters();
        Ok(Stats {
            minted: counters.minted().await?,
            redirects: counters.redirects().await?,
            pool_remaining: self.pool.get().map(CodePool::remaining),
        })
    }

    /// Builds the pool of unissued codes; returns how many it holds.
    ///
    /// The code space is enumerated on the blocking thread pool while the
    /// store is asked for the codes already in use. Calling this again once
    /// a pool exists is a no-op.
    pub async fn build_pool(&self) -> Result<usize> {
        if let Some(pool) = self.pool.get() {
            return Ok(pool.remaining());
        }

        info!(size = self.space.size(), "Building code pool");
        let space = self.space.clone();
        let listing = tokio::task::spawn_blocking(move || space.enumerate());

        let issued: HashSet<String> = self.records.list_keys().await?.into_iter().collect();
        let codes = listing.await.map_err(join_error)??;

        let pool = tokio::task::spawn_blocking(move || {
            CodePool::from_codes(codes, &issued, &mut rand::thread_rng())
        })
        .await
        .map_err(join_error)?;

        if self.pool.set(pool).is_err() {
            debug!("Code pool was built concurrently, keeping the first one");
        }
        Ok(self.pool.get().map_or(0, CodePool::remaining))
    }

    /// Waits up to `timeout` for background counter updates.
    pub async fn drain(&self, timeout: Duration) -> bool {
        self.records.drain(timeout).await
    }

    async fn sample_unused(&self) -> Result<String> {
        for attempt in 1..=self.max_attempts {
            let Some(candidate) = self.random.generate() else {
                break;
            };
            if self.records.get(&candidate).await?.is_none() {
                return Ok(candidate);
            }
            debug!(code = %candidate, attempt, "Random code already taken");
        }

        warn!(attempts = self.max_attempts, "No free code found by sampling");
        Err(ShortenerError::Exhausted(format!(
            "no free code after {} attempts",
            self.max_attempts
        )))
    }
}

/// Puts a pooled code back after its write failed.
///
/// A timed-out write may still have landed, so that code is given up rather
/// than risk issuing it twice.
fn return_unwritten(pool: &CodePool, code: String, err: &StorageError) {
    if matches!(err, StorageError::Timeout(_)) {
        warn!(code = %code, "Write timed out, dropping code from the pool");
    } else {
        pool.release(code);
    }
}

fn join_error(e: tokio::task::JoinError) -> ShortenerError {
    ShortenerError::Internal(format!("code pool task failed: {e}"))
}
