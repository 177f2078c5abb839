use jiff::{SignedDuration, Timestamp};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// A source of the current time.
///
/// Expiration decisions go through this trait so that tests can move time
/// forward without sleeping.
pub trait Clock: Send + Sync {
    /// Returns the current time of the clock
    fn now(&self) -> Timestamp;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        Timestamp::now()
    }
}

/// A clock that only moves when told to.
///
/// Clones share the same underlying instant, so a test can keep one handle
/// and pass another into the component under test.
#[derive(Debug, Clone)]
pub struct ManualClock {
    inner: Arc<Mutex<Timestamp>>,
}

impl ManualClock {
    pub fn new(now: Timestamp) -> Self {
        Self {
            inner: Arc::new(Mutex::new(now)),
        }
    }

    /// Moves the clock forward by `by`.
    pub fn advance(&self, by: Duration) {
        let by = SignedDuration::try_from(by).expect("advance duration fits in a signed duration");
        let mut now = self
            .inner
            .lock()
            .expect("manual clock lock should not be poisoned");
        *now = *now + by;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new(Timestamp::UNIX_EPOCH)
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        *self
            .inner
            .lock()
            .expect("manual clock lock should not be poisoned")
    }
}

impl<C: Clock + ?Sized> Clock for Arc<C> {
    fn now(&self) -> Timestamp {
        (**self).now()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_clock_starts_at_given_time() {
        let base = Timestamp::from_second(1_000).unwrap();
        let clock = ManualClock::new(base);
        assert_eq!(clock.now(), base);
    }

    #[test]
    fn manual_clock_advances_all_clones() {
        let clock = ManualClock::new(Timestamp::from_second(0).unwrap());
        let handle = clock.clone();

        handle.advance(Duration::from_secs(90));

        assert_eq!(clock.now(), Timestamp::from_second(90).unwrap());
    }
}
