use jiff::{SignedDuration, Timestamp};
use parking_lot::Mutex;
use portkey_core::{Clock, SystemClock};
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;
use tracing::{debug, trace};

/// A bounded least-recently-used cache with a fixed time-to-live per entry.
///
/// Entries live in an arena owned by the cache and are threaded onto a
/// circular doubly-linked recency ring through slot indices. The most
/// recently used entry is the ring's head; the least recently used one is
/// the head's predecessor.
///
/// An entry whose age exceeds the expiration is treated as absent. Expired
/// entries are not swept in the background: they are dropped when the key is
/// next fetched, or evicted in recency order like any other entry.
///
/// Every public method takes the lock exactly once and then works on the
/// unlocked ring helpers, which never call back into the public API.
///
/// # Example
///
/// ```rust
/// use portkey_cache::LruCache;
/// use std::time::Duration;
///
/// let cache = LruCache::new(2, Duration::from_secs(60));
/// cache.insert("a", "https://a.example".to_string());
/// cache.insert("b", "https://b.example".to_string());
/// cache.fetch("a");
/// cache.insert("c", "https://c.example".to_string());
///
/// // "b" was the least recently used entry.
/// assert!(!cache.contains("b"));
/// assert_eq!(cache.keys(), vec!["c", "a"]);
/// ```
pub struct LruCache<V, C = SystemClock> {
    ring: Mutex<Ring<V>>,
    clock: C,
}

impl<V: Clone> LruCache<V, SystemClock> {
    /// Creates an empty cache backed by the system clock.
    pub fn new(capacity: usize, expiration: Duration) -> Self {
        Self::with_clock(capacity, expiration, SystemClock)
    }
}

impl<V: Clone, C: Clock> LruCache<V, C> {
    /// Creates an empty cache that reads time from `clock`.
    pub fn with_clock(capacity: usize, expiration: Duration, clock: C) -> Self {
        let expiration = SignedDuration::try_from(expiration).unwrap_or(SignedDuration::MAX);
        Self {
            ring: Mutex::new(Ring::new(capacity, expiration)),
            clock,
        }
    }

    /// Returns the value for `key` and marks it most recently used.
    ///
    /// An expired entry is evicted and reported as a miss.
    pub fn fetch(&self, key: &str) -> Option<V> {
        let now = self.clock.now();
        let mut ring = self.ring.lock();
        ring.fetch(key, now)
    }

    /// Inserts or refreshes `key`, returning the stored value.
    ///
    /// A fresh key evicts the least recently used entry first when the cache
    /// is full. A zero-capacity cache stores nothing.
    pub fn insert(&self, key: impl Into<String>, value: V) -> V {
        let now = self.clock.now();
        let mut ring = self.ring.lock();
        ring.insert(key.into(), value, now)
    }

    /// Whether `key` is present and not expired. Does not touch recency.
    pub fn contains(&self, key: &str) -> bool {
        let now = self.clock.now();
        let ring = self.ring.lock();
        ring.contains(key, now)
    }

    /// Removes `key`, returning its value if it was present.
    pub fn remove(&self, key: &str) -> Option<V> {
        let mut ring = self.ring.lock();
        ring.remove(key)
    }

    /// Evicts the least recently used entry and returns its key.
    pub fn drop_lru(&self) -> Option<String> {
        let mut ring = self.ring.lock();
        ring.drop_lru().map(|(key, _)| key)
    }

    /// Changes the capacity, evicting least recently used entries until the
    /// cache fits. A capacity of 0 empties the cache.
    pub fn change_capacity(&self, capacity: usize) {
        let mut ring = self.ring.lock();
        ring.change_capacity(capacity);
    }

    pub fn len(&self) -> usize {
        self.ring.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.ring.lock().capacity
    }

    /// Keys ordered from most to least recently used, expired ones included.
    pub fn keys(&self) -> Vec<String> {
        self.ring.lock().keys()
    }
}

impl<V, C> fmt::Debug for LruCache<V, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ring = self.ring.lock();
        f.debug_struct("LruCache")
            .field("len", &ring.index.len())
            .field("capacity", &ring.capacity)
            .field("expiration", &ring.expiration)
            .finish()
    }
}

struct Entry<V> {
    key: String,
    value: V,
    last_updated: Timestamp,
    prev: usize,
    next: usize,
}

/// Lock-free core of [`LruCache`]; callers must hold the cache lock.
struct Ring<V> {
    slots: Vec<Option<Entry<V>>>,
    free: Vec<usize>,
    index: HashMap<String, usize>,
    head: Option<usize>,
    capacity: usize,
    expiration: SignedDuration,
}

impl<V: Clone> Ring<V> {
    fn new(capacity: usize, expiration: SignedDuration) -> Self {
        Self {
            slots: Vec::with_capacity(capacity),
            free: Vec::new(),
            index: HashMap::with_capacity(capacity),
            head: None,
            capacity,
            expiration,
        }
    }

    fn len(&self) -> usize {
        self.index.len()
    }

    fn entry(&self, slot: usize) -> &Entry<V> {
        self.slots[slot]
            .as_ref()
            .expect("recency ring links to a vacant slot")
    }

    fn entry_mut(&mut self, slot: usize) -> &mut Entry<V> {
        self.slots[slot]
            .as_mut()
            .expect("recency ring links to a vacant slot")
    }

    fn is_expired(&self, entry: &Entry<V>, now: Timestamp) -> bool {
        now.duration_since(entry.last_updated) > self.expiration
    }

    fn allocate(&mut self, entry: Entry<V>) -> usize {
        match self.free.pop() {
            Some(slot) => {
                self.slots[slot] = Some(entry);
                slot
            }
            None => {
                self.slots.push(Some(entry));
                self.slots.len() - 1
            }
        }
    }

    fn release(&mut self, slot: usize) -> Entry<V> {
        let entry = self.slots[slot]
            .take()
            .expect("released slot must be occupied");
        self.free.push(slot);
        entry
    }

    /// Links a detached slot in as the new head.
    fn link_front(&mut self, slot: usize) {
        match self.head {
            None => {
                let entry = self.entry_mut(slot);
                entry.prev = slot;
                entry.next = slot;
            }
            Some(head) => {
                let last = self.entry(head).prev;
                self.entry_mut(last).next = slot;
                self.entry_mut(head).prev = slot;
                let entry = self.entry_mut(slot);
                entry.next = head;
                entry.prev = last;
            }
        }
        self.head = Some(slot);
    }

    /// Detaches a slot from the ring without freeing it.
    fn unlink(&mut self, slot: usize) {
        let (prev, next) = {
            let entry = self.entry(slot);
            (entry.prev, entry.next)
        };
        if next == slot {
            self.head = None;
            return;
        }
        self.entry_mut(prev).next = next;
        self.entry_mut(next).prev = prev;
        if self.head == Some(slot) {
            self.head = Some(next);
        }
    }

    fn promote(&mut self, slot: usize) {
        if self.head == Some(slot) {
            return;
        }
        self.unlink(slot);
        self.link_front(slot);
    }

    fn remove(&mut self, key: &str) -> Option<V> {
        let slot = self.index.remove(key)?;
        self.unlink(slot);
        Some(self.release(slot).value)
    }

    fn drop_lru(&mut self) -> Option<(String, V)> {
        let head = self.head?;
        let tail = self.entry(head).prev;
        self.unlink(tail);
        let entry = self.release(tail);
        self.index.remove(&entry.key);
        debug!(key = %entry.key, "evicted least recently used entry");
        Some((entry.key, entry.value))
    }

    fn contains(&self, key: &str, now: Timestamp) -> bool {
        self.index
            .get(key)
            .is_some_and(|&slot| !self.is_expired(self.entry(slot), now))
    }

    fn fetch(&mut self, key: &str, now: Timestamp) -> Option<V> {
        let slot = *self.index.get(key)?;
        if self.is_expired(self.entry(slot), now) {
            trace!(key = %key, "cached entry expired");
            self.remove(key);
            return None;
        }
        self.promote(slot);
        Some(self.entry(slot).value.clone())
    }

    fn insert(&mut self, key: String, value: V, now: Timestamp) -> V {
        if self.capacity == 0 {
            return value;
        }

        if let Some(&slot) = self.index.get(&key) {
            let entry = self.entry_mut(slot);
            entry.value = value.clone();
            entry.last_updated = now;
            self.promote(slot);
            return value;
        }

        if self.len() >= self.capacity {
            self.drop_lru();
        }

        let slot = self.allocate(Entry {
            key: key.clone(),
            value: value.clone(),
            last_updated: now,
            prev: 0,
            next: 0,
        });
        self.index.insert(key, slot);
        self.link_front(slot);
        value
    }

    fn change_capacity(&mut self, capacity: usize) {
        if capacity == 0 {
            self.slots.clear();
            self.free.clear();
            self.index.clear();
            self.head = None;
        } else {
            while self.len() > capacity {
                self.drop_lru();
            }
        }
        self.capacity = capacity;
    }

    fn keys(&self) -> Vec<String> {
        let mut keys = Vec::with_capacity(self.len());
        let Some(head) = self.head else {
            return keys;
        };
        let mut slot = head;
        loop {
            let entry = self.entry(slot);
            keys.push(entry.key.clone());
            slot = entry.next;
            if slot == head {
                break;
            }
        }
        keys
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use portkey_core::ManualClock;
    use std::sync::Arc;

    const TTL: Duration = Duration::from_secs(60);

    fn cache(capacity: usize) -> (LruCache<String, ManualClock>, ManualClock) {
        let clock = ManualClock::new(Timestamp::from_second(1_000).unwrap());
        (LruCache::with_clock(capacity, TTL, clock.clone()), clock)
    }

    fn url(n: u32) -> String {
        format!("https://example.com/{n}")
    }

    /// Walks the ring in both directions and checks it against the index.
    fn assert_consistent<V: Clone, C: Clock>(cache: &LruCache<V, C>) {
        let ring = cache.ring.lock();
        assert!(ring.len() <= ring.capacity);

        let forward = ring.keys();
        assert_eq!(forward.len(), ring.index.len());
        for key in &forward {
            assert!(ring.index.contains_key(key), "ring key {key} missing from index");
        }

        if let Some(head) = ring.head {
            let mut backward = Vec::new();
            let mut slot = ring.entry(head).prev;
            loop {
                backward.push(ring.entry(slot).key.clone());
                if slot == head {
                    break;
                }
                slot = ring.entry(slot).prev;
            }
            backward.reverse();
            assert_eq!(forward, backward);
        }
    }

    #[test]
    fn new_cache_is_empty() {
        let (cache, _) = cache(3);
        assert_eq!(cache.len(), 0);
        assert_eq!(cache.capacity(), 3);
        assert!(cache.is_empty());
        assert_eq!(cache.fetch("missing"), None);
        assert!(cache.keys().is_empty());
    }

    #[test]
    fn insert_then_fetch() {
        let (cache, _) = cache(3);
        assert_eq!(cache.insert("a", url(1)), url(1));
        assert_eq!(cache.fetch("a"), Some(url(1)));
        assert_eq!(cache.len(), 1);
        assert_consistent(&cache);
    }

    #[test]
    fn overflow_evicts_first_inserted() {
        let (cache, _) = cache(3);
        for (i, key) in ["a", "b", "c", "d"].iter().enumerate() {
            cache.insert(*key, url(i as u32));
        }

        assert!(!cache.contains("a"));
        assert_eq!(cache.keys(), vec!["d", "c", "b"]);
        assert_consistent(&cache);
    }

    #[test]
    fn fetch_protects_from_next_eviction() {
        let (cache, _) = cache(3);
        cache.insert("a", url(1));
        cache.insert("b", url(2));
        cache.insert("c", url(3));

        cache.fetch("a");
        cache.insert("d", url(4));

        assert!(cache.contains("a"));
        assert!(!cache.contains("b"));
        assert_eq!(cache.keys(), vec!["d", "a", "c"]);
        assert_consistent(&cache);
    }

    #[test]
    fn reinsert_updates_value_and_promotes() {
        let (cache, _) = cache(3);
        cache.insert("a", url(1));
        cache.insert("b", url(2));
        cache.insert("c", url(3));

        cache.insert("a", url(10));
        cache.insert("d", url(4));

        assert_eq!(cache.len(), 3);
        assert_eq!(cache.fetch("a"), Some(url(10)));
        assert!(!cache.contains("b"));
        assert_consistent(&cache);
    }

    #[test]
    fn contains_does_not_touch_recency() {
        let (cache, _) = cache(2);
        cache.insert("a", url(1));
        cache.insert("b", url(2));

        assert!(cache.contains("a"));
        cache.insert("c", url(3));

        assert!(!cache.contains("a"));
        assert!(cache.contains("b"));
    }

    #[test]
    fn expired_entry_is_logically_absent() {
        let (cache, clock) = cache(3);
        cache.insert("a", url(1));

        clock.advance(TTL);
        assert!(cache.contains("a"), "age equal to the expiration is still live");

        clock.advance(Duration::from_millis(1));
        assert!(!cache.contains("a"));
        // Still structurally present until the next fetch.
        assert_eq!(cache.len(), 1);

        assert_eq!(cache.fetch("a"), None);
        assert_eq!(cache.len(), 0);
        assert_consistent(&cache);
    }

    #[test]
    fn reinsert_resets_expiration() {
        let (cache, clock) = cache(3);
        cache.insert("a", url(1));
        clock.advance(Duration::from_secs(50));
        cache.insert("a", url(2));
        clock.advance(Duration::from_secs(50));

        assert_eq!(cache.fetch("a"), Some(url(2)));
    }

    #[test]
    fn fetch_does_not_extend_expiration() {
        let (cache, clock) = cache(3);
        cache.insert("a", url(1));
        clock.advance(Duration::from_secs(50));
        assert!(cache.fetch("a").is_some());
        clock.advance(Duration::from_secs(11));

        assert_eq!(cache.fetch("a"), None);
    }

    #[test]
    fn remove_is_noop_for_missing_key() {
        let (cache, _) = cache(3);
        cache.insert("a", url(1));

        assert_eq!(cache.remove("missing"), None);
        assert_eq!(cache.remove("a"), Some(url(1)));
        assert_eq!(cache.remove("a"), None);
        assert!(cache.is_empty());
        assert_consistent(&cache);
    }

    #[test]
    fn remove_head_middle_and_tail() {
        let (cache, _) = cache(5);
        for key in ["a", "b", "c", "d", "e"] {
            cache.insert(key, key.to_string());
        }

        cache.remove("e");
        cache.remove("c");
        cache.remove("a");

        assert_eq!(cache.keys(), vec!["d", "b"]);
        assert_consistent(&cache);
    }

    #[test]
    fn drop_lru_on_empty_is_noop() {
        let (cache, _) = cache(3);
        assert_eq!(cache.drop_lru(), None);
        assert!(cache.is_empty());
    }

    #[test]
    fn drop_lru_evicts_tail() {
        let (cache, _) = cache(3);
        cache.insert("a", url(1));
        cache.insert("b", url(2));

        assert_eq!(cache.drop_lru(), Some("a".to_string()));
        assert_eq!(cache.drop_lru(), Some("b".to_string()));
        assert_eq!(cache.drop_lru(), None);
        assert_consistent(&cache);
    }

    #[test]
    fn shrinking_keeps_most_recent_in_order() {
        let (cache, _) = cache(5);
        for key in ["a", "b", "c", "d", "e"] {
            cache.insert(key, key.to_string());
        }
        cache.fetch("b");

        cache.change_capacity(3);

        assert_eq!(cache.capacity(), 3);
        assert_eq!(cache.keys(), vec!["b", "e", "d"]);
        assert_consistent(&cache);
    }

    #[test]
    fn growing_only_changes_the_limit() {
        let (cache, _) = cache(2);
        cache.insert("a", url(1));
        cache.insert("b", url(2));

        cache.change_capacity(4);
        cache.insert("c", url(3));
        cache.insert("d", url(4));

        assert_eq!(cache.len(), 4);
        assert_eq!(cache.keys(), vec!["d", "c", "b", "a"]);
    }

    #[test]
    fn zero_capacity_clears_and_stores_nothing() {
        let (cache, _) = cache(3);
        cache.insert("a", url(1));
        cache.insert("b", url(2));

        cache.change_capacity(0);
        assert!(cache.is_empty());

        assert_eq!(cache.insert("c", url(3)), url(3));
        assert!(cache.is_empty());
        assert_eq!(cache.fetch("c"), None);
        assert_eq!(cache.drop_lru(), None);
        assert_eq!(cache.remove("c"), None);
    }

    #[test]
    fn freed_slots_are_reused() {
        let (cache, _) = cache(2);
        for n in 0..100 {
            cache.insert(format!("k{n}"), url(n));
        }
        assert_eq!(cache.ring.lock().slots.len(), 2);
        assert_eq!(cache.keys(), vec!["k99", "k98"]);
        assert_consistent(&cache);
    }

    #[test]
    fn concurrent_access_respects_capacity() {
        let cache = Arc::new(LruCache::new(64, TTL));
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let cache = Arc::clone(&cache);
                std::thread::spawn(move || {
                    for n in 0..500 {
                        let key = format!("{t}-{}", n % 100);
                        cache.insert(key.clone(), n);
                        cache.fetch(&key);
                        if n % 7 == 0 {
                            cache.remove(&key);
                        }
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert!(cache.len() <= 64);
        assert_consistent(&*cache);
    }
}
