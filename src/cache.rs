use std::convert::Infallible;
use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;

use crate::builder::CacheBuilder;
use crate::clock::{Clock, Timestamp};
use crate::listener::{EvictionCause, EvictionListener};
use crate::metrics::stats::{CacheCounters, Metrics};
use crate::store::sharded::{Lookup, ShardedStore};

// ---------------------------------------------------------------------------
// Cache interior
// ---------------------------------------------------------------------------

/// Shared interior of a [`TypedCache`].
pub(crate) struct Inner<K, V> {
    pub(crate) store: ShardedStore<K, V>,
    pub(crate) ttl: Duration,
    pub(crate) clock: Arc<dyn Clock>,
    /// Optional eviction listener.  `None` if the user didn't register one.
    pub(crate) listener: Option<Box<dyn EvictionListener<K, V>>>,
    pub(crate) metrics: CacheCounters,
}

// ---------------------------------------------------------------------------
// Cache handle
// ---------------------------------------------------------------------------

/// A concurrent map from key to a liveness-tagged value.
///
/// Every live hit pushes the entry's deadline to `now + ttl`.  Entries past
/// their deadline are never returned; they stay resident until a sweep
/// ([`sweep_expired`](Self::sweep_expired) or
/// [`remove_if_expired`](Self::remove_if_expired)) takes them, so that
/// values owning external resources can be released by whoever sweeps.
///
/// # Example
/// ```
/// use paintcache::TypedCache;
/// use std::sync::Arc;
///
/// let cache: TypedCache<String, String> = TypedCache::builder().build();
/// cache.insert("hello".to_string(), "world".to_string());
/// assert_eq!(cache.get(&"hello".to_string()), Some(Arc::new("world".to_string())));
/// ```
pub struct TypedCache<K, V> {
    inner: Arc<Inner<K, V>>,
}

impl<K, V> Clone for TypedCache<K, V> {
    fn clone(&self) -> Self {
        TypedCache {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<K, V> TypedCache<K, V>
where
    K: Hash + Eq + Clone + Send + Sync + 'static,
    V: Send + Sync + 'static,
{
    pub(crate) fn new(
        num_shards: usize,
        ttl: Duration,
        clock: Arc<dyn Clock>,
        listener: Option<Box<dyn EvictionListener<K, V>>>,
    ) -> Self {
        TypedCache {
            inner: Arc::new(Inner {
                store: ShardedStore::new(num_shards),
                ttl,
                clock,
                listener,
                metrics: CacheCounters::default(),
            }),
        }
    }

    /// Returns a [`CacheBuilder`] for constructing a new cache.
    pub fn builder() -> CacheBuilder<K, V> {
        CacheBuilder::new()
    }

    #[inline]
    fn now(&self) -> Timestamp {
        self.inner.clock.now()
    }

    /// The liveness window granted by every touch.
    pub fn time_to_idle(&self) -> Duration {
        self.inner.ttl
    }

    #[inline]
    fn notify(&self, key: &K, value: Arc<V>, cause: EvictionCause) {
        if let Some(listener) = &self.inner.listener {
            listener.on_evict(key, value, cause);
        }
    }

    // -----------------------------------------------------------------------
    // Lookups
    // -----------------------------------------------------------------------

    /// Returns the value for `key` if it exists and has not expired, and
    /// marks it alive.
    pub fn get(&self, key: &K) -> Option<Arc<V>> {
        match self.inner.store.lookup(key, self.now(), self.inner.ttl, true) {
            Lookup::Hit(value) => {
                self.inner.metrics.lookup(true);
                Some(value)
            }
            Lookup::Expired | Lookup::Missing => {
                self.inner.metrics.lookup(false);
                None
            }
        }
    }

    /// Like [`get`](Self::get) but leaves the deadline and the statistics
    /// untouched.
    pub fn peek(&self, key: &K) -> Option<Arc<V>> {
        match self.inner.store.lookup(key, self.now(), self.inner.ttl, false) {
            Lookup::Hit(value) => Some(value),
            Lookup::Expired | Lookup::Missing => None,
        }
    }

    /// Returns the live value for `key`, creating it with `make` otherwise.
    ///
    /// Under concurrent calls for the same unseen key `make` runs exactly
    /// once and every caller receives the same `Arc`.  `make` runs while a
    /// shard lock is held and must not use this cache.
    pub fn get_or_create<F>(&self, key: K, make: F) -> Arc<V>
    where
        F: FnOnce() -> V,
    {
        match self.upsert(key, || Ok::<V, Infallible>(make())) {
            Ok(value) => value,
            Err(never) => match never {},
        }
    }

    /// Like [`get_or_create`](Self::get_or_create), but `make` may decline
    /// by returning `None`, in which case nothing is cached and the next
    /// access tries again.
    pub fn try_get_or_create<F>(&self, key: K, make: F) -> Option<Arc<V>>
    where
        F: FnOnce() -> Option<V>,
    {
        self.upsert(key, || make().ok_or(())).ok()
    }

    fn upsert<F, E>(&self, key: K, make: F) -> Result<Arc<V>, E>
    where
        F: FnOnce() -> Result<V, E>,
    {
        let listener_key = self.inner.listener.as_ref().map(|_| key.clone());
        let up = match self
            .inner
            .store
            .get_or_insert_with(key, self.now(), self.inner.ttl, make)
        {
            Ok(up) => up,
            Err(declined) => {
                self.inner.metrics.lookup(false);
                return Err(declined);
            }
        };

        self.inner.metrics.lookup(!up.created);
        if let Some(old) = up.displaced {
            self.inner.metrics.departed(EvictionCause::Expired, 1);
            if let Some(key) = &listener_key {
                self.notify(key, old, EvictionCause::Expired);
            }
        }
        Ok(up.value)
    }

    // -----------------------------------------------------------------------
    // Writes
    // -----------------------------------------------------------------------

    /// Inserts `value` for `key`, alive for one full liveness window.
    pub fn insert(&self, key: K, value: V) {
        let listener_key = self.inner.listener.as_ref().map(|_| key.clone());
        let now = self.now();
        if let Some(old) = self.inner.store.insert(key, value, now, self.inner.ttl) {
            self.inner.metrics.departed(EvictionCause::Replaced, 1);
            if let Some(key) = &listener_key {
                self.notify(key, old, EvictionCause::Replaced);
            }
        }
    }

    /// Renews the deadline of a resident entry without fetching it.  An
    /// expired entry that has not been swept yet becomes live again.
    ///
    /// Returns `false` when `key` is not resident.
    pub fn touch(&self, key: &K) -> bool {
        self.inner.store.touch(key, self.now(), self.inner.ttl)
    }

    /// Removes the entry for `key`, if present, and returns it.
    pub fn remove(&self, key: &K) -> Option<Arc<V>> {
        let value = self.inner.store.remove(key)?;
        self.inner.metrics.departed(EvictionCause::Explicit, 1);
        self.notify(key, Arc::clone(&value), EvictionCause::Explicit);
        Some(value)
    }

    /// Removes `key` only if `pred` accepts its current value, checked
    /// atomically with the removal.
    pub fn remove_if<F>(&self, key: &K, pred: F) -> Option<Arc<V>>
    where
        F: FnOnce(&V) -> bool,
    {
        let value = self.inner.store.remove_if(key, |e| pred(&e.value))?;
        self.inner.metrics.departed(EvictionCause::Explicit, 1);
        self.notify(key, Arc::clone(&value), EvictionCause::Explicit);
        Some(value)
    }

    /// Removes `key` only if it is expired at `now`, and returns it.
    pub fn remove_if_expired(&self, key: &K, now: Timestamp) -> Option<Arc<V>> {
        let value = self.inner.store.remove_if_expired(key, now)?;
        self.inner.metrics.departed(EvictionCause::Expired, 1);
        self.notify(key, Arc::clone(&value), EvictionCause::Expired);
        Some(value)
    }

    // -----------------------------------------------------------------------
    // Bulk operations
    // -----------------------------------------------------------------------

    /// Visits every resident entry until `visit` returns `false`.
    ///
    /// Order is unspecified.  Each shard is copied out before its entries
    /// are visited, so `visit` may insert or remove keys (including the one
    /// being visited) without disturbing the walk over the others.  Entries
    /// added during the walk may or may not be seen.
    pub fn range<F>(&self, mut visit: F)
    where
        F: FnMut(&K, &Arc<V>) -> bool,
    {
        for idx in 0..self.inner.store.num_shards() {
            for (key, value) in self.inner.store.snapshot_shard(idx) {
                if !visit(&key, &value) {
                    return;
                }
            }
        }
    }

    /// Removes every entry expired at `now` and hands them back, so owned
    /// resources can be released by the caller.
    pub fn sweep_expired(&self, now: Timestamp) -> Vec<(K, Arc<V>)> {
        let expired = self.inner.store.drain_expired(now);
        self.inner
            .metrics
            .departed(EvictionCause::Expired, expired.len() as u64);
        for (key, value) in &expired {
            self.notify(key, Arc::clone(value), EvictionCause::Expired);
        }
        expired
    }

    /// Copies of the entries whose deadline has passed at `now`, left in
    /// place.  Pair with [`remove_if_expired`](Self::remove_if_expired) to
    /// take them one at a time.
    pub fn expired_entries(&self, now: Timestamp) -> Vec<(K, Arc<V>)> {
        self.inner.store.expired_entries(now)
    }

    /// Removes all entries.
    pub fn clear(&self) {
        let drained = self.inner.store.drain_all();
        self.inner
            .metrics
            .departed(EvictionCause::Cleared, drained.len() as u64);
        if self.inner.listener.is_some() {
            for (key, value) in drained {
                self.notify(&key, value, EvictionCause::Cleared);
            }
        }
    }

    // -----------------------------------------------------------------------
    // Introspection
    // -----------------------------------------------------------------------

    pub fn stats(&self) -> Metrics {
        self.inner.metrics.snapshot(self.inner.store.len())
    }

    /// Number of resident entries, expired ones included.
    pub fn len(&self) -> usize {
        self.inner.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.store.is_empty()
    }

    /// The value for `key` even if it has expired.  Does not touch.
    pub fn resident(&self, key: &K) -> Option<Arc<V>> {
        self.inner.store.resident(key)
    }

    /// `true` if `key` is resident, expired or not.
    pub fn contains(&self, key: &K) -> bool {
        self.inner.store.contains(key)
    }

    /// The deadline of `key`, if resident.
    pub fn expires_at(&self, key: &K) -> Option<Timestamp> {
        self.inner.store.expires_at(key)
    }
}
