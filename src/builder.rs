use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;

use crate::cache::TypedCache;
use crate::clock::{Clock, SystemClock};
use crate::listener::{EvictionCause, EvictionListener, FnListener};

/// Liveness window used when none is configured.
pub const DEFAULT_TIME_TO_IDLE: Duration = Duration::from_secs(60);

/// Builder for configuring and constructing a [`TypedCache`].
///
/// # Example
/// ```
/// use paintcache::CacheBuilder;
/// use std::time::Duration;
///
/// let cache: paintcache::TypedCache<String, String> = CacheBuilder::new()
///     .time_to_idle(Duration::from_secs(60))
///     .build();
/// ```
pub struct CacheBuilder<K, V> {
    num_shards: usize,
    ttl: Duration,
    clock: Option<Arc<dyn Clock>>,
    listener: Option<Box<dyn EvictionListener<K, V>>>,
}

impl<K: 'static, V: 'static> CacheBuilder<K, V> {
    pub fn new() -> Self {
        CacheBuilder {
            num_shards: 16,
            ttl: DEFAULT_TIME_TO_IDLE,
            clock: None,
            listener: None,
        }
    }

    /// Set the number of internal shards (must be a power of two; default: 16).
    pub fn num_shards(mut self, n: usize) -> Self {
        assert!(n > 0 && n.is_power_of_two(), "num_shards must be a power of two");
        self.num_shards = n;
        self
    }

    /// Each entry expires `tti` after it was last written or touched.
    pub fn time_to_idle(mut self, tti: Duration) -> Self {
        self.ttl = tti;
        self
    }

    /// Read time from `clock` instead of the system monotonic clock.
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Register an eviction listener closure.
    ///
    /// The closure is called synchronously on the thread that removed the
    /// entry, after internal locks have been released.
    ///
    /// # Example
    /// ```
    /// use paintcache::CacheBuilder;
    ///
    /// let cache: paintcache::TypedCache<u64, u64> = CacheBuilder::new()
    ///     .eviction_listener(|key: &u64, _val, cause| {
    ///         println!("evicted key={key} cause={cause:?}");
    ///     })
    ///     .build();
    /// ```
    pub fn eviction_listener<F>(mut self, f: F) -> Self
    where
        F: Fn(&K, Arc<V>, EvictionCause) + Send + Sync + 'static,
    {
        self.listener = Some(Box::new(FnListener(f)));
        self
    }

    /// Register an eviction listener via the [`EvictionListener`] trait.
    pub fn eviction_listener_impl<L: EvictionListener<K, V>>(mut self, l: L) -> Self {
        self.listener = Some(Box::new(l));
        self
    }
}

impl<K: 'static, V: 'static> Default for CacheBuilder<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> CacheBuilder<K, V>
where
    K: Hash + Eq + Clone + Send + Sync + 'static,
    V: Send + Sync + 'static,
{
    pub fn build(self) -> TypedCache<K, V> {
        let clock = self
            .clock
            .unwrap_or_else(|| Arc::new(SystemClock::new()) as Arc<dyn Clock>);
        TypedCache::new(self.num_shards, self.ttl, clock, self.listener)
    }
}
