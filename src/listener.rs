//! Eviction listener: a callback invoked whenever an entry leaves a cache.
//!
//! # Example
//! ```
//! use paintcache::TypedCache;
//! use paintcache::listener::EvictionCause;
//! use std::sync::{Arc, Mutex};
//!
//! let log: Arc<Mutex<Vec<(u64, EvictionCause)>>> = Arc::new(Mutex::new(Vec::new()));
//! let log2 = Arc::clone(&log);
//!
//! let cache: TypedCache<u64, u64> = TypedCache::builder()
//!     .eviction_listener(move |key: &u64, _val, cause| {
//!         log2.lock().unwrap().push((*key, cause));
//!     })
//!     .build();
//!
//! cache.insert(1, 10);
//! cache.remove(&1);
//! assert_eq!(log.lock().unwrap()[0], (1, EvictionCause::Explicit));
//! ```

use std::sync::Arc;

// ---------------------------------------------------------------------------
// EvictionCause
// ---------------------------------------------------------------------------

/// The reason an entry was removed from the cache.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EvictionCause {
    /// Its liveness deadline passed and a sweep, or a re-creation, took it.
    Expired,
    /// Removed explicitly via [`TypedCache::remove`].
    ///
    /// [`TypedCache::remove`]: crate::TypedCache::remove
    Explicit,
    /// Overwritten by [`TypedCache::insert`].
    ///
    /// [`TypedCache::insert`]: crate::TypedCache::insert
    Replaced,
    /// Dropped by [`TypedCache::clear`].
    ///
    /// [`TypedCache::clear`]: crate::TypedCache::clear
    Cleared,
}

// ---------------------------------------------------------------------------
// EvictionListener trait
// ---------------------------------------------------------------------------

/// A callback invoked each time an entry leaves the cache.
///
/// The listener always runs after the shard lock has been released, on the
/// thread that performed the removal.  It may call back into the cache.
pub trait EvictionListener<K, V>: Send + Sync + 'static {
    fn on_evict(&self, key: &K, value: Arc<V>, cause: EvictionCause);
}

/// An [`EvictionListener`] backed by a closure.
///
/// Created via [`CacheBuilder::eviction_listener`](crate::CacheBuilder::eviction_listener).
pub struct FnListener<F>(pub F);

impl<K, V, F> EvictionListener<K, V> for FnListener<F>
where
    F: Fn(&K, Arc<V>, EvictionCause) + Send + Sync + 'static,
{
    fn on_evict(&self, key: &K, value: Arc<V>, cause: EvictionCause) {
        (self.0)(key, value, cause)
    }
}
