use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;

use ahash::{AHashMap, RandomState};
use parking_lot::RwLock;

use crate::clock::Timestamp;
use crate::entry::ExpiringEntry;

// ---------------------------------------------------------------------------
// StoreEntry
// ---------------------------------------------------------------------------

/// A single entry in the store: the shared value and its liveness record.
///
/// The deadline is atomic, so a hit can extend it under the shard's
/// read-lock.
pub struct StoreEntry<V> {
    pub value: Arc<V>,
    pub liveness: ExpiringEntry,
}

/// Outcome of a keyed lookup.
pub enum Lookup<V> {
    Hit(Arc<V>),
    /// Present but past its deadline; left in place for the sweep.
    Expired,
    Missing,
}

/// Outcome of [`ShardedStore::get_or_insert_with`].
pub struct Upsert<V> {
    pub value: Arc<V>,
    pub created: bool,
    /// An expired value that was replaced by the new one.
    pub displaced: Option<Arc<V>>,
}

// ---------------------------------------------------------------------------
// Shard
// ---------------------------------------------------------------------------

/// Cache-line padding to prevent false sharing between shards.
#[repr(align(64))]
pub(crate) struct Shard<K, V> {
    pub(crate) map: RwLock<AHashMap<K, StoreEntry<V>>>,
}

// ---------------------------------------------------------------------------
// ShardedStore
// ---------------------------------------------------------------------------

/// A thread-safe key-value store backed by `N` independently-locked shards.
///
/// Reads use a shared lock, writes use an exclusive lock, both per-shard.
/// Nothing in here calls back into user code while a lock is held, except
/// the factory of [`get_or_insert_with`](Self::get_or_insert_with).
pub struct ShardedStore<K, V> {
    shards: Box<[Shard<K, V>]>,
    /// Always `shards.len() - 1`; shards.len() is a power of two.
    shard_mask: usize,
    /// Hasher used only to compute shard indices.
    build_hasher: RandomState,
}

impl<K: Hash + Eq + Clone, V> ShardedStore<K, V> {
    pub fn new(num_shards: usize) -> Self {
        assert!(num_shards.is_power_of_two());
        let shards = (0..num_shards)
            .map(|_| Shard {
                map: RwLock::new(AHashMap::new()),
            })
            .collect::<Vec<_>>()
            .into_boxed_slice();

        ShardedStore {
            shards,
            shard_mask: num_shards - 1,
            build_hasher: RandomState::new(),
        }
    }

    #[inline]
    fn shard_index(&self, key: &K) -> usize {
        let h = self.build_hasher.hash_one(key);
        // Use the high bits (better avalanche from ahash).
        ((h >> 32) as usize) & self.shard_mask
    }

    #[inline]
    fn shard(&self, key: &K) -> &Shard<K, V> {
        &self.shards[self.shard_index(key)]
    }

    // -----------------------------------------------------------------------
    // Keyed operations
    // -----------------------------------------------------------------------

    /// Looks up `key`, extending its deadline to `now + ttl` on a live hit
    /// when `touch` is set.
    pub fn lookup(&self, key: &K, now: Timestamp, ttl: Duration, touch: bool) -> Lookup<V> {
        let map = self.shard(key).map.read();
        match map.get(key) {
            None => Lookup::Missing,
            Some(e) if e.liveness.is_expired(now) => Lookup::Expired,
            Some(e) => {
                if touch {
                    e.liveness.touch(now, ttl);
                }
                Lookup::Hit(Arc::clone(&e.value))
            }
        }
    }

    /// Returns the live value for `key`, creating it with `make` if absent
    /// or expired.
    ///
    /// The shard's write-lock is held while `make` runs, so concurrent
    /// callers for the same key see exactly one creation.  `make` must not
    /// touch this store.  An `Err` from `make` stores nothing and is passed
    /// through.
    pub fn get_or_insert_with<F, E>(
        &self,
        key: K,
        now: Timestamp,
        ttl: Duration,
        make: F,
    ) -> Result<Upsert<V>, E>
    where
        F: FnOnce() -> Result<V, E>,
    {
        if let Lookup::Hit(value) = self.lookup(&key, now, ttl, true) {
            return Ok(Upsert {
                value,
                created: false,
                displaced: None,
            });
        }

        let mut map = self.shard(&key).map.write();
        // Re-check: another thread may have won the race for the lock.
        if let Some(e) = map.get(&key) {
            if !e.liveness.is_expired(now) {
                e.liveness.touch(now, ttl);
                return Ok(Upsert {
                    value: Arc::clone(&e.value),
                    created: false,
                    displaced: None,
                });
            }
        }

        let value = Arc::new(make()?);
        let displaced = map
            .insert(
                key,
                StoreEntry {
                    value: Arc::clone(&value),
                    liveness: ExpiringEntry::new(now, ttl),
                },
            )
            .map(|old| old.value);
        Ok(Upsert {
            value,
            created: true,
            displaced,
        })
    }

    /// Inserts `value` for `key`, alive until `now + ttl`.
    ///
    /// Returns the previous value, if any.
    pub fn insert(&self, key: K, value: V, now: Timestamp, ttl: Duration) -> Option<Arc<V>> {
        self.shard(&key)
            .map
            .write()
            .insert(
                key,
                StoreEntry {
                    value: Arc::new(value),
                    liveness: ExpiringEntry::new(now, ttl),
                },
            )
            .map(|old| old.value)
    }

    /// Sets the deadline of `key` to `now + ttl`, reviving it if it had
    /// expired.  Returns `false` when the key is absent.
    pub fn touch(&self, key: &K, now: Timestamp, ttl: Duration) -> bool {
        match self.shard(key).map.read().get(key) {
            Some(e) => {
                e.liveness.touch(now, ttl);
                true
            }
            None => false,
        }
    }

    /// Returns the deadline of `key`, whether or not it has passed.
    pub fn expires_at(&self, key: &K) -> Option<Timestamp> {
        self.shard(key)
            .map
            .read()
            .get(key)
            .map(|e| e.liveness.expires_at())
    }

    /// Removes the entry for `key`.  Returns the removed value, if any.
    pub fn remove(&self, key: &K) -> Option<Arc<V>> {
        self.shard(key).map.write().remove(key).map(|e| e.value)
    }

    /// Removes `key` only if `pred` accepts its current entry.
    ///
    /// The check and the removal happen under the same write-lock, so an
    /// entry touched or replaced concurrently is judged on its latest state.
    pub fn remove_if<F>(&self, key: &K, pred: F) -> Option<Arc<V>>
    where
        F: FnOnce(&StoreEntry<V>) -> bool,
    {
        let mut map = self.shard(key).map.write();
        if pred(map.get(key)?) {
            map.remove(key).map(|e| e.value)
        } else {
            None
        }
    }

    /// Removes `key` only if it is expired at `now`.
    pub fn remove_if_expired(&self, key: &K, now: Timestamp) -> Option<Arc<V>> {
        self.remove_if(key, |e| e.liveness.is_expired(now))
    }

    /// Returns the value for `key` whether or not it has expired.
    pub fn resident(&self, key: &K) -> Option<Arc<V>> {
        self.shard(key)
            .map
            .read()
            .get(key)
            .map(|e| Arc::clone(&e.value))
    }

    /// Returns `true` if the key is present (expired or not).
    pub fn contains(&self, key: &K) -> bool {
        self.shard(key).map.read().contains_key(key)
    }

    // -----------------------------------------------------------------------
    // Whole-store operations
    // -----------------------------------------------------------------------

    /// Removes every entry expired at `now` and returns them.
    pub fn drain_expired(&self, now: Timestamp) -> Vec<(K, Arc<V>)> {
        let mut out = Vec::new();
        for shard in self.shards.iter() {
            let mut map = shard.map.write();
            let expired: Vec<K> = map
                .iter()
                .filter(|(_, e)| e.liveness.is_expired(now))
                .map(|(k, _)| k.clone())
                .collect();
            for key in expired {
                if let Some(e) = map.remove(&key) {
                    out.push((key, e.value));
                }
            }
        }
        out
    }

    /// Removes all entries from every shard and returns them.
    pub fn drain_all(&self) -> Vec<(K, Arc<V>)> {
        let mut out = Vec::new();
        for shard in self.shards.iter() {
            out.extend(shard.map.write().drain().map(|(k, e)| (k, e.value)));
        }
        out
    }

    /// Copies out the entries of every shard that are expired at `now`.
    pub fn expired_entries(&self, now: Timestamp) -> Vec<(K, Arc<V>)> {
        let mut out = Vec::new();
        for shard in self.shards.iter() {
            out.extend(
                shard
                    .map
                    .read()
                    .iter()
                    .filter(|(_, e)| e.liveness.is_expired(now))
                    .map(|(k, e)| (k.clone(), Arc::clone(&e.value))),
            );
        }
        out
    }

    /// Copies out the keys and values of one shard.
    ///
    /// Iteration works over these copies so the visitor can freely mutate
    /// the store.
    pub(crate) fn snapshot_shard(&self, idx: usize) -> Vec<(K, Arc<V>)> {
        self.shards[idx]
            .map
            .read()
            .iter()
            .map(|(k, e)| (k.clone(), Arc::clone(&e.value)))
            .collect()
    }

    pub(crate) fn num_shards(&self) -> usize {
        self.shards.len()
    }

    /// Returns the total number of entries across all shards.
    pub fn len(&self) -> usize {
        self.shards.iter().map(|s| s.map.read().len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.shards.iter().all(|s| s.map.read().is_empty())
    }
}
