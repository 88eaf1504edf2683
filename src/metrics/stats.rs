//! Per-cache counters.
//!
//! Lookups are split into hits and misses.  Departures are split by
//! [`EvictionCause`], so an idle renderer reaching the end of its liveness
//! window is told apart from one torn down with its canvas.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::listener::EvictionCause;

#[derive(Default)]
pub(crate) struct CacheCounters {
    hits: AtomicU64,
    misses: AtomicU64,
    expired: AtomicU64,
    removed: AtomicU64,
    replaced: AtomicU64,
}

impl CacheCounters {
    #[inline]
    pub(crate) fn lookup(&self, hit: bool) {
        let counter = if hit { &self.hits } else { &self.misses };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Counts `count` entries leaving the cache for `cause`.
    #[inline]
    pub(crate) fn departed(&self, cause: EvictionCause, count: u64) {
        let counter = match cause {
            EvictionCause::Expired => &self.expired,
            EvictionCause::Replaced => &self.replaced,
            EvictionCause::Explicit | EvictionCause::Cleared => &self.removed,
        };
        counter.fetch_add(count, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self, entries: usize) -> Metrics {
        Metrics {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            expired: self.expired.load(Ordering::Relaxed),
            removed: self.removed.load(Ordering::Relaxed),
            replaced: self.replaced.load(Ordering::Relaxed),
            entries,
        }
    }
}

/// Counters of one cache, read at a single point in time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Metrics {
    /// Lookups that found a live entry.
    pub hits: u64,
    /// Lookups that found nothing or only an expired entry.
    pub misses: u64,
    /// Entries dropped after their liveness window lapsed.
    pub expired: u64,
    /// Entries removed on request or by `clear`.
    pub removed: u64,
    /// Entries overwritten by a fresh `insert`.
    pub replaced: u64,
    /// Entries resident at snapshot time, expired ones included.
    pub entries: usize,
}

impl Metrics {
    pub fn lookups(&self) -> u64 {
        self.hits + self.misses
    }

    /// `hits / lookups`, or `0.0` before the first lookup.
    pub fn hit_rate(&self) -> f64 {
        match self.lookups() {
            0 => 0.0,
            n => self.hits as f64 / n as f64,
        }
    }

    /// Sums two snapshots.
    pub fn merge(self, other: Metrics) -> Metrics {
        Metrics {
            hits: self.hits + other.hits,
            misses: self.misses + other.misses,
            expired: self.expired + other.expired,
            removed: self.removed + other.removed,
            replaced: self.replaced + other.replaced,
            entries: self.entries + other.entries,
        }
    }
}
