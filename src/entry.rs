//! Liveness record carried by every cached value.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use crate::clock::Timestamp;

/// A deadline that moves forward every time the owner is used.
///
/// `expires_at` is always the last touch plus the cache duration.  An entry
/// whose deadline is at or before `now` is expired: it may be removed by a
/// sweep but must never be handed out again.
///
/// The deadline is atomic so lookups can touch an entry while holding only
/// a shard's shared lock.
#[derive(Debug)]
pub struct ExpiringEntry {
    expires_at: AtomicU64,
}

impl ExpiringEntry {
    /// Creates an entry that is alive until `now + ttl`.
    pub fn new(now: Timestamp, ttl: Duration) -> Self {
        ExpiringEntry {
            expires_at: AtomicU64::new(now.saturating_add(ttl).as_nanos()),
        }
    }

    #[inline]
    pub fn expires_at(&self) -> Timestamp {
        Timestamp::from_nanos(self.expires_at.load(Ordering::Acquire))
    }

    #[inline]
    pub fn is_expired(&self, now: Timestamp) -> bool {
        self.expires_at() <= now
    }

    /// Extends the deadline to `now + ttl`.
    ///
    /// Touching twice at the same instant yields the same deadline.
    #[inline]
    pub fn touch(&self, now: Timestamp, ttl: Duration) {
        self.expires_at
            .store(now.saturating_add(ttl).as_nanos(), Ordering::Release);
    }
}
