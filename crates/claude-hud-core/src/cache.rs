//! Memoizing guard shared by the polled readers.
//!
//! A [`Memo`] holds the latest value of one source together with a stamp
//! describing when (or from what) it was produced. Each reader supplies its
//! own freshness predicate over the stamp:
//!
//! - transcript: stamp is the file signature, fresh while it is unchanged
//! - settings: stamp is an `Instant`, fresh while younger than the TTL
//! - usage: stamp is an `Instant`, fresh while younger than the minimum
//!   refresh interval, plus the single-flight guard
//!
//! Values are handed out as `Arc<T>` so a cache hit returns the same
//! instance, and callers can compare with `Arc::ptr_eq`.

use parking_lot::Mutex;
use std::sync::Arc;

struct Slot<T, S> {
    value: Option<Arc<T>>,
    stamp: Option<S>,
    in_flight: bool,
}

/// Cached value with a freshness stamp and an in-flight flag
pub struct Memo<T, S> {
    slot: Mutex<Slot<T, S>>,
}

impl<T, S> Memo<T, S> {
    /// Create an empty memo
    pub fn new() -> Self {
        Self {
            slot: Mutex::new(Slot {
                value: None,
                stamp: None,
                in_flight: false,
            }),
        }
    }

    /// Latest value regardless of freshness
    pub fn cached(&self) -> Option<Arc<T>> {
        self.slot.lock().value.clone()
    }

    /// Cached value if `is_fresh` accepts its stamp
    pub fn fresh(&self, is_fresh: impl FnOnce(&S) -> bool) -> Option<Arc<T>> {
        let slot = self.slot.lock();
        match (&slot.value, &slot.stamp) {
            (Some(value), Some(stamp)) if is_fresh(stamp) => Some(Arc::clone(value)),
            _ => None,
        }
    }

    /// Replace the cached value and its stamp, returning the stored instance
    pub fn store(&self, value: T, stamp: S) -> Arc<T> {
        self.store_arc(Arc::new(value), stamp)
    }

    /// Like [`Memo::store`] for a value that is already shared
    pub fn store_arc(&self, value: Arc<T>, stamp: S) -> Arc<T> {
        let mut slot = self.slot.lock();
        slot.value = Some(Arc::clone(&value));
        slot.stamp = Some(stamp);
        value
    }

    /// Drop the cached value and stamp
    ///
    /// An outstanding flight is not affected.
    pub fn invalidate(&self) {
        let mut slot = self.slot.lock();
        slot.value = None;
        slot.stamp = None;
    }

    /// Whether a flight is currently outstanding
    pub fn is_in_flight(&self) -> bool {
        self.slot.lock().in_flight
    }

    /// Claim the single in-flight slot.
    ///
    /// Returns `None` while another flight is outstanding. The flag is
    /// released when the guard drops, so a cancelled fetch never wedges the
    /// memo.
    pub fn begin_flight(&self) -> Option<FlightGuard<'_, T, S>> {
        let mut slot = self.slot.lock();
        if slot.in_flight {
            return None;
        }
        slot.in_flight = true;
        Some(FlightGuard { memo: self })
    }
}

impl<T, S: Clone> Memo<T, S> {
    /// Stamp of the cached value, if any
    pub fn stamp(&self) -> Option<S> {
        self.slot.lock().stamp.clone()
    }
}

impl<T, S> Default for Memo<T, S> {
    fn default() -> Self {
        Self::new()
    }
}

/// Releases the in-flight flag of a [`Memo`] on drop
pub struct FlightGuard<'a, T, S> {
    memo: &'a Memo<T, S>,
}

impl<T, S> Drop for FlightGuard<'_, T, S> {
    fn drop(&mut self) {
        self.memo.slot.lock().in_flight = false;
    }
}
