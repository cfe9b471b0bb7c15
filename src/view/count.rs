//! Cached row count with explicit invalidation
//!
//! The count is the one piece of view state both the producer (on arrival)
//! and the consumer (on read) write. It is modeled as a cell holding an
//! optional value and an epoch: every invalidation bumps the epoch, and a
//! freshly computed count is only published if no invalidation happened
//! while it was being computed. Store queries never run under the lock.

use parking_lot::Mutex;

/// Epoch at which a count computation started
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CountEpoch(u64);

#[derive(Debug, Default)]
struct Slot {
    value: Option<u64>,
    epoch: u64,
}

/// Row count cache shared by producer and consumer
#[derive(Debug, Default)]
pub struct CachedRowCount {
    slot: Mutex<Slot>,
}

impl CachedRowCount {
    pub fn new() -> Self {
        Self::default()
    }

    /// The cached count, or the epoch to compute a new one under
    pub fn get(&self) -> Result<u64, CountEpoch> {
        let slot = self.slot.lock();
        slot.value.ok_or(CountEpoch(slot.epoch))
    }

    /// Store a count computed under `epoch`
    ///
    /// Returns false, and keeps the cell empty, if the count was invalidated
    /// after `epoch` was taken.
    pub fn publish(&self, epoch: CountEpoch, value: u64) -> bool {
        let mut slot = self.slot.lock();
        if slot.epoch != epoch.0 {
            return false;
        }
        slot.value = Some(value);
        true
    }

    /// Drop the cached count, returning what it was
    pub fn invalidate(&self) -> Option<u64> {
        let mut slot = self.slot.lock();
        slot.epoch = slot.epoch.wrapping_add(1);
        slot.value.take()
    }

    /// Whether a count is currently cached
    pub fn is_known(&self) -> bool {
        self.slot.lock().value.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_starts_unknown() {
        let count = CachedRowCount::new();
        assert!(count.get().is_err());
        assert!(!count.is_known());
    }

    #[test]
    fn test_publish_then_get() {
        let count = CachedRowCount::new();
        let epoch = count.get().unwrap_err();

        assert!(count.publish(epoch, 42));
        assert_eq!(count.get(), Ok(42));
    }

    #[test]
    fn test_invalidate_returns_previous() {
        let count = CachedRowCount::new();
        let epoch = count.get().unwrap_err();
        count.publish(epoch, 7);

        assert_eq!(count.invalidate(), Some(7));
        assert_eq!(count.invalidate(), None);
        assert!(count.get().is_err());
    }

    #[test]
    fn test_stale_publish_rejected() {
        let count = CachedRowCount::new();
        let stale = count.get().unwrap_err();

        // an arrival lands while the count query is in flight
        count.invalidate();

        assert!(!count.publish(stale, 10));
        assert!(!count.is_known());

        let fresh = count.get().unwrap_err();
        assert!(count.publish(fresh, 11));
        assert_eq!(count.get(), Ok(11));
    }

    #[test]
    fn test_last_write_wins_within_epoch() {
        let count = CachedRowCount::new();
        let epoch = count.get().unwrap_err();

        assert!(count.publish(epoch, 3));
        assert!(count.publish(epoch, 4));
        assert_eq!(count.get(), Ok(4));
    }
}
