//! Single-slot "latest value" mailbox
//!
//! Decouples a fast reader thread from a slower polling consumer: the reader
//! publishes every sample, the consumer only ever sees the newest one.
//! Publishing never blocks and never grows a queue; an unread value is simply
//! overwritten.

use parking_lot::Mutex;
use std::sync::Arc;

/// Single-slot overwrite mailbox shared between one producer and one consumer.
///
/// Cloning is cheap and shares the slot.
pub struct LatestValueCache<T> {
    slot: Arc<Mutex<Option<T>>>,
}

impl<T> LatestValueCache<T> {
    /// Create an empty mailbox
    pub fn new() -> Self {
        Self {
            slot: Arc::new(Mutex::new(None)),
        }
    }

    /// Overwrite the slot with a new value.
    ///
    /// If a previous value was still pending it is discarded; only the
    /// newest survives.
    pub fn publish(&self, value: T) {
        *self.slot.lock() = Some(value);
    }

    /// Pop and return the pending value, or `None` if the slot is empty.
    ///
    /// Values are consumed, not copied: two consecutive takes with no
    /// publish in between return a value at most once.
    pub fn take(&self) -> Option<T> {
        self.slot.lock().take()
    }

    /// Drop any pending value. Used when a sensor disconnects so a stale
    /// sample cannot leak into the next session.
    pub fn clear(&self) {
        *self.slot.lock() = None;
    }
}

impl<T> Clone for LatestValueCache<T> {
    fn clone(&self) -> Self {
        Self {
            slot: Arc::clone(&self.slot),
        }
    }
}

impl<T> Default for LatestValueCache<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_take_before_publish_is_empty() {
        let cache: LatestValueCache<u32> = LatestValueCache::new();
        assert_eq!(cache.take(), None);
    }

    #[test]
    fn test_last_write_wins() {
        let cache = LatestValueCache::new();
        for i in 0..10 {
            cache.publish(i);
        }
        assert_eq!(cache.take(), Some(9));
        // Consumed, not copied
        assert_eq!(cache.take(), None);
    }

    #[test]
    fn test_clear_discards_pending() {
        let cache = LatestValueCache::new();
        cache.publish(42);
        cache.clear();
        assert_eq!(cache.take(), None);
    }

    #[test]
    fn test_concurrent_publish_take() {
        let cache = LatestValueCache::new();
        let producer_cache = cache.clone();

        let producer = thread::spawn(move || {
            for i in 0..1000u64 {
                producer_cache.publish(i);
            }
        });

        let mut last_seen = None;
        while !producer.is_finished() {
            if let Some(v) = cache.take() {
                last_seen = Some(v);
            }
        }
        producer.join().unwrap();

        // Whatever was observed is valid; the final publish must be takeable
        // if nothing consumed it after the producer finished.
        if let Some(v) = cache.take() {
            assert_eq!(v, 999);
        } else {
            assert_eq!(last_seen, Some(999));
        }
    }
}
