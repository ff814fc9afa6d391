//! Exclusive pool of scarce hardware identifiers.
//!
//! A [`ResourcePool`] is declared once at start-up with every identifier the
//! hardware offers (for example the physical I2S ports). Each identifier has at
//! most one holder at a time; the pool never grows.
//!
//! # Example
//!
//! ```
//! use hwreactor::ResourcePool;
//!
//! let ports = ResourcePool::new(["A", "B"]);
//! assert_eq!(ports.any(), Some("A"));
//! assert_eq!(ports.any(), Some("B"));
//! assert_eq!(ports.any(), None);
//!
//! ports.put("A");
//! assert_eq!(ports.any(), Some("A"));
//! ```

use parking_lot::Mutex;
use tracing::warn;

/// Fixed-capacity allocator of exclusive identifiers.
///
/// Running out is not an error of the pool: [`ResourcePool::any`] reports it
/// with `None` and the caller decides what to surface. The internal lock is
/// held only for the duration of a single call.
pub struct ResourcePool<T> {
    slots: Mutex<Vec<Option<T>>>,
}

impl<T: Copy + PartialEq + std::fmt::Debug> ResourcePool<T> {
    /// Creates a pool holding every identifier in `ids`, all free.
    pub fn new(ids: impl IntoIterator<Item = T>) -> Self {
        Self {
            slots: Mutex::new(ids.into_iter().map(Some).collect()),
        }
    }

    /// Grants some currently free identifier, or `None` when all are held.
    ///
    /// Identifiers are handed out in declaration order.
    pub fn any(&self) -> Option<T> {
        self.slots.lock().iter_mut().find_map(Option::take)
    }

    /// Grants `id` specifically. Returns `false` when it is held or unknown.
    pub fn take(&self, id: T) -> bool {
        let mut slots = self.slots.lock();
        match slots.iter_mut().find(|slot| **slot == Some(id)) {
            Some(slot) => {
                *slot = None;
                true
            }
            None => false,
        }
    }

    /// Returns a previously granted identifier.
    ///
    /// Each grant must be returned exactly once. Returning more identifiers
    /// than the pool was declared with is logged and ignored.
    pub fn put(&self, id: T) {
        let mut slots = self.slots.lock();
        match slots.iter_mut().find(|slot| slot.is_none()) {
            Some(slot) => *slot = Some(id),
            None => warn!(?id, "identifier returned to a pool with no outstanding grants"),
        }
    }

    /// Number of identifiers currently free.
    pub fn available(&self) -> usize {
        self.slots.lock().iter().filter(|slot| slot.is_some()).count()
    }

    pub fn capacity(&self) -> usize {
        self.slots.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;

    #[test]
    fn grants_in_declaration_order() {
        let pool = ResourcePool::new(['A', 'B']);

        assert_eq!(pool.any(), Some('A'));
        assert_eq!(pool.any(), Some('B'));
        assert_eq!(pool.any(), None);

        pool.put('A');
        assert_eq!(pool.any(), Some('A'));
    }

    #[test]
    fn take_specific_identifier() {
        let pool = ResourcePool::new([0u8, 1]);

        assert!(pool.take(1));
        assert!(!pool.take(1));
        assert!(!pool.take(7));
        assert_eq!(pool.any(), Some(0));
        assert_eq!(pool.any(), None);
    }

    #[test]
    fn extra_put_is_ignored() {
        let pool = ResourcePool::new([3u8]);
        pool.put(3);

        assert_eq!(pool.available(), 1);
        assert_eq!(pool.capacity(), 1);
    }

    #[test]
    fn concurrent_grants_never_exceed_capacity() {
        const CAPACITY: u32 = 4;
        let pool = Arc::new(ResourcePool::new(0..CAPACITY));
        let granted = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let pool = pool.clone();
                let granted = granted.clone();
                thread::spawn(move || {
                    if pool.any().is_some() {
                        granted.fetch_add(1, Ordering::SeqCst);
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(granted.load(Ordering::SeqCst), CAPACITY as usize);
        assert_eq!(pool.available(), 0);
        assert_eq!(pool.any(), None);
    }
}
