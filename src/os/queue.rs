//! Bounded FIFO queue posted to by drivers.

use super::queue_set::{Link, MemberId, QueueSet, Sealed, SetError, SetMember};

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;

/// Returned by [`Queue::send`] when the queue is at capacity. Carries the
/// rejected item back to the caller.
pub struct QueueFull<T>(pub T);

impl<T> fmt::Debug for QueueFull<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("QueueFull(..)")
    }
}

impl<T> fmt::Display for QueueFull<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("queue is full")
    }
}

impl<T> std::error::Error for QueueFull<T> {}

/// Bounded multi-producer queue. Cloning yields another handle to the same
/// queue.
///
/// Sending never blocks, matching the ISR-safe post operation drivers use.
pub struct Queue<T> {
    shared: Arc<Shared<T>>,
}

struct Shared<T> {
    id: MemberId,
    capacity: usize,
    inner: Mutex<Inner<T>>,
}

struct Inner<T> {
    items: VecDeque<T>,
    link: Link,
}

impl<T> Clone for Queue<T> {
    fn clone(&self) -> Self {
        Self {
            shared: self.shared.clone(),
        }
    }
}

impl<T> Queue<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            shared: Arc::new(Shared {
                id: MemberId::next(),
                capacity,
                inner: Mutex::new(Inner {
                    items: VecDeque::with_capacity(capacity),
                    link: Link::default(),
                }),
            }),
        }
    }

    /// Posts `item` without blocking and marks the queue ready in its set.
    pub fn send(&self, item: T) -> Result<(), QueueFull<T>> {
        let mut inner = self.shared.inner.lock();
        if inner.items.len() >= self.shared.capacity {
            return Err(QueueFull(item));
        }
        inner.items.push_back(item);
        inner.link.notify(self.shared.id);
        Ok(())
    }

    /// Non-blocking receive.
    pub fn try_recv(&self) -> Option<T> {
        self.shared.inner.lock().items.pop_front()
    }

    /// Discards everything currently queued and returns how many items were
    /// dropped.
    pub fn drain(&self) -> usize {
        let mut count = 0;
        while self.try_recv().is_some() {
            count += 1;
        }
        count
    }

    pub fn len(&self) -> usize {
        self.shared.inner.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.shared.capacity
    }
}

impl<T> Sealed for Queue<T> {}

impl<T: Send> SetMember for Queue<T> {
    fn member_id(&self) -> MemberId {
        self.shared.id
    }

    fn attach(&self, set: &QueueSet) -> Result<(), SetError> {
        let mut inner = self.shared.inner.lock();
        let pending = !inner.items.is_empty();
        inner.link.attach(set, pending)
    }

    fn detach(&self, set: &QueueSet) -> Result<(), SetError> {
        let mut inner = self.shared.inner.lock();
        let pending = !inner.items.is_empty();
        inner.link.detach(set, self.shared.id, pending)
    }
}
