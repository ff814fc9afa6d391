use super::queue_set::{Link, MemberId, QueueSet, Sealed, SetError, SetMember};

use parking_lot::Mutex;

/// One-bit signal that can be waited on through a [`QueueSet`].
pub struct BinarySemaphore {
    id: MemberId,
    inner: Mutex<Inner>,
}

struct Inner {
    given: bool,
    link: Link,
}

impl Default for BinarySemaphore {
    fn default() -> Self {
        Self::new()
    }
}

impl BinarySemaphore {
    /// Creates a semaphore in the taken state.
    pub fn new() -> Self {
        Self {
            id: MemberId::next(),
            inner: Mutex::new(Inner {
                given: false,
                link: Link::default(),
            }),
        }
    }

    /// Sets the semaphore. Giving an already given semaphore has no effect.
    pub fn give(&self) {
        let mut inner = self.inner.lock();
        if !inner.given {
            inner.given = true;
            inner.link.notify(self.id);
        }
    }

    /// Clears the semaphore without blocking. Returns whether it was set.
    pub fn take(&self) -> bool {
        std::mem::replace(&mut self.inner.lock().given, false)
    }

    pub fn is_given(&self) -> bool {
        self.inner.lock().given
    }
}

impl Sealed for BinarySemaphore {}

impl SetMember for BinarySemaphore {
    fn member_id(&self) -> MemberId {
        self.id
    }

    fn attach(&self, set: &QueueSet) -> Result<(), SetError> {
        let mut inner = self.inner.lock();
        let pending = inner.given;
        inner.link.attach(set, pending)
    }

    fn detach(&self, set: &QueueSet) -> Result<(), SetError> {
        let mut inner = self.inner.lock();
        let pending = inner.given;
        inner.link.detach(set, self.id, pending)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn take_clears() {
        let semaphore = BinarySemaphore::new();
        assert!(!semaphore.take());

        semaphore.give();
        semaphore.give();
        assert!(semaphore.take());
        assert!(!semaphore.take());
    }
}
