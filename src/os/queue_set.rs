//! Demultiplexed wait set.
//!
//! A [`QueueSet`] keeps a FIFO of member ids that became ready. Producers push
//! their id when they post an item (at most once while it is still pending in
//! the set), and [`QueueSet::select`] blocks until an id is available.

use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_MEMBER_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of a queue or semaphore, as reported by [`QueueSet::select`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MemberId(u64);

impl MemberId {
    pub(crate) fn next() -> Self {
        Self(NEXT_MEMBER_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// Reasons a structural change to a [`QueueSet`] was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum SetError {
    #[error("member has pending items")]
    NotEmpty,
    #[error("member already belongs to a queue set")]
    AlreadyMember,
    #[error("member does not belong to this queue set")]
    NotMember,
    #[error("queue set is full")]
    Full,
}

mod sealed {
    pub trait Sealed {}
}

pub(crate) use sealed::Sealed;

/// Anything that can be waited on through a [`QueueSet`].
///
/// Implemented by [`Queue`](super::Queue) and
/// [`BinarySemaphore`](super::BinarySemaphore) only.
pub trait SetMember: Sealed + Send + Sync {
    fn member_id(&self) -> MemberId;

    #[doc(hidden)]
    fn attach(&self, set: &QueueSet) -> Result<(), SetError>;

    #[doc(hidden)]
    fn detach(&self, set: &QueueSet) -> Result<(), SetError>;
}

/// Blocking wait over many queues at once.
#[derive(Clone)]
pub struct QueueSet {
    shared: Arc<SetShared>,
}

pub(crate) struct SetShared {
    ready: Mutex<Ready>,
    signal: Condvar,
}

struct Ready {
    pending: VecDeque<MemberId>,
    members: usize,
    capacity: usize,
}

impl QueueSet {
    /// Creates a set accepting at most `capacity` members.
    pub fn new(capacity: usize) -> Self {
        Self {
            shared: Arc::new(SetShared {
                ready: Mutex::new(Ready {
                    pending: VecDeque::with_capacity(capacity),
                    members: 0,
                    capacity,
                }),
                signal: Condvar::new(),
            }),
        }
    }

    /// Adds `member` to the set. Fails with [`SetError::NotEmpty`] when the
    /// member has anything pending.
    pub fn add(&self, member: &dyn SetMember) -> Result<(), SetError> {
        member.attach(self)
    }

    /// Removes `member` from the set. Fails with [`SetError::NotEmpty`] when
    /// the member has anything pending.
    pub fn remove(&self, member: &dyn SetMember) -> Result<(), SetError> {
        member.detach(self)
    }

    /// Blocks until a member is ready and returns its id.
    ///
    /// A returned member may turn out to be empty by the time it is read when
    /// another thread drained it first.
    pub fn select(&self) -> MemberId {
        let mut ready = self.shared.ready.lock();
        loop {
            if let Some(id) = ready.pending.pop_front() {
                return id;
            }
            self.shared.signal.wait(&mut ready);
        }
    }

    /// Returns a ready member id without blocking.
    pub fn try_select(&self) -> Option<MemberId> {
        self.shared.ready.lock().pending.pop_front()
    }

    /// Number of members currently in the set.
    pub fn len(&self) -> usize {
        self.shared.ready.lock().members
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl SetShared {
    fn join(&self) -> Result<(), SetError> {
        let mut ready = self.ready.lock();
        if ready.members >= ready.capacity {
            return Err(SetError::Full);
        }
        ready.members += 1;
        Ok(())
    }

    fn leave(&self, id: MemberId) {
        let mut ready = self.ready.lock();
        ready.members -= 1;
        ready.pending.retain(|pending| *pending != id);
    }

    fn notify(&self, id: MemberId) {
        let mut ready = self.ready.lock();
        if !ready.pending.contains(&id) {
            ready.pending.push_back(id);
        }
        self.signal.notify_one();
    }
}

/// Membership of a single queue or semaphore. Lives under the member's own
/// lock so that the emptiness check and the change happen atomically with
/// respect to producers.
#[derive(Default)]
pub(crate) struct Link(Option<Arc<SetShared>>);

impl Link {
    pub(crate) fn attach(&mut self, set: &QueueSet, pending: bool) -> Result<(), SetError> {
        if self.0.is_some() {
            return Err(SetError::AlreadyMember);
        }
        if pending {
            return Err(SetError::NotEmpty);
        }
        set.shared.join()?;
        self.0 = Some(set.shared.clone());
        Ok(())
    }

    pub(crate) fn detach(
        &mut self,
        set: &QueueSet,
        id: MemberId,
        pending: bool,
    ) -> Result<(), SetError> {
        match &self.0 {
            Some(shared) if Arc::ptr_eq(shared, &set.shared) => {}
            _ => return Err(SetError::NotMember),
        }
        if pending {
            return Err(SetError::NotEmpty);
        }
        set.shared.leave(id);
        self.0 = None;
        Ok(())
    }

    pub(crate) fn notify(&self, id: MemberId) {
        if let Some(shared) = &self.0 {
            shared.notify(id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::os::{BinarySemaphore, Queue};
    use std::thread;
    use std::time::Duration;

    #[test]
    fn add_requires_empty_queue() {
        let set = QueueSet::new(4);
        let queue = Queue::new(4);
        queue.send(1u32).unwrap();

        assert_eq!(set.add(&queue), Err(SetError::NotEmpty));
        assert_eq!(queue.try_recv(), Some(1));
        assert_eq!(set.add(&queue), Ok(()));
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn remove_requires_empty_queue() {
        let set = QueueSet::new(4);
        let queue = Queue::new(4);
        set.add(&queue).unwrap();
        queue.send(7u32).unwrap();

        assert_eq!(set.remove(&queue), Err(SetError::NotEmpty));
        queue.drain();
        assert_eq!(set.remove(&queue), Ok(()));
        assert!(set.is_empty());
        assert_eq!(set.try_select(), None, "stale ready id survived removal");
    }

    #[test]
    fn membership_is_exclusive() {
        let first = QueueSet::new(4);
        let second = QueueSet::new(4);
        let queue = Queue::<u32>::new(1);

        first.add(&queue).unwrap();
        assert_eq!(second.add(&queue), Err(SetError::AlreadyMember));
        assert_eq!(second.remove(&queue), Err(SetError::NotMember));
    }

    #[test]
    fn capacity_is_enforced() {
        let set = QueueSet::new(1);
        let a = Queue::<u32>::new(1);
        let b = Queue::<u32>::new(1);

        set.add(&a).unwrap();
        assert_eq!(set.add(&b), Err(SetError::Full));
    }

    #[test]
    fn ready_ids_are_coalesced() {
        let set = QueueSet::new(4);
        let queue = Queue::new(8);
        set.add(&queue).unwrap();

        queue.send(1u32).unwrap();
        queue.send(2u32).unwrap();

        assert_eq!(set.try_select(), Some(queue.member_id()));
        assert_eq!(set.try_select(), None);
    }

    #[test]
    fn select_wakes_on_semaphore() {
        let set = QueueSet::new(4);
        let stop = std::sync::Arc::new(BinarySemaphore::new());
        set.add(stop.as_ref()).unwrap();

        let giver = stop.clone();
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            giver.give();
        });

        assert_eq!(set.select(), stop.member_id());
        assert!(stop.take());
        handle.join().unwrap();
    }
}
