//! Event sources: one worker thread multiplexing many hardware queues.
//!
//! An event source owns a worker, a mutex over its registered resources, and
//! the wait primitive the worker blocks on. The locking discipline shared by
//! every source:
//!
//! - registration, unregistration and dispatch all run with the source's lock
//!   held, so at most one of them happens at a time;
//! - the worker releases the lock only while blocked on the wait primitive,
//!   which is what keeps registering threads from starving;
//! - shutdown is a permanent member of the wait set and is checked before
//!   anything else on every wake.
//!
//! - [`event_queue`]: the queue-set backed source used by drivers

pub mod event_queue;

pub use event_queue::{EventQueueEventSource, EventSourceBuilder, PinEvent};

use crate::error::fatal;
use crate::os::{SetError, SetMember};
use crate::resource::{EventWord, Member, ResourceId, ResourceState, StateWord};
use crate::utils::slab::Slab;

use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};
use tracing::{debug, trace};

/// Attempts at a drain-then-change cycle before the wait set is declared
/// broken.
pub const MAX_ATTEMPTS: usize = 16;

/// Dispatcher for a class of resources.
pub trait EventSource: Send + Sync {
    fn name(&self) -> &str;

    /// Makes `registration` live. Events already queued are discarded.
    fn register_resource(&self, registration: Registration) -> ResourceId;

    /// Removes a resource. Queued events are discarded, never dispatched.
    fn unregister_resource(&self, id: ResourceId);
}

/// A resource as seen by its event source: its queue, its group's fold and
/// its accumulated state.
pub struct Registration {
    member: Box<dyn Member>,
    state: Arc<ResourceState>,
}

impl Registration {
    pub(crate) fn new(member: Box<dyn Member>, state: Arc<ResourceState>) -> Self {
        Self { member, state }
    }

    pub fn queue(&self) -> &dyn SetMember {
        self.member.queue()
    }

    pub fn receive_event(&self) -> Option<EventWord> {
        self.member.receive_event()
    }

    pub fn check_pin(&self, pin: u32) -> bool {
        self.member.check_pin(pin)
    }

    pub fn state(&self) -> StateWord {
        self.state.bits()
    }

    /// Folds `data` into the accumulated state, waking parked tasks when the
    /// state changed. Must only be called by the worker with the source's
    /// lock held.
    pub fn dispatch(&self, data: EventWord) {
        let changed = self
            .state
            .fold(|previous| self.member.on_event(data, previous));
        trace!(data, changed, "dispatched event");
    }

    /// Receives and discards everything queued. Returns the number dropped.
    pub(crate) fn discard_pending(&self) -> usize {
        let mut count = 0;
        while self.receive_event().is_some() {
            count += 1;
        }
        count
    }
}

/// Resource set of a source. Only ever touched with the source's lock held.
pub(crate) struct Registry {
    entries: Slab<Registration>,
}

impl Registry {
    pub(crate) fn new() -> Self {
        Self {
            entries: Slab::new(8),
        }
    }

    pub(crate) fn insert(&mut self, registration: Registration) -> ResourceId {
        ResourceId(self.entries.insert(registration))
    }

    pub(crate) fn remove(&mut self, id: ResourceId) -> Option<Registration> {
        self.entries.remove(id.0)
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = &Registration> {
        self.entries.iter().map(|(_, registration)| registration)
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}

/// Repeats `drain` then `change` until the change is accepted.
///
/// The wait set only accepts structural changes for empty members, and a
/// producer may post between the drain and the change. Failing
/// [`MAX_ATTEMPTS`] times in a row means the precondition cannot be met and
/// the process is aborted.
pub(crate) fn converge(
    source: &str,
    action: &str,
    mut drain: impl FnMut() -> usize,
    mut change: impl FnMut() -> Result<(), SetError>,
) {
    for attempt in 1..=MAX_ATTEMPTS {
        let discarded = drain();
        if discarded > 0 {
            trace!(source, action, discarded, "discarded queued events");
        }

        match change() {
            Ok(()) => return,
            Err(err) => debug!(source, action, attempt, %err, "wait set change refused"),
        }
    }

    fatal!("{source}: couldn't {action} resource after {MAX_ATTEMPTS} attempts")
}

/// Lifecycle of a source's worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum WorkerState {
    /// Blocked on the wait set with the lock released.
    Waiting = 0,
    /// Handling a wake with the lock held.
    Processing = 1,
    Stopped = 2,
}

pub(crate) struct WorkerStatus(AtomicU8);

impl WorkerStatus {
    pub(crate) fn new() -> Self {
        Self(AtomicU8::new(WorkerState::Waiting as u8))
    }

    pub(crate) fn set(&self, state: WorkerState) {
        self.0.store(state as u8, Ordering::Release);
    }

    pub(crate) fn get(&self) -> WorkerState {
        match self.0.load(Ordering::Acquire) {
            0 => WorkerState::Waiting,
            1 => WorkerState::Processing,
            _ => WorkerState::Stopped,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn converge_retries_until_accepted() {
        let mut refusals = 3;
        let mut drains = 0;

        converge(
            "test",
            "register",
            || {
                drains += 1;
                0
            },
            || {
                if refusals > 0 {
                    refusals -= 1;
                    Err(SetError::NotEmpty)
                } else {
                    Ok(())
                }
            },
        );

        assert_eq!(drains, 4);
    }
}
