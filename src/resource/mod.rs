//! Resources and the groups that own them.
//!
//! A resource is one hardware handle with a private event queue. Every
//! resource belongs to exactly one [`ResourceGroup`], which supplies the
//! domain semantics: an [`EventFold`] turning raw event words into the
//! resource's accumulated [`StateWord`].
//!
//! # Example
//!
//! ```
//! use hwreactor::os::{Queue, SetMember};
//! use hwreactor::{EventFold, EventQueueEventSource, EventQueueResource, EventWord};
//! use hwreactor::{ResourceGroup, StateWord};
//!
//! struct Uart {
//!     queue: Queue<EventWord>,
//! }
//!
//! impl EventQueueResource for Uart {
//!     fn queue(&self) -> &dyn SetMember {
//!         &self.queue
//!     }
//!
//!     fn receive_event(&self) -> Option<EventWord> {
//!         self.queue.try_recv()
//!     }
//! }
//!
//! struct UartEvents;
//!
//! impl EventFold for UartEvents {
//!     type Resource = Uart;
//!
//!     fn on_event(&self, _: &Uart, data: EventWord, state: StateWord) -> StateWord {
//!         state | (1 << data)
//!     }
//! }
//!
//! let source = EventQueueEventSource::builder().build().unwrap();
//! let group = ResourceGroup::new(&source, UartEvents);
//!
//! let queue = Queue::new(8);
//! let uart = group.register_resource(Uart { queue: queue.clone() });
//!
//! queue.send(3).unwrap();
//! let bits = futures::executor::block_on(uart.wait(1 << 3));
//! assert_eq!(bits, 1 << 3);
//! ```

mod state;

pub use state::{ResourceState, StateFuture};

use crate::os::SetMember;
use crate::source::{EventSource, Registration};

use parking_lot::Mutex;
use std::collections::HashSet;
use std::ops::Deref;
use std::sync::Arc;

/// Raw event data as carried through a driver queue.
pub type EventWord = usize;

/// Accumulated per-resource event bits.
pub type StateWord = u32;

/// Key of a registered resource inside its event source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ResourceId(pub(crate) usize);

/// Capabilities a queue-bearing resource offers to the event source.
pub trait EventQueueResource: Send + Sync + 'static {
    /// The private queue, as a member of the source's wait set.
    fn queue(&self) -> &dyn SetMember;

    /// Receives one native event without blocking and translates it into an
    /// event word.
    fn receive_event(&self) -> Option<EventWord>;

    /// Whether a shared pin notification for `pin` concerns this resource.
    fn check_pin(&self, _pin: u32) -> bool {
        false
    }
}

/// Domain semantics of a group: folds one event into the previous state.
pub trait EventFold: Send + Sync + 'static {
    type Resource: EventQueueResource;

    fn on_event(&self, resource: &Self::Resource, data: EventWord, state: StateWord)
    -> StateWord;
}

/// Type-erased pairing of a resource with its group's fold.
pub(crate) trait Member: Send + Sync {
    fn queue(&self) -> &dyn SetMember;
    fn receive_event(&self) -> Option<EventWord>;
    fn check_pin(&self, pin: u32) -> bool;
    fn on_event(&self, data: EventWord, state: StateWord) -> StateWord;
}

struct Bound<G: EventFold> {
    resource: Arc<G::Resource>,
    events: Arc<G>,
}

impl<G: EventFold> Member for Bound<G> {
    fn queue(&self) -> &dyn SetMember {
        self.resource.queue()
    }

    fn receive_event(&self) -> Option<EventWord> {
        self.resource.receive_event()
    }

    fn check_pin(&self, pin: u32) -> bool {
        self.resource.check_pin(pin)
    }

    fn on_event(&self, data: EventWord, state: StateWord) -> StateWord {
        self.events.on_event(&self.resource, data, state)
    }
}

/// Owner of all resources of one kind.
///
/// Borrows the event source it registers with; the source therefore outlives
/// the group and every resource in it.
pub struct ResourceGroup<'s, G: EventFold> {
    source: &'s dyn EventSource,
    events: Arc<G>,
    members: Mutex<HashSet<ResourceId>>,
}

impl<'s, G: EventFold> ResourceGroup<'s, G> {
    pub fn new(source: &'s dyn EventSource, events: G) -> Self {
        Self {
            source,
            events: Arc::new(events),
            members: Mutex::new(HashSet::new()),
        }
    }

    pub fn source(&self) -> &'s dyn EventSource {
        self.source
    }

    pub fn events(&self) -> &G {
        &self.events
    }

    /// Takes ownership of `resource` and registers its queue with the source.
    ///
    /// Anything already sitting in the queue is discarded.
    pub fn register_resource(&self, resource: G::Resource) -> ResourceHandle<'_, G> {
        let resource = Arc::new(resource);
        let state = Arc::new(ResourceState::new());
        let member = Bound {
            resource: resource.clone(),
            events: self.events.clone(),
        };

        let id = self
            .source
            .register_resource(Registration::new(Box::new(member), state.clone()));
        self.members.lock().insert(id);

        ResourceHandle {
            group: self,
            id,
            resource,
            state,
            registered: true,
        }
    }

    /// Unregisters and releases a resource. Same as dropping the handle.
    pub fn unregister_resource(&self, handle: ResourceHandle<'_, G>) {
        drop(handle);
    }

    pub fn len(&self) -> usize {
        self.members.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A registered resource. Dropping it unregisters the resource; events still
/// queued at that point are discarded.
pub struct ResourceHandle<'g, G: EventFold> {
    group: &'g ResourceGroup<'g, G>,
    id: ResourceId,
    resource: Arc<G::Resource>,
    state: Arc<ResourceState>,
    registered: bool,
}

impl<G: EventFold> ResourceHandle<'_, G> {
    pub fn id(&self) -> ResourceId {
        self.id
    }

    pub fn state(&self) -> &ResourceState {
        &self.state
    }

    /// Resolves once any bit of `mask` has been folded in, consuming them.
    pub fn wait(&self, mask: StateWord) -> StateFuture<'_> {
        self.state.wait(mask)
    }

    pub fn is_registered(&self) -> bool {
        self.registered
    }

    /// Removes the resource from its source and group. Idempotent; lets
    /// owners run their own teardown strictly after unregistration.
    pub(crate) fn unregister(&mut self) {
        if !self.registered {
            return;
        }
        self.registered = false;
        self.group.source.unregister_resource(self.id);
        self.group.members.lock().remove(&self.id);
    }
}

impl<G: EventFold> Deref for ResourceHandle<'_, G> {
    type Target = G::Resource;

    fn deref(&self) -> &Self::Target {
        &self.resource
    }
}

impl<G: EventFold> Drop for ResourceHandle<'_, G> {
    fn drop(&mut self) {
        self.unregister();
    }
}
