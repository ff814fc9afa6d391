//! The subsystem's start-up object.
//!
//! A [`Runtime`] owns everything that exists exactly once: the queue event
//! source and its worker, the privileged system thread, the pool of I2S ports
//! and the managed heap. Resource groups borrow it, so it necessarily outlives
//! every resource; dropping it stops both threads.

pub mod heap;
pub mod system;

pub use heap::{Heap, Proxy, SystemHeap};
pub use system::SystemThread;

use crate::i2s::Port;
use crate::pool::ResourcePool;
use crate::source::EventQueueEventSource;

use std::sync::Arc;

pub struct Runtime {
    pub(crate) event_source: EventQueueEventSource,
    pub(crate) system: SystemThread,
    pub(crate) i2s_ports: ResourcePool<Port>,
    pub(crate) heap: Arc<dyn Heap>,
}

impl Runtime {
    /// Starts a runtime with the default configuration.
    pub fn new() -> crate::Result<Self> {
        crate::RuntimeBuilder::new().build()
    }

    pub fn event_source(&self) -> &EventQueueEventSource {
        &self.event_source
    }

    pub fn system(&self) -> &SystemThread {
        &self.system
    }

    pub fn i2s_ports(&self) -> &ResourcePool<Port> {
        &self.i2s_ports
    }

    pub fn heap(&self) -> &dyn Heap {
        self.heap.as_ref()
    }
}
