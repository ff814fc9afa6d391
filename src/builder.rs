//! Fluent builder for Runtime construction.
//!
//! Provides a builder pattern interface for creating and configuring Runtime instances.

use crate::error::Result;
use crate::i2s::Port;
use crate::os::Queue;
use crate::pool::ResourcePool;
use crate::runtime::{Heap, Runtime, SystemHeap, SystemThread};
use crate::source::{EventQueueEventSource, PinEvent};

use std::sync::Arc;

/// Builder for constructing Runtime instances with fluent API.
///
/// # Example
/// ```
/// use hwreactor::RuntimeBuilder;
///
/// let runtime = RuntimeBuilder::new()
///     .event_source_name("EVQ")
///     .i2s_ports([0])
///     .build()
///     .unwrap();
///
/// assert_eq!(runtime.i2s_ports().capacity(), 1);
/// ```
pub struct RuntimeBuilder {
    event_source_name: String,
    wait_set_capacity: Option<usize>,
    pins: Option<Queue<PinEvent>>,
    system_thread_name: String,
    i2s_ports: Vec<Port>,
    heap: Option<Arc<dyn Heap>>,
}

impl Default for RuntimeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl RuntimeBuilder {
    /// Creates a new runtime builder.
    ///
    /// Defaults: an event source named `EVQ` with the default wait-set
    /// capacity and no pin queue, a system thread named `system`, I2S ports 0
    /// and 1, and the process allocator as heap.
    pub fn new() -> Self {
        Self {
            event_source_name: String::from("EVQ"),
            wait_set_capacity: None,
            pins: None,
            system_thread_name: String::from("system"),
            i2s_ports: vec![0, 1],
            heap: None,
        }
    }

    pub fn event_source_name(mut self, name: impl Into<String>) -> Self {
        self.event_source_name = name.into();
        self
    }

    pub fn wait_set_capacity(mut self, capacity: usize) -> Self {
        self.wait_set_capacity = Some(capacity);
        self
    }

    /// Shared pin-change queue multiplexed by the event source.
    pub fn pin_queue(mut self, pins: Queue<PinEvent>) -> Self {
        self.pins = Some(pins);
        self
    }

    pub fn system_thread_name(mut self, name: impl Into<String>) -> Self {
        self.system_thread_name = name.into();
        self
    }

    /// Physical I2S ports offered to [`I2sGroup::create`](crate::i2s::I2sGroup::create).
    pub fn i2s_ports(mut self, ports: impl IntoIterator<Item = Port>) -> Self {
        self.i2s_ports = ports.into_iter().collect();
        self
    }

    pub fn heap(mut self, heap: Arc<dyn Heap>) -> Self {
        self.heap = Some(heap);
        self
    }

    /// Starts the event source and the system thread.
    pub fn build(self) -> Result<Runtime> {
        let mut source = EventQueueEventSource::builder().name(self.event_source_name);
        if let Some(capacity) = self.wait_set_capacity {
            source = source.capacity(capacity);
        }
        if let Some(pins) = self.pins {
            source = source.pin_queue(pins);
        }

        Ok(Runtime {
            event_source: source.build()?,
            system: SystemThread::spawn(self.system_thread_name)?,
            i2s_ports: ResourcePool::new(self.i2s_ports),
            heap: self.heap.unwrap_or_else(|| Arc::new(SystemHeap::new())),
        })
    }
}
