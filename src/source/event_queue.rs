//! Event source backed by a [`QueueSet`].
//!
//! The wait set holds the shutdown semaphore (permanently), an optional shared
//! queue of pin notifications, and the private queue of every registered
//! resource. On each wake the worker:
//!
//! 1. stops if shutdown was signalled, ignoring anything else that is ready;
//! 2. drains the pin queue, fanning each notification out to every resource
//!    whose pin filter accepts it;
//! 3. drains every registered resource's queue, dispatching in arrival order.

use super::{EventSource, Registration, Registry, WorkerState, WorkerStatus, converge};
use crate::error::{Error, Result};
use crate::os::{BinarySemaphore, Queue, QueueSet};
use crate::resource::{EventWord, ResourceId};

use parking_lot::{Mutex, MutexGuard};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, error, trace, warn};

/// Default number of wait-set members, shutdown semaphore included.
pub const DEFAULT_CAPACITY: usize = 68;

/// Coalesced pin-level notification, shared by all resources.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PinEvent {
    pub pin: u32,
    pub data: EventWord,
}

/// Configures and starts an [`EventQueueEventSource`].
///
/// # Example
/// ```
/// use hwreactor::EventQueueEventSource;
/// use hwreactor::os::Queue;
///
/// let pins = Queue::new(32);
/// let source = EventQueueEventSource::builder()
///     .name("EVQ")
///     .capacity(16)
///     .pin_queue(pins.clone())
///     .build()
///     .unwrap();
///
/// assert_eq!(source.registered(), 0);
/// ```
pub struct EventSourceBuilder {
    name: String,
    capacity: usize,
    pins: Option<Queue<PinEvent>>,
}

impl Default for EventSourceBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl EventSourceBuilder {
    pub fn new() -> Self {
        Self {
            name: String::from("EVQ"),
            capacity: DEFAULT_CAPACITY,
            pins: None,
        }
    }

    /// Name of the source, also used for its worker thread.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Maximum number of wait-set members, including the shutdown semaphore
    /// and the pin queue.
    pub fn capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Shared queue of pin notifications, fanned out by pin filter.
    pub fn pin_queue(mut self, pins: Queue<PinEvent>) -> Self {
        self.pins = Some(pins);
        self
    }

    /// Builds the wait set and starts the worker.
    pub fn build(self) -> Result<EventQueueEventSource> {
        let set = QueueSet::new(self.capacity);
        let stop = BinarySemaphore::new();
        set.add(&stop)?;

        if let Some(pins) = &self.pins {
            let stale = pins.drain();
            if stale > 0 {
                trace!(source = %self.name, stale, "discarded pin events queued before start");
            }
            set.add(pins)?;
        }

        let shared = Arc::new(Shared {
            name: self.name,
            registry: Mutex::new(Registry::new()),
            set,
            stop,
            pins: self.pins,
            status: WorkerStatus::new(),
        });

        let worker = thread::Builder::new()
            .name(shared.name.clone())
            .spawn({
                let shared = shared.clone();
                move || shared.run()
            })
            .map_err(|source| Error::Spawn {
                name: shared.name.clone(),
                source,
            })?;

        debug!(source = %shared.name, "event source started");

        Ok(EventQueueEventSource {
            shared,
            worker: Some(worker),
        })
    }
}

/// Source multiplexing every queue-bearing resource onto one worker thread.
///
/// Dropping the source signals shutdown and joins the worker.
pub struct EventQueueEventSource {
    shared: Arc<Shared>,
    worker: Option<JoinHandle<()>>,
}

struct Shared {
    name: String,
    registry: Mutex<Registry>,
    set: QueueSet,
    stop: BinarySemaphore,
    pins: Option<Queue<PinEvent>>,
    status: WorkerStatus,
}

impl EventQueueEventSource {
    pub fn builder() -> EventSourceBuilder {
        EventSourceBuilder::new()
    }

    pub fn worker_state(&self) -> WorkerState {
        self.shared.status.get()
    }

    /// Number of resources currently registered.
    pub fn registered(&self) -> usize {
        self.shared.registry.lock().len()
    }

    pub fn pin_queue(&self) -> Option<&Queue<PinEvent>> {
        self.shared.pins.as_ref()
    }
}

impl Shared {
    fn run(&self) {
        let mut registry = self.registry.lock();

        loop {
            let ready = MutexGuard::unlocked(&mut registry, || {
                self.status.set(WorkerState::Waiting);
                self.set.select()
            });
            self.status.set(WorkerState::Processing);

            if self.stop.take() {
                self.status.set(WorkerState::Stopped);
                debug!(source = %self.name, "event source stopped");
                return;
            }

            trace!(source = %self.name, ?ready, "woke");

            if let Some(pins) = &self.pins {
                while let Some(event) = pins.try_recv() {
                    for registration in registry.iter().filter(|r| r.check_pin(event.pin)) {
                        registration.dispatch(event.data);
                    }
                }
            }

            for registration in registry.iter() {
                while let Some(data) = registration.receive_event() {
                    registration.dispatch(data);
                }
            }
        }
    }
}

impl EventSource for EventQueueEventSource {
    fn name(&self) -> &str {
        &self.shared.name
    }

    fn register_resource(&self, registration: Registration) -> ResourceId {
        let shared = &self.shared;
        let mut registry = shared.registry.lock();

        converge(
            &shared.name,
            "register",
            || registration.discard_pending(),
            || shared.set.add(registration.queue()),
        );

        let id = registry.insert(registration);
        debug!(source = %shared.name, ?id, "registered resource");
        id
    }

    fn unregister_resource(&self, id: ResourceId) {
        let shared = &self.shared;
        let mut registry = shared.registry.lock();

        let Some(registration) = registry.remove(id) else {
            warn!(source = %shared.name, ?id, "unregistering unknown resource");
            return;
        };

        converge(
            &shared.name,
            "unregister",
            || registration.discard_pending(),
            || shared.set.remove(registration.queue()),
        );

        debug!(source = %shared.name, ?id, "unregistered resource");
    }
}

impl Drop for EventQueueEventSource {
    fn drop(&mut self) {
        self.shared.stop.give();

        if let Some(worker) = self.worker.take()
            && worker.join().is_err()
        {
            error!(source = %self.shared.name, "event source worker panicked");
        }

        let leftover = self.shared.registry.lock().len();
        if leftover > 0 {
            warn!(source = %self.shared.name, leftover, "event source dropped with registered resources");
        }
    }
}
