//! Event-driven native resource layer for a small embedded runtime.
//!
//! Hardware drivers report completions by posting events to queues. This crate
//! multiplexes those queues onto one worker thread, folds each event into a
//! per-resource state word and wakes the tasks waiting on it.
//!
//! # Architecture
//!
//! - **Runtime**: start-up object owning the event source, the system thread,
//!   the I2S port pool and the heap
//! - **EventSource**: worker blocked on a wait set of queues; dispatches events
//!   to registered resources
//! - **ResourceGroup**: owner of resources of one kind, supplying the fold from
//!   events to state bits
//! - **ResourceState**: state word plus wakers, awaited through [`StateFuture`]
//! - **ResourcePool**: exclusive allocation of scarce hardware identifiers
//! - **I2S**: audio transport built on the pieces above
//! - **os**: queue, queue set and binary semaphore primitives

mod builder;
mod error;
mod pool;
mod resource;
mod runtime;
mod source;
mod utils;

pub mod i2s;
pub mod os;

pub use builder::RuntimeBuilder;
pub use error::{Error, NativeError, Result};
pub use pool::ResourcePool;
pub use resource::{
    EventFold, EventQueueResource, EventWord, ResourceGroup, ResourceHandle, ResourceId,
    ResourceState, StateFuture, StateWord,
};
pub use runtime::{Heap, Proxy, Runtime, SystemHeap, SystemThread};
pub use source::{
    EventQueueEventSource, EventSource, EventSourceBuilder, MAX_ATTEMPTS, PinEvent, Registration,
    WorkerState,
};
