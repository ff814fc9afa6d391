//! Host implementations of the RTOS primitives the event sources are built on.
//!
//! - [`Queue`]: bounded FIFO filled by drivers and interrupt handlers
//! - [`BinarySemaphore`]: one-bit signal, used for shutdown
//! - [`QueueSet`]: demultiplexed wait over any number of queues and semaphores
//!
//! Like their RTOS counterparts, queues and semaphores can only join or leave a
//! [`QueueSet`] while nothing is pending on them. Callers that need a
//! structural change must drain first and retry when a producer slips an item
//! in between.

mod queue;
mod queue_set;
mod semaphore;

pub use queue::{Queue, QueueFull};
pub use queue_set::{MemberId, QueueSet, SetError, SetMember};
pub use semaphore::BinarySemaphore;
