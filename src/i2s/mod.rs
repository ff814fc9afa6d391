//! I2S audio transport on top of the queue event source.
//!
//! [`I2sGroup`] is the resource group for all I2S ports of a [`Runtime`]. Each
//! [`I2s`] handle owns one physical port, taken from the runtime's port pool.
//! The driver posts completion events to the port's private queue; the event
//! source folds them into [`READ_STATE`], [`WRITE_STATE`] and [`ERROR_STATE`],
//! which tasks wait on before retrying a non-blocking [`I2s::write`] or
//! [`I2s::read`].
//!
//! # Example
//!
//! ```
//! use hwreactor::Runtime;
//! use hwreactor::i2s::{I2sConfig, I2sGroup, SimulatedI2s};
//! use std::sync::Arc;
//!
//! let runtime = Runtime::new().unwrap();
//! let group = I2sGroup::init(&runtime, Arc::new(SimulatedI2s::new())).unwrap();
//!
//! let speaker = group
//!     .create(&I2sConfig {
//!         sck_pin: Some(26),
//!         ws_pin: Some(25),
//!         tx_pin: Some(22),
//!         ..I2sConfig::default()
//!     })
//!     .unwrap();
//!
//! assert!(speaker.write(&[0, 1, 2, 3]).unwrap());
//! group.close(speaker);
//! ```

pub mod codec;
mod config;
mod driver;
mod sim;

pub use config::{GPIO_COUNT, I2sConfig};
pub use driver::{DriverConfig, I2sDriver, I2sEvent, Mode, PinConfig, Port};
pub use sim::{ERR_INVALID_ARG, ERR_INVALID_STATE, SimulatedI2s};

use crate::error::{Error, NativeError, Result, fatal};
use crate::os::{Queue, SetMember};
use crate::resource::{
    EventFold, EventQueueResource, EventWord, ResourceGroup, ResourceHandle, ResourceState,
    StateFuture, StateWord,
};
use crate::runtime::{Proxy, Runtime};

use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, trace, warn};

/// Received data is ready to be read.
pub const READ_STATE: StateWord = 1 << 0;
/// A transmit DMA buffer has been sent; writing may make progress.
pub const WRITE_STATE: StateWord = 1 << 1;
/// The DMA engine reported an error.
pub const ERROR_STATE: StateWord = 1 << 2;

/// Length of the per-port queue the driver posts events to.
const EVENT_QUEUE_LEN: usize = 32;

const DMA_ERROR: EventWord = I2sEvent::DmaError as EventWord;
const TX_DONE: EventWord = I2sEvent::TxDone as EventWord;
const RX_DONE: EventWord = I2sEvent::RxDone as EventWord;

/// One installed I2S port as registered with the event source.
pub struct I2sPort {
    port: Port,
    word_size: usize,
    max_frames_per_read: usize,
    queue: Queue<I2sEvent>,
}

impl I2sPort {
    pub fn port(&self) -> Port {
        self.port
    }

    /// Bytes per sample as configured, 1 to 4.
    pub fn word_size(&self) -> usize {
        self.word_size
    }

    pub fn max_frames_per_read(&self) -> usize {
        self.max_frames_per_read
    }
}

impl EventQueueResource for I2sPort {
    fn queue(&self) -> &dyn SetMember {
        &self.queue
    }

    fn receive_event(&self) -> Option<EventWord> {
        self.queue.try_recv().map(EventWord::from)
    }
}

/// Folds driver completion codes into state bits.
pub struct I2sEvents;

impl EventFold for I2sEvents {
    type Resource = I2sPort;

    fn on_event(&self, resource: &I2sPort, data: EventWord, state: StateWord) -> StateWord {
        match data {
            RX_DONE => state | READ_STATE,
            TX_DONE => state | WRITE_STATE,
            DMA_ERROR => state | ERROR_STATE,
            other => {
                trace!(port = resource.port, event = other, "ignored i2s event");
                state
            }
        }
    }
}

/// The resource group owning every open I2S port of a runtime.
pub struct I2sGroup<'r> {
    runtime: &'r Runtime,
    driver: Arc<dyn I2sDriver>,
    group: ResourceGroup<'r, I2sEvents>,
    proxy: Proxy,
}

impl<'r> I2sGroup<'r> {
    /// Creates the group and the handle wrapper managed code refers to it by.
    pub fn init(runtime: &'r Runtime, driver: Arc<dyn I2sDriver>) -> Result<Self> {
        let proxy = runtime.heap().allocate_proxy().ok_or(Error::AllocationFailed)?;

        Ok(Self {
            runtime,
            driver,
            group: ResourceGroup::new(&runtime.event_source, I2sEvents),
            proxy,
        })
    }

    pub fn proxy(&self) -> Proxy {
        self.proxy
    }

    /// Number of open ports.
    pub fn len(&self) -> usize {
        self.group.len()
    }

    pub fn is_empty(&self) -> bool {
        self.group.is_empty()
    }

    /// Opens a port configured by `config`.
    ///
    /// Every failure after the port was taken from the pool hands it back and
    /// undoes whatever was already set up on the driver.
    pub fn create(&self, config: &I2sConfig) -> Result<I2s<'_>> {
        let layout = config.layout()?;
        let ports = self.runtime.i2s_ports();

        let port = ports.any().ok_or(Error::OutOfRange)?;

        let Some(proxy) = self.runtime.heap().allocate_proxy() else {
            ports.put(port);
            return Err(Error::AllocationFailed);
        };

        let driver = self.driver.clone();
        let driver_config = layout.driver.clone();
        let installed = self
            .runtime
            .system()
            .run(move || driver.install(port, &driver_config, EVENT_QUEUE_LEN));
        let queue = match installed {
            Ok(queue) => queue,
            Err(err) => {
                ports.put(port);
                return Err(err.into());
            }
        };

        if let Err(err) = self.driver.set_pin(port, &layout.driver.pins) {
            if let Err(teardown) = self.uninstall(port) {
                warn!(port, error = %teardown, "failed to uninstall i2s port after pin setup error");
            }
            ports.put(port);
            return Err(err.into());
        }

        let handle = self.group.register_resource(I2sPort {
            port,
            word_size: layout.word_size,
            max_frames_per_read: layout.max_frames_per_read,
            queue,
        });

        debug!(
            port,
            sample_rate = config.sample_rate,
            bits = config.bits_per_sample,
            "i2s port opened"
        );

        Ok(I2s {
            owner: self,
            handle,
            proxy,
            pending: Mutex::new(None),
        })
    }

    /// Closes a port. Same as dropping the handle.
    pub fn close(&self, i2s: I2s<'_>) {
        drop(i2s);
    }

    fn uninstall(&self, port: Port) -> std::result::Result<(), NativeError> {
        let driver = self.driver.clone();
        self.runtime.system().run(move || driver.uninstall(port))
    }
}

/// A transmit buffer partially handed to the driver.
struct Pending {
    bytes: Vec<u8>,
    offset: usize,
}

/// An open I2S port.
///
/// Dropping it unregisters the port from the event source, uninstalls the
/// driver on the system thread, frees any pending transmit buffer and returns
/// the port to the pool, in that order.
pub struct I2s<'g> {
    owner: &'g I2sGroup<'g>,
    handle: ResourceHandle<'g, I2sEvents>,
    proxy: Proxy,
    pending: Mutex<Option<Pending>>,
}

impl I2s<'_> {
    pub fn proxy(&self) -> Proxy {
        self.proxy
    }

    pub fn port(&self) -> Port {
        self.handle.port
    }

    pub fn state(&self) -> &ResourceState {
        self.handle.state()
    }

    /// Resolves once any bit of `mask` is set, consuming those bits.
    pub fn wait(&self, mask: StateWord) -> StateFuture<'_> {
        self.handle.wait(mask)
    }

    /// Hands samples to the driver without blocking.
    ///
    /// The first call packs `samples` into a native buffer; calls that
    /// follow continue sending that buffer and ignore their argument until
    /// it is gone. Returns `true` once the whole buffer has been accepted, at
    /// which point the next call starts over with fresh samples. Between
    /// partial writes, wait for [`WRITE_STATE`].
    pub fn write(&self, samples: &[i32]) -> Result<bool> {
        let mut pending = self.pending.lock();

        let mut current = match pending.take() {
            Some(current) => current,
            None => self.pack(samples)?,
        };

        // On error the buffer is dropped along with `current`.
        let written = self
            .owner
            .driver
            .write(self.handle.port, &current.bytes[current.offset..])?;
        current.offset += written;

        if current.offset >= current.bytes.len() {
            trace!(port = self.handle.port, bytes = current.bytes.len(), "i2s write complete");
            return Ok(true);
        }

        *pending = Some(current);
        Ok(false)
    }

    fn pack(&self, samples: &[i32]) -> Result<Pending> {
        let word_size = self.handle.word_size;
        let len = samples.len() * codec::bytes_per_sample(word_size);

        let mut bytes = self.owner.runtime.heap().malloc(len).ok_or(Error::MallocFailed)?;
        codec::pack(samples, word_size, &mut bytes);

        Ok(Pending { bytes, offset: 0 })
    }

    /// Reads whatever the driver has buffered, without blocking.
    ///
    /// Returns an array sized for the largest possible read (two channels of
    /// `max_frames_per_read` frames) and the number of samples filled in.
    pub fn read(&self) -> Result<(Vec<i32>, usize)> {
        let heap = self.owner.runtime.heap();
        let word_size = self.handle.word_size;
        let width = codec::bytes_per_sample(word_size);
        let capacity = self.handle.max_frames_per_read * 2;

        let mut samples = heap.allocate_array(capacity).ok_or(Error::AllocationFailed)?;
        let mut bytes = heap.malloc(capacity * width).ok_or(Error::MallocFailed)?;

        let count = self.owner.driver.read(self.handle.port, &mut bytes)?;
        if count > bytes.len() {
            fatal!(
                "broken I2S read: driver reported {count} bytes for a {}-byte buffer on port {}",
                bytes.len(),
                self.handle.port
            );
        }
        let frame = width * 2;
        if count % frame != 0 {
            fatal!(
                "broken I2S read: {count} bytes is not a whole number of {frame}-byte frames on port {}",
                self.handle.port
            );
        }

        let filled = codec::unpack(&bytes[..count], word_size, &mut samples);
        Ok((samples, filled))
    }
}

impl Drop for I2s<'_> {
    fn drop(&mut self) {
        let port = self.handle.port;
        self.handle.unregister();

        if let Err(err) = self.owner.uninstall(port) {
            fatal!("failed to uninstall i2s port {port}: {err}");
        }

        self.pending.get_mut().take();
        self.owner.runtime.i2s_ports().put(port);

        debug!(port, "i2s port closed");
    }
}
