//! Contract with the native I2S driver.

use crate::error::NativeError;
use crate::os::Queue;
use crate::resource::EventWord;

/// Physical I2S port number.
pub type Port = u32;

/// Completion codes the driver posts to a port's event queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(usize)]
pub enum I2sEvent {
    DmaError = 0,
    TxDone = 1,
    RxDone = 2,
    TxQueueOverflow = 3,
    RxQueueOverflow = 4,
}

impl From<I2sEvent> for EventWord {
    fn from(event: I2sEvent) -> Self {
        event as EventWord
    }
}

/// Which directions are enabled, and who drives the clocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Mode {
    pub master: bool,
    pub tx: bool,
    pub rx: bool,
}

/// Pin routing. `None` leaves a signal unconnected.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PinConfig {
    pub mclk: Option<u32>,
    pub sck: Option<u32>,
    pub ws: Option<u32>,
    pub tx: Option<u32>,
    pub rx: Option<u32>,
}

/// Settings handed to [`I2sDriver::install`], derived from a validated
/// [`I2sConfig`](super::I2sConfig).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriverConfig {
    pub mode: Mode,
    pub sample_rate: u32,
    pub bits_per_sample: u32,
    pub dma_buf_count: usize,
    /// Length of one DMA buffer in bytes.
    pub dma_buf_len: usize,
    pub use_apll: bool,
    /// Fixed master clock in Hz, 0 when no MCLK pin is used.
    pub fixed_mclk: u32,
    pub pins: PinConfig,
}

/// Native driver operations. Read and write never block: they move whatever
/// fits right now and report how many bytes that was.
pub trait I2sDriver: Send + Sync + 'static {
    /// Installs the driver on `port` and returns the queue it posts
    /// completion events to. Must run on the system thread.
    fn install(
        &self,
        port: Port,
        config: &DriverConfig,
        queue_len: usize,
    ) -> Result<Queue<I2sEvent>, NativeError>;

    fn set_pin(&self, port: Port, pins: &PinConfig) -> Result<(), NativeError>;

    /// Must run on the system thread.
    fn uninstall(&self, port: Port) -> Result<(), NativeError>;

    fn write(&self, port: Port, bytes: &[u8]) -> Result<usize, NativeError>;

    fn read(&self, port: Port, buffer: &mut [u8]) -> Result<usize, NativeError>;
}
