//! Host-side I2S driver.
//!
//! [`SimulatedI2s`] keeps per-port state in memory: it accepts a configurable
//! number of bytes per write call, hands out scripted read data, posts
//! completion events to the port's queue and can be told to fail the next
//! call of any kind.

use super::driver::{DriverConfig, I2sDriver, I2sEvent, PinConfig, Port};
use crate::error::NativeError;
use crate::os::Queue;

use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::thread;

/// Argument rejected by the driver.
pub const ERR_INVALID_ARG: NativeError = NativeError(0x102);
/// Port not in a state that allows the call.
pub const ERR_INVALID_STATE: NativeError = NativeError(0x103);

#[derive(Default)]
struct Faults {
    install: Option<NativeError>,
    set_pin: Option<NativeError>,
    uninstall: Option<NativeError>,
    write: Option<NativeError>,
    read: Option<NativeError>,
}

struct PortState {
    config: DriverConfig,
    pins: Option<PinConfig>,
    queue: Queue<I2sEvent>,
    installed_on: Option<String>,
    written: Vec<u8>,
    reads: VecDeque<Vec<u8>>,
}

pub struct SimulatedI2s {
    write_chunk: usize,
    ports: Mutex<HashMap<Port, PortState>>,
    faults: Mutex<Faults>,
    uninstalls: Mutex<Vec<(Port, Option<String>)>>,
}

impl Default for SimulatedI2s {
    fn default() -> Self {
        Self::new()
    }
}

fn current_thread() -> Option<String> {
    thread::current().name().map(str::to_owned)
}

impl SimulatedI2s {
    /// A driver accepting whole writes.
    pub fn new() -> Self {
        Self::with_write_chunk(usize::MAX)
    }

    /// A driver accepting at most `bytes` per write call.
    pub fn with_write_chunk(bytes: usize) -> Self {
        Self {
            write_chunk: bytes,
            ports: Mutex::new(HashMap::new()),
            faults: Mutex::new(Faults::default()),
            uninstalls: Mutex::new(Vec::new()),
        }
    }

    pub fn fail_next_install(&self, err: NativeError) {
        self.faults.lock().install = Some(err);
    }

    pub fn fail_next_set_pin(&self, err: NativeError) {
        self.faults.lock().set_pin = Some(err);
    }

    pub fn fail_next_uninstall(&self, err: NativeError) {
        self.faults.lock().uninstall = Some(err);
    }

    pub fn fail_next_write(&self, err: NativeError) {
        self.faults.lock().write = Some(err);
    }

    pub fn fail_next_read(&self, err: NativeError) {
        self.faults.lock().read = Some(err);
    }

    /// Queues `bytes` as the result of a later read. Returns `false` when the
    /// port is not installed.
    pub fn push_read(&self, port: Port, bytes: Vec<u8>) -> bool {
        match self.ports.lock().get_mut(&port) {
            Some(state) => {
                state.reads.push_back(bytes);
                true
            }
            None => false,
        }
    }

    /// Posts `event` to the port's queue, as the interrupt handler would.
    pub fn post(&self, port: Port, event: I2sEvent) -> bool {
        match self.ports.lock().get(&port) {
            Some(state) => state.queue.send(event).is_ok(),
            None => false,
        }
    }

    pub fn is_installed(&self, port: Port) -> bool {
        self.ports.lock().contains_key(&port)
    }

    /// Everything written to the port so far.
    pub fn written(&self, port: Port) -> Vec<u8> {
        self.ports
            .lock()
            .get(&port)
            .map(|state| state.written.clone())
            .unwrap_or_default()
    }

    pub fn config(&self, port: Port) -> Option<DriverConfig> {
        self.ports.lock().get(&port).map(|state| state.config.clone())
    }

    pub fn pins(&self, port: Port) -> Option<PinConfig> {
        self.ports.lock().get(&port).and_then(|state| state.pins)
    }

    /// Name of the thread the port was installed from.
    pub fn installed_on(&self, port: Port) -> Option<String> {
        self.ports
            .lock()
            .get(&port)
            .and_then(|state| state.installed_on.clone())
    }

    /// Every successful uninstall, with the thread it ran on.
    pub fn uninstalls(&self) -> Vec<(Port, Option<String>)> {
        self.uninstalls.lock().clone()
    }
}

impl I2sDriver for SimulatedI2s {
    fn install(
        &self,
        port: Port,
        config: &DriverConfig,
        queue_len: usize,
    ) -> Result<Queue<I2sEvent>, NativeError> {
        if let Some(err) = self.faults.lock().install.take() {
            return Err(err);
        }

        let mut ports = self.ports.lock();
        if ports.contains_key(&port) {
            return Err(ERR_INVALID_STATE);
        }

        let queue = Queue::new(queue_len);
        ports.insert(
            port,
            PortState {
                config: config.clone(),
                pins: None,
                queue: queue.clone(),
                installed_on: current_thread(),
                written: Vec::new(),
                reads: VecDeque::new(),
            },
        );
        Ok(queue)
    }

    fn set_pin(&self, port: Port, pins: &PinConfig) -> Result<(), NativeError> {
        if let Some(err) = self.faults.lock().set_pin.take() {
            return Err(err);
        }

        let mut ports = self.ports.lock();
        let state = ports.get_mut(&port).ok_or(ERR_INVALID_STATE)?;
        state.pins = Some(*pins);
        Ok(())
    }

    fn uninstall(&self, port: Port) -> Result<(), NativeError> {
        if let Some(err) = self.faults.lock().uninstall.take() {
            return Err(err);
        }

        self.ports.lock().remove(&port).ok_or(ERR_INVALID_STATE)?;
        self.uninstalls.lock().push((port, current_thread()));
        Ok(())
    }

    fn write(&self, port: Port, bytes: &[u8]) -> Result<usize, NativeError> {
        if let Some(err) = self.faults.lock().write.take() {
            return Err(err);
        }

        let mut ports = self.ports.lock();
        let state = ports.get_mut(&port).ok_or(ERR_INVALID_STATE)?;
        if !state.config.mode.tx {
            return Err(ERR_INVALID_ARG);
        }

        let accepted = bytes.len().min(self.write_chunk);
        state.written.extend_from_slice(&bytes[..accepted]);
        if accepted > 0 {
            let _ = state.queue.send(I2sEvent::TxDone);
        }
        Ok(accepted)
    }

    fn read(&self, port: Port, buffer: &mut [u8]) -> Result<usize, NativeError> {
        if let Some(err) = self.faults.lock().read.take() {
            return Err(err);
        }

        let mut ports = self.ports.lock();
        let state = ports.get_mut(&port).ok_or(ERR_INVALID_STATE)?;
        if !state.config.mode.rx {
            return Err(ERR_INVALID_ARG);
        }

        let Some(data) = state.reads.pop_front() else {
            return Ok(0);
        };
        let count = data.len().min(buffer.len());
        buffer[..count].copy_from_slice(&data[..count]);
        Ok(count)
    }
}
