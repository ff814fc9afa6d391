//! Privileged setup thread.
//!
//! Some driver calls (install, uninstall) have to run on a thread the driver
//! layer trusts rather than on whatever task thread issued the request. The
//! [`SystemThread`] owns such a thread and runs submitted closures on it one at
//! a time, blocking the caller until the result is back.

use crate::error::{Error, Result, fatal};

use std::sync::mpsc::{self, Sender};
use std::thread::{self, JoinHandle};
use tracing::{debug, error};

type Job = Box<dyn FnOnce() + Send>;

/// Dedicated thread executing blocking setup and teardown calls.
pub struct SystemThread {
    name: String,
    transmitter: Option<Sender<Job>>,
    worker: Option<JoinHandle<()>>,
}

impl SystemThread {
    pub fn spawn(name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        let (transmitter, receiver) = mpsc::channel::<Job>();

        let worker = thread::Builder::new()
            .name(name.clone())
            .spawn(move || {
                for job in receiver {
                    job();
                }
            })
            .map_err(|source| Error::Spawn {
                name: name.clone(),
                source,
            })?;

        debug!(thread = %name, "system thread started");

        Ok(Self {
            name,
            transmitter: Some(transmitter),
            worker: Some(worker),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Runs `f` on the system thread and returns its result.
    ///
    /// A closure that panics takes the system thread down with it; that is
    /// treated as fatal.
    pub fn run<F, R>(&self, f: F) -> R
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        let (reply, result) = mpsc::sync_channel(1);
        let job: Job = Box::new(move || {
            let _ = reply.send(f());
        });

        let Some(transmitter) = &self.transmitter else {
            fatal!("{}: system thread is shut down", self.name)
        };
        if transmitter.send(job).is_err() {
            fatal!("{}: system thread is gone", self.name)
        }

        match result.recv() {
            Ok(value) => value,
            Err(_) => fatal!("{}: system call did not complete", self.name),
        }
    }
}

impl Drop for SystemThread {
    fn drop(&mut self) {
        // Closing the channel ends the job loop.
        self.transmitter.take();
        if let Some(worker) = self.worker.take()
            && worker.join().is_err()
        {
            error!(thread = %self.name, "system thread panicked");
        }
        debug!(thread = %self.name, "system thread stopped");
    }
}
