//! Recoverable outcomes of the managed call surface, and the fatal path.
//!
//! Everything a caller can act on is an [`Error`]. Broken internal invariants
//! (a wait set that refuses to converge, a driver that breaks its framing
//! contract) go through `fatal!` instead and end the process.

use crate::os::SetError;

use std::io;

/// Native driver error code, passed through verbatim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, thiserror::Error)]
#[error("native error {0:#x}")]
pub struct NativeError(pub i32);

impl NativeError {
    pub fn code(self) -> i32 {
        self.0
    }
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The managed heap could not provide a handle wrapper or result array.
    #[error("allocation failed")]
    AllocationFailed,
    /// A native buffer could not be allocated.
    #[error("malloc failed")]
    MallocFailed,
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),
    /// No free identifier was left in a resource pool.
    #[error("out of range")]
    OutOfRange,
    #[error(transparent)]
    Native(#[from] NativeError),
    #[error("wait set rejected a permanent member: {0}")]
    WaitSet(#[from] SetError),
    #[error("failed to spawn the {name} thread")]
    Spawn {
        name: String,
        #[source]
        source: io::Error,
    },
}

pub type Result<T> = std::result::Result<T, Error>;

/// Logs and aborts the process. Used for invariant breaks no caller can
/// recover from; nothing unwinds, so `catch_unwind` cannot intercept it.
macro_rules! fatal {
    ($($arg:tt)+) => {{
        ::tracing::error!($($arg)+);
        ::std::process::abort()
    }};
}

pub(crate) use fatal;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn native_codes_pass_through() {
        let err = Error::from(NativeError(0x107));

        assert_eq!(err.to_string(), "native error 0x107");
        assert!(matches!(err, Error::Native(native) if native.code() == 0x107));
    }
}
