//! The managed heap as seen by native resources.
//!
//! Resources need three things from the runtime's heap: a handle wrapper to
//! hand back to managed code, result arrays, and plain native buffers. Each
//! can fail, and each failure has its own outcome
//! ([`Error::AllocationFailed`](crate::Error::AllocationFailed) for the
//! managed heap, [`Error::MallocFailed`](crate::Error::MallocFailed) for
//! native buffers).

use std::sync::atomic::{AtomicU64, Ordering};

/// Opaque handle wrapper returned to managed code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Proxy(u64);

impl Proxy {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn id(self) -> u64 {
        self.0
    }
}

pub trait Heap: Send + Sync {
    /// Allocates a handle wrapper, or `None` when the managed heap is full.
    fn allocate_proxy(&self) -> Option<Proxy>;

    /// Allocates a managed array of `len` zeroed integers.
    fn allocate_array(&self, len: usize) -> Option<Vec<i32>>;

    /// Allocates a native buffer of `len` zeroed bytes.
    fn malloc(&self, len: usize) -> Option<Vec<u8>>;
}

/// Heap backed by the process allocator; fails only when it does.
#[derive(Default)]
pub struct SystemHeap {
    next_proxy: AtomicU64,
}

impl SystemHeap {
    pub fn new() -> Self {
        Self::default()
    }
}

fn zeroed<T: Default + Clone>(len: usize) -> Option<Vec<T>> {
    let mut buffer = Vec::new();
    buffer.try_reserve_exact(len).ok()?;
    buffer.resize(len, T::default());
    Some(buffer)
}

impl Heap for SystemHeap {
    fn allocate_proxy(&self) -> Option<Proxy> {
        Some(Proxy(self.next_proxy.fetch_add(1, Ordering::Relaxed)))
    }

    fn allocate_array(&self, len: usize) -> Option<Vec<i32>> {
        zeroed(len)
    }

    fn malloc(&self, len: usize) -> Option<Vec<u8>> {
        zeroed(len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn proxies_are_distinct() {
        let heap = SystemHeap::new();
        let a = heap.allocate_proxy().unwrap();
        let b = heap.allocate_proxy().unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn buffers_are_zeroed() {
        let heap = SystemHeap::new();
        assert_eq!(heap.malloc(4), Some(vec![0u8; 4]));
        assert_eq!(heap.allocate_array(3), Some(vec![0; 3]));
    }

    #[test]
    fn impossible_request_fails() {
        let heap = SystemHeap::new();
        assert_eq!(heap.malloc(usize::MAX), None);
    }
}
