//! Accumulated per-resource state and the future managed tasks park on.
//!
//! The worker folds every event into the state word of the resource it came
//! from. A task waiting for some bits registers its waker; when a fold changes
//! the word, every registered waker is woken and the tasks re-check their
//! masks.
//!
//! # Examples
//!
//! ```
//! use hwreactor::ResourceState;
//!
//! let state = ResourceState::new();
//! state.fold(|bits| bits | 0b10);
//!
//! let bits = futures::executor::block_on(state.wait(0b11));
//! assert_eq!(bits, 0b10);
//! assert_eq!(state.bits(), 0);
//! ```

use crate::resource::StateWord;

use parking_lot::Mutex;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll, Waker};

/// Bitmask of every event type observed since it was last consumed.
#[derive(Default)]
pub struct ResourceState {
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    bits: StateWord,
    waiters: Vec<Waker>,
}

impl ResourceState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bits(&self) -> StateWord {
        self.inner.lock().bits
    }

    /// Replaces the word with `f(previous)`. Waiters are woken when the word
    /// changed. Returns whether it did.
    pub fn fold(&self, f: impl FnOnce(StateWord) -> StateWord) -> bool {
        let waiters = {
            let mut inner = self.inner.lock();
            let next = f(inner.bits);
            if next == inner.bits {
                return false;
            }
            inner.bits = next;
            std::mem::take(&mut inner.waiters)
        };

        for waiter in waiters {
            waiter.wake();
        }

        true
    }

    /// Clears `mask` and returns the bits that were set in it.
    pub fn consume(&self, mask: StateWord) -> StateWord {
        let mut inner = self.inner.lock();
        let taken = inner.bits & mask;
        inner.bits &= !mask;
        taken
    }

    /// Resolves once any bit of `mask` is set, consuming those bits.
    pub fn wait(&self, mask: StateWord) -> StateFuture<'_> {
        StateFuture { state: self, mask }
    }
}

/// Future returned by [`ResourceState::wait`].
pub struct StateFuture<'a> {
    state: &'a ResourceState,
    mask: StateWord,
}

impl Future for StateFuture<'_> {
    type Output = StateWord;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let mut inner = self.state.inner.lock();

        let taken = inner.bits & self.mask;
        if taken != 0 {
            inner.bits &= !self.mask;
            return Poll::Ready(taken);
        }

        if !inner.waiters.iter().any(|w| w.will_wake(cx.waker())) {
            inner.waiters.push(cx.waker().clone());
        }

        Poll::Pending
    }
}
