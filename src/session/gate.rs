use std::sync::{
    Mutex, MutexGuard,
    atomic::{AtomicUsize, Ordering},
};

use log::warn;

/// Per-session mutual exclusion around the state an edit mutates.
///
/// Callers queue on a plain lock in arrival order. Nothing is coalesced or
/// rate-limited here.
#[derive(Debug)]
pub struct OperationGate<T> {
    state: Mutex<T>,
    in_flight: AtomicUsize,
}

struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::AcqRel);
    }
}

impl<T> OperationGate<T> {
    pub fn new(state: T) -> Self {
        Self {
            state: Mutex::new(state),
            in_flight: AtomicUsize::new(0),
        }
    }

    /// Runs `block` while holding the gate. The gate is released on every
    /// exit path, including an unwinding panic inside `block`.
    pub fn with_exclusive_access<R>(&self, block: impl FnOnce(&mut T) -> R) -> R {
        self.in_flight.fetch_add(1, Ordering::AcqRel);
        let _in_flight = InFlight(&self.in_flight);

        block(&mut *self.lock())
    }

    /// Runs a query while holding the gate. Queries are not counted by
    /// [`OperationGate::busy`].
    pub fn read<R>(&self, query: impl FnOnce(&T) -> R) -> R {
        query(&*self.lock())
    }

    fn lock(&self) -> MutexGuard<'_, T> {
        self.state.lock().unwrap_or_else(|poisoned| {
            warn!("operation gate poisoned by an earlier panic, continuing");
            poisoned.into_inner()
        })
    }

    /// True while any edit is waiting on or holding the gate.
    pub fn busy(&self) -> bool {
        self.in_flight() > 0
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::Acquire)
    }
}
