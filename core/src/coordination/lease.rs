use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread::{self, ThreadId};

use parking_lot::Mutex;

use crate::error::ExecutorError;

/// Permission for one thread to run work.
///
/// A lease is only an identity; whether it is held, and by which thread, is
/// tracked by the [`LeaseRegistry`] inside the coordinated state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WorkerLease {
    id: u64,
}

impl WorkerLease {
    pub fn id(&self) -> u64 {
        self.id
    }
}

/// Bounded pool of worker leases.
///
/// Must only be touched while holding the coordination state lock.
#[derive(Debug)]
pub struct LeaseRegistry {
    max_workers: usize,
    holders: HashMap<u64, ThreadId>,
    released: bool,
}

impl LeaseRegistry {
    pub fn new(max_workers: usize) -> Self {
        Self {
            max_workers,
            holders: HashMap::new(),
            released: false,
        }
    }

    pub fn max_workers(&self) -> usize {
        self.max_workers
    }

    /// Number of leases currently held.
    pub fn active(&self) -> usize {
        self.holders.len()
    }

    /// Try to take `lease` for the current thread.
    ///
    /// Returns `true` if the current thread already holds it. Fails when
    /// another thread holds it or every permit is taken.
    pub fn try_lock(&mut self, lease: &WorkerLease) -> bool {
        let current = thread::current().id();
        match self.holders.get(&lease.id) {
            Some(owner) => *owner == current,
            None if self.holders.len() >= self.max_workers => false,
            None => {
                self.holders.insert(lease.id, current);
                true
            }
        }
    }

    /// Release `lease`. Releasing a lease nobody holds is a no-op.
    pub fn unlock(&mut self, lease: &WorkerLease) -> Result<(), ExecutorError> {
        match self.holders.get(&lease.id) {
            None => Ok(()),
            Some(owner) if *owner == thread::current().id() => {
                self.holders.remove(&lease.id);
                self.released = true;
                Ok(())
            }
            Some(_) => Err(ExecutorError::LeaseNotOwned),
        }
    }

    pub fn is_locked_by_current_thread(&self, lease: &WorkerLease) -> bool {
        self.holders
            .get(&lease.id)
            .is_some_and(|owner| *owner == thread::current().id())
    }

    /// Whether any lease was released since the last call.
    pub fn take_released(&mut self) -> bool {
        std::mem::take(&mut self.released)
    }
}

/// Hands out lease identities and remembers which one belongs to each thread.
#[derive(Debug, Default)]
pub struct WorkerLeaseService {
    next_id: AtomicU64,
    thread_leases: Mutex<HashMap<ThreadId, WorkerLease>>,
}

impl WorkerLeaseService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a lease and make it the current thread's lease.
    pub fn new_worker_lease(&self) -> WorkerLease {
        let lease = WorkerLease {
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
        };
        self.thread_leases
            .lock()
            .insert(thread::current().id(), lease);
        lease
    }

    /// The lease registered for the current thread, if any.
    pub fn current_worker_lease(&self) -> Option<WorkerLease> {
        self.thread_leases
            .lock()
            .get(&thread::current().id())
            .copied()
    }

    /// Forget the current thread's lease.
    pub fn release_thread_lease(&self) {
        self.thread_leases.lock().remove(&thread::current().id());
    }
}
