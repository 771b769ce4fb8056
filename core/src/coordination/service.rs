use parking_lot::{Condvar, Mutex};

/// Outcome of one attempt made while holding the state lock.
#[derive(Debug)]
pub enum Disposition<R> {
    /// Done; release the lock and return the value.
    Finished(R),
    /// Release the lock, block until the state changes, then try again.
    Retry,
}

/// State guarded by a [`CoordinationService`].
pub trait CoordinatedState {
    /// Whether resource locks were released since the last call.
    ///
    /// Waiters are woken after any attempt that released a lock, since the
    /// freed resource may be what they are blocked on.
    fn take_released_locks(&mut self) -> bool {
        false
    }
}

/// A single state lock plus a broadcast condition.
///
/// A `&mut S` can only be obtained inside [`with_state_lock`](Self::with_state_lock)
/// or [`run_with_state_lock`](Self::run_with_state_lock), so holding one is the
/// proof that the lock is held.
pub struct CoordinationService<S> {
    state: Mutex<S>,
    changed: Condvar,
}

impl<S: CoordinatedState> CoordinationService<S> {
    pub fn new(state: S) -> Self {
        Self {
            state: Mutex::new(state),
            changed: Condvar::new(),
        }
    }

    /// Run `f` while holding the state lock, retrying until it finishes.
    ///
    /// Each `Retry` releases the lock and blocks until
    /// [`notify_state_change`](Self::notify_state_change) is called. `f` must
    /// re-check its predicate on every call; wakeups may be spurious.
    pub fn with_state_lock<R, F>(&self, mut f: F) -> R
    where
        F: FnMut(&mut S) -> Disposition<R>,
    {
        let mut state = self.state.lock();
        loop {
            let disposition = f(&mut state);
            if state.take_released_locks() {
                self.changed.notify_all();
            }
            match disposition {
                Disposition::Finished(value) => return value,
                Disposition::Retry => self.changed.wait(&mut state),
            }
        }
    }

    /// Run `f` once while holding the state lock.
    pub fn run_with_state_lock<R, F>(&self, f: F) -> R
    where
        F: FnOnce(&mut S) -> R,
    {
        let mut state = self.state.lock();
        let value = f(&mut state);
        if state.take_released_locks() {
            self.changed.notify_all();
        }
        value
    }

    /// Wake every thread blocked in [`with_state_lock`](Self::with_state_lock).
    ///
    /// The change being announced must have been made under the state lock.
    /// Changes made outside it, such as a cancellation flag, are announced
    /// with [`signal_state_change`](Self::signal_state_change).
    pub fn notify_state_change(&self) {
        self.changed.notify_all();
    }

    /// Wake every waiter from a thread that does not hold the state lock.
    ///
    /// Acquiring the lock first means an attempt that read the old state has
    /// reached its wait before the wakeup is sent, so the wakeup cannot be lost.
    /// Must not be called while holding the state lock.
    pub fn signal_state_change(&self) {
        drop(self.state.lock());
        self.changed.notify_all();
    }
}
