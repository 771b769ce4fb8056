//! Coordination primitives shared by every worker thread.
//!
//! All scheduling state lives behind a single lock owned by a
//! [`CoordinationService`]. Threads that cannot make progress block on the
//! service's condition variable and re-evaluate whenever another thread
//! reports a state change.

mod cancel;
mod lease;
mod service;

pub use cancel::CancellationToken;
pub use lease::{LeaseRegistry, WorkerLease, WorkerLeaseService};
pub use service::{CoordinatedState, CoordinationService, Disposition};
