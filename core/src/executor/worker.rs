use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread;

use tracing::{info, warn};

use crate::coordination::{Disposition, LeaseRegistry, WorkerLease};
use crate::error::Failure;
use crate::executor::merged::MergedQueues;
use crate::executor::plan::WorkItem;
use crate::executor::plan_executor::{SchedulerState, Shared};
use crate::executor::source::{ExecutionState, Selection};
use crate::executor::stats::WorkerStats;

/// Which queue a worker pulls from.
pub(crate) enum WorkerQueue {
    /// The executor-wide queue of every submitted plan.
    Shared,
    /// A caller's own plan, processed inline on the calling thread.
    Private(MergedQueues),
}

/// Pulls items from a queue and runs them until the queue is exhausted.
pub(crate) struct ExecutorWorker {
    shared: Arc<Shared>,
    queue: WorkerQueue,
    lease: Option<WorkerLease>,
    stats: Box<dyn WorkerStats>,
}

impl ExecutorWorker {
    /// A worker given a `lease` borrows it from its caller and never
    /// releases it on exit.
    pub fn new(shared: Arc<Shared>, queue: WorkerQueue, lease: Option<WorkerLease>) -> Self {
        let stats = shared.stats.start_worker();
        Self {
            shared,
            queue,
            lease,
            stats,
        }
    }

    pub fn run(mut self) {
        // Dropped on exit or unwind, so a created lease is always given back.
        let _owned;
        let lease = match self.lease {
            Some(lease) => lease,
            None => {
                let lease = self.shared.leases.new_worker_lease();
                _owned = OwnedLease {
                    shared: Arc::clone(&self.shared),
                    lease,
                };
                lease
            }
        };

        let current = thread::current();
        let thread_name = current.name().unwrap_or("<unnamed>");
        while let Some(item) = self.next_item(&lease) {
            info!(work = %item.work.describe(), thread = thread_name, "Started executing");
            self.execute(item);
        }
        self.stats.finish();
    }

    fn next_item(&mut self, lease: &WorkerLease) -> Option<WorkItem> {
        self.stats.start_select();
        let shared = Arc::clone(&self.shared);
        let own_queue = &mut self.queue;

        let selected = shared.coordination.with_state_lock(|state| {
            let SchedulerState {
                plans,
                queue: shared_queue,
                leases,
            } = state;
            let queue = match &mut *own_queue {
                WorkerQueue::Shared => shared_queue,
                WorkerQueue::Private(queue) => queue,
            };

            if shared.cancellation.is_cancellation_requested() && queue.cancel_execution(plans) {
                shared.coordination.notify_state_change();
            }

            match queue.execution_state(plans) {
                ExecutionState::NoMoreWorkToStart => return Disposition::Finished(None),
                ExecutionState::NoWorkReadyToStart => {
                    release_lease(leases, lease);
                    return Disposition::Retry;
                }
                ExecutionState::MaybeWorkReadyToStart => {}
            }

            if !leases.try_lock(lease) {
                return Disposition::Retry;
            }

            let selection = panic::catch_unwind(AssertUnwindSafe(|| queue.select_next(plans)))
                .unwrap_or_else(|payload| Err(Failure::from_panic(payload)));
            match selection {
                Ok(Selection::Item(item)) => Disposition::Finished(Some(item)),
                Ok(Selection::NoMoreWorkToStart) => Disposition::Finished(None),
                Ok(Selection::NoWorkReadyToStart) => {
                    release_lease(leases, lease);
                    Disposition::Retry
                }
                Err(failure) => {
                    warn!(error = %failure, "Failed to select work; aborting queued plans");
                    release_lease(leases, lease);
                    queue.abort_all_and_fail(plans, failure);
                    shared.coordination.notify_state_change();
                    Disposition::Finished(None)
                }
            }
        });

        self.stats.finish_select();
        selected
    }

    fn execute(&mut self, item: WorkItem) {
        self.stats.start_execute();
        let failure = item.work.execute();
        self.stats.finish_execute();
        self.mark_finished(item, failure);
    }

    fn mark_finished(&mut self, item: WorkItem, failure: Option<Failure>) {
        self.stats.start_mark_finished();
        let shared = Arc::clone(&self.shared);
        let own_queue = &mut self.queue;

        shared.coordination.run_with_state_lock(|state| {
            let SchedulerState {
                plans,
                queue: shared_queue,
                ..
            } = state;
            let WorkItem { plan, work } = item;

            let result = match plans.get_mut(&plan) {
                Some(source) => panic::catch_unwind(AssertUnwindSafe(|| {
                    source.finished_executing(work, failure)
                }))
                .unwrap_or_else(|payload| Err(Failure::from_panic(payload))),
                None => Err(Failure::msg(format!(
                    "plan {plan} was removed while one of its items was executing"
                ))),
            };

            if let Err(failure) = result {
                warn!(error = %failure, "Failed to record finished work; aborting queued plans");
                let queue = match &mut *own_queue {
                    WorkerQueue::Shared => shared_queue,
                    WorkerQueue::Private(queue) => queue,
                };
                queue.abort_all_and_fail(plans, failure);
            }
            shared.coordination.notify_state_change();
        });

        self.stats.finish_mark_finished();
    }
}

/// A lease a worker created for itself.
struct OwnedLease {
    shared: Arc<Shared>,
    lease: WorkerLease,
}

impl Drop for OwnedLease {
    fn drop(&mut self) {
        let lease = self.lease;
        self.shared
            .coordination
            .run_with_state_lock(|state| release_lease(&mut state.leases, &lease));
        self.shared.leases.release_thread_lease();
    }
}

/// Release `lease` if the current thread holds it.
pub(crate) fn release_lease(leases: &mut LeaseRegistry, lease: &WorkerLease) {
    if let Err(e) = leases.unlock(lease) {
        warn!(lease = lease.id(), error = %e, "Could not release worker lease");
    }
}
