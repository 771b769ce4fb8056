use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::thread::{self, JoinHandle};
use std::time::Instant;

use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::config::ExecutorConfig;
use crate::coordination::{
    CancellationToken, CoordinatedState, CoordinationService, Disposition, LeaseRegistry,
    WorkerLease, WorkerLeaseService,
};
use crate::error::{ExecutorError, Failure};
use crate::executor::merged::MergedQueues;
use crate::executor::plan::{PlanHandle, PlanId, PlanRegistry, TypedPlan};
use crate::executor::source::{Action, WorkSource};
use crate::executor::stats::{CollectingExecutorStats, ExecutorStats, NoOpStats, STATS_ENV_VAR};
use crate::executor::types::ExecutionResult;
use crate::executor::worker::{release_lease, ExecutorWorker, WorkerQueue};

/// Everything guarded by the coordination lock.
pub(crate) struct SchedulerState {
    pub plans: PlanRegistry,
    /// Every submitted plan, newest first. Background workers pull from here.
    pub queue: MergedQueues,
    pub leases: LeaseRegistry,
}

impl CoordinatedState for SchedulerState {
    fn take_released_locks(&mut self) -> bool {
        self.leases.take_released()
    }
}

/// State shared between the executor, its callers and its background workers.
pub(crate) struct Shared {
    pub coordination: CoordinationService<SchedulerState>,
    pub leases: WorkerLeaseService,
    pub cancellation: CancellationToken,
    pub stats: Arc<dyn ExecutorStats>,
}

/// Runs work sources on a bounded pool of threads.
///
/// The calling thread of [`process`](Self::process) always works on its own
/// plan, so a plan completes even if every background worker is busy
/// elsewhere. Background workers are started lazily on the first call and
/// serve every submitted plan.
pub struct PlanExecutor {
    shared: Arc<Shared>,
    executor_count: usize,
    thread_name_prefix: String,
    next_plan_id: AtomicU64,
    workers_started: AtomicBool,
    workers: Mutex<Vec<JoinHandle<()>>>,
    stopped: AtomicBool,
}

impl PlanExecutor {
    /// Create an executor sized by `config`.
    ///
    /// Statistics are collected when `config.collect_stats` is set or the
    /// `DAGRUN_EXECUTOR_STATS` environment variable is present.
    pub fn new(
        config: &ExecutorConfig,
        cancellation: CancellationToken,
    ) -> Result<Self, ExecutorError> {
        let stats: Arc<dyn ExecutorStats> =
            if config.collect_stats || std::env::var_os(STATS_ENV_VAR).is_some() {
                Arc::new(CollectingExecutorStats::new())
            } else {
                Arc::new(NoOpStats)
            };
        Self::with_stats(config, cancellation, stats)
    }

    pub fn with_stats(
        config: &ExecutorConfig,
        cancellation: CancellationToken,
        stats: Arc<dyn ExecutorStats>,
    ) -> Result<Self, ExecutorError> {
        let executor_count = config.max_workers;
        if executor_count < 1 {
            return Err(ExecutorError::InvalidWorkerCount(executor_count));
        }

        let shared = Arc::new(Shared {
            coordination: CoordinationService::new(SchedulerState {
                plans: PlanRegistry::new(),
                queue: MergedQueues::new(false),
                leases: LeaseRegistry::new(executor_count),
            }),
            leases: WorkerLeaseService::new(),
            cancellation,
            stats,
        });

        // Blocked workers must observe cancellation promptly. The flag is set
        // outside the state lock, so the wakeup has to take it.
        let weak: Weak<Shared> = Arc::downgrade(&shared);
        shared.cancellation.add_callback(move || {
            if let Some(shared) = weak.upgrade() {
                shared.coordination.signal_state_change();
            }
        });

        Ok(Self {
            shared,
            executor_count,
            thread_name_prefix: config.thread_name_prefix.clone(),
            next_plan_id: AtomicU64::new(0),
            workers_started: AtomicBool::new(false),
            workers: Mutex::new(Vec::new()),
            stopped: AtomicBool::new(false),
        })
    }

    pub fn executor_count(&self) -> usize {
        self.executor_count
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.shared.cancellation
    }

    /// Number of worker leases currently held.
    pub fn active_workers(&self) -> usize {
        self.shared
            .coordination
            .run_with_state_lock(|state| state.leases.active())
    }

    /// Run `source` to completion, executing each selected item with `action`.
    ///
    /// Blocks until every item of `source` has finished. The calling thread
    /// executes items itself; background workers help. Item failures are
    /// returned in the result; an `Err` means the plan could not be submitted.
    pub fn process<S, A>(&self, source: S, action: A) -> Result<ExecutionResult, ExecutorError>
    where
        S: WorkSource + 'static,
        A: Action<S::Item> + 'static,
    {
        let started = Instant::now();
        let plan_id = self.next_plan_id.fetch_add(1, Ordering::Relaxed);
        let plan: Box<dyn PlanHandle> = Box::new(TypedPlan::new(source, action));

        self.shared.coordination.run_with_state_lock(|state| {
            state.queue.add(plan_id)?;
            state.plans.insert(plan_id, plan);
            Ok::<_, ExecutorError>(())
        })?;
        self.shared.coordination.notify_state_change();

        self.maybe_start_workers();

        let (lease, created_lease) = match self.shared.leases.current_worker_lease() {
            Some(lease) => (lease, false),
            None => (self.shared.leases.new_worker_lease(), true),
        };
        let held_on_entry = self
            .shared
            .coordination
            .run_with_state_lock(|state| state.leases.is_locked_by_current_thread(&lease));

        let mut this_plan_only = MergedQueues::new(true);
        this_plan_only.add(plan_id)?;
        ExecutorWorker::new(
            Arc::clone(&self.shared),
            WorkerQueue::Private(this_plan_only),
            Some(lease),
        )
        .run();

        let failures = self.await_completion(plan_id, &lease, held_on_entry);
        if created_lease {
            self.shared.leases.release_thread_lease();
        }

        Ok(ExecutionResult::new(failures, started.elapsed()))
    }

    fn await_completion(
        &self,
        plan_id: PlanId,
        lease: &WorkerLease,
        keep_lease: bool,
    ) -> Vec<Failure> {
        self.shared.coordination.with_state_lock(|state| {
            let SchedulerState {
                plans,
                queue,
                leases,
            } = state;

            let complete = plans
                .get(&plan_id)
                .map_or(true, |plan| plan.all_execution_complete());
            if !complete {
                release_lease(leases, lease);
                return Disposition::Retry;
            }

            // Finishing up needs a worker lease.
            if !leases.try_lock(lease) {
                return Disposition::Retry;
            }

            let mut failures = Vec::new();
            if let Some(plan) = plans.get_mut(&plan_id) {
                plan.collect_failures(&mut failures);
            }
            queue.remove_finished_plans(plans);
            plans.remove(&plan_id);

            if !keep_lease {
                release_lease(leases, lease);
            }
            Disposition::Finished(failures)
        })
    }

    fn maybe_start_workers(&self) {
        if self
            .workers_started
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return;
        }

        debug!("Using {} parallel executor threads", self.executor_count);
        let mut workers = self.workers.lock();
        for index in 1..self.executor_count {
            let worker = ExecutorWorker::new(Arc::clone(&self.shared), WorkerQueue::Shared, None);
            let spawned = thread::Builder::new()
                .name(format!("{} Thread {}", self.thread_name_prefix, index + 1))
                .spawn(move || worker.run());
            match spawned {
                Ok(handle) => workers.push(handle),
                Err(e) => {
                    warn!(
                        error = %ExecutorError::WorkerSpawn(e),
                        "Continuing with fewer executor threads"
                    );
                }
            }
        }
    }

    /// Abort every queued plan if none of them can make progress.
    ///
    /// Logs a diagnostic dump of each plan before failing them with
    /// [`ExecutorError::UnableToMakeProgress`].
    pub fn assert_healthy(&self) {
        let aborted = self.shared.coordination.run_with_state_lock(|state| {
            let SchedulerState { plans, queue, .. } = state;
            queue.assert_healthy(plans)
        });
        if aborted {
            self.shared.coordination.notify_state_change();
        }
    }

    /// Close the shared queue and join the background workers.
    ///
    /// Statistics are reported even when shutdown fails. Calling `stop` more
    /// than once is a no-op.
    pub fn stop(&self) -> Result<(), ExecutorError> {
        if self.stopped.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        let result = self.shutdown();
        self.shared.stats.report();
        result
    }

    fn shutdown(&self) -> Result<(), ExecutorError> {
        let closed = self
            .shared
            .coordination
            .run_with_state_lock(|state| state.queue.close());
        self.shared.coordination.notify_state_change();

        let handles: Vec<JoinHandle<()>> = self.workers.lock().drain(..).collect();
        let panicked = handles
            .into_iter()
            .map(JoinHandle::join)
            .filter(Result::is_err)
            .count();

        closed?;
        if panicked > 0 {
            return Err(ExecutorError::WorkerPanicked(panicked));
        }
        Ok(())
    }
}

impl Drop for PlanExecutor {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            warn!(error = %e, "Plan executor did not shut down cleanly");
        }
    }
}

impl std::fmt::Debug for PlanExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlanExecutor")
            .field("executor_count", &self.executor_count)
            .field("thread_name_prefix", &self.thread_name_prefix)
            .field("stopped", &self.stopped.load(Ordering::Relaxed))
            .finish()
    }
}
