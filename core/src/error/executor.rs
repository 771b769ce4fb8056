use thiserror::Error;

/// Errors raised by the scheduler itself, as opposed to failures of the work it runs.
#[derive(Error, Debug)]
pub enum ExecutorError {
    #[error("Not a valid number of parallel executors: {0}")]
    InvalidWorkerCount(usize),

    #[error("This queue has been closed.")]
    QueueClosed,

    #[error("Not all work has completed: {0} plan(s) still queued")]
    PlansStillActive(usize),

    #[error("Unable to make progress running work. There are items queued for execution but none of them can be started")]
    UnableToMakeProgress,

    #[error("worker lease is held by another thread")]
    LeaseNotOwned,

    #[error("work item was returned to a plan that did not select it")]
    ForeignWorkItem,

    #[error("failed to spawn executor thread: {0}")]
    WorkerSpawn(#[source] std::io::Error),

    #[error("{0} executor thread(s) panicked")]
    WorkerPanicked(usize),
}
