use crate::error::Failure;

/// Decides whether a task failure stops the rest of the plan.
pub trait TaskFailureHandler: Send + Sync {
    /// Return `Err` to abort every task that has not started yet.
    fn on_task_failure(&self, task_id: &str, failure: &Failure) -> Result<(), Failure>;
}

/// Abort the plan on the first failure.
#[derive(Debug, Clone, Copy, Default)]
pub struct RethrowingFailureHandler;

impl TaskFailureHandler for RethrowingFailureHandler {
    fn on_task_failure(&self, task_id: &str, failure: &Failure) -> Result<(), Failure> {
        Err(failure.context(format!("Execution failed for task '{task_id}'")))
    }
}

/// Keep running tasks that do not depend on the failed one.
#[derive(Debug, Clone, Copy, Default)]
pub struct ContinueOnFailureHandler;

impl TaskFailureHandler for ContinueOnFailureHandler {
    fn on_task_failure(&self, _task_id: &str, _failure: &Failure) -> Result<(), Failure> {
        Ok(())
    }
}
