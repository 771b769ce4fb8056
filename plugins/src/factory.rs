use std::fmt::Debug;

use dagrun_core::api::{
    AppConfig, CancellationToken, ExecutorConfig, ExecutorError, GraphError, PlanExecutor,
    TaskLike,
};

use crate::source::{FailurePolicy, GraphWorkSource};

pub fn build_plan_executor(
    cfg: &AppConfig,
    cancellation: CancellationToken,
) -> Result<PlanExecutor, ExecutorError> {
    PlanExecutor::new(&cfg.executor, cancellation)
}

pub fn build_failure_policy(cfg: &ExecutorConfig) -> FailurePolicy {
    if cfg.continue_on_failure {
        FailurePolicy::Continue
    } else {
        FailurePolicy::StopOnFirstFailure
    }
}

pub fn build_graph_source<T>(
    name: &str,
    tasks: &[T],
    policy: FailurePolicy,
) -> Result<GraphWorkSource<T>, GraphError>
where
    T: TaskLike + Debug + 'static,
{
    GraphWorkSource::from_tasks(name, tasks, policy)
}
