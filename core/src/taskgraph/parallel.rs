use std::collections::HashSet;
use std::panic::{self, AssertUnwindSafe};
use std::thread;

use tracing::{debug, info, warn};

use crate::error::{ExecutorError, Failure};
use crate::executor::{Action, TaskLike};
use crate::taskgraph::plan::TaskExecutionPlan;

/// Runs a [`TaskExecutionPlan`] with one thread per group shard.
///
/// Groups are dealt round-robin to `min(executor_count, groups)` workers,
/// so all tasks of one group run on the same thread.
#[derive(Debug, Clone, Copy)]
pub struct ParallelTaskExecutor {
    executor_count: usize,
}

impl ParallelTaskExecutor {
    pub fn new(executor_count: usize) -> Result<Self, ExecutorError> {
        if executor_count < 1 {
            return Err(ExecutorError::InvalidWorkerCount(executor_count));
        }
        Ok(Self { executor_count })
    }

    pub fn executor_count(&self) -> usize {
        self.executor_count
    }

    /// Execute every task in `plan` and wait for completion.
    pub fn process<T, A>(&self, plan: &TaskExecutionPlan<T>, action: A) -> Result<(), Failure>
    where
        T: TaskLike,
        A: Action<T>,
    {
        let mut seen = HashSet::new();
        let groups: Vec<String> = plan
            .tasks()
            .iter()
            .map(|task| task.group().to_string())
            .filter(|group| seen.insert(group.clone()))
            .collect();

        let worker_count = self.executor_count.min(groups.len());
        debug!(
            "Using {} parallel executor threads for {} groups",
            worker_count,
            groups.len()
        );

        thread::scope(|scope| {
            for shard in 0..worker_count {
                let assigned: HashSet<&str> = groups
                    .iter()
                    .skip(shard)
                    .step_by(worker_count)
                    .map(String::as_str)
                    .collect();
                let action = &action;
                scope.spawn(move || run_shard(plan, &assigned, action));
            }
        });

        plan.await_completion()
    }
}

fn run_shard<T, A>(plan: &TaskExecutionPlan<T>, groups: &HashSet<&str>, action: &A)
where
    T: TaskLike,
    A: Action<T>,
{
    while let Some(task) = plan.get_task_to_execute(|task| groups.contains(task.group())) {
        info!(task = task.id(), group = task.group(), "Executing task");
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| action.execute(&task)));
        let recorded = match outcome {
            Ok(Ok(())) => plan.task_complete(task.id()),
            Ok(Err(error)) => plan.task_failed(task.id(), Failure::new(error)),
            Err(payload) => plan.task_failed(task.id(), Failure::from_panic(payload)),
        };
        if let Err(e) = recorded {
            warn!(task = task.id(), error = %e, "Could not record task outcome");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::ExecutableTask;
    use parking_lot::Mutex;
    use std::collections::HashMap;
    use std::thread::ThreadId;

    fn task(id: &str, group: &str, deps: &[&str]) -> ExecutableTask {
        ExecutableTask::new(id)
            .in_group(group)
            .depends_on(deps.iter().copied())
    }

    #[test]
    fn test_rejects_zero_executors() {
        assert!(matches!(
            ParallelTaskExecutor::new(0),
            Err(ExecutorError::InvalidWorkerCount(0))
        ));
    }

    #[test]
    fn test_group_runs_on_one_thread() {
        let mut plan = TaskExecutionPlan::new();
        plan.add_to_task_graph(&[
            task("a1", "a", &[]),
            task("b1", "b", &[]),
            task("a2", "a", &["b1"]),
            task("b2", "b", &["a1"]),
            task("c1", "c", &[]),
        ])
        .unwrap();

        let threads: Mutex<HashMap<String, Vec<ThreadId>>> = Mutex::new(HashMap::new());
        let executor = ParallelTaskExecutor::new(2).unwrap();
        executor
            .process(&plan, |t: &ExecutableTask| -> anyhow::Result<()> {
                threads
                    .lock()
                    .entry(t.group.clone())
                    .or_default()
                    .push(thread::current().id());
                Ok(())
            })
            .unwrap();

        let threads = threads.into_inner();
        assert_eq!(threads.values().map(Vec::len).sum::<usize>(), 5);
        for ids in threads.values() {
            assert!(ids.windows(2).all(|w| w[0] == w[1]));
        }
    }

    #[test]
    fn test_failure_is_rethrown() {
        let mut plan = TaskExecutionPlan::new();
        plan.add_to_task_graph(&[task("a", "", &[]), task("b", "", &["a"])])
            .unwrap();

        let executor = ParallelTaskExecutor::new(4).unwrap();
        let failure = executor
            .process(&plan, |t: &ExecutableTask| -> anyhow::Result<()> {
                if t.id == "a" {
                    anyhow::bail!("boom");
                }
                Ok(())
            })
            .unwrap_err();

        assert!(format!("{failure:#}").contains("boom"));
        assert_eq!(plan.task_state("b"), Some(crate::taskgraph::TaskState::Failed));
    }

    #[test]
    fn test_panicking_task_fails() {
        let mut plan = TaskExecutionPlan::new();
        plan.add_to_task_graph(&[task("a", "", &[])]).unwrap();

        let executor = ParallelTaskExecutor::new(1).unwrap();
        let failure = executor
            .process(&plan, |_: &ExecutableTask| -> anyhow::Result<()> { panic!("kaboom") })
            .unwrap_err();
        assert!(format!("{failure:#}").contains("kaboom"));
    }

    #[test]
    fn test_empty_plan_completes() {
        let plan: TaskExecutionPlan<ExecutableTask> = TaskExecutionPlan::new();
        ParallelTaskExecutor::new(3)
            .unwrap()
            .process(&plan, |_: &ExecutableTask| -> anyhow::Result<()> { Ok(()) })
            .unwrap();
    }
}
