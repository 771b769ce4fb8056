use indexmap::IndexMap;
use parking_lot::{Condvar, Mutex};
use tracing::debug;

use crate::error::{Failure, GraphError};
use crate::executor::{TaskGraph, TaskLike};
use crate::taskgraph::failure::{RethrowingFailureHandler, TaskFailureHandler};

/// Lifecycle of a task in a [`TaskExecutionPlan`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskState {
    Ready,
    Executing,
    Succeeded,
    Failed,
}

impl TaskState {
    fn is_complete(self) -> bool {
        matches!(self, TaskState::Succeeded | TaskState::Failed)
    }
}

#[derive(Debug)]
struct TaskInfo<T> {
    task: T,
    dependencies: Vec<usize>,
    state: TaskState,
    failure: Option<Failure>,
}

#[derive(Debug)]
struct PlanState<T> {
    tasks: IndexMap<String, TaskInfo<T>>,
    failure: Option<Failure>,
}

impl<T> PlanState<T> {
    fn dependencies_complete(&self, info: &TaskInfo<T>) -> bool {
        info.dependencies
            .iter()
            .filter_map(|&index| self.tasks.get_index(index))
            .all(|(_, dep)| dep.state.is_complete())
    }

    fn dependencies_failed(&self, info: &TaskInfo<T>) -> bool {
        info.dependencies
            .iter()
            .filter_map(|&index| self.tasks.get_index(index))
            .any(|(_, dep)| dep.state == TaskState::Failed)
    }

    fn all_complete(&self) -> bool {
        self.tasks.values().all(|info| info.state.is_complete())
    }
}

/// A shared plan of tasks that worker threads pull from.
///
/// Building the plan (`add_to_task_graph`, `use_filter`, `clear`) needs
/// `&mut self`; executing it is safe from many threads at once.
pub struct TaskExecutionPlan<T: TaskLike> {
    state: Mutex<PlanState<T>>,
    changed: Condvar,
    filter: Box<dyn Fn(&T) -> bool + Send + Sync>,
    failure_handler: Box<dyn TaskFailureHandler>,
}

impl<T: TaskLike> Default for TaskExecutionPlan<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: TaskLike> TaskExecutionPlan<T> {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(PlanState {
                tasks: IndexMap::new(),
                failure: None,
            }),
            changed: Condvar::new(),
            filter: Box::new(|_| true),
            failure_handler: Box::new(RethrowingFailureHandler),
        }
    }

    /// Add `tasks` and their dependencies to the plan.
    ///
    /// Dependencies may refer to tasks already in the plan. Tasks already
    /// present are not added twice.
    pub fn add_to_task_graph(&mut self, tasks: &[T]) -> Result<(), GraphError> {
        let state = self.state.get_mut();

        let mut candidates: Vec<T> = state.tasks.values().map(|info| info.task.clone()).collect();
        candidates.extend(
            tasks
                .iter()
                .filter(|task| !state.tasks.contains_key(task.id()))
                .cloned(),
        );
        // The filter only applies to new tasks; planned ones keep their edges.
        let filter = &self.filter;
        let planned = &state.tasks;
        let graph = TaskGraph::build(&candidates, |task| {
            planned.contains_key(task.id()) || filter(task)
        })?;

        for task in graph.tasks() {
            if state.tasks.contains_key(task.id()) {
                continue;
            }
            let dependencies = graph
                .dependencies_of(task.id())
                .iter()
                .filter_map(|dep| state.tasks.get_index_of(dep.as_str()))
                .collect();
            state.tasks.insert(
                task.id().to_string(),
                TaskInfo {
                    task: task.clone(),
                    dependencies,
                    state: TaskState::Ready,
                    failure: None,
                },
            );
        }
        Ok(())
    }

    /// Only tasks accepted by `filter` are added from now on.
    pub fn use_filter<F>(&mut self, filter: F)
    where
        F: Fn(&T) -> bool + Send + Sync + 'static,
    {
        self.filter = Box::new(filter);
    }

    pub fn use_failure_handler<H>(&mut self, handler: H)
    where
        H: TaskFailureHandler + 'static,
    {
        self.failure_handler = Box::new(handler);
    }

    pub fn clear(&mut self) {
        let state = self.state.get_mut();
        state.tasks.clear();
        state.failure = None;
    }

    /// Tasks in execution order.
    pub fn tasks(&self) -> Vec<T> {
        self.state
            .lock()
            .tasks
            .values()
            .map(|info| info.task.clone())
            .collect()
    }

    pub fn task_state(&self, task_id: &str) -> Option<TaskState> {
        self.state.lock().tasks.get(task_id).map(|info| info.state)
    }

    /// Failures recorded against individual tasks, in plan order.
    pub fn task_failures(&self) -> Vec<(String, Failure)> {
        self.state
            .lock()
            .tasks
            .iter()
            .filter_map(|(id, info)| info.failure.clone().map(|f| (id.clone(), f)))
            .collect()
    }

    /// Block until a task matching `criteria` can run and mark it executing.
    ///
    /// Returns `None` once no ready task matches. A task whose dependencies
    /// failed is failed silently and never returned.
    pub fn get_task_to_execute<F>(&self, criteria: F) -> Option<T>
    where
        F: Fn(&T) -> bool,
    {
        let mut state = self.state.lock();
        loop {
            let mut candidate_waiting = false;
            let mut runnable = None;
            for (index, (_, info)) in state.tasks.iter().enumerate() {
                if info.state != TaskState::Ready || !criteria(&info.task) {
                    continue;
                }
                if state.dependencies_complete(info) {
                    runnable = Some(index);
                    break;
                }
                candidate_waiting = true;
            }

            let Some(index) = runnable else {
                if !candidate_waiting {
                    return None;
                }
                self.changed.wait(&mut state);
                continue;
            };

            let dependencies_failed = state
                .tasks
                .get_index(index)
                .is_some_and(|(_, info)| state.dependencies_failed(info));
            let Some((id, info)) = state.tasks.get_index_mut(index) else {
                continue;
            };
            if dependencies_failed {
                debug!(task = %id, "Skipping task: a dependency failed");
                info.state = TaskState::Failed;
                self.changed.notify_all();
                continue;
            }
            info.state = TaskState::Executing;
            return Some(info.task.clone());
        }
    }

    pub fn task_complete(&self, task_id: &str) -> Result<(), GraphError> {
        let mut state = self.state.lock();
        let info = state
            .tasks
            .get_mut(task_id)
            .ok_or_else(|| GraphError::UnknownTask(task_id.to_string()))?;
        info.state = TaskState::Succeeded;
        self.changed.notify_all();
        Ok(())
    }

    /// Record a failure and consult the failure handler.
    pub fn task_failed(&self, task_id: &str, failure: Failure) -> Result<(), GraphError> {
        let mut state = self.state.lock();
        let info = state
            .tasks
            .get_mut(task_id)
            .ok_or_else(|| GraphError::UnknownTask(task_id.to_string()))?;
        info.state = TaskState::Failed;
        info.failure = Some(failure.clone());

        if let Err(abort) = self.failure_handler.on_task_failure(task_id, &failure) {
            Self::abort_execution(&mut state, abort);
        }
        self.changed.notify_all();
        Ok(())
    }

    fn abort_execution(state: &mut PlanState<T>, failure: Failure) {
        for info in state.tasks.values_mut() {
            if info.state == TaskState::Ready {
                info.state = TaskState::Failed;
            }
        }
        state.failure.get_or_insert(failure);
    }

    /// Block until every task has completed; return the abort failure, if any.
    pub fn await_completion(&self) -> Result<(), Failure> {
        let mut state = self.state.lock();
        while !state.all_complete() {
            self.changed.wait(&mut state);
        }
        match &state.failure {
            Some(failure) => Err(failure.clone()),
            None => Ok(()),
        }
    }
}
