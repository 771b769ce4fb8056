use std::fmt::Debug;

use dagrun_core::api::{
    DiagnosticNode, Diagnostics, ExecutionState, Failure, GraphError, Selection, TaskGraph,
    TaskLike, WorkSource,
};
use tracing::debug;

/// Lifecycle of one node in a [`GraphWorkSource`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeState {
    Queued,
    Executing,
    Succeeded,
    Failed,
    /// Will never run: a dependency failed or was skipped, or the plan
    /// was cancelled or aborted.
    Skipped,
}

impl NodeState {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeState::Queued => "queued",
            NodeState::Executing => "executing",
            NodeState::Succeeded => "succeeded",
            NodeState::Failed => "failed",
            NodeState::Skipped => "skipped",
        }
    }
}

/// What happens to unstarted nodes once a node fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailurePolicy {
    /// Keep starting nodes that do not depend on the failure.
    #[default]
    Continue,
    /// Skip every node that has not started yet.
    StopOnFirstFailure,
}

/// A task handed to the executor, tagged with its position in plan order.
#[derive(Debug, Clone)]
pub struct TaskNode<T> {
    index: usize,
    task: T,
}

impl<T: TaskLike> TaskNode<T> {
    pub fn id(&self) -> &str {
        self.task.id()
    }

    pub fn task(&self) -> &T {
        &self.task
    }

    pub fn index(&self) -> usize {
        self.index
    }
}

/// Work source over a validated task graph.
///
/// Nodes are selected in plan order once every dependency has succeeded.
pub struct GraphWorkSource<T: TaskLike> {
    name: String,
    tasks: Vec<T>,
    dependencies: Vec<Vec<usize>>,
    states: Vec<NodeState>,
    policy: FailurePolicy,
    node_failures: Vec<(usize, Failure)>,
    abort_failures: Vec<Failure>,
    queued: usize,
    executing: usize,
}

impl<T: TaskLike> GraphWorkSource<T> {
    pub fn new(name: impl Into<String>, graph: TaskGraph<T>, policy: FailurePolicy) -> Self {
        let dependencies = graph
            .tasks()
            .map(|task| {
                graph
                    .dependencies_of(task.id())
                    .iter()
                    .filter_map(|dep| graph.index_of(dep))
                    .collect()
            })
            .collect();
        let tasks = graph.into_tasks();
        let count = tasks.len();

        Self {
            name: name.into(),
            tasks,
            dependencies,
            states: vec![NodeState::Queued; count],
            policy,
            node_failures: Vec::new(),
            abort_failures: Vec::new(),
            queued: count,
            executing: 0,
        }
    }

    /// Build the graph from `tasks` and wrap it.
    pub fn from_tasks(
        name: impl Into<String>,
        tasks: &[T],
        policy: FailurePolicy,
    ) -> Result<Self, GraphError> {
        Ok(Self::new(name, TaskGraph::from_tasks(tasks)?, policy))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn policy(&self) -> FailurePolicy {
        self.policy
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn state_of(&self, task_id: &str) -> Option<NodeState> {
        self.tasks
            .iter()
            .position(|task| task.id() == task_id)
            .map(|index| self.states[index])
    }

    fn is_ready(&self, index: usize) -> bool {
        self.states[index] == NodeState::Queued
            && self.dependencies[index]
                .iter()
                .all(|&dep| self.states[dep] == NodeState::Succeeded)
    }

    fn is_blocked(&self, index: usize) -> bool {
        self.dependencies[index]
            .iter()
            .any(|&dep| matches!(self.states[dep], NodeState::Failed | NodeState::Skipped))
    }

    fn skip(&mut self, index: usize) {
        self.states[index] = NodeState::Skipped;
        self.queued -= 1;
    }

    /// Skip queued nodes that can no longer run. Dependencies precede
    /// dependents, so one pass reaches a fixed point.
    fn skip_blocked(&mut self) {
        if self.queued == 0 {
            return;
        }
        for index in 0..self.tasks.len() {
            if self.states[index] == NodeState::Queued && self.is_blocked(index) {
                debug!(
                    task = self.tasks[index].id(),
                    "Skipping task: a dependency did not succeed"
                );
                self.skip(index);
            }
        }
    }

    fn skip_all_queued(&mut self) {
        for index in 0..self.tasks.len() {
            if self.states[index] == NodeState::Queued {
                self.skip(index);
            }
        }
    }

    fn first_ready(&self) -> Option<usize> {
        if self.queued == 0 {
            return None;
        }
        (0..self.tasks.len()).find(|&index| self.is_ready(index))
    }
}

impl<T> WorkSource for GraphWorkSource<T>
where
    T: TaskLike + Debug + 'static,
{
    type Item = TaskNode<T>;

    fn execution_state(&mut self) -> ExecutionState {
        self.skip_blocked();
        if self.queued == 0 {
            ExecutionState::NoMoreWorkToStart
        } else if self.first_ready().is_some() {
            ExecutionState::MaybeWorkReadyToStart
        } else {
            ExecutionState::NoWorkReadyToStart
        }
    }

    fn select_next(&mut self) -> Result<Selection<Self::Item>, Failure> {
        self.skip_blocked();
        let Some(index) = self.first_ready() else {
            return Ok(if self.queued == 0 {
                Selection::NoMoreWorkToStart
            } else {
                Selection::NoWorkReadyToStart
            });
        };

        self.states[index] = NodeState::Executing;
        self.queued -= 1;
        self.executing += 1;
        Ok(Selection::Item(TaskNode {
            index,
            task: self.tasks[index].clone(),
        }))
    }

    fn finished_executing(
        &mut self,
        node: Self::Item,
        failure: Option<Failure>,
    ) -> Result<(), Failure> {
        let index = node.index;
        if self.states.get(index) != Some(&NodeState::Executing) {
            return Err(Failure::msg(format!(
                "task '{}' finished but was not executing",
                node.id()
            )));
        }

        self.executing -= 1;
        match failure {
            None => self.states[index] = NodeState::Succeeded,
            Some(failure) => {
                self.states[index] = NodeState::Failed;
                self.node_failures.push((index, failure));
                if self.policy == FailurePolicy::StopOnFirstFailure {
                    self.skip_all_queued();
                }
            }
        }
        self.skip_blocked();
        Ok(())
    }

    fn all_execution_complete(&self) -> bool {
        self.queued == 0 && self.executing == 0
    }

    fn collect_failures(&mut self, failures: &mut Vec<Failure>) {
        for (index, failure) in &self.node_failures {
            let id = self.tasks[*index].id();
            failures.push(failure.context(format!("Execution failed for task '{id}'")));
        }
        failures.extend(self.abort_failures.iter().cloned());
    }

    fn cancel_execution(&mut self) {
        self.skip_all_queued();
    }

    fn abort_all_and_fail(&mut self, failure: Failure) {
        self.abort_failures.push(failure);
        self.skip_all_queued();
    }

    fn can_make_progress(&self) -> bool {
        self.all_execution_complete()
            || self.executing > 0
            || (0..self.tasks.len()).any(|index| {
                self.states[index] == NodeState::Queued
                    && (self.is_ready(index) || self.is_blocked(index))
            })
    }

    fn health_diagnostics(&self) -> Diagnostics {
        let mut diagnostics = Diagnostics::new(format!("task graph '{}'", self.name));
        for (index, task) in self.tasks.iter().enumerate() {
            match self.states[index] {
                NodeState::Executing => {
                    let label = format!("task '{}' (executing)", task.id());
                    diagnostics.push(DiagnosticNode::new(label));
                }
                NodeState::Queued => {
                    let mut entry = DiagnosticNode::new(format!("task '{}' (queued)", task.id()));
                    for &dep in &self.dependencies[index] {
                        if self.states[dep] != NodeState::Succeeded {
                            entry = entry.with_child(DiagnosticNode::new(format!(
                                "waiting for '{}' ({})",
                                self.tasks[dep].id(),
                                self.states[dep].as_str()
                            )));
                        }
                    }
                    diagnostics.push(entry);
                }
                _ => {}
            }
        }
        diagnostics
    }
}
