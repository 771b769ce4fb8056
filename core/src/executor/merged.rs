use std::collections::VecDeque;

use tracing::error;

use crate::error::{ExecutorError, Failure};
use crate::executor::diagnostics::TreeFormatter;
use crate::executor::plan::{PlanId, PlanRegistry, WorkItem};
use crate::executor::source::{ExecutionState, Selection};

/// Ordered view over several plans, presented as a single work source.
///
/// The queue only holds plan ids; the plans themselves live in the
/// [`PlanRegistry`] passed to every call. Ids missing from the registry are
/// dropped as they are encountered.
#[derive(Debug)]
pub(crate) struct MergedQueues {
    queues: VecDeque<PlanId>,
    auto_finish: bool,
    finished: bool,
}

impl MergedQueues {
    /// With `auto_finish`, an empty queue reports `NoMoreWorkToStart`.
    /// Otherwise it waits for more plans until [`close`](Self::close) is called.
    pub fn new(auto_finish: bool) -> Self {
        Self {
            queues: VecDeque::new(),
            auto_finish,
            finished: false,
        }
    }

    pub fn len(&self) -> usize {
        self.queues.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queues.is_empty()
    }

    fn no_plans_state(&self) -> ExecutionState {
        if self.finished || self.auto_finish {
            ExecutionState::NoMoreWorkToStart
        } else {
            ExecutionState::NoWorkReadyToStart
        }
    }

    pub fn execution_state(&mut self, plans: &mut PlanRegistry) -> ExecutionState {
        let mut index = 0;
        while let Some(&id) = self.queues.get(index) {
            let Some(plan) = plans.get_mut(&id) else {
                self.queues.remove(index);
                continue;
            };
            match plan.execution_state() {
                ExecutionState::MaybeWorkReadyToStart => {
                    return ExecutionState::MaybeWorkReadyToStart;
                }
                ExecutionState::NoMoreWorkToStart if plan.all_execution_complete() => {
                    self.queues.remove(index);
                    continue;
                }
                _ => index += 1,
            }
        }

        if self.queues.is_empty() {
            self.no_plans_state()
        } else {
            ExecutionState::NoWorkReadyToStart
        }
    }

    /// Select from the first plan, newest first, that yields an item.
    pub fn select_next(
        &mut self,
        plans: &mut PlanRegistry,
    ) -> Result<Selection<WorkItem>, Failure> {
        let mut index = 0;
        while let Some(&id) = self.queues.get(index) {
            let Some(plan) = plans.get_mut(&id) else {
                self.queues.remove(index);
                continue;
            };
            let selection = plan.select_next()?;
            if selection.is_item() {
                return Ok(selection.map(|work| WorkItem { plan: id, work }));
            }
            if selection.is_no_more_work_to_start() && plan.all_execution_complete() {
                self.queues.remove(index);
            } else {
                index += 1;
            }
        }

        Ok(if self.queues.is_empty() && (self.finished || self.auto_finish) {
            Selection::NoMoreWorkToStart
        } else {
            Selection::NoWorkReadyToStart
        })
    }

    /// Put `plan` at the front of the queue. The caller notifies waiters.
    pub fn add(&mut self, plan: PlanId) -> Result<(), ExecutorError> {
        if self.finished {
            return Err(ExecutorError::QueueClosed);
        }
        self.queues.push_front(plan);
        Ok(())
    }

    pub fn remove_finished_plans(&mut self, plans: &PlanRegistry) {
        self.queues.retain(|id| {
            plans
                .get(id)
                .is_some_and(|plan| !plan.all_execution_complete())
        });
    }

    /// Refuse new plans. Fails if any plan is still queued.
    pub fn close(&mut self) -> Result<(), ExecutorError> {
        self.finished = true;
        if self.is_empty() {
            Ok(())
        } else {
            Err(ExecutorError::PlansStillActive(self.len()))
        }
    }

    /// Returns `true` if cancelling completed any plan.
    pub fn cancel_execution(&self, plans: &mut PlanRegistry) -> bool {
        let mut completed = false;
        for id in &self.queues {
            if let Some(plan) = plans.get_mut(id) {
                let was_complete = plan.all_execution_complete();
                plan.cancel_execution();
                completed |= !was_complete && plan.all_execution_complete();
            }
        }
        completed
    }

    pub fn abort_all_and_fail(&self, plans: &mut PlanRegistry, failure: Failure) {
        for id in &self.queues {
            if let Some(plan) = plans.get_mut(id) {
                plan.abort_all_and_fail(failure.clone());
            }
        }
    }

    /// Abort every queued plan if none of them can make progress.
    ///
    /// Returns `true` if the queue was aborted; the caller notifies waiters.
    pub fn assert_healthy(&self, plans: &mut PlanRegistry) -> bool {
        let queued: Vec<PlanId> = self
            .queues
            .iter()
            .copied()
            .filter(|id| plans.contains_key(id))
            .collect();
        if queued.is_empty() {
            return false;
        }
        if queued
            .iter()
            .filter_map(|id| plans.get(id))
            .any(|plan| plan.can_make_progress())
        {
            return false;
        }

        let mut formatter = TreeFormatter::new();
        formatter.node(
            "Unable to make progress running work. The following items are queued for execution but none of them can be started:",
        );
        formatter.start_children();
        for plan in queued.iter().filter_map(|id| plans.get(id)) {
            plan.health_diagnostics().describe_to(&mut formatter);
        }
        formatter.end_children();
        error!("{}", formatter);

        self.abort_all_and_fail(plans, ExecutorError::UnableToMakeProgress.into());
        true
    }
}
