use std::any::Any;
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use crate::error::{ExecutorError, Failure};
use crate::executor::diagnostics::Diagnostics;
use crate::executor::source::{Action, ExecutionState, Selection, WorkSource};

pub(crate) type PlanId = u64;

/// Every plan submitted to an executor and not yet collected by its caller.
pub(crate) type PlanRegistry = HashMap<PlanId, Box<dyn PlanHandle>>;

/// Object-safe view of a [`WorkSource`] bundled with its [`Action`].
pub(crate) trait PlanHandle: Send {
    fn execution_state(&mut self) -> ExecutionState;
    fn select_next(&mut self) -> Result<Selection<Box<dyn SelectedWork>>, Failure>;
    fn finished_executing(
        &mut self,
        work: Box<dyn SelectedWork>,
        failure: Option<Failure>,
    ) -> Result<(), Failure>;
    fn all_execution_complete(&self) -> bool;
    fn collect_failures(&mut self, failures: &mut Vec<Failure>);
    fn cancel_execution(&mut self);
    fn abort_all_and_fail(&mut self, failure: Failure);
    fn can_make_progress(&self) -> bool;
    fn health_diagnostics(&self) -> Diagnostics;
}

/// An item selected from a plan, ready to run without the state lock.
pub(crate) trait SelectedWork: Send {
    /// Run the action. Errors and panics become the returned failure.
    fn execute(&self) -> Option<Failure>;
    fn describe(&self) -> String;
    fn into_any(self: Box<Self>) -> Box<dyn Any + Send>;
}

/// Selected work tagged with the plan it came from.
pub(crate) struct WorkItem {
    pub plan: PlanId,
    pub work: Box<dyn SelectedWork>,
}

pub(crate) struct TypedPlan<S, A> {
    source: S,
    action: Arc<A>,
}

impl<S, A> TypedPlan<S, A> {
    pub fn new(source: S, action: A) -> Self {
        Self {
            source,
            action: Arc::new(action),
        }
    }
}

struct TypedWork<T, A> {
    item: T,
    action: Arc<A>,
}

impl<T, A> SelectedWork for TypedWork<T, A>
where
    T: Send + std::fmt::Debug + 'static,
    A: Action<T> + 'static,
{
    fn execute(&self) -> Option<Failure> {
        match panic::catch_unwind(AssertUnwindSafe(|| self.action.execute(&self.item))) {
            Ok(Ok(())) => None,
            Ok(Err(error)) => Some(Failure::new(error)),
            Err(payload) => Some(Failure::from_panic(payload)),
        }
    }

    fn describe(&self) -> String {
        format!("{:?}", self.item)
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any + Send> {
        Box::new(self.item)
    }
}

impl<S, A> PlanHandle for TypedPlan<S, A>
where
    S: WorkSource + 'static,
    A: Action<S::Item> + 'static,
{
    fn execution_state(&mut self) -> ExecutionState {
        self.source.execution_state()
    }

    fn select_next(&mut self) -> Result<Selection<Box<dyn SelectedWork>>, Failure> {
        let action = &self.action;
        Ok(self.source.select_next()?.map(|item| {
            Box::new(TypedWork {
                item,
                action: Arc::clone(action),
            }) as Box<dyn SelectedWork>
        }))
    }

    fn finished_executing(
        &mut self,
        work: Box<dyn SelectedWork>,
        failure: Option<Failure>,
    ) -> Result<(), Failure> {
        let item = work
            .into_any()
            .downcast::<S::Item>()
            .map_err(|_| ExecutorError::ForeignWorkItem)?;
        self.source.finished_executing(*item, failure)
    }

    fn all_execution_complete(&self) -> bool {
        self.source.all_execution_complete()
    }

    fn collect_failures(&mut self, failures: &mut Vec<Failure>) {
        self.source.collect_failures(failures)
    }

    fn cancel_execution(&mut self) {
        self.source.cancel_execution()
    }

    fn abort_all_and_fail(&mut self, failure: Failure) {
        self.source.abort_all_and_fail(failure)
    }

    fn can_make_progress(&self) -> bool {
        self.source.can_make_progress()
    }

    fn health_diagnostics(&self) -> Diagnostics {
        self.source.health_diagnostics()
    }
}
