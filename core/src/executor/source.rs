use std::fmt::Debug;

use crate::error::Failure;
use crate::executor::diagnostics::Diagnostics;

/// What a work source (or a queue of them) could do right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExecutionState {
    /// Something may be selectable.
    MaybeWorkReadyToStart,
    /// Nothing is selectable until some running work finishes.
    NoWorkReadyToStart,
    /// Nothing will ever be selectable again.
    NoMoreWorkToStart,
}

/// Result of asking a work source for its next item.
#[derive(Debug)]
pub enum Selection<T> {
    Item(T),
    NoWorkReadyToStart,
    NoMoreWorkToStart,
}

impl<T> Selection<T> {
    pub fn map<U, F>(self, f: F) -> Selection<U>
    where
        F: FnOnce(T) -> U,
    {
        match self {
            Selection::Item(item) => Selection::Item(f(item)),
            Selection::NoWorkReadyToStart => Selection::NoWorkReadyToStart,
            Selection::NoMoreWorkToStart => Selection::NoMoreWorkToStart,
        }
    }

    /// An actual selection, neither of the two "nothing to start" outcomes.
    pub fn is_item(&self) -> bool {
        matches!(self, Selection::Item(_))
    }

    pub fn is_no_more_work_to_start(&self) -> bool {
        matches!(self, Selection::NoMoreWorkToStart)
    }

    pub fn is_no_work_ready_to_start(&self) -> bool {
        matches!(self, Selection::NoWorkReadyToStart)
    }

    pub fn into_item(self) -> Option<T> {
        match self {
            Selection::Item(item) => Some(item),
            _ => None,
        }
    }
}

/// A plan of work items whose dependencies the source tracks itself.
///
/// The executor only calls these methods while holding its state lock, so
/// implementations need no synchronization of their own.
pub trait WorkSource: Send {
    type Item: Send + Debug + 'static;

    /// Cheap probe. Must not select anything.
    fn execution_state(&mut self) -> ExecutionState;

    /// Hand out the next runnable item and mark it as started.
    ///
    /// An `Err` is a bookkeeping failure; the executor aborts every queued
    /// plan with it.
    fn select_next(&mut self) -> Result<Selection<Self::Item>, Failure>;

    /// Record completion of an item previously returned by `select_next`.
    fn finished_executing(
        &mut self,
        item: Self::Item,
        failure: Option<Failure>,
    ) -> Result<(), Failure>;

    /// No item is queued or running.
    fn all_execution_complete(&self) -> bool;

    /// Append the failures recorded so far to `failures`.
    fn collect_failures(&mut self, failures: &mut Vec<Failure>);

    /// Stop handing out items. Running items finish normally.
    fn cancel_execution(&mut self);

    /// Stop handing out items and record `failure` against the plan.
    fn abort_all_and_fail(&mut self, failure: Failure);

    /// Whether anything is selectable, running or finished.
    fn can_make_progress(&self) -> bool;

    fn health_diagnostics(&self) -> Diagnostics;
}

/// The work performed for each selected item.
pub trait Action<T>: Send + Sync {
    fn execute(&self, item: &T) -> anyhow::Result<()>;
}

impl<T, F> Action<T> for F
where
    F: Fn(&T) -> anyhow::Result<()> + Send + Sync,
{
    fn execute(&self, item: &T) -> anyhow::Result<()> {
        self(item)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_selection_predicates() {
        let item = Selection::Item(3);
        assert!(item.is_item());
        assert!(!item.is_no_more_work_to_start());
        assert!(!item.is_no_work_ready_to_start());
        assert_eq!(item.map(|n| n * 2).into_item(), Some(6));

        let waiting: Selection<i32> = Selection::NoWorkReadyToStart;
        assert!(!waiting.is_item());
        assert!(waiting.is_no_work_ready_to_start());
        assert_eq!(waiting.into_item(), None);

        let done: Selection<i32> = Selection::NoMoreWorkToStart;
        assert!(!done.is_item());
        assert!(done.is_no_more_work_to_start());
    }
}
