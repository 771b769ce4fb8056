//! Group-sharded task execution over a single shared plan.
//!
//! An older scheduling model kept alongside [`crate::executor`]: tasks are
//! grouped (by project, say), each group is pinned to one worker thread, and
//! workers block on the plan until a task of theirs becomes runnable.

mod failure;
mod parallel;
mod plan;

pub use failure::{ContinueOnFailureHandler, RethrowingFailureHandler, TaskFailureHandler};
pub use parallel::ParallelTaskExecutor;
pub use plan::{TaskExecutionPlan, TaskState};
