//! Stable re-exports for consumers (`plugins` and external crates).
//!
//! Prefer importing from `dagrun_core::api` instead of reaching into internal modules.

pub use crate::config::{load_default, load_from_path, AppConfig, ExecutorConfig, LoggingConfig};
pub use crate::coordination::CancellationToken;
pub use crate::error::{ExecutorError, Failure, GraphError};
pub use crate::executor::{
    Action, CollectingExecutorStats, DiagnosticNode, Diagnostics, ExecutableTask, ExecutionResult,
    ExecutionState, ExecutorStats, NoOpStats, PlanExecutor, Selection, StatsReport, TaskGraph,
    TaskLike, WorkSource,
};
pub use crate::logging::init_tracing;
pub use crate::taskgraph::{
    ContinueOnFailureHandler, ParallelTaskExecutor, RethrowingFailureHandler, TaskExecutionPlan,
    TaskFailureHandler,
};
