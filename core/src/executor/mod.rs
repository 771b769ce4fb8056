//! Parallel execution of dependency-aware work sources.
//!
//! # Architecture
//!
//! ```text
//! PlanExecutor::process(source, action)
//!   ↓
//! shared MergedQueues (newest plan first) ← background ExecutorWorkers
//!   ↓
//! private MergedQueues (this plan only)   ← calling thread's ExecutorWorker
//!   ↓
//! await completion → ExecutionResult { failures }
//! ```
//!
//! All queue and plan state sits behind one coordination lock. A worker
//! needs a worker lease to select and run an item; the number of leases
//! bounds parallelism across every caller of the same executor.

mod diagnostics;
mod graph;
mod merged;
mod plan;
mod plan_executor;
mod source;
mod stats;
pub mod types;
mod worker;

pub use diagnostics::{DiagnosticNode, Diagnostics, TreeFormatter};
pub use graph::TaskGraph;
pub use plan_executor::PlanExecutor;
pub use source::{Action, ExecutionState, Selection, WorkSource};
pub use stats::{
    CollectingExecutorStats, ExecutorStats, NoOpStats, StatsReport, WorkerStats, STATS_ENV_VAR,
};
pub use types::{ExecutableTask, ExecutionResult, TaskLike};
