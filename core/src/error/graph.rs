use thiserror::Error;

/// Errors raised while building a task graph.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GraphError {
    #[error("Duplicate task ID: {0}")]
    DuplicateTaskId(String),

    #[error("Dependency not found: task '{task_id}' depends on '{missing_dep}'")]
    DependencyNotFound { task_id: String, missing_dep: String },

    #[error("Circular dependency between tasks. Cycle includes [{from}, {to}].")]
    CircularReference { from: String, to: String },

    #[error("Unknown task: {0}")]
    UnknownTask(String),
}
