pub mod graph;

pub use graph::{FailurePolicy, GraphWorkSource, NodeState, TaskNode};
