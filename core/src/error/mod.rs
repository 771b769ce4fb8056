pub mod executor;
pub mod failure;
pub mod graph;

pub use executor::ExecutorError;
pub use failure::Failure;
pub use graph::GraphError;
