//! Parallel execution of dependency graphs of work.
//!
//! [`executor::PlanExecutor`] runs any [`executor::WorkSource`] on a bounded
//! pool of worker threads shared by every caller. [`taskgraph`] holds the
//! older group-sharded scheduler.

pub mod api;
pub mod config;
pub mod coordination;
pub mod error;
pub mod executor;
pub mod logging;
pub mod taskgraph;
