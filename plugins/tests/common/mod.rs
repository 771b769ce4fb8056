#![allow(dead_code)]

use std::sync::Arc;
use std::time::{Duration, Instant};

use dagrun_core::api::{ExecutableTask, ExecutorConfig};
use dagrun_plugins::source::TaskNode;
use parking_lot::Mutex;

/// One action invocation.
#[derive(Debug, Clone)]
pub struct Run {
    pub id: String,
    pub start: Instant,
    pub end: Instant,
}

/// Shared record of every action invocation, in completion order.
#[derive(Debug, Clone, Default)]
pub struct RunLog(Arc<Mutex<Vec<Run>>>);

impl RunLog {
    /// An action that sleeps for `delay`, records itself and fails for the
    /// ids in `failing`.
    pub fn action(
        &self,
        delay: Duration,
        failing: &[&str],
    ) -> impl Fn(&TaskNode<ExecutableTask>) -> anyhow::Result<()> + Send + Sync + 'static {
        let runs = Arc::clone(&self.0);
        let failing: Vec<String> = failing.iter().map(|s| s.to_string()).collect();
        move |node: &TaskNode<ExecutableTask>| {
            let start = Instant::now();
            std::thread::sleep(delay);
            runs.lock().push(Run {
                id: node.id().to_string(),
                start,
                end: Instant::now(),
            });
            if failing.iter().any(|f| f == node.id()) {
                anyhow::bail!("boom");
            }
            Ok(())
        }
    }

    pub fn runs(&self) -> Vec<Run> {
        self.0.lock().clone()
    }

    pub fn ids(&self) -> Vec<String> {
        self.0.lock().iter().map(|r| r.id.clone()).collect()
    }
}

pub fn task(id: &str, deps: &[&str]) -> ExecutableTask {
    ExecutableTask::new(id).depends_on(deps.iter().copied())
}

pub fn independent(prefix: &str, count: usize) -> Vec<ExecutableTask> {
    (0..count)
        .map(|i| ExecutableTask::new(format!("{prefix}{i}")))
        .collect()
}

pub fn config(max_workers: usize) -> ExecutorConfig {
    ExecutorConfig::with_max_workers(max_workers)
}
