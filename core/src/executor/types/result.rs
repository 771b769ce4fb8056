use std::time::Duration;

use crate::error::Failure;

/// Result of processing one work source to completion.
#[derive(Debug, Clone, Default)]
pub struct ExecutionResult {
    /// Failures collected from the source, in the order it reported them.
    pub failures: Vec<Failure>,

    /// Wall time from submission until the source completed.
    pub duration: Duration,
}

impl ExecutionResult {
    pub fn new(failures: Vec<Failure>, duration: Duration) -> Self {
        Self { failures, duration }
    }

    pub fn failures(&self) -> &[Failure] {
        &self.failures
    }

    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn duration_ms(&self) -> u64 {
        u64::try_from(self.duration.as_millis()).unwrap_or(u64::MAX)
    }

    /// Convert into a `Result`, keeping the first failure.
    pub fn into_result(self) -> Result<(), Failure> {
        match self.failures.into_iter().next() {
            Some(failure) => Err(failure),
            None => Ok(()),
        }
    }
}
