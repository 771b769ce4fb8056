use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::info;

/// Environment variable that turns on worker statistics.
pub const STATS_ENV_VAR: &str = "DAGRUN_EXECUTOR_STATS";

/// Collects timing statistics for the executor's workers.
pub trait ExecutorStats: Send + Sync {
    /// Called once per worker, on the thread that creates it.
    fn start_worker(&self) -> Box<dyn WorkerStats>;

    /// Log the collected statistics and reset them.
    fn report(&self) -> Option<StatsReport>;
}

/// Per-worker timing hooks. Every hook defaults to a no-op.
pub trait WorkerStats: Send {
    fn start_select(&mut self) {}
    fn finish_select(&mut self) {}
    fn start_execute(&mut self) {}
    fn finish_execute(&mut self) {}
    fn start_mark_finished(&mut self) {}
    fn finish_mark_finished(&mut self) {}
    fn finish(self: Box<Self>) {}
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpStats;

impl ExecutorStats for NoOpStats {
    fn start_worker(&self) -> Box<dyn WorkerStats> {
        Box::new(NoOpStats)
    }

    fn report(&self) -> Option<StatsReport> {
        None
    }
}

impl WorkerStats for NoOpStats {}

/// Averages over every worker that finished since the last report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatsReport {
    pub worker_count: usize,
    pub average_lifetime: Duration,
    pub average_select: Duration,
    pub average_execute: Duration,
    pub average_mark_finished: Duration,
}

#[derive(Debug, Clone, Copy, Default)]
struct WorkerTimings {
    lifetime: Duration,
    select: Duration,
    execute: Duration,
    mark_finished: Duration,
}

#[derive(Debug, Default)]
pub struct CollectingExecutorStats {
    finished: Arc<Mutex<Vec<WorkerTimings>>>,
    last_report: Mutex<Option<StatsReport>>,
}

impl CollectingExecutorStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// The most recent report, kept after the collected timings are reset.
    pub fn last_report(&self) -> Option<StatsReport> {
        self.last_report.lock().clone()
    }
}

impl ExecutorStats for CollectingExecutorStats {
    fn start_worker(&self) -> Box<dyn WorkerStats> {
        Box::new(CollectingWorkerStats {
            created: Instant::now(),
            phase_started: None,
            timings: WorkerTimings::default(),
            sink: Arc::clone(&self.finished),
        })
    }

    fn report(&self) -> Option<StatsReport> {
        let workers = std::mem::take(&mut *self.finished.lock());
        if workers.is_empty() {
            return None;
        }

        let count = workers.len();
        let average = |f: fn(&WorkerTimings) -> Duration| {
            let total: Duration = workers.iter().map(f).sum();
            total / u32::try_from(count).unwrap_or(u32::MAX)
        };
        let report = StatsReport {
            worker_count: count,
            average_lifetime: average(|w| w.lifetime),
            average_select: average(|w| w.select),
            average_execute: average(|w| w.execute),
            average_mark_finished: average(|w| w.mark_finished),
        };

        info!("WORKER THREAD STATISTICS");
        info!("worker count: {}", report.worker_count);
        info!("average worker time: {}", format_millis(report.average_lifetime));
        info!("average select time: {}", format_millis(report.average_select));
        info!("average execute time: {}", format_millis(report.average_execute));
        info!(
            "average mark finished time: {}",
            format_millis(report.average_mark_finished)
        );

        *self.last_report.lock() = Some(report.clone());
        Some(report)
    }
}

struct CollectingWorkerStats {
    created: Instant,
    phase_started: Option<Instant>,
    timings: WorkerTimings,
    sink: Arc<Mutex<Vec<WorkerTimings>>>,
}

impl CollectingWorkerStats {
    fn elapsed_phase(&mut self) -> Duration {
        self.phase_started
            .take()
            .map(|started| started.elapsed())
            .unwrap_or_default()
    }
}

impl WorkerStats for CollectingWorkerStats {
    fn start_select(&mut self) {
        self.phase_started = Some(Instant::now());
    }

    fn finish_select(&mut self) {
        let elapsed = self.elapsed_phase();
        self.timings.select += elapsed;
    }

    fn start_execute(&mut self) {
        self.phase_started = Some(Instant::now());
    }

    fn finish_execute(&mut self) {
        let elapsed = self.elapsed_phase();
        self.timings.execute += elapsed;
    }

    fn start_mark_finished(&mut self) {
        self.phase_started = Some(Instant::now());
    }

    fn finish_mark_finished(&mut self) {
        let elapsed = self.elapsed_phase();
        self.timings.mark_finished += elapsed;
    }

    fn finish(mut self: Box<Self>) {
        self.timings.lifetime = self.created.elapsed();
        self.sink.lock().push(self.timings);
    }
}

/// Whole milliseconds, rounded half up.
fn format_millis(duration: Duration) -> String {
    format!("{}ms", (duration.as_nanos() + 500_000) / 1_000_000)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_noop_reports_nothing() {
        let stats = NoOpStats;
        let mut worker = stats.start_worker();
        worker.start_select();
        worker.finish_select();
        worker.finish();
        assert!(stats.report().is_none());
    }

    #[test]
    fn test_collecting_stats_averages_workers() {
        let stats = CollectingExecutorStats::new();
        for _ in 0..2 {
            let mut worker = stats.start_worker();
            worker.start_execute();
            std::thread::sleep(Duration::from_millis(5));
            worker.finish_execute();
            worker.finish();
        }

        let report = stats.report().expect("two workers finished");
        assert_eq!(report.worker_count, 2);
        assert!(report.average_execute >= Duration::from_millis(5));
        assert!(report.average_lifetime >= report.average_execute);
        assert_eq!(stats.last_report(), Some(report));

        // Timings reset after a report.
        assert!(stats.report().is_none());
    }

    #[test]
    fn test_phases_accumulate_across_items() {
        let stats = CollectingExecutorStats::new();
        let mut worker = stats.start_worker();
        for _ in 0..2 {
            worker.start_select();
            std::thread::sleep(Duration::from_millis(2));
            worker.finish_select();
            worker.start_mark_finished();
            std::thread::sleep(Duration::from_millis(2));
            worker.finish_mark_finished();
        }
        // A finish without a matching start adds nothing.
        worker.finish_execute();
        worker.finish();

        let report = stats.report().expect("one worker finished");
        assert_eq!(report.worker_count, 1);
        assert!(report.average_select >= Duration::from_millis(4));
        assert!(report.average_mark_finished >= Duration::from_millis(4));
        assert_eq!(report.average_execute, Duration::ZERO);
    }

    #[test]
    fn test_unfinished_workers_are_not_reported() {
        let stats = CollectingExecutorStats::new();
        let _worker = stats.start_worker();
        assert!(stats.report().is_none());
    }

    #[test]
    fn test_format_millis_rounds_half_up() {
        assert_eq!(format_millis(Duration::from_micros(1_499)), "1ms");
        assert_eq!(format_millis(Duration::from_micros(1_500)), "2ms");
    }
}
