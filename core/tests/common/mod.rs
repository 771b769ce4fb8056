#![allow(dead_code)]

use std::sync::Arc;
use std::time::{Duration, Instant};

use dagrun_core::api::{
    DiagnosticNode, Diagnostics, ExecutionState, ExecutorConfig, Failure, Selection, WorkSource,
};
use parking_lot::Mutex;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Selected(String),
    Finished(String),
}

pub type EventLog = Arc<Mutex<Vec<Event>>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NodeState {
    Queued,
    Running,
    Done,
    Failed,
    Skipped,
}

/// A small DAG source that records every selection and completion.
///
/// Nodes must be listed after their dependencies.
pub struct RecordingSource {
    name: String,
    nodes: Vec<(String, Vec<usize>)>,
    states: Vec<NodeState>,
    failures: Vec<Failure>,
    log: EventLog,
}

impl RecordingSource {
    pub fn new(name: &str, nodes: &[(&str, &[&str])]) -> Self {
        let mut indexed: Vec<(String, Vec<usize>)> = Vec::new();
        for (id, deps) in nodes {
            let deps = deps
                .iter()
                .map(|dep| {
                    indexed
                        .iter()
                        .position(|(n, _)| n == dep)
                        .unwrap_or_else(|| panic!("'{dep}' must be listed before '{id}'"))
                })
                .collect();
            indexed.push((id.to_string(), deps));
        }
        Self {
            name: name.to_string(),
            states: vec![NodeState::Queued; indexed.len()],
            nodes: indexed,
            failures: Vec::new(),
            log: EventLog::default(),
        }
    }

    /// `count` independent nodes named `<prefix>0`, `<prefix>1`, ...
    pub fn independent(name: &str, prefix: &str, count: usize) -> Self {
        let ids: Vec<String> = (0..count).map(|i| format!("{prefix}{i}")).collect();
        let nodes: Vec<(&str, &[&str])> = ids.iter().map(|id| (id.as_str(), &[][..])).collect();
        Self::new(name, &nodes)
    }

    pub fn log(&self) -> EventLog {
        Arc::clone(&self.log)
    }

    fn is_ready(&self, index: usize) -> bool {
        self.states[index] == NodeState::Queued
            && self.nodes[index]
                .1
                .iter()
                .all(|&dep| self.states[dep] == NodeState::Done)
    }

    fn is_blocked(&self, index: usize) -> bool {
        self.nodes[index]
            .1
            .iter()
            .any(|&dep| matches!(self.states[dep], NodeState::Failed | NodeState::Skipped))
    }

    fn skip_blocked(&mut self) {
        for index in 0..self.nodes.len() {
            if self.states[index] == NodeState::Queued && self.is_blocked(index) {
                self.states[index] = NodeState::Skipped;
            }
        }
    }

    fn skip_queued(&mut self) {
        for state in &mut self.states {
            if *state == NodeState::Queued {
                *state = NodeState::Skipped;
            }
        }
    }

    fn any_queued(&self) -> bool {
        self.states.contains(&NodeState::Queued)
    }
}

impl WorkSource for RecordingSource {
    type Item = String;

    fn execution_state(&mut self) -> ExecutionState {
        self.skip_blocked();
        if !self.any_queued() {
            ExecutionState::NoMoreWorkToStart
        } else if (0..self.nodes.len()).any(|i| self.is_ready(i)) {
            ExecutionState::MaybeWorkReadyToStart
        } else {
            ExecutionState::NoWorkReadyToStart
        }
    }

    fn select_next(&mut self) -> Result<Selection<String>, Failure> {
        self.skip_blocked();
        match (0..self.nodes.len()).find(|&i| self.is_ready(i)) {
            Some(index) => {
                self.states[index] = NodeState::Running;
                let id = self.nodes[index].0.clone();
                self.log.lock().push(Event::Selected(id.clone()));
                Ok(Selection::Item(id))
            }
            None if self.any_queued() => Ok(Selection::NoWorkReadyToStart),
            None => Ok(Selection::NoMoreWorkToStart),
        }
    }

    fn finished_executing(
        &mut self,
        item: String,
        failure: Option<Failure>,
    ) -> Result<(), Failure> {
        let index = self
            .nodes
            .iter()
            .position(|(id, _)| *id == item)
            .ok_or_else(|| Failure::msg(format!("unknown node {item}")))?;
        if self.states[index] != NodeState::Running {
            return Err(Failure::msg(format!("node {item} finished but was not running")));
        }
        self.log.lock().push(Event::Finished(item.clone()));
        self.states[index] = match failure {
            Some(failure) => {
                self.failures
                    .push(failure.context(format!("node '{item}' failed")));
                NodeState::Failed
            }
            None => NodeState::Done,
        };
        Ok(())
    }

    fn all_execution_complete(&self) -> bool {
        !self
            .states
            .iter()
            .any(|s| matches!(s, NodeState::Queued | NodeState::Running))
    }

    fn collect_failures(&mut self, failures: &mut Vec<Failure>) {
        failures.extend(self.failures.iter().cloned());
    }

    fn cancel_execution(&mut self) {
        self.skip_queued();
    }

    fn abort_all_and_fail(&mut self, failure: Failure) {
        self.skip_queued();
        self.failures.push(failure);
    }

    fn can_make_progress(&self) -> bool {
        self.all_execution_complete()
            || self.states.contains(&NodeState::Running)
            || (0..self.nodes.len()).any(|i| self.is_ready(i) || self.is_blocked(i))
    }

    fn health_diagnostics(&self) -> Diagnostics {
        let mut diagnostics = Diagnostics::new(self.name.clone());
        for (index, (id, _)) in self.nodes.iter().enumerate() {
            if self.states[index] == NodeState::Queued {
                diagnostics.push(DiagnosticNode::new(format!("{id} (queued)")));
            }
        }
        diagnostics
    }
}

/// A source with one item that never becomes ready.
#[derive(Debug, Default)]
pub struct StuckSource {
    aborted: Option<Failure>,
}

impl WorkSource for StuckSource {
    type Item = ();

    fn execution_state(&mut self) -> ExecutionState {
        if self.aborted.is_some() {
            ExecutionState::NoMoreWorkToStart
        } else {
            ExecutionState::NoWorkReadyToStart
        }
    }

    fn select_next(&mut self) -> Result<Selection<()>, Failure> {
        Ok(if self.aborted.is_some() {
            Selection::NoMoreWorkToStart
        } else {
            Selection::NoWorkReadyToStart
        })
    }

    fn finished_executing(&mut self, _: (), _: Option<Failure>) -> Result<(), Failure> {
        Err(Failure::msg("nothing was ever selected"))
    }

    fn all_execution_complete(&self) -> bool {
        self.aborted.is_some()
    }

    fn collect_failures(&mut self, failures: &mut Vec<Failure>) {
        failures.extend(self.aborted.clone());
    }

    fn cancel_execution(&mut self) {}

    fn abort_all_and_fail(&mut self, failure: Failure) {
        self.aborted.get_or_insert(failure);
    }

    fn can_make_progress(&self) -> bool {
        self.aborted.is_some()
    }

    fn health_diagnostics(&self) -> Diagnostics {
        let mut diagnostics = Diagnostics::new("stuck");
        diagnostics.push(DiagnosticNode::new("waiting for a resource nobody holds"));
        diagnostics
    }
}

/// A source that is never ready and takes a while to say so.
///
/// It only completes once cancelled.
#[derive(Debug)]
pub struct SlowScanSource {
    scan_delay: Duration,
    cancelled: bool,
}

impl SlowScanSource {
    pub fn new(scan_delay: Duration) -> Self {
        Self {
            scan_delay,
            cancelled: false,
        }
    }
}

impl WorkSource for SlowScanSource {
    type Item = ();

    fn execution_state(&mut self) -> ExecutionState {
        if self.cancelled {
            return ExecutionState::NoMoreWorkToStart;
        }
        std::thread::sleep(self.scan_delay);
        ExecutionState::NoWorkReadyToStart
    }

    fn select_next(&mut self) -> Result<Selection<()>, Failure> {
        Ok(if self.cancelled {
            Selection::NoMoreWorkToStart
        } else {
            Selection::NoWorkReadyToStart
        })
    }

    fn finished_executing(&mut self, _: (), _: Option<Failure>) -> Result<(), Failure> {
        Err(Failure::msg("nothing was ever selected"))
    }

    fn all_execution_complete(&self) -> bool {
        self.cancelled
    }

    fn collect_failures(&mut self, _: &mut Vec<Failure>) {}

    fn cancel_execution(&mut self) {
        self.cancelled = true;
    }

    fn abort_all_and_fail(&mut self, _: Failure) {
        self.cancelled = true;
    }

    fn can_make_progress(&self) -> bool {
        self.cancelled
    }

    fn health_diagnostics(&self) -> Diagnostics {
        Diagnostics::new("slow scan")
    }
}

/// Wraps a [`RecordingSource`]; once a background worker has finished an
/// item, that worker's next state query panics.
pub struct PanicOnPoolThreadSource {
    inner: RecordingSource,
    pool_item_finished: bool,
}

impl PanicOnPoolThreadSource {
    pub fn new(inner: RecordingSource) -> Self {
        Self {
            inner,
            pool_item_finished: false,
        }
    }
}

pub fn on_pool_thread() -> bool {
    std::thread::current()
        .name()
        .is_some_and(|name| name.starts_with("Execution worker Thread"))
}

impl WorkSource for PanicOnPoolThreadSource {
    type Item = String;

    fn execution_state(&mut self) -> ExecutionState {
        if on_pool_thread() && std::mem::take(&mut self.pool_item_finished) {
            panic!("state query blew up");
        }
        self.inner.execution_state()
    }

    fn select_next(&mut self) -> Result<Selection<String>, Failure> {
        self.inner.select_next()
    }

    fn finished_executing(
        &mut self,
        item: String,
        failure: Option<Failure>,
    ) -> Result<(), Failure> {
        if on_pool_thread() {
            self.pool_item_finished = true;
        }
        self.inner.finished_executing(item, failure)
    }

    fn all_execution_complete(&self) -> bool {
        self.inner.all_execution_complete()
    }

    fn collect_failures(&mut self, failures: &mut Vec<Failure>) {
        self.inner.collect_failures(failures);
    }

    fn cancel_execution(&mut self) {
        self.inner.cancel_execution();
    }

    fn abort_all_and_fail(&mut self, failure: Failure) {
        self.inner.abort_all_and_fail(failure);
    }

    fn can_make_progress(&self) -> bool {
        self.inner.can_make_progress()
    }

    fn health_diagnostics(&self) -> Diagnostics {
        self.inner.health_diagnostics()
    }
}

/// A source whose bookkeeping fails on selection.
#[derive(Debug, Default)]
pub struct FailingSelectSource {
    aborted: Option<Failure>,
}

impl WorkSource for FailingSelectSource {
    type Item = ();

    fn execution_state(&mut self) -> ExecutionState {
        if self.aborted.is_some() {
            ExecutionState::NoMoreWorkToStart
        } else {
            ExecutionState::MaybeWorkReadyToStart
        }
    }

    fn select_next(&mut self) -> Result<Selection<()>, Failure> {
        Err(Failure::msg("selection exploded"))
    }

    fn finished_executing(&mut self, _: (), _: Option<Failure>) -> Result<(), Failure> {
        Ok(())
    }

    fn all_execution_complete(&self) -> bool {
        self.aborted.is_some()
    }

    fn collect_failures(&mut self, failures: &mut Vec<Failure>) {
        failures.extend(self.aborted.clone());
    }

    fn cancel_execution(&mut self) {}

    fn abort_all_and_fail(&mut self, failure: Failure) {
        self.aborted.get_or_insert(failure);
    }

    fn can_make_progress(&self) -> bool {
        true
    }

    fn health_diagnostics(&self) -> Diagnostics {
        Diagnostics::new("failing select")
    }
}

/// Start and end of one action invocation.
#[derive(Debug, Clone)]
pub struct Span {
    pub id: String,
    pub start: Instant,
    pub end: Instant,
    pub thread: Option<String>,
}

pub type SpanLog = Arc<Mutex<Vec<Span>>>;

/// An action that sleeps for `delay` and records when it ran.
pub fn timed_action(
    spans: SpanLog,
    delay: Duration,
) -> impl Fn(&String) -> anyhow::Result<()> + Send + Sync + 'static {
    move |id: &String| {
        let start = Instant::now();
        std::thread::sleep(delay);
        spans.lock().push(Span {
            id: id.clone(),
            start,
            end: Instant::now(),
            thread: std::thread::current().name().map(str::to_string),
        });
        Ok(())
    }
}

pub fn config(max_workers: usize) -> ExecutorConfig {
    ExecutorConfig::with_max_workers(max_workers)
}

/// Position of `event` in `log`.
pub fn position(log: &[Event], event: &Event) -> usize {
    log.iter()
        .position(|e| e == event)
        .unwrap_or_else(|| panic!("{event:?} not in {log:?}"))
}
