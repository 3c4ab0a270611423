// src/dag/task_info.rs

//! Per-unit run state and the read-only views handed to observers.

use std::path::PathBuf;

use crate::types::{Language, UnitId, WorkUnit};

/// Per-run state of a unit (internal).
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum RunState {
    /// Waiting on this many unfinished direct children.
    Waiting(usize),
    /// All children finished; sitting in the ready queue.
    Ready,
    /// Assigned to a worker.
    Running,
    /// Terminal.
    Done(UnitOutcome),
}

/// How a unit finished.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnitOutcome {
    Succeeded,
    Failed(String),
    /// Never ran because a child failed under the strict failure policy.
    Skipped,
    /// Never ran, or was interrupted, because the run was cancelled.
    Cancelled,
}

impl UnitOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, UnitOutcome::Succeeded)
    }
}

/// Public, read-only view of a unit's state in the current run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnitRunState {
    Waiting { pending: usize },
    Ready,
    Running,
    Done(UnitOutcome),
}

impl From<&RunState> for UnitRunState {
    fn from(state: &RunState) -> Self {
        match state {
            RunState::Waiting(pending) => UnitRunState::Waiting { pending: *pending },
            RunState::Ready => UnitRunState::Ready,
            RunState::Running => UnitRunState::Running,
            RunState::Done(outcome) => UnitRunState::Done(outcome.clone()),
        }
    }
}

/// Short description of a unit for queue observers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskSummary {
    pub id: UnitId,
    pub language: Language,
    pub directory: PathBuf,
    pub file_count: usize,
}

impl TaskSummary {
    pub fn from_unit(unit: &WorkUnit) -> Self {
        Self {
            id: unit.id.clone(),
            language: unit.language.clone(),
            directory: unit.directory.clone(),
            file_count: unit.files.len(),
        }
    }
}

/// A waiting unit together with its current pending dependency count.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WaitingTask {
    pub task: TaskSummary,
    pub pending: usize,
}

/// Snapshot of the ready and waiting queues.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueueSnapshot {
    /// Ready units in dispatch (FIFO) order.
    pub ready: Vec<TaskSummary>,
    /// Units still waiting on children, in graph order.
    pub waiting: Vec<WaitingTask>,
}

impl QueueSnapshot {
    pub fn is_empty(&self) -> bool {
        self.ready.is_empty() && self.waiting.is_empty()
    }
}
