// src/dag/scheduler_step.rs

//! Step-by-step execution result types for the scheduler.

use crate::types::UnitId;

/// Structured result of a single scheduler "step".
///
/// This is useful for tests that want to manually step the DAG and make
/// assertions about what changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchedulerStep {
    /// Units that became ready as a result of this step, in FIFO order.
    pub newly_ready: Vec<UnitId>,
    /// Units skipped in this step because a child failed (strict policy).
    pub newly_skipped: Vec<UnitId>,
    /// Whether this step left every unit in a terminal state.
    pub run_just_finished: bool,
}
