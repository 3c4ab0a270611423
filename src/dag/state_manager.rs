// src/dag/state_manager.rs

//! Per-run state transitions for units in the scheduler.

use std::collections::{HashMap, VecDeque};

use tracing::{debug, warn};

use crate::dag::DependencyGraph;
use crate::dag::task_info::{RunState, UnitOutcome};
use crate::types::UnitId;

/// Applies state transitions to the per-run tables owned by the scheduler.
pub struct StateManager<'a> {
    graph: &'a DependencyGraph,
    states: &'a mut HashMap<UnitId, RunState>,
    ready: &'a mut VecDeque<UnitId>,
}

impl<'a> StateManager<'a> {
    pub(crate) fn new(
        graph: &'a DependencyGraph,
        states: &'a mut HashMap<UnitId, RunState>,
        ready: &'a mut VecDeque<UnitId>,
    ) -> Self {
        Self {
            graph,
            states,
            ready,
        }
    }

    /// Decrement the pending count of every direct dependent of `done`.
    ///
    /// Dependents that reach zero move to the back of the ready queue, in the
    /// order the graph lists them. Returns those newly ready units.
    pub fn release_dependents(&mut self, done: &UnitId) -> Vec<UnitId> {
        let mut newly_ready = Vec::new();

        for dependent in self.graph.dependents_of(done) {
            let remaining = match self.states.get_mut(dependent) {
                Some(RunState::Waiting(pending)) => {
                    *pending = pending.saturating_sub(1);
                    *pending
                }
                Some(RunState::Done(_)) => {
                    // Already skipped or cancelled.
                    continue;
                }
                Some(other) => {
                    warn!(
                        unit = %dependent,
                        state = ?other,
                        "dependent is not waiting although a child just finished"
                    );
                    continue;
                }
                None => {
                    warn!(unit = %dependent, "dependent missing from state table");
                    continue;
                }
            };

            if remaining == 0 {
                self.states.insert(dependent.clone(), RunState::Ready);
                self.ready.push_back(dependent.clone());
                debug!(unit = %dependent, "all children finished; unit is ready");
                newly_ready.push(dependent.clone());
            } else {
                debug!(
                    unit = %dependent,
                    pending = remaining,
                    "child finished; unit still waiting"
                );
            }
        }

        newly_ready
    }

    /// Mark every transitive dependent of a failed unit as skipped.
    ///
    /// Only units that have not started are affected. Returns the units that
    /// were newly skipped.
    pub fn skip_dependents(&mut self, failed: &UnitId) -> Vec<UnitId> {
        let mut stack: Vec<UnitId> = self.graph.dependents_of(failed).to_vec();
        let mut newly_skipped = Vec::new();

        while let Some(id) = stack.pop() {
            let Some(state) = self.states.get_mut(&id) else {
                continue;
            };
            match state {
                RunState::Waiting(_) | RunState::Ready => {
                    let was_ready = matches!(state, RunState::Ready);
                    *state = RunState::Done(UnitOutcome::Skipped);
                    if was_ready {
                        self.ready.retain(|r| r != &id);
                    }
                    debug!(unit = %id, upstream = %failed, "skipping unit due to failed child");
                    stack.extend(self.graph.dependents_of(&id).iter().cloned());
                    newly_skipped.push(id);
                }
                RunState::Running | RunState::Done(_) => {}
            }
        }

        newly_skipped
    }

    /// Mark every unit that has not started as cancelled and empty the ready
    /// queue. Returns the affected units in graph order.
    pub fn cancel_pending(&mut self) -> Vec<UnitId> {
        self.ready.clear();

        let mut cancelled = Vec::new();
        for id in self.graph.ids() {
            if let Some(state) = self.states.get_mut(id) {
                if matches!(state, RunState::Waiting(_) | RunState::Ready) {
                    *state = RunState::Done(UnitOutcome::Cancelled);
                    cancelled.push(id.clone());
                }
            }
        }
        cancelled
    }

    /// Check if every unit is in a terminal state.
    pub fn all_units_terminal(&self) -> bool {
        self.states
            .values()
            .all(|state| matches!(state, RunState::Done(_)))
    }
}
