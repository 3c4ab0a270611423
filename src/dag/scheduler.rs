use std::collections::{HashMap, VecDeque};

use tracing::{debug, info, warn};

use crate::dag::graph::DependencyGraph;
use crate::dag::scheduler_step::SchedulerStep;
use crate::dag::state_manager::StateManager;
use crate::dag::task_info::{QueueSnapshot, RunState, TaskSummary, UnitOutcome, UnitRunState, WaitingTask};
use crate::types::{FailurePolicy, UnitId, WorkUnit};

/// Scheduler holds the immutable dependency graph plus mutable per-run state.
///
/// It is responsible for:
/// - seeding the ready queue with units that have no unfinished children
/// - handing out ready units in FIFO order
/// - recording completions and releasing parents whose children are all done
/// - skipping ancestors of failed units under [`FailurePolicy::Strict`]
///
/// It performs no IO and knows nothing about workers or Tokio; the worker
/// pool drives it.
#[derive(Debug)]
pub struct Scheduler {
    graph: DependencyGraph,
    states: HashMap<UnitId, RunState>,
    ready: VecDeque<UnitId>,
    policy: FailurePolicy,
}

impl Scheduler {
    /// Build a scheduler for one run over `graph`.
    pub fn new(graph: DependencyGraph, policy: FailurePolicy) -> Self {
        let mut states = HashMap::with_capacity(graph.len());
        let mut ready = VecDeque::new();

        for id in graph.ids() {
            let pending = graph.in_degree(id);
            if pending == 0 {
                states.insert(id.clone(), RunState::Ready);
                ready.push_back(id.clone());
            } else {
                states.insert(id.clone(), RunState::Waiting(pending));
            }
        }

        debug!(
            units = graph.len(),
            ready = ready.len(),
            ?policy,
            "scheduler: seeded ready queue"
        );

        Self {
            graph,
            states,
            ready,
            policy,
        }
    }

    pub fn graph(&self) -> &DependencyGraph {
        &self.graph
    }

    /// Read-only view of the given unit's run state.
    pub fn run_state_of(&self, id: &UnitId) -> Option<UnitRunState> {
        self.states.get(id).map(UnitRunState::from)
    }

    /// Whether a unit is waiting in the ready queue.
    pub fn has_ready(&self) -> bool {
        !self.ready.is_empty()
    }

    /// Number of units currently marked running.
    pub fn running_count(&self) -> usize {
        self.states
            .values()
            .filter(|s| matches!(s, RunState::Running))
            .count()
    }

    /// Number of units still waiting on children.
    pub fn waiting_count(&self) -> usize {
        self.states
            .values()
            .filter(|s| matches!(s, RunState::Waiting(_)))
            .count()
    }

    /// Whether every unit has reached a terminal state.
    pub fn is_finished(&self) -> bool {
        self.states
            .values()
            .all(|state| matches!(state, RunState::Done(_)))
    }

    /// Pop the next ready unit (FIFO) and mark it running.
    pub fn next_ready(&mut self) -> Option<WorkUnit> {
        while let Some(id) = self.ready.pop_front() {
            match self.states.get_mut(&id) {
                Some(state @ RunState::Ready) => {
                    *state = RunState::Running;
                    debug!(unit = %id, "dequeued ready unit; marking Running");
                    if let Some(unit) = self.graph.unit(&id) {
                        return Some(unit.clone());
                    }
                }
                other => {
                    warn!(unit = %id, state = ?other, "stale entry in ready queue; dropping");
                }
            }
        }
        None
    }

    /// Record a unit's completion and release (or, under the strict policy,
    /// skip) its parent.
    pub fn step_completion(&mut self, id: &UnitId, outcome: UnitOutcome) -> SchedulerStep {
        match self.states.get_mut(id) {
            Some(state @ RunState::Running) => {
                *state = RunState::Done(outcome.clone());
            }
            other => {
                warn!(unit = %id, state = ?other, "completion for unit that is not running; ignoring");
                return SchedulerStep::default();
            }
        }

        let mut manager = StateManager::new(&self.graph, &mut self.states, &mut self.ready);

        let newly_skipped = match (&outcome, self.policy) {
            (UnitOutcome::Failed(_), FailurePolicy::Strict) => {
                warn!(unit = %id, "unit failed; skipping its ancestors (strict policy)");
                manager.skip_dependents(id)
            }
            _ => Vec::new(),
        };

        // Completion, not success, is what releases a parent.
        let newly_ready = manager.release_dependents(id);
        let run_just_finished = manager.all_units_terminal();

        if run_just_finished {
            info!("scheduler: all units terminal");
        }

        SchedulerStep {
            newly_ready,
            newly_skipped,
            run_just_finished,
        }
    }

    /// Cancel everything that has not started yet.
    ///
    /// Running units are left alone; the caller reports their completion once
    /// they stop.
    pub fn cancel_pending(&mut self) -> Vec<UnitId> {
        let mut manager = StateManager::new(&self.graph, &mut self.states, &mut self.ready);
        let cancelled = manager.cancel_pending();
        if !cancelled.is_empty() {
            info!(count = cancelled.len(), "scheduler: cancelled pending units");
        }
        cancelled
    }

    /// Current ready (FIFO order) and waiting (graph order) queues.
    pub fn snapshot(&self) -> QueueSnapshot {
        let ready = self
            .ready
            .iter()
            .filter_map(|id| self.graph.unit(id))
            .map(TaskSummary::from_unit)
            .collect();

        let waiting = self
            .graph
            .units()
            .filter_map(|unit| match self.states.get(&unit.id) {
                Some(RunState::Waiting(pending)) => Some(WaitingTask {
                    task: TaskSummary::from_unit(unit),
                    pending: *pending,
                }),
                _ => None,
            })
            .collect();

        QueueSnapshot { ready, waiting }
    }

    /// Final outcome of every unit that reached a terminal state, in graph order.
    pub fn outcomes(&self) -> Vec<(UnitId, UnitOutcome)> {
        self.graph
            .ids()
            .iter()
            .filter_map(|id| match self.states.get(id) {
                Some(RunState::Done(outcome)) => Some((id.clone(), outcome.clone())),
                _ => None,
            })
            .collect()
    }
}
