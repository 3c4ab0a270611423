// src/dag/mod.rs

//! Directory dependency graph and scheduling.
//!
//! - [`graph`] derives the "child before parent" graph over the directories
//!   of each language.
//! - [`scheduler`] contains the per-run state machine that decides which
//!   units are ready to run, and when parents can be released.
//! - [`task_info`] provides per-unit run state and queue snapshot types.
//! - [`scheduler_step`] defines the result type for scheduler steps.
//! - [`state_manager`] manages per-run state transitions.

pub mod graph;
pub mod scheduler;
pub mod scheduler_step;
pub mod state_manager;
pub mod task_info;
mod validate;

pub use graph::{DependencyEdge, DependencyGraph};
pub use scheduler::Scheduler;
pub use scheduler_step::SchedulerStep;
pub use task_info::{QueueSnapshot, TaskSummary, UnitOutcome, UnitRunState, WaitingTask};
