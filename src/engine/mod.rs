// src/engine/mod.rs

//! Execution engine for treedoc.
//!
//! This module ties together:
//! - the pure scheduler from [`crate::dag`]
//! - the bounded worker pool that drives it ([`pool`])
//! - the worker table and queue snapshot observers read ([`reporter`])
//! - the `Run` / `Reset` entrypoint ([`orchestrator`])

pub mod orchestrator;
pub mod pool;
pub mod reporter;
pub mod worker;

pub use orchestrator::{
    DEFAULT_CANCEL_GRACE, DEFAULT_CONCURRENCY, Orchestrator, OrchestratorOptions, RunRequest,
    RunSummary,
};
pub use pool::{PoolOutcome, WorkerPool};
pub use reporter::{LogReporter, NoopReporter, QueueStateReporter, Reporter};
pub use worker::{Worker, WorkerStatus};
