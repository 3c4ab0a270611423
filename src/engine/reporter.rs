// src/engine/reporter.rs

//! Live worker/queue state and the sinks it is published to.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, info, warn};

use crate::dag::{QueueSnapshot, UnitOutcome};
use crate::engine::worker::{Worker, WorkerStatus};
use crate::types::UnitId;

/// Receives state updates. Every method defaults to a no-op.
///
/// Implementations are called from the pool loop and must not block or panic.
pub trait Reporter: Send + Sync {
    fn on_worker_update(&self, _worker: &Worker) {}
    fn on_queue_update(&self, _snapshot: &QueueSnapshot) {}
    fn on_progress(&self, _completed_files: usize) {}
}

/// Discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopReporter;

impl Reporter for NoopReporter {}

/// Turns state updates into tracing events.
#[derive(Debug, Default)]
pub struct LogReporter {
    total_files: usize,
}

impl LogReporter {
    pub fn new(total_files: usize) -> Self {
        Self { total_files }
    }
}

impl Reporter for LogReporter {
    fn on_worker_update(&self, worker: &Worker) {
        match worker.status {
            WorkerStatus::Working => match (&worker.current_unit, &worker.progress_message) {
                (Some(unit), Some(message)) => {
                    debug!(worker = worker.id, unit = %unit, progress = %message, "worker progress");
                }
                (Some(unit), None) => info!(worker = worker.id, unit = %unit, "worker started unit"),
                (None, _) => {}
            },
            WorkerStatus::Success => {
                if let Some(unit) = &worker.current_unit {
                    info!(worker = worker.id, unit = %unit, "worker finished unit");
                }
            }
            WorkerStatus::Error => {
                warn!(
                    worker = worker.id,
                    unit = ?worker.current_unit.as_ref().map(UnitId::as_str),
                    error = ?worker.last_error,
                    "worker reported error"
                );
            }
            WorkerStatus::Idle => debug!(worker = worker.id, "worker idle"),
        }
    }

    fn on_queue_update(&self, snapshot: &QueueSnapshot) {
        debug!(
            ready = snapshot.ready.len(),
            waiting = snapshot.waiting.len(),
            "queue updated"
        );
    }

    fn on_progress(&self, completed_files: usize) {
        info!(completed_files, total_files = self.total_files, "progress");
    }
}

/// Owns the worker table and the latest queue snapshot, and forwards every
/// change to a [`Reporter`].
///
/// Worker ids run `1..=concurrency` and are stable for the owner's lifetime.
pub struct QueueStateReporter {
    workers: Mutex<Vec<Worker>>,
    snapshot: Mutex<QueueSnapshot>,
    completed_files: AtomicUsize,
    sink: Arc<dyn Reporter>,
}

impl std::fmt::Debug for QueueStateReporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueueStateReporter")
            .field("workers", &*self.workers_guard())
            .field("completed_files", &self.completed_files())
            .finish_non_exhaustive()
    }
}

impl QueueStateReporter {
    pub fn new(concurrency: usize, sink: Arc<dyn Reporter>) -> Self {
        Self {
            workers: Mutex::new((1..=concurrency).map(Worker::new).collect()),
            snapshot: Mutex::new(QueueSnapshot::default()),
            completed_files: AtomicUsize::new(0),
            sink,
        }
    }

    pub fn concurrency(&self) -> usize {
        self.workers_guard().len()
    }

    /// Copy of the worker table, ordered by id.
    pub fn workers(&self) -> Vec<Worker> {
        self.workers_guard().clone()
    }

    pub fn worker(&self, id: usize) -> Option<Worker> {
        self.workers_guard().iter().find(|w| w.id == id).cloned()
    }

    pub fn latest_snapshot(&self) -> QueueSnapshot {
        self.snapshot_guard().clone()
    }

    pub fn completed_files(&self) -> usize {
        self.completed_files.load(Ordering::SeqCst)
    }

    /// Worker picked up `unit`.
    pub fn assign(&self, worker: usize, unit: &UnitId) {
        self.update_worker(worker, |w| {
            w.status = WorkerStatus::Working;
            w.current_unit = Some(unit.clone());
            w.progress_message = None;
        });
    }

    /// Progress line from `unit`. Dropped unless `worker` is still running
    /// that unit, so a late line never lands on the next assignment.
    pub fn progress(&self, worker: usize, unit: &UnitId, message: String) {
        let current = self
            .worker(worker)
            .is_some_and(|w| w.is_working() && w.current_unit.as_ref() == Some(unit));
        if !current {
            debug!(worker, unit = %unit, "dropping progress for a unit the worker no longer runs");
            return;
        }
        self.update_worker(worker, |w| {
            if w.current_unit.as_ref() == Some(unit) {
                w.progress_message = Some(message);
            }
        });
    }

    /// Worker finished its unit with `outcome`.
    pub fn complete(&self, worker: usize, outcome: &UnitOutcome) {
        self.update_worker(worker, |w| match outcome {
            UnitOutcome::Succeeded => w.status = WorkerStatus::Success,
            UnitOutcome::Failed(message) => {
                w.status = WorkerStatus::Error;
                w.last_error = Some(message.clone());
            }
            UnitOutcome::Cancelled | UnitOutcome::Skipped => {
                w.status = WorkerStatus::Error;
                w.last_error = Some("cancelled".to_string());
            }
        });
    }

    /// Worker is free again. `last_error` is kept.
    pub fn release(&self, worker: usize) {
        self.update_worker(worker, |w| {
            w.status = WorkerStatus::Idle;
            w.current_unit = None;
            w.progress_message = None;
        });
    }

    pub fn publish_queue(&self, snapshot: QueueSnapshot) {
        *self.snapshot_guard() = snapshot.clone();
        self.sink.on_queue_update(&snapshot);
    }

    /// Zero the completed-file counter for a new run.
    pub fn start_run(&self) {
        self.completed_files.store(0, Ordering::SeqCst);
    }

    /// Add `files` to the completed-file counter and publish the total.
    pub fn progress_files(&self, files: usize) {
        let total = self.completed_files.fetch_add(files, Ordering::SeqCst) + files;
        self.sink.on_progress(total);
    }

    /// Every worker back to a fresh `Idle`, queue snapshot and counter cleared.
    pub fn reset(&self) {
        let workers: Vec<Worker> = {
            let mut guard = self.workers_guard();
            for w in guard.iter_mut() {
                *w = Worker::new(w.id);
            }
            guard.clone()
        };
        self.completed_files.store(0, Ordering::SeqCst);
        *self.snapshot_guard() = QueueSnapshot::default();

        for w in &workers {
            self.sink.on_worker_update(w);
        }
        self.sink.on_queue_update(&QueueSnapshot::default());
    }

    fn update_worker(&self, id: usize, f: impl FnOnce(&mut Worker)) {
        let updated = {
            let mut guard = self.workers_guard();
            match guard.iter_mut().find(|w| w.id == id) {
                Some(w) => {
                    f(w);
                    w.clone()
                }
                None => {
                    warn!(worker = id, "update for unknown worker; ignoring");
                    return;
                }
            }
        };
        // Sink is called without holding the lock.
        self.sink.on_worker_update(&updated);
    }

    fn workers_guard(&self) -> MutexGuard<'_, Vec<Worker>> {
        self.workers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn snapshot_guard(&self) -> MutexGuard<'_, QueueSnapshot> {
        self.snapshot.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
