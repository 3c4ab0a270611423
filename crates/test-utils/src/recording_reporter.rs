use std::collections::BTreeMap;
use std::sync::Mutex;

use treedoc::dag::QueueSnapshot;
use treedoc::engine::{Reporter, Worker, WorkerStatus};

#[derive(Debug, Default)]
struct Recorded {
    statuses: BTreeMap<usize, WorkerStatus>,
    max_working: usize,
    worker_updates: Vec<Worker>,
    queue_updates: Vec<QueueSnapshot>,
    progress: Vec<usize>,
}

/// A reporter that records everything it is told.
///
/// It keeps its own view of worker statuses so tests can check how many
/// workers were `Working` at once.
#[derive(Debug, Default)]
pub struct RecordingReporter {
    inner: Mutex<Recorded>,
}

impl RecordingReporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Highest number of workers seen `Working` at the same time.
    pub fn max_working(&self) -> usize {
        self.inner.lock().unwrap().max_working
    }

    pub fn worker_updates(&self) -> Vec<Worker> {
        self.inner.lock().unwrap().worker_updates.clone()
    }

    pub fn queue_updates(&self) -> Vec<QueueSnapshot> {
        self.inner.lock().unwrap().queue_updates.clone()
    }

    pub fn progress(&self) -> Vec<usize> {
        self.inner.lock().unwrap().progress.clone()
    }

    pub fn last_progress(&self) -> Option<usize> {
        self.inner.lock().unwrap().progress.last().copied()
    }
}

impl Reporter for RecordingReporter {
    fn on_worker_update(&self, worker: &Worker) {
        let mut inner = self.inner.lock().unwrap();
        inner.statuses.insert(worker.id, worker.status);
        let working = inner
            .statuses
            .values()
            .filter(|s| **s == WorkerStatus::Working)
            .count();
        inner.max_working = inner.max_working.max(working);
        inner.worker_updates.push(worker.clone());
    }

    fn on_queue_update(&self, snapshot: &QueueSnapshot) {
        self.inner.lock().unwrap().queue_updates.push(snapshot.clone());
    }

    fn on_progress(&self, completed_files: usize) {
        self.inner.lock().unwrap().progress.push(completed_files);
    }
}
