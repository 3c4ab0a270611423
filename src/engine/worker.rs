// src/engine/worker.rs

use crate::types::UnitId;

/// Status of a worker slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WorkerStatus {
    #[default]
    Idle,
    Working,
    Success,
    Error,
}

/// One fixed execution lane of the pool.
///
/// `last_error` outlives the release back to `Idle`; only a reset clears it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Worker {
    pub id: usize,
    pub status: WorkerStatus,
    pub current_unit: Option<UnitId>,
    pub progress_message: Option<String>,
    pub last_error: Option<String>,
}

impl Worker {
    pub fn new(id: usize) -> Self {
        Self {
            id,
            status: WorkerStatus::Idle,
            current_unit: None,
            progress_message: None,
            last_error: None,
        }
    }

    pub fn is_idle(&self) -> bool {
        self.status == WorkerStatus::Idle
    }

    pub fn is_working(&self) -> bool {
        self.status == WorkerStatus::Working
    }
}
