// src/exec/generator.rs

//! The seam between the scheduler and whatever produces artifacts.

use std::path::PathBuf;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::trace;

use crate::errors::Result;
use crate::store::ChildArtifacts;
use crate::types::{BoxFuture, UnitId, WorkUnit};

/// A progress message emitted while a unit is being generated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressUpdate {
    pub worker: usize,
    pub unit: UnitId,
    pub message: String,
}

/// Handle a generator uses to report progress for the unit it is running.
///
/// Messages travel over the pool's progress channel; once the pool has gone
/// away they are dropped.
#[derive(Debug, Clone)]
pub struct ProgressSink {
    worker: usize,
    unit: UnitId,
    tx: mpsc::Sender<ProgressUpdate>,
}

impl ProgressSink {
    pub fn new(worker: usize, unit: UnitId, tx: mpsc::Sender<ProgressUpdate>) -> Self {
        Self { worker, unit, tx }
    }

    /// A sink whose messages go nowhere.
    pub fn detached(unit: UnitId) -> Self {
        let (tx, _rx) = mpsc::channel(1);
        Self::new(0, unit, tx)
    }

    pub fn worker(&self) -> usize {
        self.worker
    }

    pub async fn report(&self, message: impl Into<String>) {
        let update = ProgressUpdate {
            worker: self.worker,
            unit: self.unit.clone(),
            message: message.into(),
        };
        if self.tx.send(update).await.is_err() {
            trace!(unit = %self.unit, "progress channel closed; dropping message");
        }
    }
}

/// Everything a generator needs to produce one unit's artifact.
#[derive(Debug, Clone)]
pub struct GenerateRequest {
    pub unit: WorkUnit,
    /// Where the artifact must be written.
    pub artifact_path: PathBuf,
    /// Results of the unit's immediate child directories, keyed by child name.
    pub child_artifacts: ChildArtifacts,
    pub progress: ProgressSink,
    /// Fired when the run is cancelled; generators should stop promptly and
    /// return [`crate::errors::TreedocError::Cancelled`].
    pub cancel: CancellationToken,
}

/// Produces the artifact for a single unit.
///
/// Production code uses [`crate::exec::CommandGenerator`]; tests substitute
/// scripted fakes.
pub trait Generator: Send + Sync {
    /// Write the artifact for `request.unit` at `request.artifact_path`.
    fn generate(&self, request: GenerateRequest) -> BoxFuture<'_, Result<()>>;
}
