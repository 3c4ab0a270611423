// src/exec/task_runner.rs

//! Runs a single unit end to end.

use std::path::PathBuf;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::dag::UnitOutcome;
use crate::errors::{Result, TreedocError};
use crate::exec::generator::{GenerateRequest, Generator, ProgressSink};
use crate::fs::FileSystem;
use crate::store::ResultStore;
use crate::types::{UnitId, WorkUnit};

/// What the pool learns once a runner is done with a unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskReport {
    pub unit_id: UnitId,
    pub worker: usize,
    pub file_count: usize,
    pub outcome: UnitOutcome,
}

/// Fetches child context, invokes the generator, and stores the result.
///
/// Cheap to clone; the pool hands a clone to every spawned unit.
#[derive(Clone)]
pub struct TaskRunner {
    generator: Arc<dyn Generator>,
    store: Arc<dyn ResultStore>,
    fs: Arc<dyn FileSystem>,
}

impl TaskRunner {
    pub fn new(
        generator: Arc<dyn Generator>,
        store: Arc<dyn ResultStore>,
        fs: Arc<dyn FileSystem>,
    ) -> Self {
        Self {
            generator,
            store,
            fs,
        }
    }

    /// Run `unit` on `worker`. Never fails: every error becomes the outcome
    /// carried by the returned report.
    pub async fn run(
        &self,
        unit: WorkUnit,
        worker: usize,
        artifact_path: PathBuf,
        progress: ProgressSink,
        cancel: CancellationToken,
    ) -> TaskReport {
        let unit_id = unit.id.clone();
        let file_count = unit.files.len();

        let outcome = match self
            .run_inner(unit, artifact_path.clone(), progress, cancel.clone())
            .await
        {
            Ok(()) => {
                info!(unit = %unit_id, worker, "unit succeeded");
                UnitOutcome::Succeeded
            }
            Err(err) => {
                self.remove_partial(&artifact_path);
                if err.is_cancelled() || cancel.is_cancelled() {
                    info!(unit = %unit_id, worker, "unit cancelled");
                    UnitOutcome::Cancelled
                } else {
                    error!(unit = %unit_id, worker, error = %err, "unit failed");
                    UnitOutcome::Failed(err.to_string())
                }
            }
        };

        TaskReport {
            unit_id,
            worker,
            file_count,
            outcome,
        }
    }

    async fn run_inner(
        &self,
        unit: WorkUnit,
        artifact_path: PathBuf,
        progress: ProgressSink,
        cancel: CancellationToken,
    ) -> Result<()> {
        let child_artifacts = self
            .store
            .child_artifacts(&unit.directory, &unit.language)
            .await?;

        debug!(
            unit = %unit.id,
            children = child_artifacts.len(),
            artifact = %artifact_path.display(),
            "invoking generator"
        );

        let request = GenerateRequest {
            unit: unit.clone(),
            artifact_path: artifact_path.clone(),
            child_artifacts,
            progress,
            cancel: cancel.clone(),
        };
        self.generator.generate(request).await?;

        if cancel.is_cancelled() {
            return Err(TreedocError::Cancelled);
        }

        if !self.fs.is_file(&artifact_path) {
            return Err(TreedocError::Generator(
                "generator did not produce an artifact".to_string(),
            ));
        }
        let content = self.fs.read_to_string(&artifact_path)?;

        self.store
            .save_result(&unit.language, content, &unit.directory)
            .await
    }

    /// Best-effort removal of whatever a failed generator left behind.
    fn remove_partial(&self, path: &std::path::Path) {
        if !self.fs.exists(path) {
            return;
        }
        if let Err(e) = self.fs.remove_file(path) {
            warn!(path = %path.display(), error = %e, "failed to remove partial artifact");
        }
    }
}
