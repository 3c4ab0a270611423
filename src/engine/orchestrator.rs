// src/engine/orchestrator.rs

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::artifact::{ArtifactLifecycle, ArtifactNaming};
use crate::config::ConfigFile;
use crate::dag::{DependencyGraph, QueueSnapshot, Scheduler, UnitOutcome};
use crate::engine::pool::WorkerPool;
use crate::engine::reporter::{QueueStateReporter, Reporter};
use crate::engine::worker::Worker;
use crate::errors::Result;
use crate::exec::{Generator, TaskRunner};
use crate::fs::FileSystem;
use crate::store::ResultStore;
use crate::types::{FailurePolicy, Language, UnitId, WorkUnit};

pub const DEFAULT_CONCURRENCY: usize = 4;
pub const DEFAULT_CANCEL_GRACE: Duration = Duration::from_secs(10);

/// Knobs fixed for the orchestrator's lifetime.
#[derive(Debug, Clone)]
pub struct OrchestratorOptions {
    pub concurrency: usize,
    pub failure_policy: FailurePolicy,
    pub naming: ArtifactNaming,
    /// How long in-flight units get to stop after cancellation before they
    /// are aborted.
    pub cancel_grace: Duration,
}

impl Default for OrchestratorOptions {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
            failure_policy: FailurePolicy::default(),
            naming: ArtifactNaming::default(),
            cancel_grace: DEFAULT_CANCEL_GRACE,
        }
    }
}

impl From<&ConfigFile> for OrchestratorOptions {
    fn from(cfg: &ConfigFile) -> Self {
        Self {
            concurrency: cfg.run.concurrency,
            failure_policy: cfg.run.failure_policy,
            naming: ArtifactNaming::new(cfg.run.artifact_extension.clone()),
            cancel_grace: Duration::from_secs(cfg.run.cancel_grace_secs),
        }
    }
}

/// Input of one run.
#[derive(Debug, Clone, Default)]
pub struct RunRequest {
    pub units: BTreeMap<Language, Vec<WorkUnit>>,
    pub input_dir: PathBuf,
    pub output_dir: PathBuf,
}

impl RunRequest {
    /// Group a flat list of units by language.
    pub fn from_units(
        units: impl IntoIterator<Item = WorkUnit>,
        input_dir: impl Into<PathBuf>,
        output_dir: impl Into<PathBuf>,
    ) -> Self {
        let mut grouped: BTreeMap<Language, Vec<WorkUnit>> = BTreeMap::new();
        for unit in units {
            grouped.entry(unit.language.clone()).or_default().push(unit);
        }
        Self {
            units: grouped,
            input_dir: input_dir.into(),
            output_dir: output_dir.into(),
        }
    }

    pub fn total_files(&self) -> usize {
        self.units.values().flatten().map(|u| u.files.len()).sum()
    }
}

/// Result of a completed (or cancelled) run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Promoted artifact per language. Relative to the input directory when
    /// the output directory lies inside it, absolute otherwise.
    pub artifacts: BTreeMap<Language, PathBuf>,
    pub failed: Vec<(UnitId, String)>,
    pub skipped: Vec<UnitId>,
    pub cancelled_units: Vec<UnitId>,
    pub cancelled: bool,
}

impl RunSummary {
    /// No unit failed, was skipped, or was cancelled.
    pub fn is_clean(&self) -> bool {
        !self.cancelled
            && self.failed.is_empty()
            && self.skipped.is_empty()
            && self.cancelled_units.is_empty()
    }
}

/// `Run` / `Reset` entrypoint.
///
/// Owns the worker table across runs; each run gets its own scheduler,
/// artifact lifecycle and cancellation token.
pub struct Orchestrator {
    options: OrchestratorOptions,
    generator: Arc<dyn Generator>,
    store: Arc<dyn ResultStore>,
    fs: Arc<dyn FileSystem>,
    reporter: Arc<QueueStateReporter>,
    active: Mutex<Option<CancellationToken>>,
}

impl Orchestrator {
    pub fn new(
        options: OrchestratorOptions,
        generator: Arc<dyn Generator>,
        store: Arc<dyn ResultStore>,
        fs: Arc<dyn FileSystem>,
        sink: Arc<dyn Reporter>,
    ) -> Self {
        let concurrency = options.concurrency.max(1);
        Self {
            reporter: Arc::new(QueueStateReporter::new(concurrency, sink)),
            options,
            generator,
            store,
            fs,
            active: Mutex::new(None),
        }
    }

    pub fn options(&self) -> &OrchestratorOptions {
        &self.options
    }

    pub fn workers(&self) -> Vec<Worker> {
        self.reporter.workers()
    }

    pub fn queue_snapshot(&self) -> QueueSnapshot {
        self.reporter.latest_snapshot()
    }

    pub fn state(&self) -> &Arc<QueueStateReporter> {
        &self.reporter
    }

    /// Run every unit in `request` to completion.
    pub async fn run(&self, request: RunRequest) -> Result<RunSummary> {
        self.run_with_cancel(request, CancellationToken::new()).await
    }

    /// Like [`Orchestrator::run`], cancelled when `cancel` (or a `reset`) fires.
    ///
    /// A cancelled run still returns `Ok`, with `cancelled = true` and no
    /// artifacts.
    pub async fn run_with_cancel(
        &self,
        request: RunRequest,
        cancel: CancellationToken,
    ) -> Result<RunSummary> {
        let token = cancel.child_token();
        *self.active() = Some(token.clone());

        let result = self.execute(request, &token).await;

        self.active().take();
        result
    }

    /// Cancel any in-flight run and return every worker to `Idle`.
    ///
    /// Idempotent, and valid before any run.
    pub fn reset(&self) {
        if let Some(token) = self.active().take() {
            info!("reset: cancelling active run");
            token.cancel();
        }
        self.reporter.reset();
    }

    async fn execute(&self, request: RunRequest, cancel: &CancellationToken) -> Result<RunSummary> {
        let RunRequest {
            units,
            input_dir,
            output_dir,
        } = request;

        let graph = DependencyGraph::from_groups(units)?;
        info!(
            units = graph.len(),
            edges = graph.edge_count(),
            policy = ?self.options.failure_policy,
            "starting run"
        );

        self.store.begin_run().await?;

        let mut scheduler = Scheduler::new(graph, self.options.failure_policy);
        let mut artifacts = ArtifactLifecycle::new(Arc::clone(&self.fs));

        let runner = TaskRunner::new(
            Arc::clone(&self.generator),
            Arc::clone(&self.store),
            Arc::clone(&self.fs),
        );
        let pool = WorkerPool::new(
            self.options.concurrency,
            runner,
            Arc::clone(&self.reporter),
            self.options.naming.clone(),
            self.options.cancel_grace,
        );

        let outcome = match pool.execute(&mut scheduler, &mut artifacts, cancel).await {
            Ok(outcome) => outcome,
            Err(e) => {
                artifacts.cleanup();
                return Err(e);
            }
        };

        let promoted = if outcome.cancelled {
            warn!("run cancelled; discarding artifacts");
            artifacts.cleanup();
            BTreeMap::new()
        } else {
            artifacts.promote(&output_dir, &self.options.naming)
        };

        let mut summary = RunSummary {
            artifacts: promoted
                .into_iter()
                .map(|(language, path)| (language, display_path(&input_dir, path)))
                .collect(),
            cancelled: outcome.cancelled,
            ..RunSummary::default()
        };

        for (id, unit_outcome) in outcome.outcomes {
            match unit_outcome {
                UnitOutcome::Succeeded => {}
                UnitOutcome::Failed(message) => summary.failed.push((id, message)),
                UnitOutcome::Skipped => summary.skipped.push(id),
                UnitOutcome::Cancelled => summary.cancelled_units.push(id),
            }
        }

        info!(
            artifacts = summary.artifacts.len(),
            failed = summary.failed.len(),
            skipped = summary.skipped.len(),
            cancelled = summary.cancelled,
            "run finished"
        );
        Ok(summary)
    }

    fn active(&self) -> MutexGuard<'_, Option<CancellationToken>> {
        self.active.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// `path` relative to `input_dir` when it lies inside it.
fn display_path(input_dir: &Path, path: PathBuf) -> PathBuf {
    match path.strip_prefix(input_dir) {
        Ok(rel) if !input_dir.as_os_str().is_empty() => rel.to_path_buf(),
        _ => path,
    }
}
