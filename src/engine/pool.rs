// src/engine/pool.rs

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::{self, JoinError, JoinSet};
use tokio::time::{Instant, sleep_until};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::artifact::{ArtifactLifecycle, ArtifactNaming};
use crate::dag::{Scheduler, UnitOutcome};
use crate::engine::reporter::QueueStateReporter;
use crate::errors::{Result, TreedocError};
use crate::exec::{ProgressSink, ProgressUpdate, TaskReport, TaskRunner};
use crate::types::UnitId;

const PROGRESS_CHANNEL_CAPACITY: usize = 64;

/// What the pool hands back once every unit is terminal.
#[derive(Debug, Clone, Default)]
pub struct PoolOutcome {
    /// Outcome of every unit, in graph order.
    pub outcomes: Vec<(UnitId, UnitOutcome)>,
    pub cancelled: bool,
}

/// Unit running on a worker, keyed by its Tokio task id.
#[derive(Debug, Clone)]
struct InFlight {
    unit_id: UnitId,
    worker: usize,
    file_count: usize,
}

/// Bounded-concurrency executor over a [`Scheduler`].
///
/// The loop owns the scheduler, the free-worker queue and the artifact
/// lifecycle; spawned runners only send progress and return a
/// [`TaskReport`]. It waits on events (completion, progress, cancellation,
/// grace timer) and never polls.
pub struct WorkerPool {
    concurrency: usize,
    runner: TaskRunner,
    reporter: Arc<QueueStateReporter>,
    naming: ArtifactNaming,
    cancel_grace: Duration,
}

impl WorkerPool {
    pub fn new(
        concurrency: usize,
        runner: TaskRunner,
        reporter: Arc<QueueStateReporter>,
        naming: ArtifactNaming,
        cancel_grace: Duration,
    ) -> Self {
        Self {
            concurrency: concurrency.max(1),
            runner,
            reporter,
            naming,
            cancel_grace,
        }
    }

    /// Drive `scheduler` to completion.
    ///
    /// Unit failures never fail the run. The only error is a stalled
    /// scheduler (units waiting with nothing ready or in flight).
    pub async fn execute(
        &self,
        scheduler: &mut Scheduler,
        artifacts: &mut ArtifactLifecycle,
        cancel: &CancellationToken,
    ) -> Result<PoolOutcome> {
        let mut free: VecDeque<usize> = (1..=self.concurrency).collect();
        let mut in_flight: HashMap<task::Id, InFlight> = HashMap::new();
        let mut join_set: JoinSet<TaskReport> = JoinSet::new();
        let (progress_tx, mut progress_rx) =
            mpsc::channel::<ProgressUpdate>(PROGRESS_CHANNEL_CAPACITY);

        let mut cancelled = false;
        let mut grace_deadline: Option<Instant> = None;

        info!(
            units = scheduler.graph().len(),
            concurrency = self.concurrency,
            "worker pool starting"
        );
        self.reporter.start_run();
        self.reporter.publish_queue(scheduler.snapshot());

        loop {
            if !cancelled && cancel.is_cancelled() {
                cancelled = true;
                info!(in_flight = join_set.len(), "run cancelled; stopping dispatch");
                scheduler.cancel_pending();
                self.reporter.publish_queue(scheduler.snapshot());
                grace_deadline = Some(Instant::now() + self.cancel_grace);
            }

            if !cancelled {
                let started = self.dispatch(
                    scheduler,
                    artifacts,
                    &mut free,
                    &mut join_set,
                    &mut in_flight,
                    &progress_tx,
                    cancel,
                );
                if started {
                    self.reporter.publish_queue(scheduler.snapshot());
                }
            }

            if join_set.is_empty() {
                if cancelled || scheduler.is_finished() {
                    break;
                }
                let waiting = scheduler.waiting_count();
                error!(waiting, "scheduler stalled: nothing ready or running");
                return Err(TreedocError::Invariant(format!(
                    "{waiting} unit(s) waiting with nothing ready or running"
                )));
            }

            let deadline = grace_deadline;
            let grace = async move {
                match deadline {
                    Some(deadline) => sleep_until(deadline).await,
                    None => std::future::pending().await,
                }
            };

            tokio::select! {
                biased;

                // Handled at the top of the next iteration.
                _ = cancel.cancelled(), if !cancelled => {}

                Some(update) = progress_rx.recv() => {
                    debug!(worker = update.worker, unit = %update.unit, "progress: {}", update.message);
                    self.reporter.progress(update.worker, &update.unit, update.message);
                }

                joined = join_set.join_next_with_id() => {
                    let report = match joined {
                        Some(Ok((id, report))) => {
                            in_flight.remove(&id);
                            report
                        }
                        Some(Err(err)) => match in_flight.remove(&err.id()) {
                            Some(entry) => report_from_join_error(entry, err),
                            None => {
                                warn!(error = %err, "join error for unknown task; ignoring");
                                continue;
                            }
                        },
                        None => continue,
                    };
                    self.complete(scheduler, artifacts, &mut free, report);
                }

                _ = grace => {
                    warn!(
                        remaining = join_set.len(),
                        grace_secs = self.cancel_grace.as_secs_f64(),
                        "cancel grace period elapsed; aborting remaining units"
                    );
                    grace_deadline = None;
                    join_set.abort_all();
                }
            }
        }

        info!(cancelled, "worker pool finished");
        Ok(PoolOutcome {
            outcomes: scheduler.outcomes(),
            cancelled,
        })
    }

    /// Fill free workers with ready units. Returns whether anything started.
    #[allow(clippy::too_many_arguments)]
    fn dispatch(
        &self,
        scheduler: &mut Scheduler,
        artifacts: &mut ArtifactLifecycle,
        free: &mut VecDeque<usize>,
        join_set: &mut JoinSet<TaskReport>,
        in_flight: &mut HashMap<task::Id, InFlight>,
        progress_tx: &mpsc::Sender<ProgressUpdate>,
        cancel: &CancellationToken,
    ) -> bool {
        let mut started = false;

        while !free.is_empty() && scheduler.has_ready() {
            let Some(unit) = scheduler.next_ready() else {
                break;
            };
            let Some(worker) = free.pop_front() else {
                break;
            };

            let artifact_path = self.naming.staging_path(&unit);
            artifacts.track(&unit, artifact_path.clone());
            self.reporter.assign(worker, &unit.id);

            debug!(unit = %unit.id, worker, "dispatching unit");

            let entry = InFlight {
                unit_id: unit.id.clone(),
                worker,
                file_count: unit.files.len(),
            };
            let progress = ProgressSink::new(worker, unit.id.clone(), progress_tx.clone());
            let runner = self.runner.clone();
            let cancel = cancel.clone();

            let handle = join_set.spawn(async move {
                runner.run(unit, worker, artifact_path, progress, cancel).await
            });
            in_flight.insert(handle.id(), entry);
            started = true;
        }

        started
    }

    /// Apply one finished unit to the worker table, the artifacts and the
    /// scheduler.
    fn complete(
        &self,
        scheduler: &mut Scheduler,
        artifacts: &mut ArtifactLifecycle,
        free: &mut VecDeque<usize>,
        report: TaskReport,
    ) {
        let TaskReport {
            unit_id,
            worker,
            file_count,
            outcome,
        } = report;

        self.reporter.complete(worker, &outcome);
        self.reporter.release(worker);
        free.push_back(worker);

        if outcome.is_success() {
            artifacts.mark_produced(&unit_id);
        } else {
            artifacts.discard(&unit_id);
        }

        let step = scheduler.step_completion(&unit_id, outcome);

        let skipped_files: usize = step
            .newly_skipped
            .iter()
            .filter_map(|id| scheduler.graph().unit(id))
            .map(|unit| unit.files.len())
            .sum();
        self.reporter.progress_files(file_count + skipped_files);
        self.reporter.publish_queue(scheduler.snapshot());
    }
}

/// A runner task that panicked or was aborted still completes its unit.
fn report_from_join_error(entry: InFlight, err: JoinError) -> TaskReport {
    let outcome = if err.is_cancelled() {
        UnitOutcome::Cancelled
    } else {
        let message = panic_message(err);
        error!(unit = %entry.unit_id, worker = entry.worker, panic = %message, "unit panicked");
        UnitOutcome::Failed(format!("panicked: {message}"))
    };

    TaskReport {
        unit_id: entry.unit_id,
        worker: entry.worker,
        file_count: entry.file_count,
        outcome,
    }
}

fn panic_message(err: JoinError) -> String {
    match err.try_into_panic() {
        Ok(payload) => {
            if let Some(s) = payload.downcast_ref::<&str>() {
                (*s).to_string()
            } else if let Some(s) = payload.downcast_ref::<String>() {
                s.clone()
            } else {
                "unknown panic".to_string()
            }
        }
        Err(err) => err.to_string(),
    }
}
