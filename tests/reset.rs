// tests/reset.rs

use std::sync::Arc;
use std::time::Duration;

use tokio::time::sleep;
use treedoc::engine::{NoopReporter, WorkerStatus};
use treedoc_test_utils::builders::{TempTree, options, orchestrator, request};
use treedoc_test_utils::{FakeGenerator, RecordingReporter, with_timeout};

#[tokio::test]
async fn reset_before_any_run_is_a_no_op() {
    let generator = Arc::new(FakeGenerator::new());
    let (orch, _store) = orchestrator(options(3), generator, Arc::new(NoopReporter));

    orch.reset();
    orch.reset();

    let workers = orch.workers();
    assert_eq!(workers.len(), 3);
    assert!(workers.iter().all(|w| w.status == WorkerStatus::Idle));
    assert!(workers.iter().all(|w| w.last_error.is_none()));
    assert!(orch.queue_snapshot().is_empty());
    assert_eq!(orch.state().completed_files(), 0);
}

#[tokio::test]
async fn reset_clears_errors_left_by_a_run() {
    let tree = TempTree::new();
    let units = vec![tree.unit("rs", "bad", &["x.rs"])];

    let generator = Arc::new(FakeGenerator::new().fail_in(tree.path("bad")));
    let reporter = Arc::new(RecordingReporter::new());
    let (orch, _store) = orchestrator(options(1), generator, reporter);

    with_timeout(orch.run(request(&tree, units))).await.unwrap();
    assert!(orch.workers()[0].last_error.is_some());
    assert_eq!(orch.state().completed_files(), 1);

    orch.reset();

    let worker = &orch.workers()[0];
    assert_eq!(worker.status, WorkerStatus::Idle);
    assert!(worker.last_error.is_none());
    assert_eq!(orch.state().completed_files(), 0);
}

#[tokio::test]
async fn reset_during_a_run_cancels_it() {
    let tree = TempTree::new();
    let units = vec![
        tree.unit("rs", "app", &["main.rs"]),
        tree.unit("rs", "app/src", &["lib.rs"]),
    ];

    let generator = Arc::new(FakeGenerator::new().block_all());
    let reporter = Arc::new(RecordingReporter::new());
    let (orch, _store) = orchestrator(options(2), generator.clone(), reporter);

    let resetter = async {
        sleep(Duration::from_millis(50)).await;
        orch.reset();
    };
    let (summary, ()) = with_timeout(async {
        tokio::join!(orch.run(request(&tree, units)), resetter)
    })
    .await;
    let summary = summary.unwrap();

    assert!(summary.cancelled);
    assert!(summary.artifacts.is_empty());
    assert!(generator.call_for(tree.path("app")).is_none());
    assert!(tree.staging_files().is_empty());
    assert!(orch.workers().iter().all(|w| w.status == WorkerStatus::Idle));
}

#[tokio::test]
async fn orchestrator_runs_again_after_reset() {
    let tree = TempTree::new();
    let units = vec![tree.unit("rs", "app", &["main.rs", "lib.rs"])];

    let generator = Arc::new(FakeGenerator::new());
    let reporter = Arc::new(RecordingReporter::new());
    let (orch, _store) = orchestrator(options(2), generator.clone(), reporter.clone());

    let first = with_timeout(orch.run(request(&tree, units.clone()))).await.unwrap();
    orch.reset();
    let second = with_timeout(orch.run(request(&tree, units))).await.unwrap();

    assert!(first.is_clean());
    assert!(second.is_clean());
    assert_eq!(first.artifacts, second.artifacts);
    assert_eq!(generator.calls().len(), 2);
    // The file counter starts over for each run.
    assert_eq!(reporter.last_progress(), Some(2));
}
