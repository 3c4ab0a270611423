// tests/partial_failure.rs

use std::sync::Arc;

use treedoc::engine::WorkerStatus;
use treedoc::types::{FailurePolicy, UnitId};
use treedoc_test_utils::builders::{TempTree, options, orchestrator, request};
use treedoc_test_utils::{FakeGenerator, RecordingReporter, child_names, init_tracing, with_timeout};

#[tokio::test]
async fn failing_language_is_absent_and_leaves_no_artifacts() {
    init_tracing();
    let tree = TempTree::new();
    let units = vec![
        tree.unit("python", "scripts", &["build.py"]),
        tree.unit("typescript", "src", &["index.ts"]),
    ];

    let generator = Arc::new(FakeGenerator::new().fail_in(tree.path("scripts")));
    let reporter = Arc::new(RecordingReporter::new());
    let (orch, _store) = orchestrator(options(2), generator, reporter);

    let summary = with_timeout(orch.run(request(&tree, units))).await.unwrap();

    assert_eq!(
        summary.artifacts.keys().cloned().collect::<Vec<_>>(),
        vec!["typescript".to_string()]
    );
    assert_eq!(summary.failed.len(), 1);
    assert_eq!(
        summary.failed[0].0,
        UnitId::new("python", &tree.path("scripts"))
    );
    assert!(summary.failed[0].1.contains("scripted failure"));

    assert!(tree.staging_files().is_empty(), "left: {:?}", tree.staging_files());
    assert!(
        !tree
            .list_files()
            .iter()
            .any(|f| f.starts_with("scripts/") && f != "scripts/build.py")
    );

    let errored: Vec<_> = orch
        .workers()
        .into_iter()
        .filter(|w| w.last_error.is_some())
        .collect();
    assert_eq!(errored.len(), 1);
    assert_eq!(errored[0].status, WorkerStatus::Idle);
}

#[tokio::test]
async fn lenient_parent_still_runs_with_surviving_children() {
    let tree = TempTree::new();
    let units = vec![
        tree.unit("rs", "app", &["main.rs"]),
        tree.unit("rs", "app/good", &["a.rs"]),
        tree.unit("rs", "app/bad", &["b.rs"]),
    ];

    let generator = Arc::new(FakeGenerator::new().fail_in(tree.path("app/bad")));
    let reporter = Arc::new(RecordingReporter::new());
    let (orch, _store) = orchestrator(options(2), generator.clone(), reporter.clone());

    let summary = with_timeout(orch.run(request(&tree, units))).await.unwrap();

    let app_call = generator.call_for(tree.path("app")).expect("parent ran");
    assert_eq!(child_names(&app_call), vec!["good".to_string()]);
    assert!(summary.artifacts.contains_key("rs"));
    assert_eq!(summary.failed.len(), 1);
    assert_eq!(reporter.last_progress(), Some(3));
    assert!(tree.staging_files().is_empty());
}

#[tokio::test]
async fn strict_policy_skips_ancestors_of_a_failure() {
    let tree = TempTree::new();
    let units = vec![
        tree.unit("rs", "app", &["main.rs"]),
        tree.unit("rs", "app/src", &["lib.rs"]),
        tree.unit("rs", "app/src/lib", &["mod.rs"]),
        tree.unit("py", "tools", &["t.py"]),
    ];

    let generator = Arc::new(FakeGenerator::new().fail_in(tree.path("app/src/lib")));
    let reporter = Arc::new(RecordingReporter::new());
    let mut opts = options(2);
    opts.failure_policy = FailurePolicy::Strict;
    let (orch, _store) = orchestrator(opts, generator.clone(), reporter.clone());

    let summary = with_timeout(orch.run(request(&tree, units))).await.unwrap();

    assert!(generator.call_for(tree.path("app/src")).is_none());
    assert!(generator.call_for(tree.path("app")).is_none());
    assert_eq!(summary.skipped.len(), 2);
    assert_eq!(
        summary.artifacts.keys().cloned().collect::<Vec<_>>(),
        vec!["py".to_string()]
    );
    // Skipped units count towards progress.
    assert_eq!(reporter.last_progress(), Some(4));
    assert!(tree.staging_files().is_empty());
}

#[tokio::test]
async fn panicking_generator_fails_only_its_unit() {
    let tree = TempTree::new();
    let units = vec![
        tree.unit("rs", "boom", &["x.rs"]),
        tree.unit("go", "fine", &["x.go"]),
    ];

    let generator = Arc::new(FakeGenerator::new().panic_in(tree.path("boom")));
    let reporter = Arc::new(RecordingReporter::new());
    let (orch, _store) = orchestrator(options(2), generator, reporter);

    let summary = with_timeout(orch.run(request(&tree, units))).await.unwrap();

    assert_eq!(summary.failed.len(), 1);
    assert!(summary.failed[0].1.contains("panicked"));
    assert!(summary.artifacts.contains_key("go"));
    assert!(!summary.artifacts.contains_key("rs"));
    assert!(orch.workers().iter().all(|w| w.status == WorkerStatus::Idle));
}

#[tokio::test]
async fn generator_that_writes_nothing_fails_the_unit() {
    let tree = TempTree::new();
    let units = vec![tree.unit("rs", "app", &["main.rs"])];

    let generator = Arc::new(FakeGenerator::new().without_artifacts());
    let reporter = Arc::new(RecordingReporter::new());
    let (orch, store) = orchestrator(options(1), generator, reporter);

    let summary = with_timeout(orch.run(request(&tree, units))).await.unwrap();

    assert!(summary.artifacts.is_empty());
    assert!(summary.failed[0].1.contains("did not produce an artifact"));
    assert!(store.is_empty());
}

#[tokio::test]
async fn duplicate_units_reject_the_run_before_any_work() {
    let tree = TempTree::new();
    let a = tree.unit("rs", "app", &["main.rs"]);
    let units = vec![a.clone(), a];

    let generator = Arc::new(FakeGenerator::new());
    let reporter = Arc::new(RecordingReporter::new());
    let (orch, _store) = orchestrator(options(1), generator.clone(), reporter);

    let result = with_timeout(orch.run(request(&tree, units))).await;

    assert!(matches!(
        result,
        Err(treedoc::errors::TreedocError::DuplicateUnit(_))
    ));
    assert!(generator.calls().is_empty());
}
