// tests/reporter_state.rs

use std::path::Path;
use std::sync::Arc;

use treedoc::dag::UnitOutcome;
use treedoc::engine::{QueueStateReporter, WorkerStatus};
use treedoc::types::UnitId;
use treedoc_test_utils::RecordingReporter;

#[test]
fn new_table_has_one_idle_worker_per_slot() {
    let state = QueueStateReporter::new(3, Arc::new(RecordingReporter::new()));

    assert_eq!(state.concurrency(), 3);
    assert_eq!(state.worker(1).map(|w| w.status), Some(WorkerStatus::Idle));
    assert!(state.worker(0).is_none());
    assert!(state.worker(4).is_none());
}

#[test]
fn progress_lands_on_the_running_unit() {
    let state = QueueStateReporter::new(1, Arc::new(RecordingReporter::new()));
    let app = UnitId::new("rs", Path::new("/repo/app"));

    state.assign(1, &app);
    state.progress(1, &app, "parsing".to_string());

    let worker = state.worker(1).unwrap();
    assert_eq!(worker.current_unit.as_ref(), Some(&app));
    assert_eq!(worker.progress_message.as_deref(), Some("parsing"));
}

#[test]
fn late_progress_from_a_finished_unit_is_dropped() {
    let sink = Arc::new(RecordingReporter::new());
    let state = QueueStateReporter::new(1, sink.clone());
    let lib = UnitId::new("rs", Path::new("/repo/app/lib"));
    let app = UnitId::new("rs", Path::new("/repo/app"));

    state.assign(1, &lib);
    state.complete(1, &UnitOutcome::Succeeded);
    state.release(1);
    state.assign(1, &app);
    let updates_before = sink.worker_updates().len();

    state.progress(1, &lib, "last line from lib".to_string());

    let worker = state.worker(1).unwrap();
    assert_eq!(worker.status, WorkerStatus::Working);
    assert_eq!(worker.current_unit.as_ref(), Some(&app));
    assert!(worker.progress_message.is_none());
    assert_eq!(sink.worker_updates().len(), updates_before);
}

#[test]
fn progress_for_an_idle_worker_is_dropped() {
    let state = QueueStateReporter::new(2, Arc::new(RecordingReporter::new()));
    let app = UnitId::new("rs", Path::new("/repo/app"));

    state.progress(2, &app, "orphan".to_string());
    state.progress(7, &app, "unknown worker".to_string());

    let worker = state.worker(2).unwrap();
    assert_eq!(worker.status, WorkerStatus::Idle);
    assert!(worker.progress_message.is_none());
}
