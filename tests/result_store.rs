// tests/result_store.rs

use std::path::Path;
use std::sync::Arc;

use treedoc::engine::{NoopReporter, Orchestrator};
use treedoc::fs::{FileSystem, RealFileSystem};
use treedoc::store::{FileResultStore, MemoryResultStore, ResultStore};
use treedoc_test_utils::builders::{TempTree, options, request};
use treedoc_test_utils::{FakeGenerator, child_names, with_timeout};

async fn seed(store: &dyn ResultStore, root: &Path) {
    let entries = [
        ("rs", "app", "app docs"),
        ("rs", "app/core", "core docs"),
        ("rs", "app/util", "util docs"),
        ("rs", "app/core/deep", "deep docs"),
        ("py", "app/scripts", "py docs"),
    ];
    for (lang, dir, content) in entries {
        store
            .save_result(lang, content.to_string(), &root.join(dir))
            .await
            .unwrap();
    }
}

async fn check_immediate_children(store: &dyn ResultStore, root: &Path) {
    let children = store.child_artifacts(&root.join("app"), "rs").await.unwrap();
    assert_eq!(
        children.into_iter().collect::<Vec<_>>(),
        vec![
            ("core".to_string(), "core docs".to_string()),
            ("util".to_string(), "util docs".to_string()),
        ]
    );

    let py = store.child_artifacts(&root.join("app"), "py").await.unwrap();
    assert_eq!(py.keys().cloned().collect::<Vec<_>>(), vec!["scripts".to_string()]);

    let leaf = store
        .child_artifacts(&root.join("app/core/deep"), "rs")
        .await
        .unwrap();
    assert!(leaf.is_empty());
}

#[tokio::test]
async fn memory_store_returns_only_immediate_children() {
    let store = MemoryResultStore::new();
    let root = Path::new("/repo");
    seed(&store, root).await;

    check_immediate_children(&store, root).await;
    assert_eq!(store.len(), 5);
    assert_eq!(store.get("rs", &root.join("app")).as_deref(), Some("app docs"));
}

#[tokio::test]
async fn file_store_returns_only_immediate_children() {
    let tree = TempTree::new();
    let store = FileResultStore::new(tree.root().to_path_buf());
    seed(&store, tree.root()).await;

    check_immediate_children(&store, tree.root()).await;
    assert!(store.results_dir().is_dir());
}

#[tokio::test]
async fn saving_again_replaces_the_result() {
    let tree = TempTree::new();
    let store = FileResultStore::new(tree.root().to_path_buf());
    let child = tree.path("app/core");

    store.save_result("rs", "v1".into(), &child).await.unwrap();
    store.save_result("rs", "v2".into(), &child).await.unwrap();

    let children = store.child_artifacts(&tree.path("app"), "rs").await.unwrap();
    assert_eq!(children.get("core").map(String::as_str), Some("v2"));
    assert_eq!(std::fs::read_dir(store.results_dir()).unwrap().count(), 1);
}

async fn check_earlier_run_is_hidden(store: &dyn ResultStore, root: &Path) {
    store
        .save_result("rs", "stale lib docs".into(), &root.join("app/lib"))
        .await
        .unwrap();
    store.begin_run().await.unwrap();

    let children = store.child_artifacts(&root.join("app"), "rs").await.unwrap();
    assert!(children.is_empty(), "stale children: {children:?}");

    store
        .save_result("rs", "fresh util docs".into(), &root.join("app/util"))
        .await
        .unwrap();
    let children = store.child_artifacts(&root.join("app"), "rs").await.unwrap();
    assert_eq!(children.keys().cloned().collect::<Vec<_>>(), vec!["util".to_string()]);
}

#[tokio::test]
async fn memory_store_forgets_results_from_an_earlier_run() {
    let store = MemoryResultStore::new();
    check_earlier_run_is_hidden(&store, Path::new("/repo")).await;
    assert_eq!(store.len(), 1);
}

#[tokio::test]
async fn file_store_ignores_results_from_an_earlier_run() {
    let tree = TempTree::new();
    let store = FileResultStore::new(tree.root().to_path_buf());
    let first_run = store.run_id();

    check_earlier_run_is_hidden(&store, tree.root()).await;

    assert_ne!(store.run_id(), first_run);
    // The stale record stays on disk; it is only filtered on read.
    assert_eq!(std::fs::read_dir(store.results_dir()).unwrap().count(), 2);
}

#[tokio::test]
async fn reopened_file_store_starts_a_new_run() {
    let tree = TempTree::new();
    FileResultStore::new(tree.root().to_path_buf())
        .save_result("go", "svc docs".into(), &tree.path("svc/api"))
        .await
        .unwrap();

    let reopened = FileResultStore::new(tree.root().to_path_buf());
    let children = reopened.child_artifacts(&tree.path("svc"), "go").await.unwrap();
    assert!(children.is_empty());
}

#[tokio::test]
async fn child_failing_on_a_rerun_leaves_the_parent_without_its_old_result() {
    let tree = TempTree::new();
    let units = vec![
        tree.unit("rs", "app", &["main.rs"]),
        tree.unit("rs", "app/lib", &["lib.rs"]),
    ];
    let store: Arc<dyn ResultStore> = Arc::new(FileResultStore::new(tree.root().to_path_buf()));
    let run = |generator: Arc<FakeGenerator>| {
        let fs: Arc<dyn FileSystem> = Arc::new(RealFileSystem);
        Orchestrator::new(
            options(1),
            generator,
            Arc::clone(&store),
            fs,
            Arc::new(NoopReporter),
        )
    };

    let first = Arc::new(FakeGenerator::new());
    let summary = with_timeout(run(first.clone()).run(request(&tree, units.clone())))
        .await
        .unwrap();
    assert!(summary.is_clean());
    assert_eq!(child_names(&first.call_for(tree.path("app")).unwrap()), vec!["lib"]);

    let second = Arc::new(FakeGenerator::new().fail_in(tree.path("app/lib")));
    let summary = with_timeout(run(second.clone()).run(request(&tree, units)))
        .await
        .unwrap();
    assert_eq!(summary.failed.len(), 1);
    assert!(child_names(&second.call_for(tree.path("app")).unwrap()).is_empty());
}

#[tokio::test]
async fn file_store_ignores_records_outside_its_root() {
    let tree = TempTree::new();
    let store = FileResultStore::new(tree.path("project"));
    store
        .save_result("rs", "stray".into(), Path::new("/elsewhere/app/core"))
        .await
        .unwrap();
    tree.file("project/.treedoc/results/garbage.toml", "not = [valid");

    let children = store
        .child_artifacts(Path::new("/elsewhere/app"), "rs")
        .await
        .unwrap();
    assert!(children.is_empty());
}

#[tokio::test]
async fn empty_file_store_has_no_children() {
    let tree = TempTree::new();
    let store = FileResultStore::new(tree.root().to_path_buf());
    let children = store.child_artifacts(tree.root(), "rs").await.unwrap();
    assert!(children.is_empty());
}
