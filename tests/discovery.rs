// tests/discovery.rs

use std::path::PathBuf;
use std::sync::Arc;

use treedoc::discover::{DirectorySource, GroupSource};
use treedoc::fs::{MockFileSystem, RealFileSystem};
use treedoc::types::WorkUnit;
use treedoc_test_utils::builders::{ConfigFileBuilder, TempTree};

fn mock_tree(files: &[&str]) -> MockFileSystem {
    let fs = MockFileSystem::new();
    fs.add_dir("/repo");
    for f in files {
        fs.add_file(PathBuf::from("/repo").join(f), "x");
    }
    fs
}

fn keys(units: &[WorkUnit]) -> Vec<(String, PathBuf, usize)> {
    units
        .iter()
        .map(|u| (u.language.clone(), u.directory.clone(), u.files.len()))
        .collect()
}

#[test]
fn groups_files_by_extension_and_directory() {
    let fs = mock_tree(&[
        "main.rs",
        "lib.rs",
        "build.py",
        "src/a.rs",
        "src/b.rs",
        "src/nested/c.rs",
        "README",
    ]);
    let units = DirectorySource::new(Arc::new(fs))
        .discover("/repo".as_ref())
        .unwrap();

    assert_eq!(
        keys(&units),
        vec![
            ("py".to_string(), PathBuf::from("/repo"), 1),
            ("rs".to_string(), PathBuf::from("/repo"), 2),
            ("rs".to_string(), PathBuf::from("/repo/src"), 2),
            ("rs".to_string(), PathBuf::from("/repo/src/nested"), 1),
        ]
    );

    let root_rs = &units[1];
    assert_eq!(
        root_rs.files,
        vec![PathBuf::from("/repo/lib.rs"), PathBuf::from("/repo/main.rs")]
    );
}

#[test]
fn skips_staging_artifacts_and_state_dir() {
    let fs = mock_tree(&[
        "app/main.rs",
        "app/.treedoc-rs.md",
        ".treedoc/results/abc.toml",
    ]);
    let units = DirectorySource::new(Arc::new(fs))
        .discover("/repo".as_ref())
        .unwrap();

    assert_eq!(keys(&units), vec![("rs".to_string(), PathBuf::from("/repo/app"), 1)]);
}

#[test]
fn exclude_globs_are_relative_to_the_root() {
    let fs = mock_tree(&["src/a.rs", "target/debug/gen.rs", "vendor/x/y.rs"]);
    let units = DirectorySource::new(Arc::new(fs))
        .with_exclude(&["target".to_string(), "vendor/**".to_string()])
        .unwrap()
        .discover("/repo".as_ref())
        .unwrap();

    assert_eq!(keys(&units), vec![("rs".to_string(), PathBuf::from("/repo/src"), 1)]);
}

#[test]
fn invalid_exclude_glob_is_an_error() {
    let result = DirectorySource::new(Arc::new(MockFileSystem::new()))
        .with_exclude(&["a/{b".to_string()]);
    assert!(result.is_err());
}

#[test]
fn language_filter_keeps_only_listed_extensions() {
    let fs = mock_tree(&["a.rs", "b.py", "c.ts"]);
    let units = DirectorySource::new(Arc::new(fs))
        .with_languages([".rs".to_string(), "ts".to_string()])
        .discover("/repo".as_ref())
        .unwrap();

    let languages: Vec<_> = units.iter().map(|u| u.language.as_str()).collect();
    assert_eq!(languages, vec!["rs", "ts"]);
}

#[test]
fn skip_dir_prunes_the_output_directory() {
    let fs = mock_tree(&["src/a.rs", "docs/rs.md"]);
    let units = DirectorySource::new(Arc::new(fs))
        .skip_dir("/repo/docs")
        .discover("/repo".as_ref())
        .unwrap();

    assert!(units.iter().all(|u| u.language != "md"));
}

#[test]
fn from_config_applies_the_discover_section() {
    let cfg = ConfigFileBuilder::new()
        .exclude("gen/**")
        .language("py")
        .build();
    let fs = mock_tree(&["a.py", "gen/b.py", "c.rs"]);

    let units = DirectorySource::from_config(Arc::new(fs), &cfg)
        .unwrap()
        .discover("/repo".as_ref())
        .unwrap();

    assert_eq!(keys(&units), vec![("py".to_string(), PathBuf::from("/repo"), 1)]);
}

#[test]
fn real_tree_discovery_is_deterministic() {
    let tree = TempTree::new();
    tree.file("z/last.go", "package z");
    tree.file("a/first.go", "package a");
    tree.file("a/second.go", "package a");
    tree.file("a/.treedoc-go.md", "stale");

    let source = DirectorySource::new(Arc::new(RealFileSystem));
    let first = source.discover(tree.root()).unwrap();
    let second = source.discover(tree.root()).unwrap();

    assert_eq!(first, second);
    assert_eq!(
        keys(&first),
        vec![
            ("go".to_string(), tree.path("a"), 2),
            ("go".to_string(), tree.path("z"), 1),
        ]
    );
}

#[test]
fn symlinked_directories_are_not_followed() {
    let fs = mock_tree(&["src/a.rs"]);
    fs.add_dir_symlink("/repo/vendor");
    fs.add_file("/repo/vendor/b.rs", "x");

    let units = DirectorySource::new(Arc::new(fs))
        .discover("/repo".as_ref())
        .unwrap();

    assert_eq!(keys(&units), vec![("rs".to_string(), PathBuf::from("/repo/src"), 1)]);
}

#[cfg(unix)]
#[test]
fn symlink_cycle_does_not_trap_the_walk() {
    let tree = TempTree::new();
    tree.file("a/b/inner.rs", "fn f() {}");
    std::os::unix::fs::symlink(tree.path("a"), tree.path("a/b/up")).unwrap();
    std::os::unix::fs::symlink(tree.root(), tree.path("a/root")).unwrap();

    let units = DirectorySource::new(Arc::new(RealFileSystem))
        .discover(tree.root())
        .unwrap();

    assert_eq!(keys(&units), vec![("rs".to_string(), tree.path("a/b"), 1)]);
}
