// src/store/mod.rs

//! Storage for per-unit generation results.
//!
//! A parent unit reads the results of its immediate child directories before
//! it runs, so the store is what carries context up the tree.
//!
//! - [`memory`] keeps results in process memory.
//! - [`file`] persists one record per unit under `<root>/.treedoc/results`,
//!   stamped with the run that wrote it.

pub mod file;
pub mod memory;

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use crate::errors::Result;
use crate::types::{BoxFuture, StoreMode};

pub use file::{FileResultStore, RESULTS_DIR};
pub use memory::MemoryResultStore;

/// Map of child directory name (one path segment) to generated content.
pub type ChildArtifacts = BTreeMap<String, String>;

/// Result storage consulted and updated by the task runner.
///
/// Reads only ever see results saved since the last [`ResultStore::begin_run`].
pub trait ResultStore: Send + Sync {
    /// Start a new run scope. Results saved before this call are no longer
    /// returned as child artifacts.
    fn begin_run(&self) -> BoxFuture<'_, Result<()>>;

    /// Results already produced for the *immediate* child directories of
    /// `directory` in `language`.
    fn child_artifacts<'a>(
        &'a self,
        directory: &'a Path,
        language: &'a str,
    ) -> BoxFuture<'a, Result<ChildArtifacts>>;

    /// Upsert the result for `(language, directory)`.
    fn save_result<'a>(
        &'a self,
        language: &'a str,
        content: String,
        directory: &'a Path,
    ) -> BoxFuture<'a, Result<()>>;
}

/// Build the store selected in config, scoped to `root`.
pub fn store_for_mode(mode: StoreMode, root: &Path) -> Arc<dyn ResultStore> {
    match mode {
        StoreMode::Memory => Arc::new(MemoryResultStore::new()),
        StoreMode::File => Arc::new(FileResultStore::new(root.to_path_buf())),
    }
}

/// Name of `child` relative to `directory`, if it sits exactly one segment
/// below it.
pub(crate) fn immediate_child_name(directory: &Path, child: &Path) -> Option<String> {
    if child.parent() != Some(directory) {
        return None;
    }
    child
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
}
