// src/store/memory.rs

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::debug;

use crate::errors::Result;
use crate::store::{ChildArtifacts, ResultStore, immediate_child_name};
use crate::types::{BoxFuture, Language};

/// Stores results in memory only (lost on exit).
#[derive(Debug, Default)]
pub struct MemoryResultStore {
    results: Mutex<HashMap<(Language, PathBuf), String>>,
}

impl MemoryResultStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stored result for `(language, directory)`, if any.
    pub fn get(&self, language: &str, directory: &Path) -> Option<String> {
        self.results()
            .get(&(language.to_string(), directory.to_path_buf()))
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.results().len()
    }

    pub fn is_empty(&self) -> bool {
        self.results().is_empty()
    }

    fn results(&self) -> MutexGuard<'_, HashMap<(Language, PathBuf), String>> {
        self.results.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl ResultStore for MemoryResultStore {
    fn begin_run(&self) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            let mut results = self.results();
            debug!(dropped = results.len(), "clearing results from the previous run");
            results.clear();
            Ok(())
        })
    }

    fn child_artifacts<'a>(
        &'a self,
        directory: &'a Path,
        language: &'a str,
    ) -> BoxFuture<'a, Result<ChildArtifacts>> {
        Box::pin(async move {
            let children: ChildArtifacts = self
                .results()
                .iter()
                .filter(|((lang, _), _)| lang == language)
                .filter_map(|((_, dir), content)| {
                    immediate_child_name(directory, dir).map(|name| (name, content.clone()))
                })
                .collect();
            Ok(children)
        })
    }

    fn save_result<'a>(
        &'a self,
        language: &'a str,
        content: String,
        directory: &'a Path,
    ) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            self.results()
                .insert((language.to_string(), directory.to_path_buf()), content);
            debug!(language, directory = %directory.display(), "stored unit result (memory)");
            Ok(())
        })
    }
}
