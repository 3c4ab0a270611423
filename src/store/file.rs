// src/store/file.rs

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{Context, anyhow};
use blake3::Hasher;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::errors::Result;
use crate::store::{ChildArtifacts, ResultStore, immediate_child_name};
use crate::types::BoxFuture;

/// Relative path (from the run root) to the results directory.
///
/// The effective path on disk is `<root>/.treedoc/results`, holding one TOML
/// record per `(language, directory)`.
pub const RESULTS_DIR: &str = ".treedoc/results";

/// One stored unit result.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ResultRecord {
    /// Run that wrote the record. Records without one never match.
    #[serde(default)]
    run: String,
    language: String,
    directory: PathBuf,
    content: String,
}

/// Stores results as files under `<root>/.treedoc/results`.
///
/// Every record carries the id of the run that wrote it. Reads skip records
/// from other runs and records whose directory lies outside `root`, so stale
/// files on disk never reach a parent unit. A fresh store starts its own run.
#[derive(Debug)]
pub struct FileResultStore {
    root: PathBuf,
    run: Mutex<String>,
}

impl FileResultStore {
    pub fn new(root: PathBuf) -> Self {
        let run = Mutex::new(new_run_id(&root));
        Self { root, run }
    }

    /// Id stamped into records saved by the current run.
    pub fn run_id(&self) -> String {
        self.run_guard().clone()
    }

    fn run_guard(&self) -> MutexGuard<'_, String> {
        self.run.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn results_dir(&self) -> PathBuf {
        self.root.join(RESULTS_DIR)
    }

    fn record_path(&self, language: &str, directory: &Path) -> PathBuf {
        self.results_dir()
            .join(format!("{}.toml", record_key(language, directory)))
    }

    async fn load_records(&self) -> Result<Vec<ResultRecord>> {
        let dir = self.results_dir();
        if !tokio::fs::try_exists(&dir).await? {
            return Ok(Vec::new());
        }

        let run = self.run_id();
        let mut records = Vec::new();
        let mut entries = tokio::fs::read_dir(&dir)
            .await
            .with_context(|| format!("reading results dir {:?}", dir))?;

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("toml") {
                continue;
            }
            let text = tokio::fs::read_to_string(&path)
                .await
                .with_context(|| format!("reading result record {:?}", path))?;
            match toml::from_str::<ResultRecord>(&text) {
                Ok(record) if record.run != run => {
                    debug!(directory = %record.directory.display(), run = %record.run, "ignoring result record from another run");
                }
                Ok(record) if record.directory.starts_with(&self.root) => records.push(record),
                Ok(record) => {
                    debug!(directory = %record.directory.display(), "ignoring out-of-scope result record");
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "skipping unreadable result record");
                }
            }
        }

        Ok(records)
    }
}

static RUN_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Fresh id for a run scope.
fn new_run_id(root: &Path) -> String {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or_default();
    let mut hasher = Hasher::new();
    hasher.update(root.to_string_lossy().as_bytes());
    hasher.update(&nanos.to_le_bytes());
    hasher.update(&std::process::id().to_le_bytes());
    hasher.update(&RUN_COUNTER.fetch_add(1, Ordering::Relaxed).to_le_bytes());
    hasher.finalize().to_hex().as_str()[..16].to_string()
}

/// Stable file name for a `(language, directory)` key.
fn record_key(language: &str, directory: &Path) -> String {
    let mut hasher = Hasher::new();
    hasher.update(language.as_bytes());
    hasher.update(&[0]);
    hasher.update(directory.to_string_lossy().as_bytes());
    hasher.finalize().to_hex().to_string()
}

impl ResultStore for FileResultStore {
    fn begin_run(&self) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            let run = new_run_id(&self.root);
            info!(run = %run, results = %self.results_dir().display(), "file store: new run scope");
            *self.run_guard() = run;
            Ok(())
        })
    }

    fn child_artifacts<'a>(
        &'a self,
        directory: &'a Path,
        language: &'a str,
    ) -> BoxFuture<'a, Result<ChildArtifacts>> {
        Box::pin(async move {
            let children = self
                .load_records()
                .await?
                .into_iter()
                .filter(|r| r.language == language)
                .filter_map(|r| {
                    immediate_child_name(directory, &r.directory).map(|name| (name, r.content))
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
            let record = ResultRecord {
                run: self.run_id(),
                language: language.to_string(),
                directory: directory.to_path_buf(),
                content,
            };
            let text = toml::to_string(&record)
                .map_err(|e| anyhow!("serializing result record for {:?}: {e}", directory))?;

            let path = self.record_path(language, directory);
            if let Some(parent) = path.parent() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .with_context(|| format!("creating results directory at {:?}", parent))?;
            }
            tokio::fs::write(&path, text)
                .await
                .with_context(|| format!("writing result record {:?}", path))?;

            info!(language, directory = %directory.display(), "stored unit result (file)");
            Ok(())
        })
    }
}
