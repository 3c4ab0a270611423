use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use treedoc::errors::{Result, TreedocError};
use treedoc::exec::{GenerateRequest, Generator};
use treedoc::fs::{FileSystem, RealFileSystem};
use treedoc::store::ChildArtifacts;
use treedoc::types::{BoxFuture, UnitId};

/// What happened to one `generate` call.
#[derive(Debug, Clone)]
pub struct GenerateCall {
    pub unit: UnitId,
    pub directory: PathBuf,
    pub artifact_path: PathBuf,
    pub child_artifacts: ChildArtifacts,
}

/// A scripted generator that:
/// - records every call in start order (with the child artifacts it got)
/// - tracks how many calls run at once
/// - writes `"<language> docs for <dir>"` to the artifact path
/// - fails, panics, blocks or ignores cancellation in chosen directories.
pub struct FakeGenerator {
    fs: Arc<dyn FileSystem>,
    calls: Mutex<Vec<GenerateCall>>,
    current: AtomicUsize,
    max: AtomicUsize,
    delay: Option<Duration>,
    failing: HashSet<PathBuf>,
    panicking: HashSet<PathBuf>,
    blocking: HashSet<PathBuf>,
    block_all: bool,
    stubborn: HashSet<PathBuf>,
    skip_write: bool,
}

impl Default for FakeGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeGenerator {
    pub fn new() -> Self {
        Self {
            fs: Arc::new(RealFileSystem),
            calls: Mutex::new(Vec::new()),
            current: AtomicUsize::new(0),
            max: AtomicUsize::new(0),
            delay: None,
            failing: HashSet::new(),
            panicking: HashSet::new(),
            blocking: HashSet::new(),
            block_all: false,
            stubborn: HashSet::new(),
            skip_write: false,
        }
    }

    /// Write artifacts through `fs` instead of the real filesystem.
    pub fn with_fs(mut self, fs: Arc<dyn FileSystem>) -> Self {
        self.fs = fs;
        self
    }

    /// Sleep this long (cancellably) before writing.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Write a partial artifact in `dir`, then fail.
    pub fn fail_in(mut self, dir: impl AsRef<Path>) -> Self {
        self.failing.insert(dir.as_ref().to_path_buf());
        self
    }

    pub fn panic_in(mut self, dir: impl AsRef<Path>) -> Self {
        self.panicking.insert(dir.as_ref().to_path_buf());
        self
    }

    /// Write a partial artifact in `dir`, then wait for cancellation.
    pub fn block_in(mut self, dir: impl AsRef<Path>) -> Self {
        self.blocking.insert(dir.as_ref().to_path_buf());
        self
    }

    /// Every unit waits for cancellation.
    pub fn block_all(mut self) -> Self {
        self.block_all = true;
        self
    }

    /// Write a partial artifact in `dir`, then hang, ignoring cancellation.
    pub fn ignore_cancel_in(mut self, dir: impl AsRef<Path>) -> Self {
        self.stubborn.insert(dir.as_ref().to_path_buf());
        self
    }

    /// Succeed without writing anything.
    pub fn without_artifacts(mut self) -> Self {
        self.skip_write = true;
        self
    }

    pub fn calls(&self) -> Vec<GenerateCall> {
        self.calls.lock().unwrap().clone()
    }

    /// Directories in the order their units started.
    pub fn started_dirs(&self) -> Vec<PathBuf> {
        self.calls().into_iter().map(|c| c.directory).collect()
    }

    pub fn call_for(&self, dir: impl AsRef<Path>) -> Option<GenerateCall> {
        self.calls()
            .into_iter()
            .find(|c| c.directory == dir.as_ref())
    }

    /// Highest number of calls that were in progress at the same time.
    pub fn max_concurrency(&self) -> usize {
        self.max.load(Ordering::SeqCst)
    }

    fn write_artifact(&self, request: &GenerateRequest, content: &str) -> Result<()> {
        self.fs.write(&request.artifact_path, content.as_bytes())?;
        Ok(())
    }

    async fn run(&self, request: GenerateRequest) -> Result<()> {
        let dir = request.unit.directory.clone();
        self.calls.lock().unwrap().push(GenerateCall {
            unit: request.unit.id.clone(),
            directory: dir.clone(),
            artifact_path: request.artifact_path.clone(),
            child_artifacts: request.child_artifacts.clone(),
        });

        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.max.fetch_max(now, Ordering::SeqCst);
        let _active = ActiveGuard(&self.current);

        request.progress.report(format!("generating {}", request.unit.id)).await;

        if let Some(delay) = self.delay {
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = request.cancel.cancelled() => return Err(TreedocError::Cancelled),
            }
        }

        if self.failing.contains(&dir) {
            self.write_artifact(&request, "partial")?;
            return Err(TreedocError::Generator(format!(
                "scripted failure in {}",
                dir.display()
            )));
        }

        if self.panicking.contains(&dir) {
            panic!("scripted panic in {}", dir.display());
        }

        if self.block_all || self.blocking.contains(&dir) {
            self.write_artifact(&request, "partial")?;
            request.cancel.cancelled().await;
            return Err(TreedocError::Cancelled);
        }

        if self.stubborn.contains(&dir) {
            self.write_artifact(&request, "partial")?;
            std::future::pending::<()>().await;
        }

        if !self.skip_write {
            let mut content = format!("{} docs for {}\n", request.unit.language, dir.display());
            for (child, text) in &request.child_artifacts {
                content.push_str(&format!("[{child}] {}", text));
            }
            self.write_artifact(&request, &content)?;
        }
        Ok(())
    }
}

impl Generator for FakeGenerator {
    fn generate(&self, request: GenerateRequest) -> BoxFuture<'_, Result<()>> {
        Box::pin(self.run(request))
    }
}

struct ActiveGuard<'a>(&'a AtomicUsize);

impl Drop for ActiveGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Child artifact names a unit received, for assertions.
pub fn child_names(call: &GenerateCall) -> Vec<String> {
    call.child_artifacts.keys().cloned().collect()
}
