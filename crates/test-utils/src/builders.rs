#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;
use treedoc::artifact::ArtifactNaming;
use treedoc::config::loader::parse_raw;
use treedoc::config::{ConfigFile, RawConfigFile};
use treedoc::engine::{Orchestrator, OrchestratorOptions, Reporter, RunRequest};
use treedoc::exec::Generator;
use treedoc::fs::{FileSystem, RealFileSystem};
use treedoc::store::MemoryResultStore;
use treedoc::types::{FailurePolicy, WorkUnit};

/// Build a unit for `dir` whose files are `names` inside it. Nothing is
/// created on disk.
pub fn unit(language: &str, dir: impl AsRef<Path>, names: &[&str]) -> WorkUnit {
    let dir = dir.as_ref();
    WorkUnit::new(
        language,
        dir,
        names.iter().map(|n| dir.join(n)).collect(),
    )
}

/// A real directory tree under a temp dir.
pub struct TempTree {
    dir: TempDir,
}

impl TempTree {
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().expect("creating temp dir"),
        }
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn path(&self, rel: &str) -> PathBuf {
        if rel.is_empty() || rel == "." {
            self.root().to_path_buf()
        } else {
            self.root().join(rel)
        }
    }

    /// Create `rel` (and its parents) with `contents`.
    pub fn file(&self, rel: &str, contents: &str) -> PathBuf {
        let path = self.path(rel);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("creating parent dirs");
        }
        std::fs::write(&path, contents).expect("writing file");
        path
    }

    /// Create the files of a unit in `rel_dir` and return the unit.
    pub fn unit(&self, language: &str, rel_dir: &str, names: &[&str]) -> WorkUnit {
        let dir = self.path(rel_dir);
        std::fs::create_dir_all(&dir).expect("creating unit dir");
        for name in names {
            std::fs::write(dir.join(name), "content").expect("writing unit file");
        }
        unit(language, &dir, names)
    }

    /// Every file under the root, relative, with forward slashes, sorted.
    pub fn list_files(&self) -> Vec<String> {
        let mut out = Vec::new();
        let mut stack = vec![self.root().to_path_buf()];
        while let Some(dir) = stack.pop() {
            for entry in std::fs::read_dir(&dir).expect("reading dir") {
                let path = entry.expect("dir entry").path();
                if path.is_dir() {
                    stack.push(path);
                } else {
                    let rel = path.strip_prefix(self.root()).expect("under root");
                    out.push(rel.to_string_lossy().replace('\\', "/"));
                }
            }
        }
        out.sort();
        out
    }

    /// Staging artifacts left anywhere in the tree.
    pub fn staging_files(&self) -> Vec<String> {
        self.list_files()
            .into_iter()
            .filter(|f| {
                f.rsplit('/')
                    .next()
                    .is_some_and(ArtifactNaming::is_staging_name)
            })
            .collect()
    }
}

impl Default for TempTree {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for `ConfigFile` to simplify test setup.
pub struct ConfigFileBuilder {
    config: RawConfigFile,
}

impl ConfigFileBuilder {
    pub fn new() -> Self {
        let mut config = parse_raw("").expect("empty config deserializes");
        config.generator.cmd = "true".to_string();
        Self { config }
    }

    pub fn cmd(mut self, cmd: &str) -> Self {
        self.config.generator.cmd = cmd.to_string();
        self
    }

    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.run.concurrency = n;
        self
    }

    pub fn strict(mut self) -> Self {
        self.config.run.failure_policy = FailurePolicy::Strict;
        self
    }

    pub fn exclude(mut self, pattern: &str) -> Self {
        self.config.discover.exclude.push(pattern.to_string());
        self
    }

    pub fn language(mut self, language: &str) -> Self {
        self.config.discover.languages.push(language.to_string());
        self
    }

    pub fn build_raw(self) -> RawConfigFile {
        self.config
    }

    pub fn build(self) -> ConfigFile {
        ConfigFile::try_from(self.config).expect("Failed to build valid config from builder")
    }
}

impl Default for ConfigFileBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Orchestrator options for tests: short cancel grace, lenient policy.
pub fn options(concurrency: usize) -> OrchestratorOptions {
    OrchestratorOptions {
        concurrency,
        cancel_grace: Duration::from_millis(200),
        ..OrchestratorOptions::default()
    }
}

/// Orchestrator over the real filesystem with an in-memory store.
pub fn orchestrator(
    options: OrchestratorOptions,
    generator: Arc<dyn Generator>,
    reporter: Arc<dyn Reporter>,
) -> (Orchestrator, Arc<MemoryResultStore>) {
    let store = Arc::new(MemoryResultStore::new());
    let fs: Arc<dyn FileSystem> = Arc::new(RealFileSystem);
    let orch = Orchestrator::new(options, generator, store.clone(), fs, reporter);
    (orch, store)
}

/// A run request over `units` with output at `<root>/docs`.
pub fn request(tree: &TempTree, units: Vec<WorkUnit>) -> RunRequest {
    RunRequest::from_units(units, tree.root(), tree.path("docs"))
}
