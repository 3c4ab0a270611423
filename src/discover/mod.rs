// src/discover/mod.rs

//! Turning a directory tree into work units.

pub mod patterns;

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use globset::GlobSet;
use tracing::{debug, info};

use crate::artifact::ArtifactNaming;
use crate::config::ConfigFile;
use crate::errors::Result;
use crate::fs::FileSystem;
use crate::types::{Language, WorkUnit};

use self::patterns::{build_globset, relative_str};

/// Directory, relative to the input root, that treedoc keeps its own state in.
pub const STATE_DIR: &str = ".treedoc";

/// Yields the work units of a run.
pub trait GroupSource {
    /// Every unit under `root`. Units never have an empty file list.
    fn discover(&self, root: &Path) -> Result<Vec<WorkUnit>>;
}

/// Walks a directory tree and groups regular files by
/// `(extension, parent directory)`.
///
/// Skips paths matching the exclude globs (relative to the root, forward
/// slashes), treedoc staging artifacts, the `.treedoc` state directory and
/// any extra directories registered with [`DirectorySource::skip_dir`].
#[derive(Debug, Clone)]
pub struct DirectorySource {
    fs: Arc<dyn FileSystem>,
    languages: BTreeSet<Language>,
    exclude: Option<GlobSet>,
    skip_dirs: Vec<PathBuf>,
}

impl DirectorySource {
    pub fn new(fs: Arc<dyn FileSystem>) -> Self {
        Self {
            fs,
            languages: BTreeSet::new(),
            exclude: None,
            skip_dirs: Vec::new(),
        }
    }

    /// Build a source from the `[discover]` section.
    pub fn from_config(fs: Arc<dyn FileSystem>, cfg: &ConfigFile) -> Result<Self> {
        Self::new(fs)
            .with_languages(cfg.discover.languages.iter().cloned())
            .with_exclude(&cfg.discover.exclude)
    }

    /// Only keep these extensions. An empty set keeps everything.
    pub fn with_languages(mut self, languages: impl IntoIterator<Item = String>) -> Self {
        self.languages = languages
            .into_iter()
            .map(|l| l.trim_start_matches('.').to_string())
            .collect();
        self
    }

    pub fn with_exclude(mut self, patterns: &[String]) -> Result<Self> {
        self.exclude = if patterns.is_empty() {
            None
        } else {
            Some(build_globset(patterns).context("building discover exclude globset")?)
        };
        Ok(self)
    }

    /// Never descend into `dir`.
    pub fn skip_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.skip_dirs.push(dir.into());
        self
    }

    fn is_excluded(&self, root: &Path, path: &Path) -> bool {
        match (&self.exclude, relative_str(root, path)) {
            (Some(set), Some(rel)) => set.is_match(&rel),
            _ => false,
        }
    }

    fn keeps_language(&self, language: &str) -> bool {
        self.languages.is_empty() || self.languages.contains(language)
    }
}

impl GroupSource for DirectorySource {
    fn discover(&self, root: &Path) -> Result<Vec<WorkUnit>> {
        let state_dir = root.join(STATE_DIR);
        let mut groups: BTreeMap<(Language, PathBuf), Vec<PathBuf>> = BTreeMap::new();
        let mut stack = vec![root.to_path_buf()];

        while let Some(dir) = stack.pop() {
            for path in self.fs.read_dir(&dir)? {
                if self.is_excluded(root, &path) {
                    debug!(path = %path.display(), "excluded by pattern");
                    continue;
                }

                if self.fs.is_dir(&path) {
                    if path == state_dir || self.skip_dirs.iter().any(|d| *d == path) {
                        debug!(path = %path.display(), "skipping directory");
                        continue;
                    }
                    // Links may point back up the tree.
                    if self.fs.is_symlink(&path) {
                        debug!(path = %path.display(), "skipping symlinked directory");
                        continue;
                    }
                    stack.push(path);
                    continue;
                }

                if !self.fs.is_file(&path) {
                    continue;
                }

                let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                    continue;
                };
                if ArtifactNaming::is_staging_name(name) {
                    continue;
                }

                let Some(language) = path.extension().and_then(|e| e.to_str()) else {
                    continue;
                };
                if language.is_empty() || !self.keeps_language(language) {
                    continue;
                }

                groups
                    .entry((language.to_string(), dir.clone()))
                    .or_default()
                    .push(path);
            }
        }

        let units: Vec<WorkUnit> = groups
            .into_iter()
            .map(|((language, directory), mut files)| {
                files.sort();
                WorkUnit::new(language, directory, files)
            })
            .collect();

        info!(
            root = %root.display(),
            units = units.len(),
            files = units.iter().map(|u| u.files.len()).sum::<usize>(),
            "discovered work units"
        );

        Ok(units)
    }
}
