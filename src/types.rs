use std::fmt;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;

use serde::Deserialize;

/// Boxed future used at the async trait seams (generator, result store).
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Language tag, derived from a file extension (without the leading dot).
pub type Language = String;

/// Stable identifier of a [`WorkUnit`], derived from `(language, directory)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UnitId(String);

impl UnitId {
    pub fn new(language: &str, directory: &Path) -> Self {
        Self(format!("{}:{}", language, directory.display()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// All files of one language in one directory: the schedulable item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkUnit {
    pub id: UnitId,
    pub language: Language,
    pub directory: PathBuf,
    pub files: Vec<PathBuf>,
}

impl WorkUnit {
    pub fn new(
        language: impl Into<Language>,
        directory: impl Into<PathBuf>,
        files: Vec<PathBuf>,
    ) -> Self {
        let language = language.into();
        let directory = directory.into();
        Self {
            id: UnitId::new(&language, &directory),
            language,
            directory,
            files,
        }
    }

    /// Number of path components in `directory`. Used to decide which
    /// artifact of a language sits nearest the root.
    pub fn depth(&self) -> usize {
        self.directory.components().count()
    }

    /// Directory shared by all of this unit's files.
    ///
    /// Falls back to `directory` if the files do not share a parent (or the
    /// unit has no files).
    pub fn base_dir(&self) -> PathBuf {
        let mut parents = self.files.iter().filter_map(|f| f.parent());
        let Some(first) = parents.next() else {
            return self.directory.clone();
        };

        let mut base = first.to_path_buf();
        for parent in parents {
            while !parent.starts_with(&base) {
                if !base.pop() {
                    return self.directory.clone();
                }
            }
        }

        if base.as_os_str().is_empty() {
            self.directory.clone()
        } else {
            base
        }
    }
}

/// What happens to the ancestors of a unit whose generator failed.
///
/// - `Lenient`: the failed unit still counts as completed, so its parent is
///   unlocked and runs with whatever child artifacts exist (default).
/// - `Strict`: every same-language ancestor of the failed unit is skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    #[default]
    Lenient,
    Strict,
}

/// Where per-unit generation results are stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StoreMode {
    /// Keep results in memory for the lifetime of the process.
    #[default]
    Memory,
    /// Persist results under `<input>/.treedoc/results`.
    File,
}
