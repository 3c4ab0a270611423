// src/artifact/naming.rs

use std::path::PathBuf;

use crate::types::WorkUnit;

/// Prefix shared by all staging artifact file names.
pub const STAGING_PREFIX: &str = ".treedoc-";

/// Deterministic artifact file names, derived from the language.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactNaming {
    extension: String,
}

impl ArtifactNaming {
    pub fn new(extension: impl Into<String>) -> Self {
        Self {
            extension: extension.into(),
        }
    }

    pub fn extension(&self) -> &str {
        &self.extension
    }

    /// Where the generator writes the artifact for `unit`:
    /// `<base dir of files>/.treedoc-<language>.<ext>`.
    pub fn staging_path(&self, unit: &WorkUnit) -> PathBuf {
        unit.base_dir().join(format!(
            "{STAGING_PREFIX}{}.{}",
            unit.language, self.extension
        ))
    }

    /// File name of the promoted artifact: `<language>.<ext>`.
    pub fn final_name(&self, language: &str) -> String {
        format!("{}.{}", language, self.extension)
    }

    /// Whether a file name looks like one of our staging artifacts.
    pub fn is_staging_name(name: &str) -> bool {
        name.starts_with(STAGING_PREFIX)
    }
}

impl Default for ArtifactNaming {
    fn default() -> Self {
        Self::new("md")
    }
}
