// src/config/model.rs

use serde::Deserialize;

use crate::types::{FailurePolicy, StoreMode};

/// Top-level configuration as read from a TOML file.
///
/// ```toml
/// [run]
/// concurrency = 4
/// output_dir = "docs"
///
/// [generator]
/// cmd = "my-doc-tool --lang $TREEDOC_LANGUAGE > $TREEDOC_OUTPUT"
///
/// [discover]
/// exclude = ["**/target/**"]
/// ```
///
/// Only `[generator].cmd` is required.
#[derive(Debug, Clone, Deserialize)]
pub struct RawConfigFile {
    #[serde(default)]
    pub run: RunSection,

    #[serde(default)]
    pub generator: GeneratorSection,

    #[serde(default)]
    pub discover: DiscoverSection,

    #[serde(default)]
    pub store: StoreSection,
}

/// Validated configuration. Only obtainable through `TryFrom<RawConfigFile>`.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    pub run: RunSection,
    pub generator: GeneratorSection,
    pub discover: DiscoverSection,
    pub store: StoreSection,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(raw: RawConfigFile) -> Self {
        Self {
            run: raw.run,
            generator: raw.generator,
            discover: raw.discover,
            store: raw.store,
        }
    }
}

/// `[run]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct RunSection {
    /// Number of worker slots (>= 1).
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Where promoted artifacts go, relative to the input directory unless
    /// absolute.
    #[serde(default = "default_output_dir")]
    pub output_dir: String,

    /// Extension of artifact files, without the dot.
    #[serde(default = "default_artifact_extension")]
    pub artifact_extension: String,

    #[serde(default)]
    pub failure_policy: FailurePolicy,

    /// Seconds in-flight units get to stop after cancellation.
    #[serde(default = "default_cancel_grace_secs")]
    pub cancel_grace_secs: u64,
}

fn default_concurrency() -> usize {
    4
}

fn default_output_dir() -> String {
    "docs".to_string()
}

fn default_artifact_extension() -> String {
    "md".to_string()
}

fn default_cancel_grace_secs() -> u64 {
    10
}

impl Default for RunSection {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            output_dir: default_output_dir(),
            artifact_extension: default_artifact_extension(),
            failure_policy: FailurePolicy::default(),
            cancel_grace_secs: default_cancel_grace_secs(),
        }
    }
}

/// `[generator]` section.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct GeneratorSection {
    /// Shell command run once per unit.
    #[serde(default)]
    pub cmd: String,

    /// Regex selecting which stdout lines are progress messages. Capture
    /// group 1, if present, is used as the message.
    #[serde(default)]
    pub progress_pattern: Option<String>,
}

/// `[discover]` section.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct DiscoverSection {
    /// Extensions to keep. Empty means all.
    #[serde(default)]
    pub languages: Vec<String>,

    /// Globs, relative to the input directory, of paths to skip.
    #[serde(default)]
    pub exclude: Vec<String>,
}

/// `[store]` section.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct StoreSection {
    #[serde(default)]
    pub mode: StoreMode,
}
