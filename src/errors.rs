// src/errors.rs

//! Crate-wide error aliases and helpers.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum TreedocError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Duplicate work unit: {0}")]
    DuplicateUnit(String),

    #[error("Cycle detected in dependency graph: {0}")]
    DagCycle(String),

    #[error("Scheduler invariant violated: {0}")]
    Invariant(String),

    #[error("cancelled")]
    Cancelled,

    #[error("Generator failed: {0}")]
    Generator(String),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl TreedocError {
    /// Whether this error was caused by run cancellation rather than a real
    /// failure of the unit.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, TreedocError::Cancelled)
    }
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, TreedocError>;
