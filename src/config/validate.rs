// src/config/validate.rs

use globset::Glob;
use regex::Regex;

use crate::config::model::{ConfigFile, RawConfigFile};
use crate::errors::{Result, TreedocError};

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = crate::errors::TreedocError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        validate_raw_config(&raw)?;
        Ok(ConfigFile::new_unchecked(raw))
    }
}

fn validate_raw_config(cfg: &RawConfigFile) -> Result<()> {
    validate_run(cfg)?;
    validate_generator(cfg)?;
    validate_discover(cfg)?;
    Ok(())
}

fn validate_run(cfg: &RawConfigFile) -> Result<()> {
    if cfg.run.concurrency == 0 {
        return Err(TreedocError::ConfigError(
            "[run].concurrency must be >= 1 (got 0)".to_string(),
        ));
    }

    if cfg.run.output_dir.trim().is_empty() {
        return Err(TreedocError::ConfigError(
            "[run].output_dir must not be empty".to_string(),
        ));
    }

    validate_extension(&cfg.run.artifact_extension)
}

/// Extensions end up in file names, so no separators or dots.
fn validate_extension(ext: &str) -> Result<()> {
    if ext.is_empty() {
        return Err(TreedocError::ConfigError(
            "[run].artifact_extension must not be empty".to_string(),
        ));
    }
    if ext.contains(['/', '\\', '.']) || ext.chars().any(char::is_whitespace) {
        return Err(TreedocError::ConfigError(format!(
            "[run].artifact_extension '{ext}' must not contain dots, separators or whitespace"
        )));
    }
    Ok(())
}

fn validate_generator(cfg: &RawConfigFile) -> Result<()> {
    if cfg.generator.cmd.trim().is_empty() {
        return Err(TreedocError::ConfigError(
            "[generator].cmd is required".to_string(),
        ));
    }

    if let Some(pattern) = &cfg.generator.progress_pattern {
        Regex::new(pattern).map_err(|e| {
            TreedocError::ConfigError(format!(
                "[generator].progress_pattern is not a valid regex: {e}"
            ))
        })?;
    }

    Ok(())
}

fn validate_discover(cfg: &RawConfigFile) -> Result<()> {
    for pattern in &cfg.discover.exclude {
        Glob::new(pattern).map_err(|e| {
            TreedocError::ConfigError(format!("[discover].exclude has invalid glob '{pattern}': {e}"))
        })?;
    }

    for language in &cfg.discover.languages {
        let trimmed = language.trim_start_matches('.');
        if trimmed.is_empty() || trimmed.contains(['/', '\\']) {
            return Err(TreedocError::ConfigError(format!(
                "[discover].languages has invalid entry '{language}'"
            )));
        }
    }

    Ok(())
}
