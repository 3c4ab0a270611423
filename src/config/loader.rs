// src/config/loader.rs

use std::fs;
use std::path::{Path, PathBuf};

use regex::Regex;

use crate::config::model::{ConfigFile, RawConfigFile};
use crate::errors::{Result, TreedocError};

pub const DEFAULT_CONFIG_FILE: &str = "Treedoc.toml";

/// Load a configuration file from a given path and return the raw `RawConfigFile`.
///
/// This only performs TOML deserialization; it does **not** perform semantic
/// validation. Use [`load_and_validate`] for that.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawConfigFile> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path)?;
    parse_raw(&contents)
}

pub fn parse_raw(contents: &str) -> Result<RawConfigFile> {
    let config: RawConfigFile = toml::from_str(contents)?;
    Ok(config)
}

/// Load a configuration file from path and validate it.
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<ConfigFile> {
    let raw_config = load_from_path(&path)?;
    let config = ConfigFile::try_from(raw_config)?;
    Ok(config)
}

/// Parse and validate configuration from a string.
pub fn parse_and_validate(contents: &str) -> Result<ConfigFile> {
    ConfigFile::try_from(parse_raw(contents)?)
}

impl ConfigFile {
    /// The compiled `[generator].progress_pattern`, if set.
    pub fn progress_regex(&self) -> Result<Option<Regex>> {
        self.generator
            .progress_pattern
            .as_deref()
            .map(|p| Regex::new(p).map_err(|e| TreedocError::ConfigError(e.to_string())))
            .transpose()
    }

    /// Output directory resolved against `input_dir`.
    pub fn output_dir_for(&self, input_dir: &Path) -> PathBuf {
        let out = Path::new(&self.run.output_dir);
        if out.is_absolute() {
            out.to_path_buf()
        } else {
            input_dir.join(out)
        }
    }
}
