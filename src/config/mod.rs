// src/config/mod.rs

//! `Treedoc.toml` loading and validation.
//!
//! TOML is deserialized into [`RawConfigFile`] and checked into a
//! [`ConfigFile`] via `TryFrom`, so a `ConfigFile` is always valid.

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{
    DEFAULT_CONFIG_FILE, load_and_validate, load_from_path,
    parse_and_validate,
};
pub use model::{
    ConfigFile, DiscoverSection, GeneratorSection, RawConfigFile, RunSection, StoreSection,
};
