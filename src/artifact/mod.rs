// src/artifact/mod.rs

//! Artifact naming and the per-run artifact lifecycle.

pub mod lifecycle;
pub mod naming;

pub use lifecycle::ArtifactLifecycle;
pub use naming::{ArtifactNaming, STAGING_PREFIX};
