// src/artifact/lifecycle.rs

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::artifact::naming::ArtifactNaming;
use crate::fs::FileSystem;
use crate::types::{Language, UnitId, WorkUnit};

#[derive(Debug, Clone)]
struct TrackedArtifact {
    language: Language,
    path: PathBuf,
    depth: usize,
    /// Completion sequence once the generator succeeded; `None` while the
    /// unit is still running.
    produced: Option<u64>,
}

/// Owns every artifact path created during one run.
///
/// Each tracked path ends the run either promoted into the output directory
/// or deleted. Dropping the lifecycle deletes whatever is still tracked, so
/// early returns and cancellation cannot leave staging files behind.
#[derive(Debug)]
pub struct ArtifactLifecycle {
    fs: Arc<dyn FileSystem>,
    tracked: BTreeMap<UnitId, TrackedArtifact>,
    next_sequence: u64,
}

impl ArtifactLifecycle {
    pub fn new(fs: Arc<dyn FileSystem>) -> Self {
        Self {
            fs,
            tracked: BTreeMap::new(),
            next_sequence: 0,
        }
    }

    /// Start tracking the staging path of a unit about to run.
    pub fn track(&mut self, unit: &WorkUnit, path: PathBuf) {
        debug!(unit = %unit.id, path = %path.display(), "tracking artifact path");
        self.tracked.insert(
            unit.id.clone(),
            TrackedArtifact {
                language: unit.language.clone(),
                path,
                depth: unit.depth(),
                produced: None,
            },
        );
    }

    /// The unit's generator succeeded; its artifact becomes a promotion
    /// candidate. Returns `false` if the unit was not tracked.
    pub fn mark_produced(&mut self, id: &UnitId) -> bool {
        let sequence = self.next_sequence;
        match self.tracked.get_mut(id) {
            Some(artifact) => {
                artifact.produced = Some(sequence);
                self.next_sequence += 1;
                true
            }
            None => {
                warn!(unit = %id, "artifact produced for untracked unit");
                false
            }
        }
    }

    /// The unit failed or was cancelled: delete anything it wrote.
    pub fn discard(&mut self, id: &UnitId) {
        if let Some(artifact) = self.tracked.remove(id) {
            self.delete(&artifact.path);
        }
    }

    /// Paths currently tracked, sorted.
    pub fn tracked_paths(&self) -> Vec<PathBuf> {
        let mut paths: Vec<PathBuf> = self.tracked.values().map(|a| a.path.clone()).collect();
        paths.sort();
        paths
    }

    pub fn is_empty(&self) -> bool {
        self.tracked.is_empty()
    }

    /// Move one artifact per language into `output_dir` and delete the rest.
    ///
    /// The winner for a language is the produced artifact nearest the root
    /// (fewest directory components); among equals, the one completed last.
    /// Returns the final path of every promoted artifact. A language whose
    /// rename fails is left out and its artifact deleted.
    pub fn promote(
        &mut self,
        output_dir: &Path,
        naming: &ArtifactNaming,
    ) -> BTreeMap<Language, PathBuf> {
        let tracked = std::mem::take(&mut self.tracked);

        let mut winners: BTreeMap<Language, TrackedArtifact> = BTreeMap::new();
        let mut losers: Vec<TrackedArtifact> = Vec::new();

        for artifact in tracked.into_values() {
            let Some(sequence) = artifact.produced else {
                losers.push(artifact);
                continue;
            };

            match winners.get(&artifact.language) {
                Some(current) if !beats(artifact.depth, sequence, current) => {
                    losers.push(artifact);
                }
                _ => {
                    if let Some(previous) = winners.insert(artifact.language.clone(), artifact) {
                        losers.push(previous);
                    }
                }
            }
        }

        for artifact in &losers {
            self.delete(&artifact.path);
        }

        let mut promoted = BTreeMap::new();
        if winners.is_empty() {
            return promoted;
        }

        if let Err(e) = self.fs.create_dir_all(output_dir) {
            error!(
                output_dir = %output_dir.display(),
                error = %e,
                "cannot create output directory; discarding all artifacts"
            );
            for artifact in winners.values() {
                self.delete(&artifact.path);
            }
            return promoted;
        }

        for (language, artifact) in winners {
            let target = output_dir.join(naming.final_name(&language));
            match self.fs.rename(&artifact.path, &target) {
                Ok(()) => {
                    info!(
                        language = %language,
                        from = %artifact.path.display(),
                        to = %target.display(),
                        "promoted artifact"
                    );
                    promoted.insert(language, target);
                }
                Err(e) => {
                    warn!(
                        language = %language,
                        from = %artifact.path.display(),
                        to = %target.display(),
                        error = %e,
                        "failed to promote artifact; deleting it"
                    );
                    self.delete(&artifact.path);
                }
            }
        }

        promoted
    }

    /// Delete every artifact still tracked.
    pub fn cleanup(&mut self) {
        let tracked = std::mem::take(&mut self.tracked);
        if !tracked.is_empty() {
            info!(count = tracked.len(), "cleaning up unpromoted artifacts");
        }
        for artifact in tracked.into_values() {
            self.delete(&artifact.path);
        }
    }

    /// Best-effort delete: a missing file is fine, anything else is logged.
    fn delete(&self, path: &Path) {
        if !self.fs.exists(path) {
            return;
        }
        match self.fs.remove_file(path) {
            Ok(()) => debug!(path = %path.display(), "deleted artifact"),
            Err(e) => warn!(path = %path.display(), error = %e, "failed to delete artifact"),
        }
    }
}

/// Whether a candidate at `(depth, sequence)` should replace `current`.
fn beats(depth: usize, sequence: u64, current: &TrackedArtifact) -> bool {
    let current_sequence = current.produced.unwrap_or(0);
    depth < current.depth || (depth == current.depth && sequence > current_sequence)
}

impl Drop for ArtifactLifecycle {
    fn drop(&mut self) {
        if !self.tracked.is_empty() {
            self.cleanup();
        }
    }
}
