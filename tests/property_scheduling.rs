// tests/property_scheduling.rs

use std::collections::{BTreeSet, HashSet};
use std::path::{Path, PathBuf};

use proptest::prelude::*;
use treedoc::dag::{DependencyEdge, DependencyGraph, Scheduler, UnitOutcome};
use treedoc::types::{FailurePolicy, UnitId, WorkUnit};
use treedoc_test_utils::builders::unit;

const SEGMENTS: [&str; 3] = ["a", "b", "c"];
const LANGUAGES: [&str; 2] = ["rs", "py"];

// Strategy to generate a set of distinct (language, directory) units under
// `/root`, with directories up to four segments deep.
fn units_strategy(max_units: usize) -> impl Strategy<Value = Vec<WorkUnit>> {
    let dir = proptest::collection::vec(0..SEGMENTS.len(), 0..=4);
    let entry = (0..LANGUAGES.len(), dir);

    proptest::collection::vec(entry, 1..=max_units).prop_map(|entries| {
        let mut seen = BTreeSet::new();
        let mut units = Vec::new();
        for (lang, segments) in entries {
            let mut path = PathBuf::from("/root");
            for s in segments {
                path.push(SEGMENTS[s]);
            }
            if seen.insert((lang, path.clone())) {
                units.push(unit(LANGUAGES[lang], &path, &["f"]));
            }
        }
        units
    })
}

/// O(n²) definition: the parent of `g` is the deepest same-language unit
/// whose directory strictly contains `g`'s.
fn brute_force_edges(units: &[WorkUnit]) -> Vec<DependencyEdge> {
    let mut edges = Vec::new();
    for g in units {
        let parent = units
            .iter()
            .filter(|p| p.language == g.language)
            .filter(|p| p.directory != g.directory && is_ancestor(&p.directory, &g.directory))
            .max_by_key(|p| p.directory.components().count());
        if let Some(p) = parent {
            edges.push(DependencyEdge {
                child: g.id.clone(),
                parent: p.id.clone(),
            });
        }
    }
    edges.sort();
    edges
}

fn is_ancestor(ancestor: &Path, path: &Path) -> bool {
    path.starts_with(ancestor)
}

proptest! {
    #[test]
    fn graph_matches_quadratic_definition(units in units_strategy(12)) {
        let expected = brute_force_edges(&units);
        let graph = DependencyGraph::build(units).unwrap();
        prop_assert_eq!(graph.edges(), expected);
    }

    #[test]
    fn every_unit_starts_after_its_children_for_any_concurrency(
        units in units_strategy(12),
        concurrency in 1usize..5,
        failing in proptest::collection::vec(any::<bool>(), 12),
        complete_last in any::<bool>(),
    ) {
        let graph = DependencyGraph::build(units.clone()).unwrap();
        let mut scheduler = Scheduler::new(graph.clone(), FailurePolicy::Lenient);

        let mut running: Vec<UnitId> = Vec::new();
        let mut done: HashSet<UnitId> = HashSet::new();
        let mut steps = 0;

        while !scheduler.is_finished() {
            steps += 1;
            prop_assert!(steps < 1000, "simulation did not terminate");

            while running.len() < concurrency {
                let Some(next) = scheduler.next_ready() else { break };
                for child in graph.dependencies_of(&next.id) {
                    prop_assert!(done.contains(child), "{} started before child {}", next.id, child);
                }
                running.push(next.id);
            }
            prop_assert!(!running.is_empty(), "scheduler stalled");
            prop_assert!(running.len() <= concurrency);

            let finished = if complete_last { running.pop() } else { Some(running.remove(0)) };
            let Some(finished) = finished else { break };

            let index = units.iter().position(|u| u.id == finished).unwrap();
            let outcome = if failing[index % failing.len()] {
                UnitOutcome::Failed("scripted".into())
            } else {
                UnitOutcome::Succeeded
            };
            scheduler.step_completion(&finished, outcome);
            done.insert(finished);
        }

        // Lenient: everything ran.
        prop_assert_eq!(done.len(), units.len());
    }

    #[test]
    fn strict_policy_always_terminates(
        units in units_strategy(12),
        failing in proptest::collection::vec(any::<bool>(), 12),
    ) {
        let graph = DependencyGraph::build(units.clone()).unwrap();
        let mut scheduler = Scheduler::new(graph.clone(), FailurePolicy::Strict);
        let mut steps = 0;

        while let Some(next) = scheduler.next_ready() {
            steps += 1;
            prop_assert!(steps <= units.len());
            let index = units.iter().position(|u| u.id == next.id).unwrap();
            let outcome = if failing[index % failing.len()] {
                UnitOutcome::Failed("scripted".into())
            } else {
                UnitOutcome::Succeeded
            };
            scheduler.step_completion(&next.id, outcome);
        }

        prop_assert!(scheduler.is_finished());
        let outcomes = scheduler.outcomes();
        prop_assert_eq!(outcomes.len(), units.len());

        // A skipped unit always has a failed unit somewhere below it.
        let failed: HashSet<UnitId> = outcomes
            .iter()
            .filter(|(_, o)| matches!(o, UnitOutcome::Failed(_)))
            .map(|(id, _)| id.clone())
            .collect();
        for (id, outcome) in &outcomes {
            if *outcome != UnitOutcome::Skipped {
                continue;
            }
            let mut stack = graph.dependencies_of(id).to_vec();
            let mut found = false;
            while let Some(child) = stack.pop() {
                if failed.contains(&child) {
                    found = true;
                    break;
                }
                stack.extend(graph.dependencies_of(&child).iter().cloned());
            }
            prop_assert!(found, "{} skipped without a failed descendant", id);
        }
    }
}
