// src/dag/graph.rs

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use tracing::debug;

use crate::dag::validate::ensure_acyclic;
use crate::errors::{Result, TreedocError};
use crate::types::{Language, UnitId, WorkUnit};

/// Internal node structure: stores the unit plus immediate deps and dependents.
#[derive(Debug, Clone)]
struct DagNode {
    unit: WorkUnit,
    /// Direct same-language children: units that must complete before this one.
    deps: Vec<UnitId>,
    /// Direct dependents. A unit has at most one (its closest ancestor unit),
    /// but a slice keeps the scheduler code shape-agnostic.
    dependents: Vec<UnitId>,
}

/// `child` must complete before `parent` starts.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct DependencyEdge {
    pub child: UnitId,
    pub parent: UnitId,
}

/// Directory dependency graph over all units of one run.
///
/// Edges only connect units of the same language, from a directory to its
/// closest ancestor directory that also holds a unit of that language.
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    nodes: HashMap<UnitId, DagNode>,
    /// Insertion order; seeds the ready queue deterministically.
    order: Vec<UnitId>,
}

impl DependencyGraph {
    /// Build the graph from units grouped by language.
    pub fn from_groups(groups: BTreeMap<Language, Vec<WorkUnit>>) -> Result<Self> {
        Self::build(groups.into_values().flatten())
    }

    /// Build the graph from a flat list of units.
    ///
    /// Rejects duplicate unit ids. For each unit, the ancestors of its
    /// directory are walked nearest-first and the first one that holds a unit
    /// of the same language becomes its parent.
    pub fn build<I>(units: I) -> Result<Self>
    where
        I: IntoIterator<Item = WorkUnit>,
    {
        let units: Vec<WorkUnit> = units.into_iter().collect();

        let mut edges: Vec<DependencyEdge> = Vec::new();
        {
            let mut by_language: HashMap<&str, HashMap<&Path, &UnitId>> = HashMap::new();
            for unit in &units {
                let dirs = by_language.entry(unit.language.as_str()).or_default();
                if dirs.insert(unit.directory.as_path(), &unit.id).is_some() {
                    return Err(TreedocError::DuplicateUnit(unit.id.to_string()));
                }
            }

            for unit in &units {
                let Some(dirs) = by_language.get(unit.language.as_str()) else {
                    continue;
                };
                let parent = unit
                    .directory
                    .ancestors()
                    .skip(1)
                    .find_map(|ancestor| dirs.get(ancestor));

                if let Some(parent) = parent {
                    edges.push(DependencyEdge {
                        child: unit.id.clone(),
                        parent: (*parent).clone(),
                    });
                }
            }
        }

        let mut nodes: HashMap<UnitId, DagNode> = HashMap::with_capacity(units.len());
        let mut order = Vec::with_capacity(units.len());
        for unit in units {
            order.push(unit.id.clone());
            nodes.insert(
                unit.id.clone(),
                DagNode {
                    unit,
                    deps: Vec::new(),
                    dependents: Vec::new(),
                },
            );
        }

        // Populate adjacency in insertion order of the children so that
        // `deps` lists are deterministic.
        for edge in edges {
            if let Some(parent) = nodes.get_mut(&edge.parent) {
                parent.deps.push(edge.child.clone());
            }
            if let Some(child) = nodes.get_mut(&edge.child) {
                child.dependents.push(edge.parent.clone());
            }
        }

        let graph = Self { nodes, order };
        ensure_acyclic(&graph)?;

        debug!(
            units = graph.len(),
            edges = graph.edge_count(),
            "built directory dependency graph"
        );
        Ok(graph)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// All units in insertion order.
    pub fn units(&self) -> impl Iterator<Item = &WorkUnit> {
        self.order
            .iter()
            .filter_map(|id| self.nodes.get(id).map(|n| &n.unit))
    }

    /// All unit ids in insertion order.
    pub fn ids(&self) -> &[UnitId] {
        &self.order
    }

    pub fn unit(&self, id: &UnitId) -> Option<&WorkUnit> {
        self.nodes.get(id).map(|n| &n.unit)
    }

    /// Immediate dependencies of a unit (its direct child units).
    pub fn dependencies_of(&self, id: &UnitId) -> &[UnitId] {
        self.nodes
            .get(id)
            .map(|n| n.deps.as_slice())
            .unwrap_or(&[])
    }

    /// Immediate dependents of a unit (the parent unit, if any).
    pub fn dependents_of(&self, id: &UnitId) -> &[UnitId] {
        self.nodes
            .get(id)
            .map(|n| n.dependents.as_slice())
            .unwrap_or(&[])
    }

    /// Number of direct children that must complete before `id` may start.
    pub fn in_degree(&self, id: &UnitId) -> usize {
        self.dependencies_of(id).len()
    }

    pub fn edge_count(&self) -> usize {
        self.nodes.values().map(|n| n.deps.len()).sum()
    }

    /// All edges, sorted.
    pub fn edges(&self) -> Vec<DependencyEdge> {
        let mut edges: Vec<DependencyEdge> = self
            .order
            .iter()
            .flat_map(|child| {
                self.dependents_of(child).iter().map(move |parent| DependencyEdge {
                    child: child.clone(),
                    parent: parent.clone(),
                })
            })
            .collect();
        edges.sort();
        edges
    }
}
