// src/dag/validate.rs

use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;

use crate::dag::DependencyGraph;
use crate::errors::{Result, TreedocError};

/// Check that the graph has no cycles.
///
/// Graphs derived from a directory tree are acyclic by construction; this
/// guards the scheduler against ever waiting on a unit that can never run.
pub(crate) fn ensure_acyclic(graph: &DependencyGraph) -> Result<()> {
    // Edge direction: child -> parent (execution order).
    let mut g: DiGraphMap<&str, ()> = DiGraphMap::new();

    for id in graph.ids() {
        g.add_node(id.as_str());
    }

    for id in graph.ids() {
        for parent in graph.dependents_of(id) {
            g.add_edge(id.as_str(), parent.as_str(), ());
        }
    }

    match toposort(&g, None) {
        Ok(_order) => Ok(()),
        Err(cycle) => Err(TreedocError::DagCycle(format!(
            "cycle detected in directory graph involving unit '{}'",
            cycle.node_id()
        ))),
    }
}
