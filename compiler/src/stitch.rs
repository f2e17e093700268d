// stitch.rs — Close every scope between its start and terminator
//
// Vertices without predecessors become successors of the scope's start
// vertex; vertices without successors feed the scope's terminator when it
// has one. Hierarchy-call vertices are linked to their child scopes in
// declaration order, and each child terminator is linked back to the call
// vertex in its parent.
//
// Preconditions: token edges have been resolved.
// Postconditions: in every scope, each non-start vertex has a predecessor;
//   in scopes with a terminator, each non-terminator vertex has a successor.
// Failure modes: call-vertex / child-scope count mismatch → DepError.
// Side effects: mutates the scope graphs.

use crate::diag::DepError;
use crate::graph::{scope_name, ScopeGraph, ScopeLink};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StitchStats {
    pub from_start: usize,
    pub to_terminator: usize,
}

/// Stitch `root` and every scope below it, outer scopes first.
pub fn stitch(root: &mut ScopeGraph) -> Result<StitchStats, DepError> {
    let mut stats = StitchStats::default();
    stitch_scope(root, &mut Vec::new(), &mut stats)?;
    tracing::debug!(
        from_start = stats.from_start,
        to_terminator = stats.to_terminator,
        "stitched scopes"
    );
    Ok(stats)
}

fn stitch_scope(
    scope: &mut ScopeGraph,
    path: &mut Vec<usize>,
    stats: &mut StitchStats,
) -> Result<(), DepError> {
    let start = scope.start;

    if let Some(terminator) = scope.terminator {
        let dangling: Vec<_> = scope
            .graph
            .node_indices()
            .filter(|&v| v != start && v != terminator && scope.out_degree(v) == 0)
            .collect();
        for v in dangling {
            stats.to_terminator += usize::from(scope.add_edge_if_new(v, terminator));
        }
    }

    let roots: Vec<_> = scope
        .graph
        .node_indices()
        .filter(|&v| v != start && scope.in_degree(v) == 0)
        .collect();
    for v in roots {
        stats.from_start += usize::from(scope.add_edge_if_new(start, v));
    }

    link_children(scope, path)?;

    for i in 0..scope.children.len() {
        path.push(i);
        stitch_scope(&mut scope.children[i], path, stats)?;
        path.pop();
    }
    Ok(())
}

/// Pair call vertices with child scopes and set the links both ways.
pub fn link_children(scope: &mut ScopeGraph, path: &[usize]) -> Result<(), DepError> {
    let calls = scope.call_vertices();
    if calls.len() != scope.children.len() {
        return Err(DepError::HierarchyScopeMismatch {
            scope: scope_name(scope.kind, path),
            calls: calls.len(),
            children: scope.children.len(),
        });
    }
    for (i, &call) in calls.iter().enumerate() {
        scope.graph[call].link = Some(ScopeLink::Child(i));
        let child = &mut scope.children[i];
        if let Some(terminator) = child.terminator {
            child.graph[terminator].link = Some(ScopeLink::Parent(call));
        }
    }
    Ok(())
}

// ── Tests ───────────────────────────────────────────────────────────────────
