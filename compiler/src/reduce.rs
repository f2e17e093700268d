// reduce.rs — Per-scope transitive reduction
//
// Replaces each scope graph with the unique minimal edge set that has the
// same reachability. Scopes are reduced independently; the result is a new
// tree with identical vertex attributes plus old ↔ new vertex maps.
//
// Preconditions: every scope graph is a DAG.
// Postconditions: reachability is preserved pairwise in every scope, and no
//   kept edge is implied by a longer path.
// Failure modes: a cycle in any scope → DepError::CyclicPrecedence.
// Side effects: none (the input tree is left untouched).

use std::collections::HashMap;

use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};

use crate::diag::DepError;
use crate::graph::{scope_name, ScopeGraph, ScopeLink, TaskNode};

// ── Vertex maps ─────────────────────────────────────────────────────────────

/// Bidirectional vertex translation for one scope.
#[derive(Debug, Clone, Default)]
pub struct VertexMap {
    old_to_new: HashMap<NodeIndex, NodeIndex>,
    new_to_old: HashMap<NodeIndex, NodeIndex>,
}

impl VertexMap {
    fn insert(&mut self, old: NodeIndex, new: NodeIndex) {
        self.old_to_new.insert(old, new);
        self.new_to_old.insert(new, old);
    }

    pub fn to_new(&self, old: NodeIndex) -> Option<NodeIndex> {
        self.old_to_new.get(&old).copied()
    }

    pub fn to_old(&self, new: NodeIndex) -> Option<NodeIndex> {
        self.new_to_old.get(&new).copied()
    }

    pub fn len(&self) -> usize {
        self.old_to_new.len()
    }

    pub fn is_empty(&self) -> bool {
        self.old_to_new.is_empty()
    }
}

/// Vertex maps shaped like the scope tree they describe.
#[derive(Debug, Clone, Default)]
pub struct VertexMapTree {
    pub map: VertexMap,
    pub children: Vec<VertexMapTree>,
}

impl VertexMapTree {
    pub fn at(&self, path: &[usize]) -> Option<&VertexMap> {
        let mut current = self;
        for &i in path {
            current = current.children.get(i)?;
        }
        Some(&current.map)
    }
}

// ── Reduction ───────────────────────────────────────────────────────────────

/// Reduce every scope of `root`.
pub fn reduce_tree(root: &ScopeGraph) -> Result<(ScopeGraph, VertexMapTree), DepError> {
    let result = reduce_at(root, &mut Vec::new())?;
    let (before, after) = (root.totals().1, result.0.totals().1);
    tracing::debug!(edges_before = before, edges_after = after, "transitive reduction");
    Ok(result)
}

fn reduce_at(
    scope: &ScopeGraph,
    path: &mut Vec<usize>,
) -> Result<(ScopeGraph, VertexMapTree), DepError> {
    let (mut reduced, map) = reduce_scope(scope, &scope_name(scope.kind, path))?;

    let mut child_maps = Vec::with_capacity(scope.children.len());
    for (i, child) in scope.children.iter().enumerate() {
        path.push(i);
        let (mut new_child, child_map) = reduce_at(child, path)?;
        path.pop();
        // The back-link points into this scope; translate it.
        if let Some(t) = new_child.terminator {
            if let Some(ScopeLink::Parent(call)) = new_child.graph[t].link {
                new_child.graph[t].link = map.to_new(call).map(ScopeLink::Parent);
            }
        }
        reduced.children.push(new_child);
        child_maps.push(child_map);
    }

    Ok((
        reduced,
        VertexMapTree {
            map,
            children: child_maps,
        },
    ))
}

/// Transitive reduction of a single scope. The returned graph has no
/// children; `reduce_tree` reattaches them.
pub fn reduce_scope(scope: &ScopeGraph, name: &str) -> Result<(ScopeGraph, VertexMap), DepError> {
    let graph = &scope.graph;
    let order = toposort(graph, None).map_err(|cycle| DepError::CyclicPrecedence {
        scope: name.to_string(),
        vertex: graph[cycle.node_id()].key,
    })?;

    let n = graph.node_count();
    let mut position = vec![0usize; n];
    for (i, v) in order.iter().enumerate() {
        position[v.index()] = i;
    }

    // reach[v][w]: w is reachable from v through the kept edges.
    let mut reach = vec![vec![false; n]; n];
    let mut kept: Vec<(NodeIndex, NodeIndex)> = Vec::new();
    for &v in order.iter().rev() {
        let mut succs: Vec<NodeIndex> = graph.neighbors(v).collect();
        succs.sort_by_key(|s| position[s.index()]);
        succs.dedup();
        for s in succs {
            if reach[v.index()][s.index()] {
                continue;
            }
            kept.push((v, s));
            reach[v.index()][s.index()] = true;
            for w in 0..n {
                if reach[s.index()][w] {
                    reach[v.index()][w] = true;
                }
            }
        }
    }

    let mut new_graph: DiGraph<TaskNode, ()> = DiGraph::with_capacity(n, kept.len());
    let mut map = VertexMap::default();
    for old in graph.node_indices() {
        let new = new_graph.add_node(graph[old].clone());
        map.insert(old, new);
    }
    kept.sort_by_key(|&(a, b)| (a.index(), b.index()));
    for (a, b) in kept {
        if let (Some(na), Some(nb)) = (map.to_new(a), map.to_new(b)) {
            new_graph.add_edge(na, nb, ());
        }
    }

    let reduced = ScopeGraph {
        kind: scope.kind,
        hierarchy_op: scope.hierarchy_op,
        start: map.to_new(scope.start).unwrap_or(scope.start),
        terminator: scope.terminator.and_then(|t| map.to_new(t)),
        graph: new_graph,
        children: Vec::new(),
    };
    tracing::trace!(
        scope = name,
        before = graph.edge_count(),
        after = reduced.edge_count(),
        "reduced scope"
    );
    Ok((reduced, map))
}

/// Pairwise reachability of a scope graph, indexed by vertex index.
pub fn reachability(scope: &ScopeGraph) -> Vec<Vec<bool>> {
    let n = scope.graph.node_count();
    let mut reach = vec![vec![false; n]; n];
    for v in scope.graph.node_indices() {
        let mut stack: Vec<NodeIndex> = scope.graph.neighbors(v).collect();
        while let Some(w) = stack.pop() {
            if reach[v.index()][w.index()] {
                continue;
            }
            reach[v.index()][w.index()] = true;
            stack.extend(scope.graph.neighbors(w));
        }
    }
    reach
}

// ── Tests ───────────────────────────────────────────────────────────────────
