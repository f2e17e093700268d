// edges.rs — Token-to-edge resolution
//
// Converts every vertex's declared token list into producer → consumer
// edges. Each token is traced to the vertex (or vertices, for conditional
// joins) that produce it. Tokens with no traceable producer, such as
// function arguments, are dropped and treated as already satisfied.
//
// Preconditions: the scope tree was built from `program` with `ctx`.
// Postconditions: edges are added only between vertices of the same scope,
//   never twice.
// Failure modes: none.
// Side effects: mutates the scope graphs.

use std::collections::HashSet;

use petgraph::graph::NodeIndex;

use crate::graph::{DependencyContext, ScopeGraph, ScopePath};
use crate::id::{NodeKey, ValueId};
use crate::ir::{OpKind, Program};

/// Producer vertices of `token`, as keys. A conditional result fans in from
/// the matching yielded value of every branch.
pub fn producers(program: &Program, ctx: &DependencyContext, token: ValueId) -> Vec<NodeKey> {
    let mut found = Vec::new();
    let mut seen: HashSet<ValueId> = HashSet::new();
    let mut worklist = vec![token];

    while let Some(t) = worklist.pop() {
        if !seen.insert(t) {
            continue;
        }
        if let Some(owner) = program.carried_arg_owner(t) {
            found.extend(ctx.exit_of(owner));
            continue;
        }
        let Some(def) = program.defining_op(t) else {
            tracing::trace!(token = %program.value_name(t), "token has no producer");
            continue;
        };
        match program.kind(def) {
            kind if kind.is_async() => found.extend(ctx.exit_of(def)),
            OpKind::Loop(_) => {
                found.extend(program.loop_yield(def).and_then(|y| ctx.exit_of(y)));
            }
            OpKind::If => {
                let Some(index) = program.op(def).results.iter().position(|&r| r == t) else {
                    continue;
                };
                for &region in program.op(def).regions.iter().rev() {
                    let yielded = program
                        .block_terminator(region)
                        .and_then(|y| program.op(y).operands.get(index).copied());
                    worklist.extend(yielded);
                }
            }
            _ => tracing::trace!(token = %program.value_name(t), "token producer is not traceable"),
        }
    }

    let mut unique = Vec::with_capacity(found.len());
    for key in found {
        if !unique.contains(&key) {
            unique.push(key);
        }
    }
    unique
}

/// Add an edge for every resolvable token of every vertex in the tree.
/// Returns the number of edges added.
pub fn resolve_edges(program: &Program, root: &mut ScopeGraph, ctx: &DependencyContext) -> usize {
    let paths: Vec<ScopePath> = root.scopes().into_iter().map(|(p, _)| p).collect();
    let mut added = 0;
    for path in paths {
        let Some(scope) = root.scope_mut(&path) else {
            continue;
        };
        let pending = scope_edges(program, ctx, scope, &path);
        for (src, dst) in pending {
            if scope.add_edge_if_new(src, dst) {
                added += 1;
            }
        }
    }
    tracing::debug!(edges = added, "resolved token edges");
    added
}

fn scope_edges(
    program: &Program,
    ctx: &DependencyContext,
    scope: &ScopeGraph,
    path: &[usize],
) -> Vec<(NodeIndex, NodeIndex)> {
    let mut edges = Vec::new();
    for consumer in scope.graph.node_indices() {
        let Some(op) = scope.graph[consumer].op else {
            continue;
        };
        for token in program.token_list(op) {
            for key in producers(program, ctx, token) {
                match ctx.lookup(key) {
                    Some((p, producer)) if p == path && producer != consumer => {
                        edges.push((producer, consumer));
                    }
                    // Lowering keeps hierarchy bodies isolated, so only
                    // hand-built programs get here.
                    Some((p, _)) if p != path => {
                        tracing::warn!(%key, "dropping cross-scope producer")
                    }
                    _ => {}
                }
            }
        }
    }
    edges
}

// ── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::build_scope_graphs;
    use crate::lower::parse_program;

    fn resolved(source: &str) -> (Program, ScopeGraph, DependencyContext) {
        let program = parse_program(source).unwrap();
        let mut ctx = DependencyContext::new();
        let mut root = build_scope_graphs(&program, &mut ctx).unwrap();
        resolve_edges(&program, &mut root, &ctx);
        (program, root, ctx)
    }

    fn edge_labels(scope: &ScopeGraph) -> Vec<(String, String)> {
        scope
            .edge_keys()
            .into_iter()
            .map(|(s, t)| (s.to_string(), t.to_string()))
            .collect()
    }

    fn pair(a: &str, b: &str) -> (String, String) {
        (a.to_string(), b.to_string())
    }

    #[test]
    fn explicit_tokens_become_edges() {
        let (_, g, _) = resolved(
            "func @f() {\n  %a = join\n  %b = join [%a]\n  %c = join [%a, %b, %a]\n}",
        );
        assert_eq!(
            edge_labels(&g),
            vec![
                pair("barrier#0", "barrier#1"),
                pair("barrier#0", "barrier#2"),
                pair("barrier#1", "barrier#2"),
            ]
        );
    }

    #[test]
    fn function_arguments_are_dropped() {
        let (_, g, _) = resolved("func @f(%t: token) {\n  %a = join [%t]\n}");
        assert_eq!(g.edge_count(), 0);
    }

    #[test]
    fn loop_tokens_resolve_through_carried_arg_and_yield() {
        let (_, g, _) = resolved(
            "func @f(%t: token) {\n  %c0 = const 0\n  %c1 = const 1\n  %r = for %i = %c0 to %c1 step %c1 iter(%k = %t) {\n    %d = join [%k]\n    yield %d\n  }\n  %after = join [%r]\n}",
        );
        assert_eq!(
            edge_labels(&g),
            vec![
                pair("control_loop#0", "barrier#0"),
                pair("barrier#0", "terminator#0"),
                pair("terminator#0", "barrier#1"),
            ]
        );
    }

    #[test]
    fn conditional_result_fans_in() {
        let (_, g, _) = resolved(
            "func @f(%c: index) {\n  %r = if %c {\n    %a = join\n    yield %a\n  } else {\n    %b = join\n    yield %b\n  }\n  %z = join [%r]\n}",
        );
        assert_eq!(
            edge_labels(&g),
            vec![pair("barrier#0", "barrier#2"), pair("barrier#1", "barrier#2")]
        );
    }

    #[test]
    fn compute_token_resolves_to_last_effect() {
        let (_, g, _) = resolved(
            "func @f(%m: memref<1, L1>) {\n  %t = compute {\n    copy %m, %m\n    dealloc %m\n    yield\n  }\n  %j = join [%t]\n}",
        );
        assert!(edge_labels(&g).contains(&pair("compute#2", "barrier#0")));
    }

    #[test]
    fn call_dependencies_resolve_in_the_outer_scope() {
        let (_, g, _) = resolved(
            "func @f() {\n  %a = join\n  %h = launch [%a] {\n    %b = join\n    end\n  }\n}",
        );
        assert_eq!(edge_labels(&g), vec![pair("barrier#0", "hierarchy#0")]);
        assert_eq!(g.children[0].edge_count(), 0);
    }
}
