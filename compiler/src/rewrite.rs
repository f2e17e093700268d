// rewrite.rs — Regenerate dependency lists from the reduced graphs
//
// `purge` clears the dependency list of every asynchronous operation that
// has a vertex; `fill` rebuilds it from the reduced in-edges, choosing for
// each source vertex the token that stands for it at the consumer. The
// cleanup passes then tidy the program:
//
//   1. deduplicate dependency lists
//   2. erase compute blocks whose only secondary result is unused and whose
//      body has no memory effect
//   3. collapse joins with a single input
//   4. make segment and herd calls depend on control tokens only
//   5. drop hierarchy parameters that have no uses inside the body
//
// Preconditions: `reduced` was produced from graphs of `program`.
// Postconditions: dependency lists reflect the reduced edges.
// Failure modes: none.
// Side effects: mutates the program.

use std::collections::HashMap;

use petgraph::Direction;

use crate::graph::{ScopeGraph, VertexKind};
use crate::id::{OpId, ValueId};
use crate::ir::{HierarchyLevel, OpKind, Program, Use, UseSlot};
use crate::tracer::{control_tokens, is_control_token};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RewriteStats {
    pub purged: usize,
    pub filled: usize,
    pub duplicates_removed: usize,
    pub dead_computes: usize,
    pub joins_collapsed: usize,
    pub hierarchy_deps_dropped: usize,
    pub params_removed: usize,
}

/// Purge, fill and clean up the whole program.
pub fn rewrite(program: &mut Program, reduced: &ScopeGraph) -> RewriteStats {
    let mut stats = RewriteStats::default();
    rewrite_tokens(program, reduced, &mut stats);
    cleanup(program, &mut stats);
    stats
}

/// Purge every scope, then fill every scope. Purging first keeps tokens
/// filled into an outer scope from being cleared by an inner one.
pub fn rewrite_tokens(program: &mut Program, reduced: &ScopeGraph, stats: &mut RewriteStats) {
    for (_, scope) in reduced.scopes() {
        stats.purged += purge(program, scope);
    }
    for (_, scope) in reduced.scopes() {
        stats.filled += fill(program, scope);
    }
    tracing::debug!(
        purged = stats.purged,
        filled = stats.filled,
        "rewrote dependency lists"
    );
}

/// Remove every dependency of the asynchronous operations backing a vertex
/// of `scope`. Returns the number of tokens removed.
pub fn purge(program: &mut Program, scope: &ScopeGraph) -> usize {
    let mut removed = 0;
    for v in scope.graph.node_indices() {
        let Some(op) = scope.graph[v].op else {
            continue;
        };
        if program.is_live(op) && program.kind(op).is_async() {
            removed += program.deps(op).len();
            program.clear_deps(op);
        }
    }
    removed
}

/// Rebuild dependency lists from the in-edges of `scope`. Returns the
/// number of tokens added.
pub fn fill(program: &mut Program, scope: &ScopeGraph) -> usize {
    let mut added = 0;
    for dst in scope.graph.node_indices() {
        let Some(consumer) = scope.graph[dst].op else {
            continue;
        };
        if !program.is_live(consumer) || !program.kind(consumer).is_async() {
            continue;
        }
        let mut sources: Vec<_> = scope
            .graph
            .neighbors_directed(dst, Direction::Incoming)
            .collect();
        sources.sort();
        for src in sources {
            let Some(token) = source_token(program, scope, src, consumer) else {
                continue;
            };
            if program.defining_op(token) == Some(consumer) {
                continue;
            }
            added += usize::from(program.add_dep_if_new(consumer, token));
        }
    }
    added
}

/// Token standing for vertex `src` as seen from `consumer`.
fn source_token(
    program: &Program,
    scope: &ScopeGraph,
    src: petgraph::graph::NodeIndex,
    consumer: OpId,
) -> Option<ValueId> {
    let node = &scope.graph[src];
    match node.kind() {
        VertexKind::Start | VertexKind::HierarchyTerminator => None,
        VertexKind::ControlLoop => program
            .loop_carried_arg(node.op?, 0)
            .filter(|&v| program.value_type(v).is_token()),
        VertexKind::Terminator => {
            let loop_op = program.parent_op(node.op?)?;
            elevated_token(program, loop_op, consumer)
        }
        _ => elevated_token(program, node.owner?, consumer),
    }
}

/// Completion token of `producer`, lifted through enclosing conditionals
/// that do not also enclose `consumer`.
fn elevated_token(program: &Program, producer: OpId, consumer: OpId) -> Option<ValueId> {
    if producer == consumer {
        return None;
    }
    let consumer_ancestors = program.ancestors(consumer);
    let mut current = producer;
    while let Some(parent) = program.parent_op(current) {
        if !matches!(program.kind(parent), OpKind::If) || consumer_ancestors.contains(&parent) {
            break;
        }
        current = parent;
    }
    program.completion_token(current)
}

// ── Cleanup passes ──────────────────────────────────────────────────────────

/// Run the five cleanup passes in order.
pub fn cleanup(program: &mut Program, stats: &mut RewriteStats) {
    stats.duplicates_removed += dedup_deps(program);
    stats.dead_computes += remove_dead_computes(program);
    stats.joins_collapsed += collapse_single_joins(program);
    // Collapsing can make two entries of one list name the same token.
    stats.duplicates_removed += dedup_deps(program);
    stats.hierarchy_deps_dropped += canonicalize_hierarchy_deps(program);
    stats.params_removed += remove_unused_hierarchy_params(program);
    tracing::debug!(
        removed = stats.dead_computes + stats.joins_collapsed,
        duplicates = stats.duplicates_removed,
        params = stats.params_removed,
        "cleaned up program"
    );
}

/// Drop repeated tokens from every dependency list, keeping first
/// occurrences. Returns the number removed.
pub fn dedup_deps(program: &mut Program) -> usize {
    let mut removed = 0;
    for op in program.walk() {
        let deps = program.deps(op);
        let mut unique: Vec<ValueId> = Vec::with_capacity(deps.len());
        for &d in deps {
            if !unique.contains(&d) {
                unique.push(d);
            }
        }
        if unique.len() != deps.len() {
            removed += deps.len() - unique.len();
            program.set_deps(op, unique);
        }
    }
    removed
}

/// Erase compute blocks that exist only to produce an unused secondary
/// result from a side-effect-free body. Their waiters inherit their
/// dependencies.
///
/// Each sweep builds the use map once and erases every compute found dead
/// in it; sweeps repeat until one removes nothing.
pub fn remove_dead_computes(program: &mut Program) -> usize {
    let mut removed = 0;
    loop {
        let mut uses = program.use_map();
        let dead: Vec<OpId> = program
            .walk()
            .into_iter()
            .filter(|&op| is_dead_compute(program, &uses, op))
            .collect();
        if dead.is_empty() {
            break;
        }
        for op in dead {
            let token = program.op(op).results[0];
            let inherited = program.deps(op).to_vec();
            let waiters: Vec<OpId> = uses
                .get(&token)
                .into_iter()
                .flatten()
                .filter(|u| matches!(u.slot, UseSlot::Dep(_)))
                .map(|u| u.op)
                .collect();
            for waiter in waiters {
                if !program.is_live(waiter) {
                    continue;
                }
                for &d in &inherited {
                    if program.add_dep_if_new(waiter, d) {
                        let slot = UseSlot::Dep(program.deps(waiter).len() - 1);
                        uses.entry(d).or_default().push(Use { op: waiter, slot });
                    }
                }
            }
            program.erase_token_uses(token);
            program.erase_op(op);
            removed += 1;
        }
    }
    removed
}

fn is_dead_compute(program: &Program, uses: &HashMap<ValueId, Vec<Use>>, op: OpId) -> bool {
    if !matches!(program.kind(op), OpKind::Compute) {
        return false;
    }
    let uses_of = |v: ValueId| uses.get(&v).map(Vec::as_slice).unwrap_or(&[]);
    let results = &program.op(op).results;
    if results.len() != 2 || !uses_of(results[1]).is_empty() {
        return false;
    }
    // Uses of the token outside dependency lists (yields) keep it alive.
    if uses_of(results[0])
        .iter()
        .any(|u| matches!(u.slot, UseSlot::Operand(_)))
    {
        return false;
    }
    match program.body(op) {
        Some(body) => program
            .walk_block(body)
            .iter()
            .all(|&o| program.kind(o).is_side_effect_free()),
        None => true,
    }
}

/// Replace joins that wait on exactly one token by that token.
pub fn collapse_single_joins(program: &mut Program) -> usize {
    let mut collapsed = 0;
    for op in program.walk() {
        if !program.is_live(op) || !matches!(program.kind(op), OpKind::Join) {
            continue;
        }
        let [input] = program.deps(op) else {
            continue;
        };
        let input = *input;
        let result = program.op(op).results[0];
        program.replace_all_uses(result, input);
        program.erase_op(op);
        collapsed += 1;
    }
    collapsed
}

/// Segment and herd calls keep only control tokens: the control tokens
/// reachable backwards from their current dependencies are added, and
/// tokens from other producers are dropped. Launch calls are left alone.
pub fn canonicalize_hierarchy_deps(program: &mut Program) -> usize {
    let mut dropped = 0;
    for op in program.walk() {
        let OpKind::Hierarchy { level, .. } = program.kind(op) else {
            continue;
        };
        if *level == HierarchyLevel::Launch {
            continue;
        }
        for token in control_tokens(program, op) {
            program.add_dep_if_new(op, token);
        }
        let before = program.deps(op).len();
        let kept: Vec<ValueId> = program
            .deps(op)
            .iter()
            .copied()
            .filter(|&d| program.defining_op(d).is_none() || is_control_token(program, d))
            .collect();
        dropped += before - kept.len();
        program.set_deps(op, kept);
    }
    dropped
}

/// Remove hierarchy parameters with no uses in the body, innermost calls
/// first so that outer parameters freed by the removal go too.
pub fn remove_unused_hierarchy_params(program: &mut Program) -> usize {
    let mut removed = 0;
    for op in program.walk().into_iter().rev() {
        if !matches!(program.kind(op), OpKind::Hierarchy { .. }) {
            continue;
        }
        let pairs = program.hierarchy_pairs(op);
        for (index, &(_, inner)) in pairs.iter().enumerate().rev() {
            if !program.has_uses(inner) {
                program.remove_hierarchy_param(op, index);
                removed += 1;
            }
        }
    }
    removed
}

// ── Tests ───────────────────────────────────────────────────────────────────
