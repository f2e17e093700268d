// tracer.rs — Memory-conflict dependency tracing
//
// Synthesizes dependency tokens from plain data flow. For a sink operation
// the tracer decomposes its operands into partial memory references, scans
// the other uses of each base value, and makes the sink wait on every
// earlier conflicting access. Dependencies found deep inside a nested block
// attach to the enclosing operation that is ordered before the sink in the
// sink's own block.
//
// Preconditions: `program` is lowered.
// Postconditions: only dependency lists are mutated, and only by appending
//   tokens not already present.
// Failure modes: an unknown conflict-mode string → DepError.
// Side effects: mutates the program's dependency lists.

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use crate::diag::DepError;
use crate::id::{OpId, ValueId};
use crate::ir::{OpKind, Program, Role, UseSlot};
use crate::memref::{decompose, operand_ref, operand_role, overlaps, PartialRef};

/// Upper bound on the values visited by the backwards scalar walk.
const MAX_TRACE_DEPTH: usize = 64;

// ── Conflict mode ───────────────────────────────────────────────────────────

/// Which earlier accesses count as producers for a sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictMode {
    /// Only earlier writes.
    ReadAfterWrite,
    /// Any earlier read or write.
    AnyAfterAny,
}

impl ConflictMode {
    pub fn as_str(self) -> &'static str {
        match self {
            ConflictMode::ReadAfterWrite => "RAW",
            ConflictMode::AnyAfterAny => "WAW/WAR",
        }
    }

    fn admits(self, role: Role) -> bool {
        match self {
            ConflictMode::ReadAfterWrite => role.writes(),
            ConflictMode::AnyAfterAny => role.reads() || role.writes(),
        }
    }
}

impl FromStr for ConflictMode {
    type Err = DepError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "RAW" => Ok(ConflictMode::ReadAfterWrite),
            "WAW/WAR" => Ok(ConflictMode::AnyAfterAny),
            other => Err(DepError::InvalidConflictMode(other.to_string())),
        }
    }
}

impl fmt::Display for ConflictMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Edge insertion ──────────────────────────────────────────────────────────

/// Make `sink` wait on `source`, or on the closest enclosing operation of
/// `source` that sits in the sink's block before the sink. Returns whether a
/// new token was added. Nothing is added when no such operation exists.
pub fn add_dependency_between(program: &mut Program, source: OpId, sink: OpId) -> bool {
    let Some(sink_block) = program.parent_block(sink) else {
        return false;
    };
    let candidates = std::iter::once(source).chain(program.ancestors(source));
    for candidate in candidates {
        if candidate == sink {
            return false;
        }
        if program.parent_block(candidate) != Some(sink_block)
            || !program.is_before_in_block(candidate, sink)
        {
            continue;
        }
        if let Some(token) = program.completion_token(candidate) {
            return program.add_dep_if_new(sink, token);
        }
    }
    false
}

// ── Tracing ─────────────────────────────────────────────────────────────────

/// Trace every memory access of `sink` under one conflict mode. Returns the
/// number of tokens added.
pub fn trace(program: &mut Program, sink: OpId, mode: ConflictMode) -> usize {
    let acc = decompose(program, sink);
    trace_refs(program, sink, &acc.reads, mode) + trace_refs(program, sink, &acc.writes, mode)
}

/// Trace the given references of `sink`.
pub fn trace_refs(
    program: &mut Program,
    sink: OpId,
    refs: &[PartialRef],
    mode: ConflictMode,
) -> usize {
    let mut added = 0;
    for r in refs {
        for u in program.uses(r.base) {
            let UseSlot::Operand(index) = u.slot else {
                continue;
            };
            if u.op == sink || program.ancestors(u.op).contains(&sink) {
                continue;
            }
            if !mode.admits(operand_role(program, u.op, index)) {
                continue;
            }
            let candidate = operand_ref(program, u.op, index);
            if !overlaps(r, &candidate) {
                continue;
            }
            if add_dependency_between(program, u.op, sink) {
                tracing::trace!(source = u.op.0, sink = sink.0, mode = %mode, "conflict edge");
                added += 1;
            }
        }
    }
    added
}

/// Depend on compute blocks that define a traced buffer.
fn trace_defining_ops(program: &mut Program, sink: OpId, refs: &[PartialRef]) -> usize {
    let mut added = 0;
    for r in refs {
        if let Some(def) = program.defining_op(r.base) {
            if def != sink
                && matches!(program.kind(def), OpKind::Compute)
                && add_dependency_between(program, def, sink)
            {
                added += 1;
            }
        }
    }
    added
}

/// Depend on compute blocks that produce a dynamic offset or scalar operand.
fn trace_tile_indices(program: &mut Program, sink: OpId, values: &[ValueId]) -> usize {
    let mut added = 0;
    for &v in values {
        if let Some(def) = program.defining_op(v) {
            if def != sink
                && matches!(program.kind(def), OpKind::Compute)
                && add_dependency_between(program, def, sink)
            {
                added += 1;
            }
        }
    }
    added
}

/// Statistics from one program-wide trace.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TraceStats {
    pub sinks: usize,
    pub tokens_added: usize,
}

/// Trace every asynchronous operation in document order. Reads are traced
/// read-after-write and writes any-after-any unless `forced` picks one mode
/// for both. Sinks inside loops that end up with no dependency are hooked
/// to the loop-carried token.
pub fn trace_program(program: &mut Program, forced: Option<ConflictMode>) -> TraceStats {
    let mut stats = TraceStats::default();
    for sink in program.walk() {
        if !program.is_live(sink) || !program.kind(sink).is_async() {
            continue;
        }
        stats.sinks += 1;
        let acc = decompose(program, sink);
        let read_mode = forced.unwrap_or(ConflictMode::ReadAfterWrite);
        let write_mode = forced.unwrap_or(ConflictMode::AnyAfterAny);

        let mut added = trace_refs(program, sink, &acc.reads, read_mode);
        added += trace_refs(program, sink, &acc.writes, write_mode);

        let all_refs: Vec<PartialRef> = acc.reads.iter().chain(&acc.writes).cloned().collect();
        added += trace_defining_ops(program, sink, &all_refs);

        let mut scalars: Vec<ValueId> = all_refs.iter().flat_map(|r| r.dynamic_indices()).collect();
        scalars.extend(&acc.scalar_ins);
        scalars.extend(&acc.scalar_outs);
        added += trace_tile_indices(program, sink, &scalars);

        if program.deps(sink).is_empty() {
            added += reconnect_loop_carried(program, sink);
        }
        stats.tokens_added += added;
    }
    tracing::debug!(sinks = stats.sinks, added = stats.tokens_added, "traced memory conflicts");
    stats
}

// ── Loop-carried reconnection ───────────────────────────────────────────────

/// Thread `op` through the iterations of its enclosing loops: it waits on
/// each loop's carried token and its completion feeds the join in front of
/// the loop's yield. Walks outward one loop at a time; for an enclosing loop
/// the op standing for it is the producer of its initial token.
pub fn reconnect_loop_carried(program: &mut Program, op: OpId) -> usize {
    let mut added = 0;
    let mut current = op;
    while let Some(parent) = program.parent_op(current) {
        if !matches!(program.kind(parent), OpKind::Loop(_)) {
            break;
        }
        let Some(carried) = program
            .loop_carried_arg(parent, 0)
            .filter(|&v| program.value_type(v).is_token())
        else {
            break;
        };

        let waiter = if program.kind(current).is_async() {
            Some(current)
        } else {
            program
                .loop_init(current, 0)
                .and_then(|v| program.defining_op(v))
                .filter(|&d| program.kind(d).is_async())
        };
        if let Some(waiter) = waiter {
            added += usize::from(program.add_dep_if_new(waiter, carried));
        }

        let finished = program.completion_token(current);
        let yield_join = program
            .loop_yield(parent)
            .and_then(|y| program.token_list(y).first().copied())
            .and_then(|t| program.defining_op(t))
            .filter(|&j| matches!(program.kind(j), OpKind::Join));
        if let (Some(token), Some(join)) = (finished, yield_join) {
            if join != current {
                added += usize::from(program.add_dep_if_new(join, token));
            }
        }
        current = parent;
    }
    added
}

// ── Backward scalar tracing ─────────────────────────────────────────────────

/// Loop induction variables an operation's scalar operands depend on, and
/// the operations passed through on the way.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InductionTrace {
    pub induction_vars: Vec<ValueId>,
    pub visited_ops: Vec<OpId>,
}

pub fn dependent_induction_vars(program: &Program, op: OpId) -> InductionTrace {
    let mut result = InductionTrace::default();
    let mut seen: HashSet<ValueId> = HashSet::new();
    let mut worklist: Vec<ValueId> = program
        .op(op)
        .operands
        .iter()
        .copied()
        .filter(|&v| {
            let ty = program.value_type(v);
            !ty.is_memref() && !ty.is_token()
        })
        .collect();

    while let Some(v) = worklist.pop() {
        if !seen.insert(v) {
            continue;
        }
        if seen.len() > MAX_TRACE_DEPTH {
            tracing::warn!(op = op.0, "induction-variable trace truncated");
            break;
        }
        if let Some((block, index)) = program.block_arg_owner(v) {
            let Some(owner) = program.block(block).parent_op else {
                continue;
            };
            match program.kind(owner) {
                OpKind::Loop(_) if index == 0 => {
                    if !result.induction_vars.contains(&v) {
                        result.induction_vars.push(v);
                    }
                }
                OpKind::Hierarchy { .. } => {
                    if let Some((call, pair)) = program.hierarchy_param_owner(v) {
                        worklist.push(program.op(call).operands[pair]);
                    }
                }
                _ => {}
            }
            continue;
        }
        let Some(def) = program.defining_op(v) else {
            continue;
        };
        if !result.visited_ops.contains(&def) {
            result.visited_ops.push(def);
        }
        match program.kind(def) {
            // Result k of a compute block is operand k - 1 of its yield.
            OpKind::Compute => {
                let index = program.op(def).results.iter().position(|&r| r == v);
                let yielded = program
                    .body(def)
                    .and_then(|b| program.block_terminator(b))
                    .zip(index)
                    .and_then(|(y, k)| program.op(y).operands.get(k.checked_sub(1)?).copied());
                worklist.extend(yielded);
            }
            _ => worklist.extend(program.op(def).operands.iter().copied()),
        }
    }
    result
}

/// Whether `token` is a control event: a loop-carried token, a join result,
/// or the result of a loop or conditional.
pub fn is_control_token(program: &Program, token: ValueId) -> bool {
    if program.carried_arg_owner(token).is_some() {
        return true;
    }
    match program.defining_op(token) {
        Some(def) => matches!(
            program.kind(def),
            OpKind::Join | OpKind::Loop(_) | OpKind::If
        ),
        None => false,
    }
}

/// Control tokens reached backwards from the dependencies of `op`. A control
/// token ends its path; any other token produced by an asynchronous
/// operation is followed through that operation's own dependencies.
pub fn control_tokens(program: &Program, op: OpId) -> Vec<ValueId> {
    let mut found = Vec::new();
    let mut seen: HashSet<ValueId> = HashSet::new();
    let mut worklist: Vec<ValueId> = program.deps(op).iter().rev().copied().collect();
    while let Some(token) = worklist.pop() {
        if !seen.insert(token) {
            continue;
        }
        if is_control_token(program, token) {
            found.push(token);
            continue;
        }
        if let Some(def) = program.defining_op(token) {
            if program.kind(def).is_async() {
                worklist.extend(program.deps(def).iter().rev().copied());
            }
        }
    }
    found
}

// ── Tests ───────────────────────────────────────────────────────────────────
