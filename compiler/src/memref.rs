// memref.rs — Partial memory references and operand role classification
//
// A `PartialRef` describes which part of a memref an operation touches: the
// base value, its rank and one index expression per dimension. Overlap is a
// conservative syntactic test: only two distinct constants in the same
// dimension prove disjointness.
//
// Preconditions: `program` is lowered.
// Postconditions: pure queries, the program is not mutated.
// Failure modes: none.
// Side effects: none.

use std::collections::HashSet;

use crate::id::{OpId, ValueId};
use crate::ir::{OpKind, Program, Role, UseSlot};

// ── Partial reference ───────────────────────────────────────────────────────

/// Index information for one dimension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndexExpr {
    /// A known constant offset.
    Const(i64),
    /// An offset computed at run time; the value is kept for tile-index tracing.
    Dynamic(ValueId),
    /// The whole dimension.
    Whole,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PartialRef {
    pub base: ValueId,
    pub indices: Vec<IndexExpr>,
}

impl PartialRef {
    /// Reference to the whole of `base`.
    pub fn whole(base: ValueId, rank: usize) -> Self {
        PartialRef {
            base,
            indices: vec![IndexExpr::Whole; rank],
        }
    }

    pub fn rank(&self) -> usize {
        self.indices.len()
    }

    /// Build from explicit offsets. An empty offset list means the whole
    /// buffer.
    pub fn from_offsets(program: &Program, base: ValueId, offsets: &[ValueId]) -> Self {
        let rank = program.value_type(base).rank().unwrap_or(0) as usize;
        if offsets.is_empty() {
            return Self::whole(base, rank);
        }
        let indices = offsets
            .iter()
            .map(|&v| match program.const_value(v) {
                Some(c) => IndexExpr::Const(c),
                None => IndexExpr::Dynamic(v),
            })
            .collect();
        PartialRef { base, indices }
    }

    /// Values feeding dynamic offsets.
    pub fn dynamic_indices(&self) -> impl Iterator<Item = ValueId> + '_ {
        self.indices.iter().filter_map(|i| match i {
            IndexExpr::Dynamic(v) => Some(*v),
            _ => None,
        })
    }
}

/// Whether two references may touch the same element.
///
/// Different bases never overlap. Same-base references of different rank are
/// treated as overlapping.
pub fn overlaps(a: &PartialRef, b: &PartialRef) -> bool {
    if a.base != b.base {
        return false;
    }
    if a.rank() != b.rank() {
        return true;
    }
    !a.indices.iter().zip(&b.indices).any(|pair| match pair {
        (IndexExpr::Const(x), IndexExpr::Const(y)) => x != y,
        _ => false,
    })
}

// ── Operand views ───────────────────────────────────────────────────────────

/// Partial reference for operand `index` of `op`, honouring the offset
/// layout of transfers and channel endpoints.
pub fn operand_ref(program: &Program, op: OpId, index: usize) -> PartialRef {
    let operation = program.op(op);
    let base = operation.operands[index];
    let offsets: &[ValueId] = match (&operation.kind, index) {
        (OpKind::Transfer { dst_offsets }, 0) => &operation.operands[2..2 + dst_offsets],
        (OpKind::Transfer { dst_offsets }, 1) => &operation.operands[2 + dst_offsets..],
        (OpKind::Put { .. } | OpKind::Get { .. }, 0) => &operation.operands[1..],
        _ => &[],
    };
    PartialRef::from_offsets(program, base, offsets)
}

/// Role of operand `index` of `op`. Hierarchy operands take the role of the
/// matching inner parameter.
pub fn operand_role(program: &Program, op: OpId, index: usize) -> Role {
    let operation = program.op(op);
    if let OpKind::Hierarchy { .. } = operation.kind {
        return match program.hierarchy_pairs(op).get(index) {
            Some(&(_, inner)) if program.value_type(inner).is_memref() => classify(program, inner),
            Some(_) => Role::Scalar,
            None => Role::Opaque,
        };
    }
    operation.kind.operand_role(index, operation.operands.len())
}

/// Classify how `value` is accessed by its users: `Write` if any use writes
/// (or has no known role), `Read` if every use only reads, `Write` if there
/// are no uses. Uses through hierarchy calls are followed into the inner
/// parameter.
pub fn classify(program: &Program, value: ValueId) -> Role {
    let mut found_read = false;
    let mut found_write = false;
    let mut visited: HashSet<ValueId> = HashSet::new();
    let mut worklist = vec![value];

    while let Some(current) = worklist.pop() {
        if !visited.insert(current) {
            continue;
        }
        for u in program.uses(current) {
            let UseSlot::Operand(index) = u.slot else {
                continue;
            };
            let operation = program.op(u.op);
            if let OpKind::Hierarchy { .. } = operation.kind {
                if let Some(&(_, inner)) = program.hierarchy_pairs(u.op).get(index) {
                    worklist.push(inner);
                }
                continue;
            }
            match operation.kind.operand_role(index, operation.operands.len()) {
                Role::Read => found_read = true,
                Role::Scalar => {}
                Role::Write | Role::ReadWrite | Role::Opaque => found_write = true,
            }
        }
    }

    if found_write || !found_read {
        Role::Write
    } else {
        Role::Read
    }
}

// ── Sink decomposition ──────────────────────────────────────────────────────

/// Memory and scalar accesses of an asynchronous operation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Accesses {
    pub reads: Vec<PartialRef>,
    pub writes: Vec<PartialRef>,
    pub scalar_ins: Vec<ValueId>,
    pub scalar_outs: Vec<ValueId>,
}

/// Split the operands of `sink` into memory reads and writes plus scalar
/// inputs and outputs. A compute block contributes the union of its body's
/// primitives; buffers allocated inside it count as writes.
pub fn decompose(program: &Program, sink: OpId) -> Accesses {
    let members: Vec<OpId> = match program.kind(sink) {
        OpKind::Compute => program
            .body(sink)
            .map(|b| program.walk_block(b))
            .unwrap_or_default(),
        _ => vec![sink],
    };

    let mut acc = Accesses::default();
    for op in members {
        let operation = program.op(op);
        for (i, &operand) in operation.operands.iter().enumerate() {
            let ty = program.value_type(operand);
            if ty.is_memref() {
                let role = operand_role(program, op, i);
                let r = operand_ref(program, op, i);
                if role.reads() {
                    push_unique(&mut acc.reads, r.clone());
                }
                if role.writes() {
                    push_unique(&mut acc.writes, r);
                }
            } else if !ty.is_token() {
                push_unique(&mut acc.scalar_ins, operand);
            }
        }
        // The sink's own results are handles, not effects.
        if op == sink {
            continue;
        }
        for &result in &operation.results {
            let ty = program.value_type(result);
            if let Some(rank) = ty.rank() {
                push_unique(&mut acc.writes, PartialRef::whole(result, rank as usize));
            } else if !ty.is_token() {
                push_unique(&mut acc.scalar_outs, result);
            }
        }
    }
    acc
}

fn push_unique<T: PartialEq>(list: &mut Vec<T>, item: T) {
    if !list.contains(&item) {
        list.push(item);
    }
}

// ── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lower::parse_program;

    fn r(base: u32, indices: &[IndexExpr]) -> PartialRef {
        PartialRef {
            base: ValueId(base),
            indices: indices.to_vec(),
        }
    }

    #[test]
    fn different_bases_never_overlap() {
        assert!(!overlaps(&r(0, &[IndexExpr::Whole]), &r(1, &[IndexExpr::Whole])));
    }

    #[test]
    fn distinct_constants_are_disjoint() {
        let a = r(0, &[IndexExpr::Const(0), IndexExpr::Whole]);
        let b = r(0, &[IndexExpr::Const(1), IndexExpr::Whole]);
        assert!(!overlaps(&a, &b));
        assert!(!overlaps(&b, &a));
    }

    #[test]
    fn unknown_or_whole_dimensions_overlap() {
        let c0 = r(0, &[IndexExpr::Const(0)]);
        assert!(overlaps(&c0, &r(0, &[IndexExpr::Whole])));
        assert!(overlaps(&c0, &r(0, &[IndexExpr::Dynamic(ValueId(7))])));
        assert!(overlaps(&c0, &r(0, &[IndexExpr::Const(0)])));
    }

    #[test]
    fn rank_mismatch_is_conservative() {
        let a = r(0, &[IndexExpr::Const(0)]);
        let b = r(0, &[IndexExpr::Const(1), IndexExpr::Const(1)]);
        assert!(overlaps(&a, &b));
    }

    #[test]
    fn transfer_offsets_become_constants() {
        let p = parse_program(
            "func @f(%a: memref<2, L3>, %b: memref<2, L1>) {\n  %c0 = const 0\n  %c4 = const 4\n  %t = transfer %b[%c0, %c4] <- %a\n}",
        )
        .unwrap();
        let t = p.walk()[2];
        let dst = operand_ref(&p, t, 0);
        assert_eq!(dst.indices, vec![IndexExpr::Const(0), IndexExpr::Const(4)]);
        let src = operand_ref(&p, t, 1);
        assert_eq!(src.indices, vec![IndexExpr::Whole, IndexExpr::Whole]);
    }

    #[test]
    fn decompose_transfer() {
        let p = parse_program(
            "func @f(%a: memref<1, L3>, %b: memref<1, L1>) {\n  %t = transfer %b <- %a\n}",
        )
        .unwrap();
        let acc = decompose(&p, p.walk()[0]);
        let a = p.block(p.funcs[0].body).args[0];
        let b = p.block(p.funcs[0].body).args[1];
        assert_eq!(acc.reads, vec![PartialRef::whole(a, 1)]);
        assert_eq!(acc.writes, vec![PartialRef::whole(b, 1)]);
    }

    #[test]
    fn decompose_compute_unions_body() {
        let p = parse_program(
            "func @f(%a: memref<1, L2>, %n: index) {\n  %t, %m = compute {\n    %x = alloc : memref<1, L1>\n    copy %a, %x\n    %k = muli %n, %n\n    yield %x\n  }\n}",
        )
        .unwrap();
        let acc = decompose(&p, p.walk()[0]);
        let a = p.block(p.funcs[0].body).args[0];
        let n = p.block(p.funcs[0].body).args[1];
        assert!(acc.reads.iter().any(|r| r.base == a));
        assert!(!acc.writes.iter().any(|r| r.base == a));
        // alloc result is a write
        assert!(!acc.writes.is_empty());
        assert_eq!(acc.scalar_ins, vec![n]);
        assert_eq!(acc.scalar_outs.len(), 1);
    }

    #[test]
    fn put_is_read_only() {
        let p = parse_program(
            "func @f(%a: memref<1, L1>, %b: memref<1, L2>) {\n  %p = put @ch %a\n  %g = get @ch %b\n}",
        )
        .unwrap();
        let ops = p.walk();
        let put = decompose(&p, ops[0]);
        assert_eq!(put.reads.len(), 1);
        assert!(put.writes.is_empty());
        let get = decompose(&p, ops[1]);
        assert!(get.reads.is_empty());
        assert_eq!(get.writes.len(), 1);
    }

    #[test]
    fn classify_follows_hierarchy_params() {
        let p = parse_program(
            "func @f(%a: memref<1, L3>, %b: memref<1, L3>, %l: memref<1, L2>) {\n  %h = launch args(%x = %a, %y = %b, %z = %l) {\n    %s = segment args(%u = %x, %w = %z) {\n      %t0 = transfer %w <- %u\n      end\n    }\n    end\n  }\n}",
        )
        .unwrap();
        let args = p.block(p.funcs[0].body).args.clone();
        assert_eq!(classify(&p, args[0]), Role::Read);
        // no uses inside the launch body
        assert_eq!(classify(&p, args[1]), Role::Write);
        assert_eq!(classify(&p, args[2]), Role::Write);
    }
}
