// ir.rs — In-memory host program: operations, values, blocks
//
// The program is an arena of operations, SSA values and blocks addressed by
// `OpId` / `ValueId` / `BlockId`. Every region is a single block. Operation
// kinds form a closed set; each kind describes its operand layout, operand
// roles and token-list slot through methods on `OpKind`, so analyses query
// data instead of testing types one by one.
//
// Operand layouts:
//   transfer   [dst, src, dst_offsets.., src_offsets..]
//   put        [src, offsets..]        get   [dst, offsets..]
//   copy       [src, dst]              transform [ins.., outs..]
//   loop       [lb, ub, step, inits..] body args [iv, carried..]
//   if         [cond]                  regions [then, else]
//   hierarchy  [kernel operands..]     body args [ids.., params..]
//
// Preconditions: programs are built through `append_op` (lowering or tests).
// Postconditions: erased operations are unlinked from their block and never
//   returned by walks or use queries.
// Failure modes: none; invalid ids panic (arena indexing).
// Side effects: none.

use std::collections::HashMap;
use std::fmt;

use crate::ast::Span;
use crate::id::{BlockId, OpId, ValueId};

// ── Types ──────────────────────────────────────────────────────────────────

/// Memory hierarchy level a buffer lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MemSpace {
    L1,
    L2,
    L3,
}

impl MemSpace {
    pub fn as_str(self) -> &'static str {
        match self {
            MemSpace::L1 => "L1",
            MemSpace::L2 => "L2",
            MemSpace::L3 => "L3",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "L1" => Some(MemSpace::L1),
            "L2" => Some(MemSpace::L2),
            "L3" => Some(MemSpace::L3),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Type {
    /// Completion handle of an asynchronous operation.
    Token,
    /// Scalar index value.
    Index,
    /// Array-like buffer of a fixed rank.
    MemRef { rank: u32, space: MemSpace },
}

impl Type {
    pub fn is_token(self) -> bool {
        matches!(self, Type::Token)
    }

    pub fn is_memref(self) -> bool {
        matches!(self, Type::MemRef { .. })
    }

    pub fn rank(self) -> Option<u32> {
        match self {
            Type::MemRef { rank, .. } => Some(rank),
            _ => None,
        }
    }

    pub fn space(self) -> Option<MemSpace> {
        match self {
            Type::MemRef { space, .. } => Some(space),
            _ => None,
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Token => write!(f, "token"),
            Type::Index => write!(f, "index"),
            Type::MemRef { rank, space } => write!(f, "memref<{}, {}>", rank, space.as_str()),
        }
    }
}

// ── Operation kinds ────────────────────────────────────────────────────────

/// Nesting level of a hierarchy call, outermost first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum HierarchyLevel {
    Launch,
    Segment,
    Herd,
}

impl HierarchyLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            HierarchyLevel::Launch => "launch",
            HierarchyLevel::Segment => "segment",
            HierarchyLevel::Herd => "herd",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LoopKind {
    Sequential,
    Parallel,
}

/// How an operation uses one of its operands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Read,
    Write,
    ReadWrite,
    /// Non-memory scalar input (index, bound, offset).
    Scalar,
    /// Role depends on context (hierarchy kernel operands, yielded values).
    Opaque,
}

impl Role {
    pub fn reads(self) -> bool {
        matches!(self, Role::Read | Role::ReadWrite | Role::Opaque)
    }

    pub fn writes(self) -> bool {
        matches!(self, Role::Write | Role::ReadWrite | Role::Opaque)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum OpKind {
    Const(i64),
    Alloc,
    Dealloc,
    Copy,
    Transform { ins: usize },
    MulI,
    AddI,
    Apply,
    /// Terminator of compute, loop and conditional bodies.
    Yield,
    Compute,
    Transfer { dst_offsets: usize },
    Put { channel: String },
    Get { channel: String },
    Join,
    Loop(LoopKind),
    If,
    Hierarchy { level: HierarchyLevel, ids: usize },
    /// Terminator of a hierarchy body.
    End,
}

impl OpKind {
    /// Operations that produce a completion token and carry an explicit
    /// dependency list.
    pub fn is_async(&self) -> bool {
        matches!(
            self,
            OpKind::Compute
                | OpKind::Transfer { .. }
                | OpKind::Put { .. }
                | OpKind::Get { .. }
                | OpKind::Join
                | OpKind::Hierarchy { .. }
        )
    }

    /// Effects allowed inside a compute body.
    pub fn is_compute_primitive(&self) -> bool {
        matches!(
            self,
            OpKind::Const(_)
                | OpKind::Alloc
                | OpKind::Dealloc
                | OpKind::Copy
                | OpKind::Transform { .. }
                | OpKind::MulI
                | OpKind::AddI
                | OpKind::Apply
                | OpKind::Yield
        )
    }

    /// Primitives with no memory side effect.
    pub fn is_side_effect_free(&self) -> bool {
        matches!(
            self,
            OpKind::Const(_)
                | OpKind::Alloc
                | OpKind::MulI
                | OpKind::AddI
                | OpKind::Apply
                | OpKind::Yield
        )
    }

    pub fn is_terminator(&self) -> bool {
        matches!(self, OpKind::Yield | OpKind::End)
    }

    /// Role of operand `index` given the operation's operand count.
    pub fn operand_role(&self, index: usize, num_operands: usize) -> Role {
        match self {
            OpKind::Dealloc => Role::ReadWrite,
            OpKind::Copy => {
                if index == 0 {
                    Role::Read
                } else {
                    Role::ReadWrite
                }
            }
            OpKind::Transform { ins } => {
                if index < *ins {
                    Role::Read
                } else {
                    Role::ReadWrite
                }
            }
            OpKind::Transfer { .. } => match index {
                0 => Role::Write,
                1 => Role::Read,
                _ => Role::Scalar,
            },
            OpKind::Put { .. } => {
                if index == 0 {
                    Role::Read
                } else {
                    Role::Scalar
                }
            }
            OpKind::Get { .. } => {
                if index == 0 {
                    Role::Write
                } else {
                    Role::Scalar
                }
            }
            OpKind::MulI | OpKind::AddI | OpKind::Apply | OpKind::If => Role::Scalar,
            OpKind::Loop(_) => {
                if index < 3 || index >= num_operands {
                    Role::Scalar
                } else {
                    Role::Opaque
                }
            }
            OpKind::Hierarchy { .. } | OpKind::Yield => Role::Opaque,
            OpKind::Const(_)
            | OpKind::Alloc
            | OpKind::Compute
            | OpKind::Join
            | OpKind::End => Role::Opaque,
        }
    }

    /// Label used for graph vertices and diagnostics.
    pub fn label(&self) -> String {
        match self {
            OpKind::Const(_) => "ConstOp".into(),
            OpKind::Alloc => "AllocOp".into(),
            OpKind::Dealloc => "DeallocOp".into(),
            OpKind::Copy => "CopyOp".into(),
            OpKind::Transform { .. } => "TransformOp".into(),
            OpKind::MulI => "MulIOp".into(),
            OpKind::AddI => "AddIOp".into(),
            OpKind::Apply => "ApplyOp".into(),
            OpKind::Yield => "YieldOp".into(),
            OpKind::Compute => "ComputeOp".into(),
            OpKind::Transfer { .. } => "TransferOp".into(),
            OpKind::Put { channel } => format!("ChannelPutOp@{}", channel),
            OpKind::Get { channel } => format!("ChannelGetOp@{}", channel),
            OpKind::Join => "JoinOp".into(),
            OpKind::Loop(LoopKind::Sequential) => "ForOp".into(),
            OpKind::Loop(LoopKind::Parallel) => "ParallelOp".into(),
            OpKind::If => "IfOp".into(),
            OpKind::Hierarchy { level, .. } => match level {
                HierarchyLevel::Launch => "LaunchOp".into(),
                HierarchyLevel::Segment => "SegmentOp".into(),
                HierarchyLevel::Herd => "HerdOp".into(),
            },
            OpKind::End => "EndOp".into(),
        }
    }

    /// Channel name for put/get rendezvous operations.
    pub fn channel(&self) -> Option<&str> {
        match self {
            OpKind::Put { channel } | OpKind::Get { channel } => Some(channel),
            _ => None,
        }
    }
}

// ── Arena entities ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueDef {
    Result { op: OpId, index: usize },
    Arg { block: BlockId, index: usize },
}

#[derive(Debug, Clone)]
pub struct Value {
    pub ty: Type,
    pub def: ValueDef,
    pub name: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Operation {
    pub kind: OpKind,
    pub operands: Vec<ValueId>,
    /// Token list of asynchronous operations.
    pub deps: Vec<ValueId>,
    pub results: Vec<ValueId>,
    pub regions: Vec<BlockId>,
    pub parent: Option<BlockId>,
    pub span: Option<Span>,
    erased: bool,
}

#[derive(Debug, Clone, Default)]
pub struct Block {
    pub args: Vec<ValueId>,
    pub ops: Vec<OpId>,
    pub parent_op: Option<OpId>,
}

#[derive(Debug, Clone)]
pub struct Func {
    pub name: String,
    pub body: BlockId,
}

/// One use of a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Use {
    pub op: OpId,
    pub slot: UseSlot,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UseSlot {
    Operand(usize),
    Dep(usize),
}

/// Description of a new operation for `Program::append_op`.
#[derive(Debug, Clone)]
pub struct OpSpec {
    pub kind: OpKind,
    pub operands: Vec<ValueId>,
    pub deps: Vec<ValueId>,
    pub results: Vec<(Option<String>, Type)>,
    pub regions: Vec<BlockId>,
    pub span: Option<Span>,
}

impl OpSpec {
    pub fn new(kind: OpKind) -> Self {
        OpSpec {
            kind,
            operands: Vec::new(),
            deps: Vec::new(),
            results: Vec::new(),
            regions: Vec::new(),
            span: None,
        }
    }

    pub fn operands(mut self, operands: Vec<ValueId>) -> Self {
        self.operands = operands;
        self
    }

    pub fn deps(mut self, deps: Vec<ValueId>) -> Self {
        self.deps = deps;
        self
    }

    pub fn result(mut self, name: Option<&str>, ty: Type) -> Self {
        self.results.push((name.map(str::to_string), ty));
        self
    }

    pub fn region(mut self, block: BlockId) -> Self {
        self.regions.push(block);
        self
    }

    pub fn span(mut self, span: Span) -> Self {
        self.span = Some(span);
        self
    }
}

// ── Program ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default)]
pub struct Program {
    ops: Vec<Operation>,
    values: Vec<Value>,
    blocks: Vec<Block>,
    pub funcs: Vec<Func>,
}

impl Program {
    pub fn new() -> Self {
        Self::default()
    }

    // ── Construction ──

    /// Create a function whose body block has the given arguments.
    pub fn add_func(&mut self, name: &str, args: &[(Option<&str>, Type)]) -> BlockId {
        let body = self.add_block(args);
        self.funcs.push(Func {
            name: name.to_string(),
            body,
        });
        body
    }

    /// Create a detached block; it becomes owned by the op that lists it as
    /// a region.
    pub fn add_block(&mut self, args: &[(Option<&str>, Type)]) -> BlockId {
        let id = BlockId(self.blocks.len() as u32);
        self.blocks.push(Block::default());
        for (index, (name, ty)) in args.iter().enumerate() {
            let value = self.add_value(*ty, ValueDef::Arg { block: id, index }, *name);
            self.blocks[id.index()].args.push(value);
        }
        id
    }

    fn add_value(&mut self, ty: Type, def: ValueDef, name: Option<&str>) -> ValueId {
        let id = ValueId(self.values.len() as u32);
        self.values.push(Value {
            ty,
            def,
            name: name.map(str::to_string),
        });
        id
    }

    /// Append a new operation at the end of `block`.
    pub fn append_op(&mut self, block: BlockId, spec: OpSpec) -> OpId {
        let id = OpId(self.ops.len() as u32);
        let mut results = Vec::with_capacity(spec.results.len());
        for (index, (name, ty)) in spec.results.iter().enumerate() {
            results.push(self.add_value(*ty, ValueDef::Result { op: id, index }, name.as_deref()));
        }
        for region in &spec.regions {
            self.blocks[region.index()].parent_op = Some(id);
        }
        self.ops.push(Operation {
            kind: spec.kind,
            operands: spec.operands,
            deps: spec.deps,
            results,
            regions: spec.regions,
            parent: Some(block),
            span: spec.span,
            erased: false,
        });
        self.blocks[block.index()].ops.push(id);
        id
    }

    // ── Entity access ──

    pub fn op(&self, id: OpId) -> &Operation {
        &self.ops[id.index()]
    }

    pub fn value(&self, id: ValueId) -> &Value {
        &self.values[id.index()]
    }

    pub fn block(&self, id: BlockId) -> &Block {
        &self.blocks[id.index()]
    }

    pub fn kind(&self, id: OpId) -> &OpKind {
        &self.ops[id.index()].kind
    }

    pub fn value_type(&self, id: ValueId) -> Type {
        self.values[id.index()].ty
    }

    pub fn is_live(&self, id: OpId) -> bool {
        !self.ops[id.index()].erased
    }

    /// Printable name of a value (without sigil).
    pub fn value_name(&self, id: ValueId) -> String {
        match &self.values[id.index()].name {
            Some(name) => name.clone(),
            None => format!("_{}", id.0),
        }
    }

    /// First live operation (document order) with a result named `name`.
    pub fn op_by_result_name(&self, name: &str) -> Option<OpId> {
        self.walk().into_iter().find(|&op| {
            self.ops[op.index()]
                .results
                .iter()
                .any(|&r| self.values[r.index()].name.as_deref() == Some(name))
        })
    }

    /// First value named `name`, in arena order.
    pub fn value_by_name(&self, name: &str) -> Option<ValueId> {
        self.values
            .iter()
            .position(|v| v.name.as_deref() == Some(name))
            .map(|i| ValueId(i as u32))
    }

    // ── Structure queries ──

    pub fn defining_op(&self, value: ValueId) -> Option<OpId> {
        match self.values[value.index()].def {
            ValueDef::Result { op, .. } => Some(op),
            ValueDef::Arg { .. } => None,
        }
    }

    /// Block argument owner: (block, argument index).
    pub fn block_arg_owner(&self, value: ValueId) -> Option<(BlockId, usize)> {
        match self.values[value.index()].def {
            ValueDef::Arg { block, index } => Some((block, index)),
            ValueDef::Result { .. } => None,
        }
    }

    /// The operation whose region contains `op`.
    pub fn parent_op(&self, op: OpId) -> Option<OpId> {
        let block = self.ops[op.index()].parent?;
        self.blocks[block.index()].parent_op
    }

    pub fn parent_block(&self, op: OpId) -> Option<BlockId> {
        self.ops[op.index()].parent
    }

    /// Chain of enclosing operations, innermost first.
    pub fn ancestors(&self, op: OpId) -> Vec<OpId> {
        let mut chain = Vec::new();
        let mut current = self.parent_op(op);
        while let Some(parent) = current {
            chain.push(parent);
            current = self.parent_op(parent);
        }
        chain
    }

    pub fn position_in_block(&self, op: OpId) -> Option<usize> {
        let block = self.ops[op.index()].parent?;
        self.blocks[block.index()].ops.iter().position(|&o| o == op)
    }

    /// True when both operations live in the same block and `a` comes first.
    pub fn is_before_in_block(&self, a: OpId, b: OpId) -> bool {
        if self.ops[a.index()].parent.is_none() || self.ops[a.index()].parent != self.ops[b.index()].parent {
            return false;
        }
        match (self.position_in_block(a), self.position_in_block(b)) {
            (Some(pa), Some(pb)) => pa < pb,
            _ => false,
        }
    }

    pub fn block_terminator(&self, block: BlockId) -> Option<OpId> {
        let last = *self.blocks[block.index()].ops.last()?;
        if self.ops[last.index()].kind.is_terminator() {
            Some(last)
        } else {
            None
        }
    }

    /// First region's block, for single-body operations.
    pub fn body(&self, op: OpId) -> Option<BlockId> {
        self.ops[op.index()].regions.first().copied()
    }

    /// Pre-order, document-order walk of every live operation under `block`.
    pub fn walk_block(&self, block: BlockId) -> Vec<OpId> {
        let mut order = Vec::new();
        let mut stack: Vec<OpId> = self.blocks[block.index()].ops.iter().rev().copied().collect();
        while let Some(op) = stack.pop() {
            if self.ops[op.index()].erased {
                continue;
            }
            order.push(op);
            for region in self.ops[op.index()].regions.iter().rev() {
                stack.extend(self.blocks[region.index()].ops.iter().rev().copied());
            }
        }
        order
    }

    /// Document-order walk of every live operation in every function.
    pub fn walk(&self) -> Vec<OpId> {
        self.funcs
            .iter()
            .flat_map(|f| self.walk_block(f.body))
            .collect()
    }

    /// Every use of `value`, in document order.
    pub fn uses(&self, value: ValueId) -> Vec<Use> {
        let mut uses = Vec::new();
        for op in self.walk() {
            let operation = &self.ops[op.index()];
            for (i, &v) in operation.operands.iter().enumerate() {
                if v == value {
                    uses.push(Use {
                        op,
                        slot: UseSlot::Operand(i),
                    });
                }
            }
            for (i, &v) in operation.deps.iter().enumerate() {
                if v == value {
                    uses.push(Use {
                        op,
                        slot: UseSlot::Dep(i),
                    });
                }
            }
        }
        uses
    }

    /// Uses of every value, gathered in one walk.
    pub fn use_map(&self) -> HashMap<ValueId, Vec<Use>> {
        let mut map: HashMap<ValueId, Vec<Use>> = HashMap::new();
        for op in self.walk() {
            let operation = &self.ops[op.index()];
            for (i, &v) in operation.operands.iter().enumerate() {
                map.entry(v).or_default().push(Use {
                    op,
                    slot: UseSlot::Operand(i),
                });
            }
            for (i, &v) in operation.deps.iter().enumerate() {
                map.entry(v).or_default().push(Use {
                    op,
                    slot: UseSlot::Dep(i),
                });
            }
        }
        map
    }

    pub fn has_uses(&self, value: ValueId) -> bool {
        !self.uses(value).is_empty()
    }

    // ── Tokens ──

    /// Completion token: result 0 of asynchronous operations, and the first
    /// token result of loops and conditionals.
    pub fn completion_token(&self, op: OpId) -> Option<ValueId> {
        let operation = &self.ops[op.index()];
        let first = *operation.results.first()?;
        match operation.kind {
            _ if operation.kind.is_async() => Some(first),
            OpKind::Loop(_) | OpKind::If if self.value_type(first).is_token() => Some(first),
            _ => None,
        }
    }

    /// Token list: explicit dependencies for asynchronous operations,
    /// initial iteration tokens for loops, yielded tokens for terminators.
    pub fn token_list(&self, op: OpId) -> Vec<ValueId> {
        let operation = &self.ops[op.index()];
        match operation.kind {
            OpKind::Loop(_) => operation.operands[3..]
                .iter()
                .copied()
                .filter(|&v| self.value_type(v).is_token())
                .collect(),
            OpKind::Yield => operation
                .operands
                .iter()
                .copied()
                .filter(|&v| self.value_type(v).is_token())
                .collect(),
            _ if operation.kind.is_async() => operation.deps.clone(),
            _ => Vec::new(),
        }
    }

    pub fn deps(&self, op: OpId) -> &[ValueId] {
        &self.ops[op.index()].deps
    }

    pub fn set_deps(&mut self, op: OpId, deps: Vec<ValueId>) {
        self.ops[op.index()].deps = deps;
    }

    pub fn clear_deps(&mut self, op: OpId) {
        self.ops[op.index()].deps.clear();
    }

    /// Append `token` unless already present. Returns whether it was added.
    pub fn add_dep_if_new(&mut self, op: OpId, token: ValueId) -> bool {
        let deps = &mut self.ops[op.index()].deps;
        if deps.contains(&token) {
            return false;
        }
        deps.push(token);
        true
    }

    pub fn remove_dep_at(&mut self, op: OpId, index: usize) -> ValueId {
        self.ops[op.index()].deps.remove(index)
    }

    // ── Loops ──

    pub fn loop_induction_var(&self, op: OpId) -> Option<ValueId> {
        let body = self.body(op)?;
        self.blocks[body.index()].args.first().copied()
    }

    /// Region argument threading iteration `slot` (slot 0 is the carried token).
    pub fn loop_carried_arg(&self, op: OpId, slot: usize) -> Option<ValueId> {
        if !matches!(self.ops[op.index()].kind, OpKind::Loop(_)) {
            return None;
        }
        let body = self.body(op)?;
        self.blocks[body.index()].args.get(1 + slot).copied()
    }

    pub fn loop_init(&self, op: OpId, slot: usize) -> Option<ValueId> {
        self.ops[op.index()].operands.get(3 + slot).copied()
    }

    /// The loop that owns `value` as a carried region argument.
    pub fn carried_arg_owner(&self, value: ValueId) -> Option<OpId> {
        let (block, index) = self.block_arg_owner(value)?;
        let owner = self.blocks[block.index()].parent_op?;
        match self.ops[owner.index()].kind {
            OpKind::Loop(_) if index >= 1 => Some(owner),
            _ => None,
        }
    }

    /// The terminator of a loop body (its yielded-value slot).
    pub fn loop_yield(&self, op: OpId) -> Option<OpId> {
        self.block_terminator(self.body(op)?)
    }

    // ── Hierarchies ──

    /// (outer operand, inner parameter) pairs of a hierarchy call.
    pub fn hierarchy_pairs(&self, op: OpId) -> Vec<(ValueId, ValueId)> {
        let operation = &self.ops[op.index()];
        let OpKind::Hierarchy { ids, .. } = operation.kind else {
            return Vec::new();
        };
        let Some(body) = self.body(op) else {
            return Vec::new();
        };
        let params = &self.blocks[body.index()].args[ids..];
        operation
            .operands
            .iter()
            .copied()
            .zip(params.iter().copied())
            .collect()
    }

    pub fn hierarchy_ids(&self, op: OpId) -> Vec<ValueId> {
        let OpKind::Hierarchy { ids, .. } = self.ops[op.index()].kind else {
            return Vec::new();
        };
        match self.body(op) {
            Some(body) => self.blocks[body.index()].args[..ids].to_vec(),
            None => Vec::new(),
        }
    }

    /// Remove the `index`-th kernel operand and its inner parameter.
    pub fn remove_hierarchy_param(&mut self, op: OpId, index: usize) {
        let OpKind::Hierarchy { ids, .. } = self.ops[op.index()].kind else {
            return;
        };
        let Some(body) = self.body(op) else {
            return;
        };
        self.ops[op.index()].operands.remove(index);
        self.blocks[body.index()].args.remove(ids + index);
        let args = self.blocks[body.index()].args.clone();
        for (i, arg) in args.into_iter().enumerate() {
            self.values[arg.index()].def = ValueDef::Arg { block: body, index: i };
        }
    }

    /// The hierarchy call owning `value` as an inner parameter, with the
    /// parameter's pair index.
    pub fn hierarchy_param_owner(&self, value: ValueId) -> Option<(OpId, usize)> {
        let (block, index) = self.block_arg_owner(value)?;
        let owner = self.blocks[block.index()].parent_op?;
        match self.ops[owner.index()].kind {
            OpKind::Hierarchy { ids, .. } if index >= ids => Some((owner, index - ids)),
            _ => None,
        }
    }

    pub fn is_hierarchy_id(&self, value: ValueId) -> bool {
        let Some((block, index)) = self.block_arg_owner(value) else {
            return false;
        };
        match self.blocks[block.index()].parent_op {
            Some(owner) => matches!(self.ops[owner.index()].kind, OpKind::Hierarchy { ids, .. } if index < ids),
            None => false,
        }
    }

    // ── Constants ──

    pub fn const_value(&self, value: ValueId) -> Option<i64> {
        let op = self.defining_op(value)?;
        match self.ops[op.index()].kind {
            OpKind::Const(v) => Some(v),
            _ => None,
        }
    }

    // ── Mutation ──

    /// Redirect every operand and dependency use of `old` to `new`.
    pub fn replace_all_uses(&mut self, old: ValueId, new: ValueId) {
        for op in &mut self.ops {
            if op.erased {
                continue;
            }
            for v in op.operands.iter_mut().chain(op.deps.iter_mut()) {
                if *v == old {
                    *v = new;
                }
            }
        }
    }

    /// Unlink `op` from its block and mark it and everything nested in it
    /// erased.
    pub fn erase_op(&mut self, op: OpId) {
        if let Some(block) = self.ops[op.index()].parent {
            self.blocks[block.index()].ops.retain(|&o| o != op);
        }
        let mut stack = vec![op];
        while let Some(current) = stack.pop() {
            self.ops[current.index()].erased = true;
            for region in &self.ops[current.index()].regions {
                stack.extend(self.blocks[region.index()].ops.iter().copied());
            }
        }
    }

    /// Erase every dependency use of `token` across the program.
    pub fn erase_token_uses(&mut self, token: ValueId) {
        for op in &mut self.ops {
            if !op.erased {
                op.deps.retain(|&v| v != token);
            }
        }
    }

    /// Number of live operations.
    pub fn live_op_count(&self) -> usize {
        self.walk().len()
    }
}

// ── Printer ────────────────────────────────────────────────────────────────

impl fmt::Display for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, func) in self.funcs.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            let params: Vec<String> = self.blocks[func.body.index()]
                .args
                .iter()
                .map(|&a| format!("%{}: {}", self.value_name(a), self.value_type(a)))
                .collect();
            writeln!(f, "func @{}({}) {{", func.name, params.join(", "))?;
            self.fmt_block(f, func.body, 1)?;
            writeln!(f, "}}")?;
        }
        Ok(())
    }
}

impl Program {
    fn names(&self, values: &[ValueId]) -> String {
        values
            .iter()
            .map(|&v| format!("%{}", self.value_name(v)))
            .collect::<Vec<_>>()
            .join(", ")
    }

    fn fmt_deps(&self, deps: &[ValueId]) -> String {
        if deps.is_empty() {
            String::new()
        } else {
            format!(" [{}]", self.names(deps))
        }
    }

    fn fmt_access(&self, base: ValueId, offsets: &[ValueId]) -> String {
        if offsets.is_empty() {
            format!("%{}", self.value_name(base))
        } else {
            format!("%{}[{}]", self.value_name(base), self.names(offsets))
        }
    }

    fn fmt_bindings(&self, pairs: &[(ValueId, ValueId)]) -> String {
        pairs
            .iter()
            .map(|&(inner, outer)| format!("%{} = %{}", self.value_name(inner), self.value_name(outer)))
            .collect::<Vec<_>>()
            .join(", ")
    }

    fn fmt_block(&self, f: &mut fmt::Formatter<'_>, block: BlockId, depth: usize) -> fmt::Result {
        for &op in &self.blocks[block.index()].ops {
            self.fmt_op(f, op, depth)?;
        }
        Ok(())
    }

    fn fmt_op(&self, f: &mut fmt::Formatter<'_>, op: OpId, depth: usize) -> fmt::Result {
        let pad = "  ".repeat(depth);
        let operation = &self.ops[op.index()];
        let ops = &operation.operands;
        write!(f, "{}", pad)?;
        if !operation.results.is_empty() {
            write!(f, "{} = ", self.names(&operation.results))?;
        }
        let deps = self.fmt_deps(&operation.deps);
        match &operation.kind {
            OpKind::Const(v) => writeln!(f, "const {}", v),
            OpKind::Alloc => writeln!(f, "alloc : {}", self.value_type(operation.results[0])),
            OpKind::Dealloc => writeln!(f, "dealloc {}", self.names(ops)),
            OpKind::Copy => writeln!(f, "copy {}", self.names(ops)),
            OpKind::Transform { ins } => writeln!(
                f,
                "transform ins({}) outs({})",
                self.names(&ops[..*ins]),
                self.names(&ops[*ins..])
            ),
            OpKind::MulI => writeln!(f, "muli {}", self.names(ops)),
            OpKind::AddI => writeln!(f, "addi {}", self.names(ops)),
            OpKind::Apply => writeln!(f, "apply({})", self.names(ops)),
            OpKind::Yield => {
                if ops.is_empty() {
                    writeln!(f, "yield")
                } else {
                    writeln!(f, "yield {}", self.names(ops))
                }
            }
            OpKind::End => writeln!(f, "end"),
            OpKind::Join => writeln!(f, "join{}", deps),
            OpKind::Compute => {
                writeln!(f, "compute{} {{", deps)?;
                self.fmt_block(f, operation.regions[0], depth + 1)?;
                writeln!(f, "{}}}", pad)
            }
            OpKind::Transfer { dst_offsets } => {
                let dst_end = 2 + dst_offsets;
                writeln!(
                    f,
                    "transfer{} {} <- {}",
                    deps,
                    self.fmt_access(ops[0], &ops[2..dst_end]),
                    self.fmt_access(ops[1], &ops[dst_end..])
                )
            }
            OpKind::Put { channel } => writeln!(
                f,
                "put @{}{} {}",
                channel,
                deps,
                self.fmt_access(ops[0], &ops[1..])
            ),
            OpKind::Get { channel } => writeln!(
                f,
                "get @{}{} {}",
                channel,
                deps,
                self.fmt_access(ops[0], &ops[1..])
            ),
            OpKind::Loop(kind) => {
                let body = operation.regions[0];
                let args = &self.blocks[body.index()].args;
                let keyword = match kind {
                    LoopKind::Sequential => "for",
                    LoopKind::Parallel => "parallel",
                };
                let carried: Vec<(ValueId, ValueId)> = args[1..]
                    .iter()
                    .copied()
                    .zip(ops[3..].iter().copied())
                    .collect();
                write!(
                    f,
                    "{} %{} = %{} to %{} step %{}",
                    keyword,
                    self.value_name(args[0]),
                    self.value_name(ops[0]),
                    self.value_name(ops[1]),
                    self.value_name(ops[2])
                )?;
                if !carried.is_empty() {
                    write!(f, " iter({})", self.fmt_bindings(&carried))?;
                }
                writeln!(f, " {{")?;
                self.fmt_block(f, body, depth + 1)?;
                writeln!(f, "{}}}", pad)
            }
            OpKind::If => {
                writeln!(f, "if {} {{", self.names(ops))?;
                self.fmt_block(f, operation.regions[0], depth + 1)?;
                writeln!(f, "{}}} else {{", pad)?;
                self.fmt_block(f, operation.regions[1], depth + 1)?;
                writeln!(f, "{}}}", pad)
            }
            OpKind::Hierarchy { level, .. } => {
                write!(f, "{}{}", level.as_str(), deps)?;
                let ids = self.hierarchy_ids(op);
                if !ids.is_empty() {
                    write!(f, " ids({})", self.names(&ids))?;
                }
                let pairs: Vec<(ValueId, ValueId)> = self
                    .hierarchy_pairs(op)
                    .into_iter()
                    .map(|(outer, inner)| (inner, outer))
                    .collect();
                if !pairs.is_empty() {
                    write!(f, " args({})", self.fmt_bindings(&pairs))?;
                }
                writeln!(f, " {{")?;
                self.fmt_block(f, operation.regions[0], depth + 1)?;
                writeln!(f, "{}}}", pad)
            }
        }
    }
}

/// Index of live operations by channel name, split by role.
pub fn channel_endpoints(program: &Program) -> HashMap<String, (Vec<OpId>, Vec<OpId>)> {
    let mut map: HashMap<String, (Vec<OpId>, Vec<OpId>)> = HashMap::new();
    for op in program.walk() {
        match program.kind(op) {
            OpKind::Put { channel } => map.entry(channel.clone()).or_default().0.push(op),
            OpKind::Get { channel } => map.entry(channel.clone()).or_default().1.push(op),
            _ => {}
        }
    }
    map
}

// ── Tests ──────────────────────────────────────────────────────────────────
