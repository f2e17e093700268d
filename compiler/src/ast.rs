// AST node types for textual async IR (.air) sources.
//
// One node per syntactic construct of the IR: functions, blocks, operation
// statements. Names are stored without their sigil. Every node carries a
// `SimpleSpan` so lowering can point diagnostics at the source.
//
// Preconditions: produced by the parser from a valid or partially-valid token stream.
// Postconditions: each node's span covers the source range of the construct.
// Failure modes: none (data-only module).
// Side effects: none.

use chumsky::span::SimpleSpan;

use crate::ir::{HierarchyLevel, LoopKind};

/// Byte-offset span (alias for chumsky's `SimpleSpan`).
pub type Span = SimpleSpan;

// ── Root ──

/// A complete source file: a sequence of functions.
#[derive(Debug, Clone, PartialEq)]
pub struct Module {
    pub funcs: Vec<FuncDef>,
    pub span: Span,
}

/// A value or symbol name, sigil stripped.
#[derive(Debug, Clone, PartialEq)]
pub struct Name {
    pub name: String,
    pub span: Span,
}

// ── func: 'func' SYMBOL '(' params? ')' block ──

#[derive(Debug, Clone, PartialEq)]
pub struct FuncDef {
    pub name: Name,
    pub params: Vec<Param>,
    pub body: Block,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub name: Name,
    pub ty: TypeExpr,
}

/// `token` | `index` | `memref<RANK, SPACE>`
#[derive(Debug, Clone, PartialEq)]
pub enum TypeExpr {
    Token(Span),
    Index(Span),
    MemRef { rank: i64, space: Name, span: Span },
}

impl TypeExpr {
    pub fn span(&self) -> Span {
        match self {
            TypeExpr::Token(s) | TypeExpr::Index(s) => *s,
            TypeExpr::MemRef { span, .. } => *span,
        }
    }
}

// ── block: '{' (op NL)* '}' ──

#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub stmts: Vec<OpStmt>,
    pub span: Span,
}

/// `results '=' op` or a bare `op`.
#[derive(Debug, Clone, PartialEq)]
pub struct OpStmt {
    pub results: Vec<Name>,
    pub op: OpExpr,
    pub span: Span,
}

/// A memory access: base value plus optional per-dimension offsets.
/// No offsets means the whole buffer.
#[derive(Debug, Clone, PartialEq)]
pub struct Access {
    pub base: Name,
    pub offsets: Vec<Name>,
}

/// `%inner = %outer` binding in loop `iter(...)` and hierarchy `args(...)`.
#[derive(Debug, Clone, PartialEq)]
pub struct Binding {
    pub inner: Name,
    pub outer: Name,
}

#[derive(Debug, Clone, PartialEq)]
pub enum OpExpr {
    Const(i64),
    Alloc(TypeExpr),
    Dealloc(Name),
    Copy {
        src: Name,
        dst: Name,
    },
    Transform {
        ins: Vec<Name>,
        outs: Vec<Name>,
    },
    MulI(Name, Name),
    AddI(Name, Name),
    Apply(Vec<Name>),
    Yield(Vec<Name>),
    Compute {
        deps: Vec<Name>,
        body: Block,
    },
    Transfer {
        deps: Vec<Name>,
        dst: Access,
        src: Access,
    },
    Put {
        channel: Name,
        deps: Vec<Name>,
        src: Access,
    },
    Get {
        channel: Name,
        deps: Vec<Name>,
        dst: Access,
    },
    Join {
        deps: Vec<Name>,
    },
    Loop {
        kind: LoopKind,
        iv: Name,
        lb: Name,
        ub: Name,
        step: Name,
        carried: Vec<Binding>,
        body: Block,
    },
    If {
        cond: Name,
        then_block: Block,
        else_block: Block,
    },
    Hierarchy {
        level: HierarchyLevel,
        deps: Vec<Name>,
        ids: Vec<Name>,
        args: Vec<Binding>,
        body: Block,
    },
    End,
}

impl OpExpr {
    /// Source mnemonic, for diagnostics.
    pub fn mnemonic(&self) -> &'static str {
        match self {
            OpExpr::Const(_) => "const",
            OpExpr::Alloc(_) => "alloc",
            OpExpr::Dealloc(_) => "dealloc",
            OpExpr::Copy { .. } => "copy",
            OpExpr::Transform { .. } => "transform",
            OpExpr::MulI(..) => "muli",
            OpExpr::AddI(..) => "addi",
            OpExpr::Apply(_) => "apply",
            OpExpr::Yield(_) => "yield",
            OpExpr::Compute { .. } => "compute",
            OpExpr::Transfer { .. } => "transfer",
            OpExpr::Put { .. } => "put",
            OpExpr::Get { .. } => "get",
            OpExpr::Join { .. } => "join",
            OpExpr::Loop {
                kind: LoopKind::Sequential,
                ..
            } => "for",
            OpExpr::Loop {
                kind: LoopKind::Parallel,
                ..
            } => "parallel",
            OpExpr::If { .. } => "if",
            OpExpr::Hierarchy { level, .. } => level.as_str(),
            OpExpr::End => "end",
        }
    }
}
