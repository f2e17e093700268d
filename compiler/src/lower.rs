// lower.rs — AST to in-memory program lowering
//
// Resolves `%names` against lexically nested scopes, infers result types,
// checks operand types against each operation's layout, and inserts the
// implicit terminators (`yield` closing a compute body, `end` closing a
// hierarchy body).
//
// Preconditions: module was produced by `parser::parse` without errors.
// Postconditions: LowerResult.program is structurally valid when
//   `has_errors()` is false.
// Failure modes: undefined names, type mismatches, result-count mismatches and
//   misplaced terminators produce diagnostics; the offending op is skipped.
// Side effects: none.

use std::collections::HashMap;

use crate::ast::{self, Access, Binding, Block, Name, OpExpr, OpStmt, Span, TypeExpr};
use crate::diag::{codes, DiagCode, DiagLevel, Diagnostic};
use crate::id::{BlockId, ValueId};
use crate::ir::{HierarchyLevel, LoopKind, MemSpace, OpKind, OpSpec, Program, Type};

// ── Output types ────────────────────────────────────────────────────────────

pub struct LowerResult {
    pub program: Program,
    pub diagnostics: Vec<Diagnostic>,
}

impl LowerResult {
    pub fn has_errors(&self) -> bool {
        self.diagnostics.iter().any(|d| d.level == DiagLevel::Error)
    }
}

/// What kind of region a block is the body of; decides terminator rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Region {
    Func,
    Compute,
    Loop,
    Branch,
    Hierarchy,
}

/// Expected operand class, for type checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Expect {
    Any,
    Token,
    Index,
    MemRef,
}

// ── Entry point ─────────────────────────────────────────────────────────────

pub fn lower(module: &ast::Module) -> LowerResult {
    let mut lowerer = Lowerer {
        program: Program::new(),
        scopes: Vec::new(),
        diagnostics: Vec::new(),
    };
    for func in &module.funcs {
        lowerer.lower_func(func);
    }
    LowerResult {
        program: lowerer.program,
        diagnostics: lowerer.diagnostics,
    }
}

struct Lowerer {
    program: Program,
    scopes: Vec<Frame>,
    diagnostics: Vec<Diagnostic>,
}

/// One lexical scope. Names defined outside an isolated frame are not
/// visible inside it; hierarchy bodies see only their ids and arguments.
#[derive(Default)]
struct Frame {
    values: HashMap<String, ValueId>,
    isolated: bool,
}

impl Lowerer {
    fn error(&mut self, code: DiagCode, span: Span, message: impl Into<String>) {
        self.diagnostics
            .push(Diagnostic::error(span, message).with_code(code));
    }

    // ── Scopes ──

    fn define(&mut self, name: &Name, value: ValueId) {
        let Some(scope) = self.scopes.last_mut() else {
            return;
        };
        if scope.values.insert(name.name.clone(), value).is_some() {
            self.error(
                codes::E0102,
                name.span,
                format!("value '%{}' is defined more than once", name.name),
            );
        }
    }

    /// Find `name`, innermost scope first. The flag is set when the
    /// definition lies beyond an isolated frame.
    fn lookup(&self, name: &str) -> Option<(ValueId, bool)> {
        let mut captured = false;
        for frame in self.scopes.iter().rev() {
            if let Some(&value) = frame.values.get(name) {
                return Some((value, captured));
            }
            captured |= frame.isolated;
        }
        None
    }

    fn resolve(&mut self, name: &Name, expect: Expect) -> Option<ValueId> {
        let Some((value, captured)) = self.lookup(&name.name) else {
            self.error(
                codes::E0101,
                name.span,
                format!("undefined value '%{}'", name.name),
            );
            return None;
        };
        if captured {
            self.diagnostics.push(
                Diagnostic::error(
                    name.span,
                    format!("'%{}' is defined outside the enclosing hierarchy body", name.name),
                )
                .with_code(codes::E0107)
                .with_hint("pass memrefs through 'args(..)' and tokens through the call's dependency list"),
            );
            return None;
        }
        let ty = self.program.value_type(value);
        let ok = match expect {
            Expect::Any => true,
            Expect::Token => ty.is_token(),
            Expect::Index => ty == Type::Index,
            Expect::MemRef => ty.is_memref(),
        };
        if !ok {
            let wanted = match expect {
                Expect::Any => "any",
                Expect::Token => "token",
                Expect::Index => "index",
                Expect::MemRef => "memref",
            };
            self.error(
                codes::E0103,
                name.span,
                format!("'%{}' has type {}, expected {}", name.name, ty, wanted),
            );
            return None;
        }
        Some(value)
    }

    fn resolve_all(&mut self, names: &[Name], expect: Expect) -> Option<Vec<ValueId>> {
        let mut out = Vec::with_capacity(names.len());
        let mut ok = true;
        for name in names {
            match self.resolve(name, expect) {
                Some(v) => out.push(v),
                None => ok = false,
            }
        }
        ok.then_some(out)
    }

    fn resolve_access(&mut self, access: &Access) -> Option<(ValueId, Vec<ValueId>)> {
        let base = self.resolve(&access.base, Expect::MemRef);
        let offsets = self.resolve_all(&access.offsets, Expect::Index);
        let (base, offsets) = (base?, offsets?);
        if let Some(rank) = self.program.value_type(base).rank() {
            if !offsets.is_empty() && offsets.len() != rank as usize {
                self.error(
                    codes::E0103,
                    access.base.span,
                    format!(
                        "'%{}' has rank {} but is indexed with {} offsets",
                        access.base.name,
                        rank,
                        offsets.len()
                    ),
                );
                return None;
            }
        }
        Some((base, offsets))
    }

    fn lower_type(&mut self, ty: &TypeExpr) -> Type {
        match ty {
            TypeExpr::Token(_) => Type::Token,
            TypeExpr::Index(_) => Type::Index,
            TypeExpr::MemRef { rank, space, span } => {
                let space = match MemSpace::from_name(&space.name) {
                    Some(s) => s,
                    None => {
                        self.error(
                            codes::E0106,
                            space.span,
                            format!("unknown memory space '{}'", space.name),
                        );
                        MemSpace::L3
                    }
                };
                let rank = match u32::try_from(*rank) {
                    Ok(r) => r,
                    Err(_) => {
                        self.error(codes::E0106, *span, format!("invalid rank {}", rank));
                        0
                    }
                };
                Type::MemRef { rank, space }
            }
        }
    }

    // ── Functions and blocks ──

    fn lower_func(&mut self, func: &ast::FuncDef) {
        let types: Vec<Type> = func.params.iter().map(|p| self.lower_type(&p.ty)).collect();
        let args: Vec<(Option<&str>, Type)> = func
            .params
            .iter()
            .zip(types)
            .map(|(p, ty)| (Some(p.name.name.as_str()), ty))
            .collect();
        let body = self.program.add_func(&func.name.name, &args);
        self.scopes.push(Frame::default());
        let values = self.program.block(body).args.clone();
        for (param, value) in func.params.iter().zip(values) {
            self.define(&param.name, value);
        }
        self.lower_block(body, &func.body, Region::Func);
        self.scopes.pop();
    }

    /// Lower `ast_block` into `block`. The caller has already pushed a scope
    /// holding the block arguments.
    fn lower_block(&mut self, block: BlockId, ast_block: &Block, region: Region) {
        let count = ast_block.stmts.len();
        for (i, stmt) in ast_block.stmts.iter().enumerate() {
            let is_last = i + 1 == count;
            if let Some(term) = terminator_kind(&stmt.op) {
                let allowed = matches!(
                    (term, region),
                    (Term::Yield, Region::Compute | Region::Loop | Region::Branch)
                        | (Term::End, Region::Hierarchy)
                );
                if !allowed || !is_last {
                    self.error(
                        codes::E0105,
                        stmt.span,
                        format!("'{}' is not allowed here", stmt.op.mnemonic()),
                    );
                    continue;
                }
            }
            self.lower_stmt(block, stmt);
        }

        let has_terminator = self.program.block_terminator(block).is_some();
        match region {
            Region::Compute if !has_terminator => {
                self.program.append_op(block, OpSpec::new(OpKind::Yield));
            }
            Region::Hierarchy if !has_terminator => {
                self.program.append_op(block, OpSpec::new(OpKind::End));
            }
            Region::Loop | Region::Branch if !has_terminator => {
                self.error(
                    codes::E0105,
                    ast_block.span,
                    "body must end with 'yield'",
                );
            }
            _ => {}
        }
    }

    /// Create a block with arguments, push a scope defining them, lower the
    /// body, pop the scope.
    fn lower_region(&mut self, args: &[(&Name, Type)], body: &Block, region: Region) -> BlockId {
        let arg_specs: Vec<(Option<&str>, Type)> = args
            .iter()
            .map(|(name, ty)| (Some(name.name.as_str()), *ty))
            .collect();
        let block = self.program.add_block(&arg_specs);
        self.scopes.push(Frame {
            values: HashMap::new(),
            isolated: region == Region::Hierarchy,
        });
        let values = self.program.block(block).args.clone();
        for ((name, _), value) in args.iter().zip(values) {
            self.define(name, value);
        }
        self.lower_block(block, body, region);
        self.scopes.pop();
        block
    }

    fn yielded_types(&self, block: BlockId) -> Vec<Type> {
        match self.program.block_terminator(block) {
            Some(term) => self
                .program
                .op(term)
                .operands
                .iter()
                .map(|&v| self.program.value_type(v))
                .collect(),
            None => Vec::new(),
        }
    }

    // ── Statements ──

    fn lower_stmt(&mut self, block: BlockId, stmt: &OpStmt) {
        let Some((spec, result_types)) = self.build_spec(stmt) else {
            return;
        };
        let names: Vec<Option<&str>> = if stmt.results.is_empty() {
            vec![None; result_types.len()]
        } else if stmt.results.len() == result_types.len() {
            stmt.results.iter().map(|n| Some(n.name.as_str())).collect()
        } else {
            self.error(
                codes::E0104,
                stmt.span,
                format!(
                    "'{}' produces {} result(s), {} name(s) given",
                    stmt.op.mnemonic(),
                    result_types.len(),
                    stmt.results.len()
                ),
            );
            vec![None; result_types.len()]
        };
        let mut spec = spec.span(stmt.span);
        for (name, ty) in names.iter().zip(&result_types) {
            spec = spec.result(*name, *ty);
        }
        let op = self.program.append_op(block, spec);
        if names.iter().all(Option::is_some) {
            let results = self.program.op(op).results.clone();
            for (name, value) in stmt.results.iter().zip(results) {
                self.define(name, value);
            }
        }
    }

    /// Build the op description and its result types. Returns `None` when
    /// operands fail to resolve (diagnostics already recorded).
    fn build_spec(&mut self, stmt: &OpStmt) -> Option<(OpSpec, Vec<Type>)> {
        let spec = match &stmt.op {
            OpExpr::Const(v) => (OpSpec::new(OpKind::Const(*v)), vec![Type::Index]),
            OpExpr::Alloc(ty) => {
                let ty = self.lower_type(ty);
                if !ty.is_memref() {
                    self.error(codes::E0103, stmt.span, "alloc must produce a memref");
                    return None;
                }
                (OpSpec::new(OpKind::Alloc), vec![ty])
            }
            OpExpr::Dealloc(buf) => {
                let buf = self.resolve(buf, Expect::MemRef)?;
                (OpSpec::new(OpKind::Dealloc).operands(vec![buf]), vec![])
            }
            OpExpr::Copy { src, dst } => {
                let src = self.resolve(src, Expect::MemRef);
                let dst = self.resolve(dst, Expect::MemRef);
                (
                    OpSpec::new(OpKind::Copy).operands(vec![src?, dst?]),
                    vec![],
                )
            }
            OpExpr::Transform { ins, outs } => {
                let ins = self.resolve_all(ins, Expect::Any);
                let outs = self.resolve_all(outs, Expect::Any);
                let (ins, outs) = (ins?, outs?);
                let kind = OpKind::Transform { ins: ins.len() };
                let operands = ins.into_iter().chain(outs).collect();
                (OpSpec::new(kind).operands(operands), vec![])
            }
            OpExpr::MulI(a, b) | OpExpr::AddI(a, b) => {
                let a = self.resolve(a, Expect::Index);
                let b = self.resolve(b, Expect::Index);
                let kind = if matches!(stmt.op, OpExpr::MulI(..)) {
                    OpKind::MulI
                } else {
                    OpKind::AddI
                };
                (OpSpec::new(kind).operands(vec![a?, b?]), vec![Type::Index])
            }
            OpExpr::Apply(args) => {
                let args = self.resolve_all(args, Expect::Index)?;
                (OpSpec::new(OpKind::Apply).operands(args), vec![Type::Index])
            }
            OpExpr::Yield(values) => {
                let values = self.resolve_all(values, Expect::Any)?;
                (OpSpec::new(OpKind::Yield).operands(values), vec![])
            }
            OpExpr::End => (OpSpec::new(OpKind::End), vec![]),
            OpExpr::Join { deps } => {
                let deps = self.resolve_all(deps, Expect::Token)?;
                (OpSpec::new(OpKind::Join).deps(deps), vec![Type::Token])
            }
            OpExpr::Compute { deps, body } => {
                let deps = self.resolve_all(deps, Expect::Token)?;
                let block = self.lower_region(&[], body, Region::Compute);
                let mut types = vec![Type::Token];
                types.extend(self.yielded_types(block));
                (
                    OpSpec::new(OpKind::Compute).deps(deps).region(block),
                    types,
                )
            }
            OpExpr::Transfer { deps, dst, src } => {
                let deps = self.resolve_all(deps, Expect::Token);
                let dst = self.resolve_access(dst);
                let src = self.resolve_access(src);
                let (deps, (dst, dst_offsets), (src, src_offsets)) = (deps?, dst?, src?);
                let kind = OpKind::Transfer {
                    dst_offsets: dst_offsets.len(),
                };
                let mut operands = vec![dst, src];
                operands.extend(dst_offsets);
                operands.extend(src_offsets);
                (
                    OpSpec::new(kind).operands(operands).deps(deps),
                    vec![Type::Token],
                )
            }
            OpExpr::Put { channel, deps, src } | OpExpr::Get { channel, deps, dst: src } => {
                let deps = self.resolve_all(deps, Expect::Token);
                let access = self.resolve_access(src);
                let (deps, (base, offsets)) = (deps?, access?);
                let kind = if matches!(stmt.op, OpExpr::Put { .. }) {
                    OpKind::Put {
                        channel: channel.name.clone(),
                    }
                } else {
                    OpKind::Get {
                        channel: channel.name.clone(),
                    }
                };
                let mut operands = vec![base];
                operands.extend(offsets);
                (
                    OpSpec::new(kind).operands(operands).deps(deps),
                    vec![Type::Token],
                )
            }
            OpExpr::Loop {
                kind,
                iv,
                lb,
                ub,
                step,
                carried,
                body,
            } => self.build_loop(*kind, iv, [lb, ub, step], carried, body)?,
            OpExpr::If {
                cond,
                then_block,
                else_block,
            } => {
                let cond = self.resolve(cond, Expect::Index)?;
                let then_b = self.lower_region(&[], then_block, Region::Branch);
                let else_b = self.lower_region(&[], else_block, Region::Branch);
                let then_types = self.yielded_types(then_b);
                let else_types = self.yielded_types(else_b);
                if then_types != else_types {
                    self.error(
                        codes::E0103,
                        stmt.span,
                        "branches of 'if' yield different types",
                    );
                    return None;
                }
                (
                    OpSpec::new(OpKind::If)
                        .operands(vec![cond])
                        .region(then_b)
                        .region(else_b),
                    then_types,
                )
            }
            OpExpr::Hierarchy {
                level,
                deps,
                ids,
                args,
                body,
            } => self.build_hierarchy(*level, deps, ids, args, body)?,
        };
        Some(spec)
    }

    fn build_loop(
        &mut self,
        kind: LoopKind,
        iv: &Name,
        bounds: [&Name; 3],
        carried: &[Binding],
        body: &Block,
    ) -> Option<(OpSpec, Vec<Type>)> {
        let mut operands = Vec::new();
        let mut ok = true;
        for bound in bounds {
            match self.resolve(bound, Expect::Index) {
                Some(v) => operands.push(v),
                None => ok = false,
            }
        }
        let mut carried_types = Vec::new();
        for binding in carried {
            match self.resolve(&binding.outer, Expect::Any) {
                Some(v) => {
                    operands.push(v);
                    carried_types.push(self.program.value_type(v));
                }
                None => ok = false,
            }
        }
        if !ok {
            return None;
        }
        let mut args: Vec<(&Name, Type)> = vec![(iv, Type::Index)];
        args.extend(carried.iter().map(|b| &b.inner).zip(carried_types.iter().copied()));
        let block = self.lower_region(&args, body, Region::Loop);
        Some((
            OpSpec::new(OpKind::Loop(kind))
                .operands(operands)
                .region(block),
            carried_types,
        ))
    }

    fn build_hierarchy(
        &mut self,
        level: HierarchyLevel,
        deps: &[Name],
        ids: &[Name],
        args: &[Binding],
        body: &Block,
    ) -> Option<(OpSpec, Vec<Type>)> {
        let deps = self.resolve_all(deps, Expect::Token);
        let outer: Vec<Name> = args.iter().map(|b| b.outer.clone()).collect();
        let operands = self.resolve_all(&outer, Expect::Any);
        let (deps, operands) = (deps?, operands?);
        let mut block_args: Vec<(&Name, Type)> = ids.iter().map(|n| (n, Type::Index)).collect();
        let mut ok = true;
        for (binding, &value) in args.iter().zip(&operands) {
            let ty = self.program.value_type(value);
            if ty.is_token() {
                self.diagnostics.push(
                    Diagnostic::error(
                        binding.outer.span,
                        format!("token '%{}' cannot be passed as a hierarchy argument", binding.outer.name),
                    )
                    .with_code(codes::E0107)
                    .with_hint("list it in the call's dependency list instead"),
                );
                ok = false;
            }
            block_args.push((&binding.inner, ty));
        }
        if !ok {
            return None;
        }
        let block = self.lower_region(&block_args, body, Region::Hierarchy);
        let kind = OpKind::Hierarchy {
            level,
            ids: ids.len(),
        };
        Some((
            OpSpec::new(kind)
                .operands(operands)
                .deps(deps)
                .region(block),
            vec![Type::Token],
        ))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Term {
    Yield,
    End,
}

fn terminator_kind(op: &OpExpr) -> Option<Term> {
    match op {
        OpExpr::Yield(_) => Some(Term::Yield),
        OpExpr::End => Some(Term::End),
        _ => None,
    }
}

/// Parse and lower a source string. Returns the program, or every
/// diagnostic collected along the way.
pub fn parse_program(source: &str) -> Result<Program, Vec<Diagnostic>> {
    let parsed = crate::parser::parse(source);
    if !parsed.errors.is_empty() {
        return Err(parsed
            .errors
            .iter()
            .map(|e| Diagnostic::error(*e.span(), e.to_string()).with_code(codes::E0001))
            .collect());
    }
    let Some(module) = parsed.module else {
        return Err(vec![Diagnostic::new(
            DiagLevel::Error,
            None,
            "no module parsed",
        )
        .with_code(codes::E0001)]);
    };
    let lowered = lower(&module);
    if lowered.has_errors() {
        return Err(lowered.diagnostics);
    }
    Ok(lowered.program)
}

// ── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn lower_ok(source: &str) -> Program {
        match parse_program(source) {
            Ok(p) => p,
            Err(diags) => panic!("unexpected diagnostics: {:#?}", diags),
        }
    }

    fn lower_err(source: &str) -> Vec<Diagnostic> {
        match parse_program(source) {
            Ok(p) => panic!("expected diagnostics, got program:\n{}", p),
            Err(diags) => diags,
        }
    }

    #[test]
    fn compute_results_follow_yield() {
        let p = lower_ok(
            "func @f() {\n  %t, %m = compute {\n    %x = alloc : memref<2, L1>\n    yield %x\n  }\n}",
        );
        let ops = p.walk();
        let compute = ops[0];
        let results = &p.op(compute).results;
        assert_eq!(results.len(), 2);
        assert_eq!(p.value_type(results[0]), Type::Token);
        assert_eq!(
            p.value_type(results[1]),
            Type::MemRef {
                rank: 2,
                space: MemSpace::L1
            }
        );
    }

    #[test]
    fn implicit_terminators_are_inserted() {
        let p = lower_ok(
            "func @f() {\n  %t = compute {\n    %c = const 1\n  }\n  %h = herd {\n  }\n}",
        );
        let ops = p.walk();
        let kinds: Vec<&OpKind> = ops.iter().map(|&o| p.kind(o)).collect();
        assert_eq!(
            kinds,
            vec![
                &OpKind::Compute,
                &OpKind::Const(1),
                &OpKind::Yield,
                &OpKind::Hierarchy {
                    level: HierarchyLevel::Herd,
                    ids: 0
                },
                &OpKind::End,
            ]
        );
    }

    #[test]
    fn loop_layout() {
        let p = lower_ok(
            "func @f(%t0: token) {\n  %c0 = const 0\n  %c1 = const 1\n  %r = for %i = %c0 to %c1 step %c1 iter(%tok = %t0) {\n    %j = join [%tok]\n    yield %j\n  }\n}",
        );
        let lp = p
            .walk()
            .into_iter()
            .find(|&o| matches!(p.kind(o), OpKind::Loop(_)))
            .unwrap();
        let carried = p.loop_carried_arg(lp, 0).unwrap();
        assert_eq!(p.carried_arg_owner(carried), Some(lp));
        assert_eq!(p.token_list(lp), vec![p.block(p.funcs[0].body).args[0]]);
        assert!(p.loop_yield(lp).is_some());
        assert_eq!(p.value_type(p.op(lp).results[0]), Type::Token);
    }

    #[test]
    fn undefined_value_is_reported() {
        let diags = lower_err("func @f() {\n  %j = join [%missing]\n}");
        assert_eq!(diags[0].code, Some(codes::E0101));
    }

    #[test]
    fn non_token_dependency_is_type_error() {
        let diags = lower_err("func @f() {\n  %c = const 0\n  %j = join [%c]\n}");
        assert_eq!(diags[0].code, Some(codes::E0103));
    }

    #[test]
    fn result_count_mismatch() {
        let diags = lower_err("func @f() {\n  %a, %b = join\n}");
        assert_eq!(diags[0].code, Some(codes::E0104));
    }

    #[test]
    fn yield_at_function_level_is_rejected() {
        let diags = lower_err("func @f() {\n  yield\n}");
        assert_eq!(diags[0].code, Some(codes::E0105));
    }

    #[test]
    fn loop_without_yield_is_rejected() {
        let diags = lower_err(
            "func @f() {\n  %c = const 0\n  for %i = %c to %c step %c {\n    %j = join\n  }\n}",
        );
        assert!(diags.iter().any(|d| d.code == Some(codes::E0105)));
    }

    #[test]
    fn offsets_must_match_rank() {
        let diags = lower_err(
            "func @f(%a: memref<2, L1>) {\n  %c = const 0\n  %t = transfer %a[%c] <- %a\n}",
        );
        assert_eq!(diags[0].code, Some(codes::E0103));
    }

    #[test]
    fn unknown_memory_space() {
        let diags = lower_err("func @f(%a: memref<1, L9>) {\n}");
        assert_eq!(diags[0].code, Some(codes::E0106));
    }

    #[test]
    fn hierarchy_body_cannot_capture_outer_token() {
        let diags = lower_err(
            "func @f() {\n  %a = join\n  %h = launch {\n    %b = join [%a]\n    end\n  }\n}",
        );
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].code, Some(codes::E0107));
        assert!(diags[0].message.contains("'%a'"));
    }

    #[test]
    fn hierarchy_body_cannot_capture_outer_memref() {
        let diags = lower_err(
            "func @f(%m: memref<1, L2>) {\n  %h = segment {\n    %t = transfer %m <- %m\n    end\n  }\n}",
        );
        assert!(diags.iter().all(|d| d.code == Some(codes::E0107)));
    }

    #[test]
    fn tokens_are_not_hierarchy_arguments() {
        let diags = lower_err(
            "func @f() {\n  %a = join\n  %h = launch args(%x = %a) {\n    end\n  }\n}",
        );
        assert_eq!(diags[0].code, Some(codes::E0107));
    }

    #[test]
    fn nested_regions_see_their_hierarchy_arguments() {
        let p = lower_ok(
            "func @f(%m: memref<1, L2>) {\n  %c0 = const 0\n  %h = launch args(%x = %m) {\n    %c1 = const 1\n    for %i = %c1 to %c1 step %c1 {\n      %t = compute {\n        copy %x, %x\n      }\n      yield\n    }\n    end\n  }\n}",
        );
        assert!(p.op_by_result_name("t").is_some());
    }

    #[test]
    fn printed_program_lowers_again() {
        let source = "func @f(%a: memref<1, L1>, %b: memref<1, L2>) {\n  %c0 = const 0\n  %t0 = transfer %b[%c0] <- %a\n  %h = herd [%t0] ids(%x) args(%p = %a) {\n    %t1 = put @ch %p\n    end\n  }\n  %t2 = get @ch [%h] %b\n}\n";
        let p = lower_ok(source);
        let printed = p.to_string();
        assert_eq!(printed, source);
        let again = lower_ok(&printed);
        assert_eq!(again.to_string(), printed);
    }
}
