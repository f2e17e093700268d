// Parser for textual async IR (.air) sources.
//
// Parses a token stream (from the lexer) into an AST. Uses chumsky
// combinators; nested regions (compute bodies, loop bodies, branches,
// hierarchy bodies) are handled by a single `recursive` block parser.
//
// Preconditions: input is a valid token stream from `lexer::lex()`.
// Postconditions: returns an AST plus any parse errors (non-fatal).
// Failure modes: syntax errors produce `Rich` diagnostics; parsing continues.
// Side effects: none.

use chumsky::input::{Stream, ValueInput};
use chumsky::prelude::*;
use chumsky::span::SimpleSpan;

use crate::ast::*;
use crate::ir::{HierarchyLevel, LoopKind};
use crate::lexer::Token;

/// Result of parsing: AST plus any errors.
#[derive(Debug)]
pub struct ParseResult {
    pub module: Option<Module>,
    pub errors: Vec<Rich<'static, Token, SimpleSpan>>,
}

/// Parse an IR source string. Lexes then parses.
///
/// Returns an AST (if parsing succeeded) plus any errors.
pub fn parse(source: &str) -> ParseResult {
    let lex_result = crate::lexer::lex(source);
    let len = source.len();

    let token_iter = lex_result.tokens.into_iter().map(|(tok, span)| {
        let cspan: SimpleSpan = (span.start..span.end).into();
        (tok, cspan)
    });
    let eoi: SimpleSpan = (len..len).into();
    let stream = Stream::from_iter(token_iter).map(eoi, |(t, s): (_, _)| (t, s));

    let parser = module_parser(source);
    let (module, parse_errors) = parser.parse(stream).into_output_errors();

    let mut all_errors: Vec<Rich<'static, Token, SimpleSpan>> = lex_result
        .errors
        .into_iter()
        .map(|e| {
            let span: SimpleSpan = (e.span.start..e.span.end).into();
            Rich::custom(span, e.message)
        })
        .collect();
    all_errors.extend(parse_errors.into_iter().map(|e| e.into_owned()));

    ParseResult {
        module,
        errors: all_errors,
    }
}

// ── Main parser builder ──
//
// All grammar rules are built inside `module_parser` so that the `source`
// reference is captured once and shared by all combinators.

fn module_parser<'tokens, 'src: 'tokens, I>(
    source: &'src str,
) -> impl Parser<'tokens, I, Module, extra::Err<Rich<'tokens, Token, SimpleSpan>>> + 'src
where
    'tokens: 'src,
    I: ValueInput<'tokens, Token = Token, Span = SimpleSpan>,
{
    let nl = just(Token::Newline).repeated().ignored();

    // ── Names ──

    let value = just(Token::Value).map_with(move |_, e| {
        let span: SimpleSpan = e.span();
        Name {
            name: source[span.start() + 1..span.end()].to_string(),
            span,
        }
    });

    let symbol = just(Token::Symbol).map_with(move |_, e| {
        let span: SimpleSpan = e.span();
        Name {
            name: source[span.start() + 1..span.end()].to_string(),
            span,
        }
    });

    let ident = just(Token::Ident).map_with(move |_, e| {
        let span: SimpleSpan = e.span();
        Name {
            name: source[span.start()..span.end()].to_string(),
            span,
        }
    });

    let int = select! { Token::Int(n) => n };

    // ── Value lists ──

    let values = value
        .clone()
        .separated_by(just(Token::Comma))
        .collect::<Vec<_>>();

    let paren_values = values
        .clone()
        .delimited_by(just(Token::LParen), just(Token::RParen));

    // Dependency list: '[' values ']' (optional, defaults to empty).
    let deps = values
        .clone()
        .delimited_by(just(Token::LBracket), just(Token::RBracket))
        .or_not()
        .map(Option::unwrap_or_default);

    // Access: VALUE ('[' values ']')?
    let access = value
        .clone()
        .then(
            values
                .clone()
                .delimited_by(just(Token::LBracket), just(Token::RBracket))
                .or_not(),
        )
        .map(|(base, offsets)| Access {
            base,
            offsets: offsets.unwrap_or_default(),
        });

    // Binding list: '(' VALUE '=' VALUE (',' ...)* ')'
    let bindings = value
        .clone()
        .then_ignore(just(Token::Equals))
        .then(value.clone())
        .map(|(inner, outer)| Binding { inner, outer })
        .separated_by(just(Token::Comma))
        .collect::<Vec<_>>()
        .delimited_by(just(Token::LParen), just(Token::RParen));

    // ── Types ──

    let ty = choice((
        just(Token::TokenType).map_with(|_, e| TypeExpr::Token(e.span())),
        just(Token::IndexType).map_with(|_, e| TypeExpr::Index(e.span())),
        just(Token::MemRefType)
            .ignore_then(
                int.clone()
                    .then_ignore(just(Token::Comma))
                    .then(ident.clone())
                    .delimited_by(just(Token::Lt), just(Token::Gt)),
            )
            .map_with(|(rank, space), e| TypeExpr::MemRef {
                rank,
                space,
                span: e.span(),
            }),
    ));

    // ── Blocks and operations ──

    let block = recursive(|block| {
        let const_op = just(Token::Const).ignore_then(int).map(OpExpr::Const);

        let alloc_op = just(Token::Alloc)
            .ignore_then(just(Token::Colon))
            .ignore_then(ty.clone())
            .map(OpExpr::Alloc);

        let dealloc_op = just(Token::Dealloc)
            .ignore_then(value.clone())
            .map(OpExpr::Dealloc);

        let copy_op = just(Token::Copy)
            .ignore_then(value.clone())
            .then_ignore(just(Token::Comma))
            .then(value.clone())
            .map(|(src, dst)| OpExpr::Copy { src, dst });

        let transform_op = just(Token::Transform)
            .ignore_then(just(Token::Ins).ignore_then(paren_values.clone()))
            .then(just(Token::Outs).ignore_then(paren_values.clone()))
            .map(|(ins, outs)| OpExpr::Transform { ins, outs });

        let muli_op = just(Token::MulI)
            .ignore_then(value.clone())
            .then_ignore(just(Token::Comma))
            .then(value.clone())
            .map(|(a, b)| OpExpr::MulI(a, b));

        let addi_op = just(Token::AddI)
            .ignore_then(value.clone())
            .then_ignore(just(Token::Comma))
            .then(value.clone())
            .map(|(a, b)| OpExpr::AddI(a, b));

        let apply_op = just(Token::Apply)
            .ignore_then(paren_values.clone())
            .map(OpExpr::Apply);

        let yield_op = just(Token::Yield)
            .ignore_then(values.clone())
            .map(OpExpr::Yield);

        let compute_op = just(Token::Compute)
            .ignore_then(deps.clone())
            .then(block.clone())
            .map(|(deps, body)| OpExpr::Compute { deps, body });

        let transfer_op = just(Token::Transfer)
            .ignore_then(deps.clone())
            .then(access.clone())
            .then_ignore(just(Token::LArrow))
            .then(access.clone())
            .map(|((deps, dst), src)| OpExpr::Transfer { deps, dst, src });

        let put_op = just(Token::Put)
            .ignore_then(symbol.clone())
            .then(deps.clone())
            .then(access.clone())
            .map(|((channel, deps), src)| OpExpr::Put { channel, deps, src });

        let get_op = just(Token::Get)
            .ignore_then(symbol.clone())
            .then(deps.clone())
            .then(access.clone())
            .map(|((channel, deps), dst)| OpExpr::Get { channel, deps, dst });

        let join_op = just(Token::Join)
            .ignore_then(deps.clone())
            .map(|deps| OpExpr::Join { deps });

        // for %iv = %lb to %ub step %s iter(%c = %init) { ... }
        let loop_op = choice((
            just(Token::For).to(LoopKind::Sequential),
            just(Token::Parallel).to(LoopKind::Parallel),
        ))
        .then(value.clone())
        .then_ignore(just(Token::Equals))
        .then(value.clone())
        .then_ignore(just(Token::To))
        .then(value.clone())
        .then_ignore(just(Token::Step))
        .then(value.clone())
        .then(just(Token::Iter).ignore_then(bindings.clone()).or_not())
        .then(block.clone())
        .map(|((((((kind, iv), lb), ub), step), carried), body)| OpExpr::Loop {
            kind,
            iv,
            lb,
            ub,
            step,
            carried: carried.unwrap_or_default(),
            body,
        });

        let if_op = just(Token::If)
            .ignore_then(value.clone())
            .then(block.clone())
            .then_ignore(just(Token::Else))
            .then(block.clone())
            .map(|((cond, then_block), else_block)| OpExpr::If {
                cond,
                then_block,
                else_block,
            });

        // herd [deps] ids(%x, %y) args(%p = %a) { ... }
        let hierarchy_op = choice((
            just(Token::Launch).to(HierarchyLevel::Launch),
            just(Token::Segment).to(HierarchyLevel::Segment),
            just(Token::Herd).to(HierarchyLevel::Herd),
        ))
        .then(deps.clone())
        .then(just(Token::Ids).ignore_then(paren_values.clone()).or_not())
        .then(just(Token::Args).ignore_then(bindings.clone()).or_not())
        .then(block.clone())
        .map(|((((level, deps), ids), args), body)| OpExpr::Hierarchy {
            level,
            deps,
            ids: ids.unwrap_or_default(),
            args: args.unwrap_or_default(),
            body,
        });

        let end_op = just(Token::End).to(OpExpr::End);

        let op_expr = choice((
            const_op,
            alloc_op,
            dealloc_op,
            copy_op,
            transform_op,
            muli_op,
            addi_op,
            apply_op,
            yield_op,
            compute_op,
            transfer_op,
            put_op,
            get_op,
            join_op,
            loop_op,
            if_op,
            hierarchy_op,
            end_op,
        ));

        let results = value
            .clone()
            .separated_by(just(Token::Comma))
            .at_least(1)
            .collect::<Vec<_>>()
            .then_ignore(just(Token::Equals))
            .or_not()
            .map(Option::unwrap_or_default);

        let op_stmt = results
            .then(op_expr)
            .map_with(|(results, op), e| OpStmt {
                results,
                op,
                span: e.span(),
            });

        nl.clone()
            .ignore_then(
                op_stmt
                    .separated_by(just(Token::Newline).repeated().at_least(1))
                    .allow_trailing()
                    .collect::<Vec<_>>(),
            )
            .then_ignore(nl.clone())
            .delimited_by(just(Token::LBrace), just(Token::RBrace))
            .map_with(|stmts, e| Block {
                stmts,
                span: e.span(),
            })
    });

    // ── Functions ──

    let param = value
        .clone()
        .then_ignore(just(Token::Colon))
        .then(ty)
        .map(|(name, ty)| Param { name, ty });

    let func = just(Token::Func)
        .ignore_then(symbol)
        .then(
            param
                .separated_by(just(Token::Comma))
                .collect::<Vec<_>>()
                .delimited_by(just(Token::LParen), just(Token::RParen)),
        )
        .then(block)
        .map_with(|((name, params), body), e| FuncDef {
            name,
            params,
            body,
            span: e.span(),
        });

    // ── Module ──

    nl.clone()
        .ignore_then(
            func.separated_by(just(Token::Newline).repeated().at_least(1))
                .allow_trailing()
                .collect::<Vec<_>>(),
        )
        .then_ignore(nl)
        .map_with(|funcs, e| Module {
            funcs,
            span: e.span(),
        })
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_ok(source: &str) -> Module {
        let result = parse(source);
        assert!(
            result.errors.is_empty(),
            "unexpected errors: {:#?}",
            result.errors
        );
        result.module.expect("expected module")
    }

    fn single_func_stmts(source: &str) -> Vec<OpStmt> {
        let module = parse_ok(source);
        assert_eq!(module.funcs.len(), 1, "expected 1 func");
        module.funcs.into_iter().next().unwrap().body.stmts
    }

    #[test]
    fn empty_module() {
        let module = parse_ok("\n\n");
        assert!(module.funcs.is_empty());
    }

    #[test]
    fn func_signature() {
        let module = parse_ok("func @main(%a: memref<2, L3>, %n: index) {\n}\n");
        let func = &module.funcs[0];
        assert_eq!(func.name.name, "main");
        assert_eq!(func.params.len(), 2);
        assert_eq!(func.params[0].name.name, "a");
        assert!(matches!(
            &func.params[0].ty,
            TypeExpr::MemRef { rank: 2, space, .. } if space.name == "L3"
        ));
        assert!(matches!(func.params[1].ty, TypeExpr::Index(_)));
        assert!(func.body.stmts.is_empty());
    }

    #[test]
    fn transfer_with_deps_and_offsets() {
        let stmts = single_func_stmts(
            "func @f(%a: memref<1, L3>, %b: memref<1, L1>) {\n  %c0 = const 0\n  %t = transfer [%x, %y] %b[%c0] <- %a\n}",
        );
        assert_eq!(stmts.len(), 2);
        let OpExpr::Transfer { deps, dst, src } = &stmts[1].op else {
            panic!("expected transfer, got {:?}", stmts[1].op)
        };
        let dep_names: Vec<_> = deps.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(dep_names, vec!["x", "y"]);
        assert_eq!(dst.base.name, "b");
        assert_eq!(dst.offsets.len(), 1);
        assert_eq!(src.base.name, "a");
        assert!(src.offsets.is_empty());
        assert_eq!(stmts[1].results[0].name, "t");
    }

    #[test]
    fn compute_with_multiple_results() {
        let stmts = single_func_stmts(
            "func @f() {\n  %t, %m = compute {\n    %x = alloc : memref<1, L1>\n    yield %x\n  }\n}",
        );
        assert_eq!(stmts[0].results.len(), 2);
        let OpExpr::Compute { deps, body } = &stmts[0].op else {
            panic!("expected compute")
        };
        assert!(deps.is_empty());
        assert_eq!(body.stmts.len(), 2);
        assert!(matches!(body.stmts[1].op, OpExpr::Yield(ref v) if v.len() == 1));
    }

    #[test]
    fn loop_with_carried_token() {
        let stmts = single_func_stmts(
            "func @f(%t0: token) {\n  %c0 = const 0\n  %c4 = const 4\n  %c1 = const 1\n  %r = for %i = %c0 to %c4 step %c1 iter(%tok = %t0) {\n    %j = join [%tok]\n    yield %j\n  }\n}",
        );
        let OpExpr::Loop {
            kind,
            iv,
            carried,
            body,
            ..
        } = &stmts[3].op
        else {
            panic!("expected loop")
        };
        assert_eq!(*kind, LoopKind::Sequential);
        assert_eq!(iv.name, "i");
        assert_eq!(carried.len(), 1);
        assert_eq!(carried[0].inner.name, "tok");
        assert_eq!(carried[0].outer.name, "t0");
        assert_eq!(body.stmts.len(), 2);
    }

    #[test]
    fn nested_hierarchy() {
        let stmts = single_func_stmts(
            "func @f(%a: memref<1, L3>) {\n  %h = launch args(%x = %a) {\n    %s = segment args(%y = %x) {\n      %g = herd ids(%tx, %ty) args(%z = %y) {\n        end\n      }\n      end\n    }\n    end\n  }\n}",
        );
        let OpExpr::Hierarchy {
            level, args, body, ..
        } = &stmts[0].op
        else {
            panic!("expected launch")
        };
        assert_eq!(*level, HierarchyLevel::Launch);
        assert_eq!(args[0].inner.name, "x");
        let OpExpr::Hierarchy {
            level, body, ..
        } = &body.stmts[0].op
        else {
            panic!("expected segment")
        };
        assert_eq!(*level, HierarchyLevel::Segment);
        let OpExpr::Hierarchy { level, ids, .. } = &body.stmts[0].op else {
            panic!("expected herd")
        };
        assert_eq!(*level, HierarchyLevel::Herd);
        assert_eq!(ids.len(), 2);
    }

    #[test]
    fn conditional_join() {
        let stmts = single_func_stmts(
            "func @f(%c: index) {\n  %r = if %c {\n    %a = join\n    yield %a\n  } else {\n    %b = join\n    yield %b\n  }\n}",
        );
        let OpExpr::If {
            then_block,
            else_block,
            ..
        } = &stmts[0].op
        else {
            panic!("expected if")
        };
        assert_eq!(then_block.stmts.len(), 2);
        assert_eq!(else_block.stmts.len(), 2);
    }

    #[test]
    fn channel_ops() {
        let stmts = single_func_stmts(
            "func @f(%a: memref<1, L1>, %b: memref<1, L2>) {\n  %p = put @ch %a\n  %g = get @ch [%p] %b\n}",
        );
        assert!(matches!(&stmts[0].op, OpExpr::Put { channel, .. } if channel.name == "ch"));
        assert!(matches!(&stmts[1].op, OpExpr::Get { deps, .. } if deps.len() == 1));
    }

    #[test]
    fn missing_arrow_is_error() {
        let result = parse("func @f(%a: memref<1, L1>) {\n  %t = transfer %a %a\n}");
        assert!(!result.errors.is_empty());
    }

    #[test]
    fn lex_errors_are_merged() {
        let result = parse("func @f() {\n  $\n}");
        assert!(!result.errors.is_empty());
    }
}
