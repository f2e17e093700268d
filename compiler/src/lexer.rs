// Lexer for the textual async IR (.air files).
//
// Uses the `logos` crate for DFA-based lexing. Value names (`%x`) and symbol
// names (`@chan`) carry no payload — the parser slices the text out of the
// source using the span, sigil stripped.
//
// Preconditions: input is valid UTF-8.
// Postconditions: returns all tokens with byte-offset spans, plus any lex errors.
// Failure modes: unrecognized characters produce `LexError`; lexing continues.
// Side effects: none.

use logos::Logos;
use std::fmt;

/// Byte-offset span in source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

/// A lexer error with location.
#[derive(Debug, Clone, PartialEq)]
pub struct LexError {
    pub span: Span,
    pub message: String,
}

/// Result of lexing: tokens plus any errors (non-fatal).
#[derive(Debug)]
pub struct LexResult {
    pub tokens: Vec<(Token, Span)>,
    pub errors: Vec<LexError>,
}

/// IR token types.
///
/// Every operation mnemonic is a keyword. Integer literals carry their
/// value; names carry nothing.
#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\r]+|//[^\n]*")]
pub enum Token {
    // ── Structure keywords ──
    #[token("func")]
    Func,
    #[token("to")]
    To,
    #[token("step")]
    Step,
    #[token("iter")]
    Iter,
    #[token("else")]
    Else,
    #[token("ins")]
    Ins,
    #[token("outs")]
    Outs,
    #[token("ids")]
    Ids,
    #[token("args")]
    Args,

    // ── Operation mnemonics ──
    #[token("const")]
    Const,
    #[token("alloc")]
    Alloc,
    #[token("dealloc")]
    Dealloc,
    #[token("copy")]
    Copy,
    #[token("transform")]
    Transform,
    #[token("muli")]
    MulI,
    #[token("addi")]
    AddI,
    #[token("apply")]
    Apply,
    #[token("yield")]
    Yield,
    #[token("compute")]
    Compute,
    #[token("transfer")]
    Transfer,
    #[token("put")]
    Put,
    #[token("get")]
    Get,
    #[token("join")]
    Join,
    #[token("for")]
    For,
    #[token("parallel")]
    Parallel,
    #[token("if")]
    If,
    #[token("launch")]
    Launch,
    #[token("segment")]
    Segment,
    #[token("herd")]
    Herd,
    #[token("end")]
    End,

    // ── Types ──
    #[token("token")]
    TokenType,
    #[token("index")]
    IndexType,
    #[token("memref")]
    MemRefType,

    // ── Symbols ──
    #[token("<-")]
    LArrow,
    #[token("=")]
    Equals,
    #[token(",")]
    Comma,
    #[token(":")]
    Colon,
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("[")]
    LBracket,
    #[token("]")]
    RBracket,
    #[token("{")]
    LBrace,
    #[token("}")]
    RBrace,
    #[token("<")]
    Lt,
    #[token(">")]
    Gt,

    // ── Literals and names ──
    /// Signed integer literal.
    #[regex(r"-?[0-9]+", parse_int)]
    Int(i64),

    /// SSA value name: `%[a-zA-Z0-9_]+`
    #[regex(r"%[a-zA-Z0-9_]+")]
    Value,

    /// Symbol name: `@[a-zA-Z_][a-zA-Z0-9_]*`
    #[regex(r"@[a-zA-Z_][a-zA-Z0-9_]*")]
    Symbol,

    /// Bare identifier (memory spaces). Keywords win over this regex.
    #[regex(r"[a-zA-Z_][a-zA-Z0-9_]*")]
    Ident,

    /// One or more newlines (operation separator).
    #[regex(r"\n+")]
    Newline,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Token::Func => "func",
            Token::To => "to",
            Token::Step => "step",
            Token::Iter => "iter",
            Token::Else => "else",
            Token::Ins => "ins",
            Token::Outs => "outs",
            Token::Ids => "ids",
            Token::Args => "args",
            Token::Const => "const",
            Token::Alloc => "alloc",
            Token::Dealloc => "dealloc",
            Token::Copy => "copy",
            Token::Transform => "transform",
            Token::MulI => "muli",
            Token::AddI => "addi",
            Token::Apply => "apply",
            Token::Yield => "yield",
            Token::Compute => "compute",
            Token::Transfer => "transfer",
            Token::Put => "put",
            Token::Get => "get",
            Token::Join => "join",
            Token::For => "for",
            Token::Parallel => "parallel",
            Token::If => "if",
            Token::Launch => "launch",
            Token::Segment => "segment",
            Token::Herd => "herd",
            Token::End => "end",
            Token::TokenType => "token",
            Token::IndexType => "index",
            Token::MemRefType => "memref",
            Token::LArrow => "<-",
            Token::Equals => "=",
            Token::Comma => ",",
            Token::Colon => ":",
            Token::LParen => "(",
            Token::RParen => ")",
            Token::LBracket => "[",
            Token::RBracket => "]",
            Token::LBrace => "{",
            Token::RBrace => "}",
            Token::Lt => "<",
            Token::Gt => ">",
            Token::Int(v) => return write!(f, "{v}"),
            Token::Value => "<value>",
            Token::Symbol => "<symbol>",
            Token::Ident => "<ident>",
            Token::Newline => "<newline>",
        };
        f.write_str(text)
    }
}

fn parse_int(lex: &mut logos::Lexer<'_, Token>) -> Option<i64> {
    lex.slice().parse().ok()
}

// ── Public API ──

/// Lex an IR source string into tokens.
///
/// Lexing is non-fatal: errors are collected and the lexer continues past
/// bad characters.
pub fn lex(source: &str) -> LexResult {
    let lexer = Token::lexer(source);
    let mut tokens = Vec::new();
    let mut errors = Vec::new();

    for (result, range) in lexer.spanned() {
        let span = Span {
            start: range.start,
            end: range.end,
        };
        match result {
            Ok(token) => tokens.push((token, span)),
            Err(()) => errors.push(LexError {
                span,
                message: format!("unexpected character: {:?}", &source[span.start..span.end]),
            }),
        }
    }

    LexResult { tokens, errors }
}

// ── Tests ──
