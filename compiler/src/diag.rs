// diag.rs — Unified diagnostics model and fatal analysis errors
//
// Provides the shared diagnostic types used by the front end (lexer,
// parser, lowering) and the `DepError` taxonomy raised by the analysis.
// Every `DepError` renders as a coded `Diagnostic`.
//
// Preconditions: none (types only).
// Postconditions: none (types only).
// Failure modes: none.
// Side effects: none.

use std::fmt;

use crate::ast::Span;
use crate::id::{NodeKey, OpId};
use crate::pass::ArtifactId;

// ── Diagnostic code ──────────────────────────────────────────────────────

/// A stable diagnostic code (e.g., `E0101`).
///
/// Codes are `&'static str` constants defined in the `codes` module. Once
/// assigned, a code keeps its meaning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DiagCode(pub &'static str);

impl fmt::Display for DiagCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

pub mod codes {
    use super::DiagCode;

    // E00xx: lexing and parsing
    pub const E0001: DiagCode = DiagCode("E0001");

    // E01xx: lowering
    pub const E0101: DiagCode = DiagCode("E0101"); // undefined value
    pub const E0102: DiagCode = DiagCode("E0102"); // duplicate definition
    pub const E0103: DiagCode = DiagCode("E0103"); // type mismatch
    pub const E0104: DiagCode = DiagCode("E0104"); // result count mismatch
    pub const E0105: DiagCode = DiagCode("E0105"); // misplaced or missing terminator
    pub const E0106: DiagCode = DiagCode("E0106"); // unknown memory space or rank
    pub const E0107: DiagCode = DiagCode("E0107"); // value captured across a hierarchy boundary

    // E02xx: structural analysis errors
    pub const E0201: DiagCode = DiagCode("E0201"); // unknown op inside compute body
    pub const E0202: DiagCode = DiagCode("E0202"); // hierarchy call / child scope mismatch
    pub const E0203: DiagCode = DiagCode("E0203"); // cyclic precedence
    pub const E0204: DiagCode = DiagCode("E0204"); // channel not in pairs
    pub const E0205: DiagCode = DiagCode("E0205"); // pass input artifact missing

    // E03xx: configuration and export
    pub const E0301: DiagCode = DiagCode("E0301"); // invalid conflict mode
    pub const E0302: DiagCode = DiagCode("E0302"); // dump I/O failure
}

// ── Severity level ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagLevel {
    Error,
    Warning,
}

// ── Diagnostic ───────────────────────────────────────────────────────────

/// A diagnostic emitted by any phase.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub code: Option<DiagCode>,
    pub level: DiagLevel,
    pub span: Option<Span>,
    pub message: String,
    pub hint: Option<String>,
}

impl Diagnostic {
    /// Create a new diagnostic with no code or hint.
    pub fn new(level: DiagLevel, span: Option<Span>, message: impl Into<String>) -> Self {
        Self {
            code: None,
            level,
            span,
            message: message.into(),
            hint: None,
        }
    }

    pub fn error(span: Span, message: impl Into<String>) -> Self {
        Self::new(DiagLevel::Error, Some(span), message)
    }

    /// Attach a stable diagnostic code.
    pub fn with_code(mut self, code: DiagCode) -> Self {
        self.code = Some(code);
        self
    }

    /// Attach a remediation hint.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    pub fn is_error(&self) -> bool {
        self.level == DiagLevel::Error
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let level = match self.level {
            DiagLevel::Error => "error",
            DiagLevel::Warning => "warning",
        };
        if let Some(code) = &self.code {
            write!(f, "{}[{}]: {}", level, code, self.message)?;
        } else {
            write!(f, "{}: {}", level, self.message)?;
        }
        if let Some(span) = &self.span {
            write!(f, " (at {}..{})", span.start, span.end)?;
        }
        if let Some(hint) = &self.hint {
            write!(f, "\n  hint: {}", hint)?;
        }
        Ok(())
    }
}

// ── Fatal analysis errors ────────────────────────────────────────────────

/// Fatal conditions that abort a canonicalization run.
#[derive(Debug)]
pub enum DepError {
    /// An operation inside a compute body has no known effect role.
    UnknownOpInCompute { op: OpId, label: String, span: Option<Span> },
    /// Hierarchy-call vertices and child scopes disagree in number.
    HierarchyScopeMismatch { scope: String, calls: usize, children: usize },
    /// The dependency graph of a scope contains a cycle.
    CyclicPrecedence { scope: String, vertex: NodeKey },
    /// A channel does not have exactly one put and one get endpoint.
    ChannelNotInPairs { channel: String, puts: usize, gets: usize },
    /// A pass was started before the artifacts it consumes existed.
    MissingArtifact { pass: &'static str, artifact: ArtifactId },
    /// Conflict mode string is neither `RAW` nor `WAW/WAR`.
    InvalidConflictMode(String),
    /// Writing dump files failed.
    Io { path: String, source: std::io::Error },
}

impl fmt::Display for DepError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DepError::UnknownOpInCompute { label, .. } => {
                write!(f, "unknown op '{}' inside compute body", label)
            }
            DepError::HierarchyScopeMismatch {
                scope,
                calls,
                children,
            } => write!(
                f,
                "mismatch between # graphs and hierarchy ops in scope '{}': {} hierarchy calls, {} child scopes",
                scope, calls, children
            ),
            DepError::CyclicPrecedence { scope, vertex } => {
                write!(f, "cyclic precedence in scope '{}' at vertex {}", scope, vertex)
            }
            DepError::ChannelNotInPairs {
                channel,
                puts,
                gets,
            } => write!(
                f,
                "channel '{}' not in pairs: {} put(s), {} get(s)",
                channel, puts, gets
            ),
            DepError::MissingArtifact { pass, artifact } => {
                write!(f, "pass '{}' needs {:?}, which has not been produced", pass, artifact)
            }
            DepError::InvalidConflictMode(mode) => {
                write!(f, "invalid conflict mode '{}'", mode)
            }
            DepError::Io { path, source } => write!(f, "cannot write '{}': {}", path, source),
        }
    }
}

impl std::error::Error for DepError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            DepError::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl DepError {
    pub fn code(&self) -> DiagCode {
        match self {
            DepError::UnknownOpInCompute { .. } => codes::E0201,
            DepError::HierarchyScopeMismatch { .. } => codes::E0202,
            DepError::CyclicPrecedence { .. } => codes::E0203,
            DepError::ChannelNotInPairs { .. } => codes::E0204,
            DepError::MissingArtifact { .. } => codes::E0205,
            DepError::InvalidConflictMode(_) => codes::E0301,
            DepError::Io { .. } => codes::E0302,
        }
    }

    pub fn to_diagnostic(&self) -> Diagnostic {
        let span = match self {
            DepError::UnknownOpInCompute { span, .. } => *span,
            _ => None,
        };
        let diag = Diagnostic::new(DiagLevel::Error, span, self.to_string()).with_code(self.code());
        match self {
            DepError::UnknownOpInCompute { .. } => diag.with_hint(
                "compute bodies may contain alloc, dealloc, copy, transform, muli, addi, apply and const",
            ),
            DepError::ChannelNotInPairs { .. } => {
                diag.with_hint("each channel needs exactly one put and one get")
            }
            DepError::InvalidConflictMode(_) => diag.with_hint("expected 'RAW' or 'WAW/WAR'"),
            _ => diag,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dummy_span() -> Span {
        use chumsky::span::Span as _;
        Span::new((), 0..1)
    }

    #[test]
    fn display_without_code() {
        let d = Diagnostic::new(DiagLevel::Error, None, "something failed");
        assert_eq!(format!("{d}"), "error: something failed");
    }

    #[test]
    fn display_with_code_and_span() {
        let d = Diagnostic::error(dummy_span(), "undefined value '%x'").with_code(codes::E0101);
        assert_eq!(format!("{d}"), "error[E0101]: undefined value '%x' (at 0..1)");
    }

    #[test]
    fn dep_error_renders_coded_diagnostic() {
        let err = DepError::ChannelNotInPairs {
            channel: "ch".into(),
            puts: 2,
            gets: 1,
        };
        let d = err.to_diagnostic();
        assert_eq!(d.code, Some(codes::E0204));
        assert!(d.is_error());
        assert_eq!(
            format!("{d}"),
            "error[E0204]: channel 'ch' not in pairs: 2 put(s), 1 get(s)\n  hint: each channel needs exactly one put and one get"
        );
    }

    #[test]
    fn invalid_mode_message() {
        let err = DepError::InvalidConflictMode("RAR".into());
        assert_eq!(err.to_string(), "invalid conflict mode 'RAR'");
        assert_eq!(err.code(), codes::E0301);
    }
}
