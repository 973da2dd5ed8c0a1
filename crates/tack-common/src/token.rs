use serde::Serialize;

use crate::span::{Position, Span};

/// A token handed to the parser by the external lexer.
///
/// The parser treats the token stream as read-only data: it never mutates
/// tokens and only ever moves a monotonically non-decreasing index forward
/// over them (backtracking re-reads, never rewrites). The stream must be
/// finite and terminated by a single [`TokenKind::EndMarker`] token.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Token {
    pub kind: TokenKind,
    /// The token's text as written in the source.
    pub text: String,
    pub span: Span,
}

impl Token {
    /// Create a new token from a kind, text and positions.
    pub fn new(kind: TokenKind, text: impl Into<String>, start: Position, end: Position) -> Self {
        Self {
            kind,
            text: text.into(),
            span: Span::new(start, end),
        }
    }

    /// The designated stream terminator at the given position.
    pub fn end_marker(at: Position) -> Self {
        Self {
            kind: TokenKind::EndMarker,
            text: String::new(),
            span: Span::point(at),
        }
    }

    /// Start position, for AST span bookkeeping.
    pub fn start(&self) -> Position {
        self.span.start
    }

    /// End position, for AST span bookkeeping.
    pub fn end(&self) -> Position {
        self.span.end
    }
}

/// Every kind of token in the Tack language.
///
/// This enum is the complete vocabulary of the lexer-to-parser interface.
/// Operator characters (`+`, `-`, `<`, ...) are delivered as `Name` tokens:
/// operators are ordinary words looked up in the environment, not special
/// syntax.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum TokenKind {
    // ── Keywords ───────────────────────────────────────────────────────
    Def,
    Class,
    Import,
    From,
    As,
    Cast,

    // ── Punctuation ────────────────────────────────────────────────────
    /// `$`
    Dollar,
    /// `.`
    Dot,
    /// `,`
    Comma,
    /// `:`
    Colon,
    /// `--` (stack-effect separator)
    DashDash,
    /// `` ` `` (item type variable sigil)
    Backtick,
    /// `*` (sequence type variable sigil)
    Star,
    /// `(`
    LPar,
    /// `)`
    RPar,
    /// `[`
    LSqb,
    /// `]`
    RSqb,
    /// `{`
    LBrace,
    /// `}`
    RBrace,

    // ── Literals and names ─────────────────────────────────────────────
    Name,
    Number,
    Str,

    // ── Layout ─────────────────────────────────────────────────────────
    Newline,
    Indent,
    Dedent,

    /// The designated end-of-stream marker. Exactly one per stream, last.
    EndMarker,
}

impl TokenKind {
    /// Human-readable description used in parse-failure messages.
    pub fn describe(self) -> &'static str {
        match self {
            TokenKind::Def => "`def`",
            TokenKind::Class => "`class`",
            TokenKind::Import => "`import`",
            TokenKind::From => "`from`",
            TokenKind::As => "`as`",
            TokenKind::Cast => "`cast`",
            TokenKind::Dollar => "`$`",
            TokenKind::Dot => "`.`",
            TokenKind::Comma => "`,`",
            TokenKind::Colon => "`:`",
            TokenKind::DashDash => "`--`",
            TokenKind::Backtick => "backtick",
            TokenKind::Star => "`*`",
            TokenKind::LPar => "`(`",
            TokenKind::RPar => "`)`",
            TokenKind::LSqb => "`[`",
            TokenKind::RSqb => "`]`",
            TokenKind::LBrace => "`{`",
            TokenKind::RBrace => "`}`",
            TokenKind::Name => "name",
            TokenKind::Number => "number",
            TokenKind::Str => "string",
            TokenKind::Newline => "newline",
            TokenKind::Indent => "indent",
            TokenKind::Dedent => "dedent",
            TokenKind::EndMarker => "end of input",
        }
    }
}
