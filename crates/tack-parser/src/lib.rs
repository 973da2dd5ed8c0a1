//! Parser for the Tack language.
//!
//! The parser is built from combinators over an explicit
//! `(stream, index) -> outcome` function representation rather than a
//! hand-written recursive descent loop. Failure is *data*
//! ([`combinators::FailureTree`] threaded through
//! [`combinators::ParseOutcome`]), never a panic or an early exit, which is
//! what makes principled error recovery possible: a failed sub-parse inside
//! a delimited region becomes an explicit [`ast::ParseErrorNode`] in the
//! AST and the rest of the file parses normally.
//!
//! # Architecture
//!
//! - [`combinators`]: the primitive parsers and combinators (sequencing,
//!   alternation, repetition, mapping, binding, commit, descriptions)
//! - [`recovery`]: `skip_until`, `recover` and `bracketed`, the
//!   synchronization-point combinators layered on top
//! - [`ast`]: the source node model, with spans and embedded parse failures
//! - [`typeexpr`]: the type-annotation sub-language's AST
//! - [`grammar`]: the named-parser registry and the grammar productions
//! - [`report`]: plain-text rendering of failure trees
//!
//! The grammar rules live in a mutable registry ([`grammar::ParserDict`])
//! resolved lazily by name, so mutually recursive rules (a quotation word
//! contains the general word rule that contains quotations) terminate
//! without forward declarations.

pub mod ast;
pub mod combinators;
pub mod grammar;
pub mod recovery;
pub mod report;
pub mod typeexpr;

use tack_common::token::Token;

use crate::ast::TopLevelNode;
use crate::combinators::ParseError;

/// Parse a token stream into a top-level AST.
///
/// This is the main entry point for the parser. The returned tree may
/// contain recovered [`ast::ParseErrorNode`] leaves; inspect
/// [`TopLevelNode::parsing_failures`] for the diagnostics they carry. An
/// `Err` is returned only when the failure could not be contained by any
/// recovery point.
pub fn parse(tokens: &[Token]) -> Result<TopLevelNode, ParseError> {
    grammar::build_parsers().parse(tokens)
}
