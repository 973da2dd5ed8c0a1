//! Plain-text rendering of parse failures.
//!
//! Renders a [`FailureTree`] against the original source text: the
//! expected-item message, the offending line, a caret under the offending
//! column, and an indented "because:" chain for nested failures.

use tack_common::diag::Diagnostic;
use tack_common::span::{LineIndex, Position};
use tack_common::token::Token;

use crate::combinators::FailureTree;

/// The source position a failure points at: the start of the token at its
/// furthest index, clamping to the last token when the failure is at end
/// of stream.
pub fn failure_position(stream: &[Token], failure: &FailureTree) -> Position {
    if failure.furthest_index < stream.len() {
        stream[failure.furthest_index].start()
    } else {
        stream
            .last()
            .map(Token::start)
            .unwrap_or_else(Position::start_of_file)
    }
}

/// Render a failure tree as an "Expected ... because: ..." message with
/// the offending source line and a caret marker.
pub fn failure_message(source: &str, stream: &[Token], failure: &FailureTree) -> String {
    let index = LineIndex::new(source);
    render(source, &index, stream, failure, 0)
}

/// Reduce a failure to the `(message, location)` diagnostic-sink shape.
pub fn failure_diagnostic(stream: &[Token], failure: &FailureTree) -> Diagnostic {
    Diagnostic::at(
        format!("expected {}", failure.expected),
        failure_position(stream, failure),
    )
}

fn render(
    source: &str,
    index: &LineIndex,
    stream: &[Token],
    failure: &FailureTree,
    depth: usize,
) -> String {
    let location = failure_position(stream, failure);
    let line = index.line_text(source, location);
    let indent = "  ".repeat(depth);
    let caret_pad = " ".repeat(location.column as usize);
    let mut message = format!(
        "{indent}Expected {} at line {}, column {}:\n{indent}{}\n{indent}{caret_pad}^",
        failure.expected,
        location.line,
        location.column + 1,
        line.trim_end(),
    );
    if !failure.children.is_empty() {
        message.push_str(&format!("\n{indent}because:"));
        for child in &failure.children {
            message.push('\n');
            message.push_str(&render(source, index, stream, child, depth + 1));
        }
    }
    message
}

#[cfg(test)]
mod tests {
    use super::*;
    use tack_common::token::TokenKind;

    fn name(text: &str, line: u32, column: u32) -> Token {
        Token::new(
            TokenKind::Name,
            text,
            Position::new(line, column),
            Position::new(line, column + text.len() as u32),
        )
    }

    #[test]
    fn message_points_at_offending_token() {
        let source = "dup bogus\n";
        let stream = vec![name("dup", 1, 0), name("bogus", 1, 4)];
        let failure = FailureTree::new("a word", 1, vec![]);
        let message = failure_message(source, &stream, &failure);
        insta::assert_snapshot!(message, @r"
        Expected a word at line 1, column 5:
        dup bogus
            ^
        ");
    }

    #[test]
    fn nested_failures_render_because_chain() {
        let source = "dup bogus\n";
        let stream = vec![name("dup", 1, 0), name("bogus", 1, 4)];
        let failure = FailureTree::new(
            "a statement",
            1,
            vec![FailureTree::new("a word", 1, vec![])],
        );
        let message = failure_message(source, &stream, &failure);
        insta::assert_snapshot!(message, @r"
        Expected a statement at line 1, column 5:
        dup bogus
            ^
        because:
          Expected a word at line 1, column 5:
          dup bogus
              ^
        ");
    }

    #[test]
    fn failure_past_end_of_stream_points_at_last_token() {
        let stream = vec![name("dup", 1, 0)];
        let failure = FailureTree::new("more input", 7, vec![]);
        assert_eq!(failure_position(&stream, &failure), Position::new(1, 0));
    }

    #[test]
    fn diagnostic_shape() {
        let stream = vec![name("dup", 1, 0), name("x", 1, 4)];
        let failure = FailureTree::new("a word", 1, vec![]);
        let diag = failure_diagnostic(&stream, &failure);
        assert_eq!(diag.message, "expected a word");
        assert_eq!(diag.location, Some(Position::new(1, 4)));
    }
}
