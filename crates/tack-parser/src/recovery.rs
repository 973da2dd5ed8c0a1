//! Parser combinators for error recovery.
//!
//! These are layered on top of the primitives in [`crate::combinators`],
//! not primitive themselves. The idiom for every delimited construct is
//! [`bracketed`]: an error anywhere inside a bracketed region is contained
//! by skipping to the closing delimiter, so the parser still consumes
//! through the matching close and the rest of the file parses normally.
//! Callers splice the carried failure into the AST as an explicit error
//! node instead of aborting the whole parse.

use tack_common::token::Token;

use crate::combinators::{furthest_failure, FailureTree, ParseOutcome, Parser};

/// The output of [`recover`]: either the primary parser's value, or the
/// fallback's value together with the primary's failure, so callers can
/// detect that recovery happened and report the original failure.
#[derive(Debug, Clone, PartialEq)]
pub enum Recovery<T, F> {
    /// The primary parser succeeded.
    Ok(T),
    /// The primary parser failed; the fallback consumed up to a
    /// synchronization point.
    Recovered {
        fallback_output: F,
        /// The primary parser's failure, to be reported as a diagnostic.
        failure: FailureTree,
        /// Where the primary parser stopped.
        failure_index: usize,
    },
}

/// Skip tokens until `marker` matches.
///
/// Returns the tokens that were skipped. The position is left *at* the
/// match, not past it. If the marker never matches before the end of the
/// stream, fails carrying the furthest sub-failure seen.
pub fn skip_until<T: 'static>(marker: Parser<T>) -> Parser<Vec<Token>> {
    Parser::new(move |stream, start| {
        let mut index = start;
        let mut failures = Vec::new();
        while index < stream.len() {
            let result = marker.run(stream, index);
            if result.is_success {
                return ParseOutcome::success(stream[start..index].to_vec(), index, None);
            }
            failures.push(
                result
                    .failures
                    .expect("failed outcome must carry a failure tree"),
            );
            index += 1;
        }
        let failure = furthest_failure(failures)
            .unwrap_or_else(|| FailureTree::new("anything to skip", start, vec![]));
        ParseOutcome {
            output: Some(stream[start..].to_vec()),
            next_index: index,
            is_success: false,
            failures: Some(failure),
            is_committed: false,
        }
    })
}

/// Invoke a fallback parser where the first parser fails.
///
/// The fallback runs at the *same* starting index. If it succeeds, the
/// outcome is [`Recovery::Recovered`] carrying both the fallback's output
/// and the primary's failure. If both fail, the primary's original failure
/// surfaces -- recovery must never mask the root cause.
pub fn recover<T: 'static, F: 'static>(
    primary: Parser<T>,
    fallback: Parser<F>,
) -> Parser<Recovery<T, F>> {
    Parser::new(move |stream, index| {
        let result = primary.run(stream, index);
        if result.is_success {
            return ParseOutcome {
                output: result.output.map(Recovery::Ok),
                next_index: result.next_index,
                is_success: true,
                failures: result.failures,
                is_committed: result.is_committed,
            };
        }
        let primary_failure = result
            .failures
            .clone()
            .expect("failed outcome must carry a failure tree");
        let fallback_result = fallback.run(stream, index);
        if fallback_result.is_success {
            return ParseOutcome {
                output: fallback_result.output.map(|fallback_output| {
                    Recovery::Recovered {
                        fallback_output,
                        failure: primary_failure,
                        failure_index: result.next_index,
                    }
                }),
                next_index: fallback_result.next_index,
                is_success: true,
                failures: fallback_result.failures,
                is_committed: false,
            };
        }
        ParseOutcome {
            output: None,
            next_index: result.next_index,
            is_success: false,
            failures: result.failures,
            is_committed: result.is_committed,
        }
    })
}

/// Match a region wrapped by delimiters, using the delimiters for error
/// recovery: `left >> recover(inside, skip_until(right)) << right`.
pub fn bracketed<L: 'static, T: 'static, R: 'static>(
    left: Parser<L>,
    inside: Parser<T>,
    right: Parser<R>,
) -> Parser<Recovery<T, Vec<Token>>> {
    left.keep(recover(inside, skip_until(right.clone())))
        .skip(right)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::combinators::{test_item, token};
    use tack_common::span::Position;
    use tack_common::token::TokenKind;

    fn tok(kind: TokenKind, text: &str, column: u32) -> Token {
        Token::new(
            kind,
            text,
            Position::new(1, column),
            Position::new(1, column + text.len().max(1) as u32),
        )
    }

    fn name(text: &str, column: u32) -> Token {
        tok(TokenKind::Name, text, column)
    }

    #[test]
    fn skip_until_stops_at_marker_without_consuming_it() {
        let stream = vec![
            name("a", 0),
            name("b", 2),
            tok(TokenKind::RPar, ")", 4),
        ];
        let result = skip_until(token(TokenKind::RPar)).run(&stream, 0);
        assert!(result.is_success);
        assert_eq!(result.next_index, 2);
        let skipped = result.output.unwrap();
        assert_eq!(skipped.len(), 2);
        assert_eq!(skipped[0].text, "a");
    }

    #[test]
    fn skip_until_fails_when_marker_never_matches() {
        let stream = vec![name("a", 0), name("b", 2)];
        let result = skip_until(token(TokenKind::RPar)).run(&stream, 0);
        assert!(!result.is_success);
        assert_eq!(result.next_index, 2);
        // The whole tail was skipped and is still reported.
        assert_eq!(result.output.as_ref().map(Vec::len), Some(2));
    }

    #[test]
    fn recover_passes_through_success() {
        let stream = vec![name("a", 0)];
        let a = test_item(|t| t.text == "a", "a");
        let result = recover(a, skip_until(token(TokenKind::RPar))).run(&stream, 0);
        assert!(result.is_success);
        assert!(matches!(result.output, Some(Recovery::Ok(_))));
    }

    #[test]
    fn recover_returns_fallback_output_and_primary_failure() {
        let stream = vec![name("junk", 0), tok(TokenKind::RPar, ")", 5)];
        let a = test_item(|t| t.text == "a", "a");
        let result = recover(a, skip_until(token(TokenKind::RPar))).run(&stream, 0);
        assert!(result.is_success);
        match result.output.unwrap() {
            Recovery::Recovered {
                fallback_output,
                failure,
                ..
            } => {
                assert_eq!(fallback_output.len(), 1);
                assert_eq!(failure.expected, "a");
            }
            Recovery::Ok(_) => panic!("expected recovery"),
        }
    }

    #[test]
    fn recover_surfaces_primary_failure_when_both_fail() {
        let stream = vec![name("junk", 0)];
        let a = test_item(|t| t.text == "a", "a");
        // The fallback also fails: no `)` anywhere.
        let result = recover(a, skip_until(token(TokenKind::RPar))).run(&stream, 0);
        assert!(!result.is_success);
        assert_eq!(result.failures.unwrap().expected, "a");
    }

    #[test]
    fn bracketed_well_formed_equals_plain_parse() {
        let stream = vec![
            tok(TokenKind::LPar, "(", 0),
            name("a", 1),
            tok(TokenKind::RPar, ")", 2),
        ];
        let inner = test_item(|t| t.text == "a", "a");
        let plain = token(TokenKind::LPar)
            .keep(inner.clone())
            .skip(token(TokenKind::RPar))
            .run(&stream, 0);
        let recovered =
            bracketed(token(TokenKind::LPar), inner, token(TokenKind::RPar)).run(&stream, 0);
        assert!(plain.is_success && recovered.is_success);
        assert_eq!(recovered.next_index, plain.next_index);
        match recovered.output.unwrap() {
            Recovery::Ok(t) => assert_eq!(t.text, "a"),
            Recovery::Recovered { .. } => panic!("no recovery expected on well-formed input"),
        }
    }

    #[test]
    fn bracketed_contains_error_and_consumes_close() {
        let stream = vec![
            tok(TokenKind::LPar, "(", 0),
            name("junk", 1),
            name("more", 6),
            tok(TokenKind::RPar, ")", 11),
            name("after", 13),
        ];
        let inner = test_item(|t| t.text == "a", "a");
        let result =
            bracketed(token(TokenKind::LPar), inner, token(TokenKind::RPar)).run(&stream, 0);
        assert!(result.is_success, "error inside brackets must be contained");
        // Consumed through the `)`, leaving the rest of the stream intact.
        assert_eq!(result.next_index, 4);
        match result.output.unwrap() {
            Recovery::Recovered {
                fallback_output,
                failure,
                ..
            } => {
                assert_eq!(fallback_output.len(), 2);
                assert_eq!(failure.expected, "a");
            }
            Recovery::Ok(_) => panic!("expected recovery"),
        }
    }
}
