//! Parser combinators.
//!
//! A parser is a pure function from a token stream and a starting index to
//! a [`ParseOutcome`]: either a typed value plus the next index, or a
//! positional failure explanation. Ordinary grammar failure never panics
//! and never throws; the only error type ([`ParseError`]) is produced at
//! the top-level [`Parser::parse`] call when no recovery applied.
//!
//! Failure explanations are [`FailureTree`]s: "what was expected, how far
//! did we get, and why", nested when a higher-level rule wraps a
//! lower-level failure. Combinators aggressively track the *furthest*
//! failure seen among their sub-parsers, even on success, so that when an
//! enclosing rule does fail, the diagnostic points at the deepest point of
//! the grammar that almost matched.

use std::fmt;
use std::rc::Rc;

use tack_common::token::{Token, TokenKind};

// ── Failure trees ──────────────────────────────────────────────────────

/// Failure messages and positions from parsing. Failures can be nested.
///
/// Immutable once built. `furthest_index` is a token index into the input
/// stream, not a byte offset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailureTree {
    /// What the failing parser expected, e.g. "name" or "stack effect type".
    pub expected: String,
    /// The furthest token index reached by this failure or its children.
    pub furthest_index: usize,
    /// Lower-level failures this one wraps ("because: ...").
    pub children: Vec<FailureTree>,
}

impl FailureTree {
    /// Create a new failure tree node.
    pub fn new(
        expected: impl Into<String>,
        furthest_index: usize,
        children: Vec<FailureTree>,
    ) -> Self {
        Self {
            expected: expected.into(),
            furthest_index,
            children,
        }
    }
}

/// Pick the failure that got furthest. Earlier entries win ties.
pub fn furthest_failure<I>(failures: I) -> Option<FailureTree>
where
    I: IntoIterator<Item = FailureTree>,
{
    let mut result: Option<FailureTree> = None;
    for failure in failures {
        let beats = match &result {
            Some(best) => failure.furthest_index > best.furthest_index,
            None => true,
        };
        if beats {
            result = Some(failure);
        }
    }
    result
}

// ── Outcomes ───────────────────────────────────────────────────────────

/// The output of running a parser at a stream index.
///
/// Invariants: `is_success == false` implies `failures` is `Some`, and
/// `is_success == true` implies `output` is `Some`. A *successful* outcome
/// may still carry a failure tree: the deepest failure observed while
/// producing it (e.g. the repetition attempt that ended a `many`). That
/// tree is what enclosing combinators report if they go on to fail.
///
/// `is_committed` is sticky metadata consulted only by alternation: a
/// committed, input-consuming failure must not be swallowed by a sibling
/// alternative or by a repetition deciding it has simply run out of items.
#[derive(Debug, Clone, PartialEq)]
pub struct ParseOutcome<T> {
    pub output: Option<T>,
    pub next_index: usize,
    pub is_success: bool,
    pub failures: Option<FailureTree>,
    pub is_committed: bool,
}

impl<T> ParseOutcome<T> {
    /// A successful outcome, optionally carrying the deepest failure seen.
    pub fn success(output: T, next_index: usize, failures: Option<FailureTree>) -> Self {
        Self {
            output: Some(output),
            next_index,
            is_success: true,
            failures,
            is_committed: false,
        }
    }

    /// A failed outcome. The failure tree is mandatory.
    pub fn failure(next_index: usize, failures: FailureTree) -> Self {
        Self {
            output: None,
            next_index,
            is_success: false,
            failures: Some(failures),
            is_committed: false,
        }
    }

    /// The failure tree of a failed outcome.
    ///
    /// # Panics
    ///
    /// Panics if called on a successful outcome with no recorded failures;
    /// the `is_success == false ⟹ failures.is_some()` invariant makes this
    /// safe at every call site below.
    fn failures_of_failed(&self) -> &FailureTree {
        self.failures
            .as_ref()
            .expect("failed outcome must carry a failure tree")
    }
}

// ── The parser representation ──────────────────────────────────────────

type ParserFn<T> = Rc<dyn Fn(&[Token], usize) -> ParseOutcome<T>>;

/// A parser in the functional style: a cheaply clonable handle around a
/// pure `(stream, index) -> ParseOutcome` function.
pub struct Parser<T> {
    f: ParserFn<T>,
}

impl<T> Clone for Parser<T> {
    fn clone(&self) -> Self {
        Parser {
            f: Rc::clone(&self.f),
        }
    }
}

impl<T: 'static> Parser<T> {
    /// Wrap a parse function.
    pub fn new(f: impl Fn(&[Token], usize) -> ParseOutcome<T> + 'static) -> Self {
        Parser { f: Rc::new(f) }
    }

    /// Run the parser at the given index.
    pub fn run(&self, stream: &[Token], index: usize) -> ParseOutcome<T> {
        (self.f)(stream, index)
    }

    // ── Functorial / monadic combinators ───────────────────────────────

    /// Transform the output of a successful parse. Failure is propagated
    /// untouched.
    pub fn map<U: 'static>(self, f: impl Fn(T) -> U + 'static) -> Parser<U> {
        Parser::new(move |stream, index| {
            let result = self.run(stream, index);
            if result.is_success {
                ParseOutcome::success(
                    f(result.output.expect("successful outcome must carry output")),
                    result.next_index,
                    result.failures,
                )
            } else {
                ParseOutcome {
                    output: None,
                    next_index: result.next_index,
                    is_success: false,
                    failures: result.failures,
                    is_committed: result.is_committed,
                }
            }
        })
    }

    /// Monadic bind: feed the first parser's output into a function that
    /// chooses the next parser.
    ///
    /// On failure of either side, the outcome reports the *furthest*
    /// failure seen across both, which may come from the first parser even
    /// when it succeeded.
    pub fn bind<U: 'static>(self, f: impl Fn(T) -> Parser<U> + 'static) -> Parser<U> {
        Parser::new(move |stream, index| {
            let first = self.run(stream, index);
            if !first.is_success {
                return ParseOutcome {
                    output: None,
                    next_index: first.next_index,
                    is_success: false,
                    failures: first.failures,
                    is_committed: false,
                };
            }
            let next_index = first.next_index;
            let first_failures = first.failures;
            let second = f(first.output.expect("successful outcome must carry output"))
                .run(stream, next_index);
            combine_sequenced(first_failures, next_index, second)
        })
    }

    /// Sequence two parsers, keeping both outputs.
    pub fn then<U: 'static>(self, other: Parser<U>) -> Parser<(T, U)> {
        Parser::new(move |stream, index| {
            let first = self.run(stream, index);
            if !first.is_success {
                return ParseOutcome {
                    output: None,
                    next_index: first.next_index,
                    is_success: false,
                    failures: first.failures,
                    is_committed: false,
                };
            }
            let a = first.output.expect("successful outcome must carry output");
            let second = other.run(stream, first.next_index);
            let second = combine_sequenced(first.failures, first.next_index, second);
            match second.output {
                Some(b) if second.is_success => ParseOutcome {
                    output: Some((a, b)),
                    next_index: second.next_index,
                    is_success: true,
                    failures: second.failures,
                    is_committed: false,
                },
                _ => ParseOutcome {
                    output: None,
                    next_index: second.next_index,
                    is_success: false,
                    failures: second.failures,
                    is_committed: false,
                },
            }
        })
    }

    /// Sequence, keeping only the right output (the original's `>>`).
    pub fn keep<U: 'static>(self, other: Parser<U>) -> Parser<U> {
        self.then(other).map(|(_, b)| b)
    }

    /// Sequence, keeping only the left output (the original's `<<`).
    pub fn skip<U: 'static>(self, other: Parser<U>) -> Parser<T> {
        self.then(other).map(|(a, _)| a)
    }

    // ── Alternation ────────────────────────────────────────────────────

    /// Ordered choice with the exact longest-match diagnostic policy.
    ///
    /// Try `self`; if it succeeds, or it failed *after committing* and
    /// consuming input, return its result immediately. Otherwise try
    /// `other` at the same index. When `other` succeeds but `self` failed
    /// deeper, the success carries a merged `"X or Y"` failure tree so the
    /// deeper near-miss is not lost. When both fail, the failure that got
    /// furthest wins (ties go left).
    pub fn or_else(self, other: Parser<T>) -> Parser<T> {
        Parser::new(move |stream, index| {
            let left = self.run(stream, index);
            if left.is_success || (left.is_committed && left.next_index > index) {
                return left;
            }
            let right = other.run(stream, index);
            if right.is_success {
                if left.next_index > right.next_index {
                    let left_failure = left.failures_of_failed();
                    let merged = match right.failures {
                        Some(right_failure) => FailureTree::new(
                            format!("{} or {}", left_failure.expected, right_failure.expected),
                            left_failure.furthest_index,
                            left_failure
                                .children
                                .iter()
                                .cloned()
                                .chain(right_failure.children)
                                .collect(),
                        ),
                        None => left_failure.clone(),
                    };
                    return ParseOutcome {
                        output: right.output,
                        next_index: right.next_index,
                        is_success: true,
                        failures: Some(merged),
                        is_committed: false,
                    };
                }
                return right;
            }
            if right.is_committed && right.next_index > index {
                return right;
            }
            // Both failed: surface whichever got furthest, ties to the left.
            let left_failure = left.failures_of_failed();
            let right_failure = right.failures_of_failed();
            if right_failure.furthest_index > left_failure.furthest_index {
                right
            } else {
                left
            }
        })
    }

    /// `self`, or succeed with `None` without consuming anything.
    pub fn optional(self) -> Parser<Option<T>>
    where
        T: Clone,
    {
        self.map(Some).or_else(success(None))
    }

    // ── Repetition ─────────────────────────────────────────────────────

    /// Between `min` and `max` (inclusive; `None` = unbounded) repetitions.
    ///
    /// After the required repetitions, an attempt that fails *without
    /// consuming input* ends the loop successfully with everything gathered
    /// so far; this is what makes repetition total. A committed,
    /// input-consuming failure is a real syntax error and propagates.
    pub fn times(self, min: usize, max: Option<usize>) -> Parser<Vec<T>> {
        Parser::new(move |stream, start| {
            let mut index = start;
            let mut output = Vec::new();
            // Deepest failure tree seen across every attempt, successful or
            // not, paired with the index its outcome stopped at.
            let mut deepest: Option<(FailureTree, usize)> = None;
            for _ in 0..min {
                let result = self.run(stream, index);
                note_deepest(&mut deepest, &result.failures, result.next_index);
                if !result.is_success {
                    let (failure, at) = deepest
                        .clone()
                        .expect("failed repetition must have noted a failure");
                    return ParseOutcome::failure(at, failure);
                }
                output.push(result.output.expect("successful outcome must carry output"));
                index = result.next_index;
            }
            let mut remaining = max.map(|m| m.saturating_sub(min));
            loop {
                if remaining == Some(0) {
                    break;
                }
                let result = self.run(stream, index);
                if result.is_success {
                    note_deepest(&mut deepest, &result.failures, result.next_index);
                    output.push(result.output.expect("successful outcome must carry output"));
                    index = result.next_index;
                    if let Some(r) = remaining.as_mut() {
                        *r -= 1;
                    }
                    continue;
                }
                if result.is_committed && result.next_index > index {
                    // A repetition started and then hit a real syntax error
                    // partway through; do not swallow it as "no more items".
                    note_deepest(&mut deepest, &result.failures, result.next_index);
                    let (failure, at) = deepest
                        .clone()
                        .expect("committed failure must have noted a failure");
                    return ParseOutcome::failure(at, failure);
                }
                if result.next_index > index {
                    // Consumed input before failing: remember the near-miss
                    // for diagnostics, then stop successfully.
                    note_deepest(&mut deepest, &result.failures, result.next_index);
                }
                break;
            }
            ParseOutcome {
                output: Some(output),
                next_index: index,
                is_success: true,
                failures: deepest.map(|(f, _)| f),
                is_committed: false,
            }
        })
    }

    /// Zero or more repetitions. Never fails, never loops forever.
    pub fn many(self) -> Parser<Vec<T>> {
        self.times(0, None)
    }

    /// At least `n` repetitions.
    pub fn at_least(self, n: usize) -> Parser<Vec<T>> {
        self.times(n, None)
    }

    /// Repetitions separated by `sep`, between `min` and `max` of them.
    pub fn sep_by<U: 'static>(
        self,
        sep: Parser<U>,
        min: usize,
        max: Option<usize>,
    ) -> Parser<Vec<T>> {
        let item = self;
        Parser::new(move |stream, start| {
            let mut index = start;
            let mut output: Vec<T> = Vec::new();
            let mut deepest: Option<(FailureTree, usize)> = None;
            for i in 0..min {
                if i > 0 {
                    let sep_result = sep.run(stream, index);
                    note_deepest(&mut deepest, &sep_result.failures, sep_result.next_index);
                    if !sep_result.is_success {
                        let (failure, at) = deepest
                            .clone()
                            .expect("failed separator must have noted a failure");
                        return ParseOutcome::failure(at, failure);
                    }
                    index = sep_result.next_index;
                }
                let result = item.run(stream, index);
                note_deepest(&mut deepest, &result.failures, result.next_index);
                if !result.is_success {
                    let (failure, at) = deepest
                        .clone()
                        .expect("failed repetition must have noted a failure");
                    return ParseOutcome::failure(at, failure);
                }
                output.push(result.output.expect("successful outcome must carry output"));
                index = result.next_index;
            }
            let mut remaining = max.map(|m| m.saturating_sub(min));
            loop {
                if remaining == Some(0) {
                    break;
                }
                // After the first item, each further item needs a separator.
                let attempt_start = index;
                let (sep_consumed_to, sep_failed) = if output.is_empty() {
                    (index, false)
                } else {
                    let sep_result = sep.run(stream, index);
                    if sep_result.is_success {
                        (sep_result.next_index, false)
                    } else {
                        if sep_result.is_committed && sep_result.next_index > index {
                            note_deepest(&mut deepest, &sep_result.failures, sep_result.next_index);
                            let (failure, at) = deepest
                                .clone()
                                .expect("committed failure must have noted a failure");
                            return ParseOutcome::failure(at, failure);
                        }
                        if sep_result.next_index > index {
                            note_deepest(&mut deepest, &sep_result.failures, sep_result.next_index);
                        }
                        (index, true)
                    }
                };
                if sep_failed {
                    break;
                }
                let result = item.run(stream, sep_consumed_to);
                if result.is_success {
                    note_deepest(&mut deepest, &result.failures, result.next_index);
                    output.push(result.output.expect("successful outcome must carry output"));
                    index = result.next_index;
                    if let Some(r) = remaining.as_mut() {
                        *r -= 1;
                    }
                    continue;
                }
                if result.is_committed && result.next_index > sep_consumed_to {
                    note_deepest(&mut deepest, &result.failures, result.next_index);
                    let (failure, at) = deepest
                        .clone()
                        .expect("committed failure must have noted a failure");
                    return ParseOutcome::failure(at, failure);
                }
                if result.next_index > attempt_start {
                    note_deepest(&mut deepest, &result.failures, result.next_index);
                }
                break;
            }
            ParseOutcome {
                output: Some(output),
                next_index: index,
                is_success: true,
                failures: deepest.map(|(f, _)| f),
                is_committed: false,
            }
        })
    }

    // ── Metadata ───────────────────────────────────────────────────────

    /// Mark this parser's results as committed.
    ///
    /// Once a downstream combinator (notably `many` composed with
    /// alternation) sees a committed, index-advancing failure, it must
    /// propagate it rather than silently trying the next alternative. This
    /// distinguishes "ran out of valid repetitions" from "started a
    /// repetition and then hit a real syntax error partway through".
    pub fn commit(self) -> Parser<T> {
        Parser::new(move |stream, index| {
            let mut result = self.run(stream, index);
            result.is_committed = true;
            result
        })
    }

    /// Describe this parser for failure messages.
    ///
    /// A failure exactly at the entry index is replaced by a fresh
    /// single-node tree with this description; a deeper failure is wrapped
    /// as a child instead, producing the nested "because: ..." chains.
    pub fn desc(self, description: impl Into<String>) -> Parser<T> {
        let description = description.into();
        Parser::new(move |stream, index| {
            let result = self.run(stream, index);
            if result.is_success {
                return result;
            }
            let inner = result.failures_of_failed();
            if result.next_index == index {
                let failure = FailureTree::new(description.clone(), inner.furthest_index, vec![]);
                ParseOutcome {
                    output: None,
                    next_index: index,
                    is_success: false,
                    failures: Some(failure),
                    is_committed: result.is_committed,
                }
            } else {
                let failure = FailureTree::new(
                    description.clone(),
                    inner.furthest_index,
                    vec![inner.clone()],
                );
                ParseOutcome {
                    output: None,
                    next_index: result.next_index,
                    is_success: false,
                    failures: Some(failure),
                    is_committed: result.is_committed,
                }
            }
        })
    }

    /// Discard the output and produce `value` instead.
    pub fn value<U: Clone + 'static>(self, value: U) -> Parser<U> {
        self.map(move |_| value.clone())
    }

    // ── Top level ──────────────────────────────────────────────────────

    /// Run at index 0 and require the whole stream to be consumed.
    ///
    /// A successful parse that stops short of the end is turned into an
    /// "end of input" failure layered over the parser's own trailing
    /// failure. This is the single place ordinary failure data escalates
    /// into an error value.
    pub fn parse(&self, stream: &[Token]) -> Result<T, ParseError> {
        let mut result = self.run(stream, 0);
        if result.next_index < stream.len() {
            let children = match result.failures.take() {
                Some(f) => vec![f],
                None => vec![],
            };
            result = ParseOutcome {
                output: result.output,
                next_index: result.next_index,
                is_success: false,
                failures: Some(FailureTree::new(
                    "end of input",
                    result.next_index,
                    children,
                )),
                is_committed: result.is_committed,
            };
        }
        if result.is_success {
            Ok(result
                .output
                .expect("successful outcome must carry output"))
        } else {
            Err(ParseError {
                furthest_index: result.next_index,
                failures: result.failures_of_failed().clone(),
            })
        }
    }
}

/// Record a failure tree into the running "deepest failure" slot used by
/// the repetition combinators, keeping the one that got furthest (earlier
/// entries win ties) along with the index its outcome stopped at.
fn note_deepest(
    deepest: &mut Option<(FailureTree, usize)>,
    failures: &Option<FailureTree>,
    at: usize,
) {
    if let Some(f) = failures {
        let beats = match deepest {
            Some((best, _)) => f.furthest_index > best.furthest_index,
            None => true,
        };
        if beats {
            *deepest = Some((f.clone(), at));
        }
    }
}

/// Merge the outcome of the second parser in a sequence with the failure
/// bookkeeping of the first: the reported failure is always the furthest
/// one seen across the whole chain.
fn combine_sequenced<U>(
    first_failures: Option<FailureTree>,
    first_index: usize,
    second: ParseOutcome<U>,
) -> ParseOutcome<U> {
    if second.is_success {
        let failures = furthest_failure(first_failures.into_iter().chain(second.failures));
        return ParseOutcome {
            output: second.output,
            next_index: second.next_index,
            is_success: true,
            failures,
            is_committed: false,
        };
    }
    let second_failure = second.failures_of_failed();
    // The first parser may have recorded a failure deeper than the second's.
    match first_failures {
        Some(first_failure) if first_failure.furthest_index > second_failure.furthest_index => {
            ParseOutcome {
                output: None,
                next_index: first_index,
                is_success: false,
                failures: Some(first_failure),
                is_committed: false,
            }
        }
        _ => ParseOutcome {
            output: None,
            next_index: second.next_index,
            is_success: false,
            failures: second.failures,
            is_committed: false,
        },
    }
}

// ── Primitives ─────────────────────────────────────────────────────────

/// Always succeed with `value`, consuming nothing.
pub fn success<T: Clone + 'static>(value: T) -> Parser<T> {
    Parser::new(move |_stream, index| ParseOutcome::success(value.clone(), index, None))
}

/// Always fail at the current index with the given expectation.
pub fn fail<T: 'static>(expected: impl Into<String>) -> Parser<T> {
    let expected = expected.into();
    Parser::new(move |_stream, index| {
        ParseOutcome::failure(index, FailureTree::new(expected.clone(), index, vec![]))
    })
}

/// Succeed consuming exactly one token iff the predicate holds.
pub fn test_item(
    predicate: impl Fn(&Token) -> bool + 'static,
    description: impl Into<String>,
) -> Parser<Token> {
    let description = description.into();
    Parser::new(move |stream, index| match stream.get(index) {
        Some(item) if predicate(item) => ParseOutcome::success(item.clone(), index + 1, None),
        _ => ParseOutcome::failure(index, FailureTree::new(description.clone(), index, vec![])),
    })
}

/// Match a single token of the given kind.
pub fn token(kind: TokenKind) -> Parser<Token> {
    test_item(move |t| t.kind == kind, kind.describe())
}

/// Run the given parsers in order, stopping at the first failure.
///
/// On failure the partial output (the successes so far plus the failing
/// parser's empty slot) is preserved and the failure reported is the
/// *furthest* one seen among the attempted sub-parsers, not just the last.
pub fn seq<T: 'static>(parsers: Vec<Parser<T>>) -> Parser<Vec<Option<T>>> {
    Parser::new(move |stream, start| {
        let mut index = start;
        let mut failures: Vec<FailureTree> = Vec::new();
        let mut output: Vec<Option<T>> = Vec::new();
        for parser in &parsers {
            let result = parser.run(stream, index);
            if let Some(f) = &result.failures {
                failures.push(f.clone());
            }
            output.push(result.output);
            if result.is_success {
                index = result.next_index;
                continue;
            }
            let failure =
                furthest_failure(failures).expect("failed sequence must have noted a failure");
            return ParseOutcome {
                output: Some(output),
                next_index: index,
                is_success: false,
                failures: Some(failure),
                is_committed: false,
            };
        }
        ParseOutcome {
            output: Some(output),
            next_index: index,
            is_success: true,
            failures: furthest_failure(failures),
            is_committed: false,
        }
    })
}

/// Run `parser` without consuming anything.
///
/// Success keeps the output but stays at the entry index; failure
/// propagates as-is. Used to let a region parser *fail* (and thereby
/// trigger recovery) when it stops short of the closing delimiter.
pub fn peek<T: 'static>(parser: Parser<T>) -> Parser<T> {
    Parser::new(move |stream, index| {
        let result = parser.run(stream, index);
        if result.is_success {
            ParseOutcome {
                next_index: index,
                ..result
            }
        } else {
            result
        }
    })
}

/// Yield the token just before the current index, consuming nothing.
///
/// Fails at the start of the stream. Used by span bookkeeping for empty
/// productions (an empty type sequence still needs a location).
pub fn peek_prev() -> Parser<Token> {
    Parser::new(move |stream, index| {
        if index > 0 {
            ParseOutcome::success(stream[index - 1].clone(), index, None)
        } else {
            ParseOutcome::failure(
                index,
                FailureTree::new("not the start of file", index, vec![]),
            )
        }
    })
}

/// Ordered choice over any number of parsers.
///
/// Folded over [`Parser::or_else`] starting from `fail("nothing")`, exactly
/// as the alternation registry expects: an empty `alt` fails with
/// "nothing" expected.
pub fn alt<T: 'static>(parsers: Vec<Parser<T>>) -> Parser<T> {
    let mut parser: Parser<T> = fail("nothing");
    for p in parsers {
        parser = parser.or_else(p);
    }
    parser
}

// ── The unrecoverable error ────────────────────────────────────────────

/// Raised only by the top-level [`Parser::parse`] when the failing point
/// was not wrapped by any recovery combinator.
#[derive(Debug, Clone, PartialEq)]
pub struct ParseError {
    /// Token index the parse stopped at.
    pub furthest_index: usize,
    /// The full failure explanation.
    pub failures: FailureTree,
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "expected {} at token index {}",
            self.failures.expected, self.failures.furthest_index
        )
    }
}

impl std::error::Error for ParseError {}
