//! Integration tests for the Tack type checker.
//!
//! These tests tokenize small programs, parse them, run `check`, and
//! assert on the rendered stack effect or the reported error. They cover
//! the end-to-end behaviors: literal pushes, word application through the
//! `__add__` protocol, quotations and `if_then`, casts, function and
//! class definitions, imports through the resolver boundary, and
//! best-effort checking of partially-recovered parses.

mod common;

use common::lex;
use tack_common::span::Position;
use tack_typeck::builtins::pusher;
use tack_typeck::context::Context;
use tack_typeck::env::Environment;
use tack_typeck::error::{ErrorKind, StaticAnalysisError};
use tack_typeck::infer::{CheckOptions, InferOutcome};
use tack_typeck::module::MapResolver;

// ── Helpers ────────────────────────────────────────────────────────────

fn check_source(
    ctx: &mut Context,
    source: &str,
) -> Result<InferOutcome, StaticAnalysisError> {
    check_source_with(ctx, source, &CheckOptions::default())
}

fn check_source_with(
    ctx: &mut Context,
    source: &str,
    options: &CheckOptions,
) -> Result<InferOutcome, StaticAnalysisError> {
    let tokens = lex(source);
    let program = tack_parser::parse(&tokens).expect("programs in these tests must parse");
    tack_typeck::check(ctx, &Environment::new(), &program, options)
}

fn assert_effect(source: &str, expected: &str) {
    let mut ctx = Context::new();
    let outcome = check_source(&mut ctx, source)
        .unwrap_or_else(|e| panic!("expected {source:?} to check, got error: {e}"));
    let rendered = outcome.effect.render(&ctx);
    assert_eq!(
        rendered, expected,
        "wrong stack effect for {source:?}"
    );
}

// ── End-to-end scenarios ───────────────────────────────────────────────

#[test]
fn adding_two_ints_yields_int() {
    let mut ctx = Context::new();
    let outcome = check_source(&mut ctx, "0 0 +").expect("ints are addable");
    insta::assert_snapshot!(outcome.effect.render(&ctx), @"( -- int)");
}

#[test]
fn if_then_with_empty_quotation_leaves_nothing() {
    assert_effect("True $() if_then", "( -- )");
}

#[test]
fn cast_bypasses_subtyping() {
    // String literals have no structural relation to int; casts do not
    // care.
    assert_effect("\"str\" cast (int)", "( -- int)");
}

#[test]
fn recovered_parse_still_checks() {
    // The malformed tail becomes a ParseError node; the checker must not
    // crash on it and must keep going with a fresh stack.
    let tokens = lex("0 0 + ,,,");
    let program = tack_parser::parse(&tokens).expect("recovery keeps the parse alive");
    assert!(program.parsing_failures().count() > 0);
    let mut ctx = Context::new();
    let result = tack_typeck::check(
        &mut ctx,
        &Environment::new(),
        &program,
        &CheckOptions::default(),
    );
    assert!(
        result.is_ok(),
        "parse-error nodes must not fail checking: {:?}",
        result.err()
    );
}

// ── Words and literals ─────────────────────────────────────────────────

#[test]
fn literals_push_their_types() {
    assert_effect("42", "( -- int)");
    assert_effect("\"hi\"", "( -- str)");
    assert_effect("True", "( -- bool)");
}

#[test]
fn stack_manipulation_words() {
    assert_effect("0 dup +", "( -- int)");
    assert_effect("0 \"x\" swap drop", "( -- str)");
    assert_effect("1 2 drop", "( -- int)");
}

#[test]
fn quotation_executes_against_current_stack() {
    assert_effect("1 (2 +)", "( -- int)");
}

#[test]
fn pushed_quotation_can_be_called() {
    assert_effect("$(1) call", "( -- int)");
}

#[test]
fn dropping_a_recovered_quotation_value() {
    // The quotation body fails to parse; its recovered type is still a
    // stack effect value that can be dropped.
    let tokens = lex("$(def) drop");
    let program = tack_parser::parse(&tokens).expect("recovery keeps the parse alive");
    assert_eq!(program.parsing_failures().count(), 1);
    let mut ctx = Context::new();
    let outcome = tack_typeck::check(
        &mut ctx,
        &Environment::new(),
        &program,
        &CheckOptions::default(),
    )
    .expect("checking a recovered quotation succeeds");
    assert_eq!(outcome.effect.render(&ctx), "( -- )");
}

#[test]
fn undefined_name_is_a_name_error_with_location() {
    let mut ctx = Context::new();
    let err = check_source(&mut ctx, "bogus").unwrap_err();
    assert!(matches!(err.kind, ErrorKind::Name { .. }));
    assert_eq!(err.location, Some(Position::new(1, 0)));
}

#[test]
fn type_errors_carry_the_node_location() {
    // `+` on a bool and an int: the failure points at the `+` word.
    let mut ctx = Context::new();
    let err = check_source(&mut ctx, "True 0 +").unwrap_err();
    assert_eq!(err.location, Some(Position::new(1, 7)));
}

#[test]
fn adding_unaddable_values_fails() {
    let mut ctx = Context::new();
    assert!(check_source(&mut ctx, "True True +").is_err());
}

// ── Collections ────────────────────────────────────────────────────────

#[test]
fn list_literal_takes_element_type_from_first_element() {
    assert_effect("[1, 2, 3]", "( -- list[int])");
}

#[test]
fn empty_list_is_list_of_no_return() {
    assert_effect("[]", "( -- list[NoReturn])");
}

#[test]
fn tuple_literal_collects_element_types() {
    assert_effect("(1, \"x\")", "( -- tuple[int, str])");
}

#[test]
fn list_elements_see_the_stack_below_them() {
    // Each element is a word sequence over the evolving stack; `dup`
    // duplicates the int pushed inside the same element.
    assert_effect("[1 dup +]", "( -- list[int])");
}

// ── Function definitions ───────────────────────────────────────────────

#[test]
fn funcdef_binds_the_declared_effect() {
    assert_effect("def twice (x:int -- y:int): dup +\n2 twice", "( -- int)");
}

#[test]
fn funcdef_with_indented_body() {
    assert_effect(
        "def go (x:int -- y:int):\n    dup\n    +\n1 go",
        "( -- int)",
    );
}

#[test]
fn funcdef_body_must_match_declared_output() {
    let mut ctx = Context::new();
    let err = check_source(&mut ctx, "def bad (x:int -- y:str): dup +").unwrap_err();
    match err.kind {
        ErrorKind::Type { message } => {
            assert!(
                message.contains("not compatible"),
                "unexpected message: {message}"
            );
        }
        other => panic!("expected a declared/inferred mismatch, got {other:?}"),
    }
}

#[test]
fn funcdef_can_recurse() {
    // The function's own name is in scope in its body.
    assert_effect(
        "def loop (x:int -- y:int): drop 0 loop\n9 loop",
        "( -- int)",
    );
}

#[test]
fn generalized_function_works_at_multiple_types() {
    // `id2` is polymorphic in both its item and its rest-of-stack
    // variable; applying it at two different stacks must not
    // cross-contaminate.
    assert_effect(
        "def id2 (x -- x): dup drop\n1 id2 \"s\" id2",
        "( -- int str)",
    );
}

// ── Class definitions ──────────────────────────────────────────────────

#[test]
fn classdef_builds_a_nominal_recursive_type() {
    let mut ctx = Context::new();
    let source = "class Box:\n    def get (self:Box -- r:int): drop 0";
    let outcome = check_source(&mut ctx, source).expect("classdef should check");
    let box_ty = outcome.env.get("Box").expect("Box is defined");
    assert_eq!(ctx.display(box_ty), "Box");
    assert!(matches!(
        ctx.data(box_ty),
        tack_typeck::ty::TypeData::Fix { .. }
    ));
    // The class exposes its body's definitions as attributes.
    let get = ctx.get_attribute(box_ty, "get").expect("Box has get");
    assert!(ctx.get_attribute(get, "__call__").is_ok());
}

#[test]
fn class_attribute_call_operates_on_the_rest_of_the_stack() {
    // `.get` pops the Box and runs the attribute's effect against the
    // remaining stack.
    assert_effect(
        "class Box:\n    def get (-- r:int): 0\n0 cast (Box) .get",
        "( -- int)",
    );
}

// ── Imports ────────────────────────────────────────────────────────────

fn spam_resolver(ctx: &mut Context) -> MapResolver {
    // spam exports fish : forall *s. (*s -- *s int)
    let int = ctx.primitives.int;
    let fish = pusher(ctx, int);
    let exports = ctx.mk_object(vec![("fish".to_string(), fish)]);
    let mut resolver = MapResolver::new();
    resolver.insert("spam", exports);
    resolver
}

#[test]
fn import_binds_a_module_value() {
    let mut ctx = Context::new();
    let resolver = spam_resolver(&mut ctx);
    let options = CheckOptions {
        resolver: &resolver,
        ..CheckOptions::default()
    };
    let outcome =
        check_source_with(&mut ctx, "import spam\nspam .fish", &options).expect("import checks");
    assert_eq!(outcome.effect.render(&ctx), "( -- int)");
}

#[test]
fn from_import_binds_the_member() {
    let mut ctx = Context::new();
    let resolver = spam_resolver(&mut ctx);
    let options = CheckOptions {
        resolver: &resolver,
        ..CheckOptions::default()
    };
    let outcome =
        check_source_with(&mut ctx, "from spam import fish\nfish", &options)
            .expect("from-import checks");
    assert_eq!(outcome.effect.render(&ctx), "( -- int)");
}

#[test]
fn missing_module_reports_module_not_found() {
    let mut ctx = Context::new();
    let err = check_source(&mut ctx, "import nowhere").unwrap_err();
    assert!(matches!(err.kind, ErrorKind::ModuleNotFound { .. }));
}

#[test]
fn missing_member_reports_a_type_error() {
    let mut ctx = Context::new();
    let resolver = spam_resolver(&mut ctx);
    let options = CheckOptions {
        resolver: &resolver,
        ..CheckOptions::default()
    };
    let err =
        check_source_with(&mut ctx, "from spam import chips", &options).unwrap_err();
    match err.kind {
        ErrorKind::Type { message } => {
            assert!(message.contains("chips"), "message: {message}")
        }
        other => panic!("expected a missing-member error, got {other:?}"),
    }
}

// ── Environments and scoping ───────────────────────────────────────────

#[test]
fn pushed_quotations_compose_with_call_and_drop() {
    assert_effect("$(1) call drop", "( -- )");
}

#[test]
fn check_runs_per_program_with_independent_contexts() {
    let mut a = Context::new();
    let mut b = Context::new();
    assert!(check_source(&mut a, "0 0 +").is_ok());
    assert!(check_source(&mut b, "\"x\"").is_ok());
}

// ── Effort beyond the happy path ───────────────────────────────────────

#[test]
fn stack_underflow_is_reported() {
    // `+` on an empty stack cannot match (*s addable b).
    let mut ctx = Context::new();
    let err = check_source(&mut ctx, "+").unwrap_err();
    assert!(matches!(
        err.kind,
        ErrorKind::StackMismatch { .. } | ErrorKind::Type { .. }
    ));
}

#[test]
fn attribute_on_unknown_stack_is_an_error() {
    let mut ctx = Context::new();
    let err = check_source(&mut ctx, ".fish").unwrap_err();
    assert!(matches!(err.kind, ErrorKind::Type { .. }));
}

#[test]
fn kinds_are_enforced_on_generic_application() {
    // list applied to a sequence variable is ill-kinded.
    let mut ctx = Context::new();
    let err = check_source(&mut ctx, "0 cast (list[*s])").unwrap_err();
    assert!(matches!(err.kind, ErrorKind::Type { .. }));
}
