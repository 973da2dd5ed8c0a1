//! Tack type checker: structural/row-polymorphic inference over stack
//! effects.
//!
//! This crate assigns a stack effect to every word of a parsed Tack
//! program, using Hindley-Milner-flavored inference extended to stack
//! shapes: constraint-based subtyping that simultaneously binds free type
//! variables, gradual-typing-style coercions, generics, nominal brands,
//! and recursive (`Fix`) types.
//!
//! # Architecture
//!
//! - [`kind`]: the kind lattice used to reject ill-formed applications
//! - [`ty`]: the arena'd type representation ([`ty::TypeData`])
//! - [`context`]: the per-compilation [`Context`] (arena, caches,
//!   primitives)
//! - [`subst`]: immutable substitutions
//! - [`constrain`]: the subtyping/unification engine
//! - [`env`]: copy-on-write typing environments
//! - [`builtins`]: primitive types and the preamble
//! - [`annotation`]: lowering annotation ASTs to types
//! - [`infer`]: the inference driver over the parser's AST
//! - [`module`]: the module-resolver boundary
//! - [`error`] / [`diagnostics`]: error values and rendering

pub mod annotation;
pub mod builtins;
pub mod constrain;
pub mod context;
pub mod diagnostics;
pub mod env;
pub mod error;
pub mod infer;
pub mod kind;
pub mod module;
pub mod subst;
pub mod ty;

use tack_parser::ast::TopLevelNode;

use crate::context::Context;
use crate::env::Environment;
use crate::error::StaticAnalysisError;
use crate::infer::{CheckOptions, InferOutcome};

/// Type-check a parsed Tack program.
///
/// The preamble environment is installed beneath `environment`, the
/// program is inferred starting from an empty stack, and the final
/// substitution, overall stack effect, and resulting environment are
/// returned. The checker tolerates recovered parse failures in the tree
/// (they reset the stack rather than crashing); it is the caller's job to
/// also surface [`TopLevelNode::parsing_failures`].
pub fn check(
    ctx: &mut Context,
    environment: &Environment,
    program: &TopLevelNode,
    options: &CheckOptions,
) -> Result<InferOutcome, StaticAnalysisError> {
    let preamble = builtins::preamble_environment(ctx);
    let merged = preamble.extended_with(environment);
    infer::infer(ctx, &merged, &program.children, true, None, options)
}
