//! The inference driver.
//!
//! Walks the AST the recoverable parser produced, consulting the type
//! model and invoking the constraint solver to build up a substitution
//! and a resulting stack effect. Inference is fail-fast per call: the
//! first type error aborts, carrying the source location of the node
//! being processed (unless a deeper raise site already attached one).
//! Callers wanting to accumulate errors run `infer` per top-level
//! statement.
//!
//! The checker runs even in the presence of parse failures: a recovered
//! [`Node::ParseError`] leaf resets the effect to an unconstrained stack
//! instead of crashing, treating the failure as already reported.

use std::path::PathBuf;

use rustc_hash::FxHashSet;
use tack_parser::ast::Node;

use crate::annotation;
use crate::builtins::pusher;
use crate::constrain::{constrain_and_bind_variables, RigidVariables};
use crate::context::Context;
use crate::env::Environment;
use crate::error::StaticAnalysisError;
use crate::kind::{GenericKind, Kind};
use crate::module::{self, ModuleResolver, NoModules};
use crate::subst::Substitutions;
use crate::ty::{TypeData, TypeId};

/// A stack effect under inference: two sequence handles.
#[derive(Debug, Clone, Copy)]
pub struct Effect {
    pub input: TypeId,
    pub output: TypeId,
}

impl Effect {
    /// Render as `(in -- out)`.
    pub fn render(&self, ctx: &Context) -> String {
        format!(
            "({} -- {})",
            ctx.display_members(self.input, " "),
            ctx.display_members(self.output, " ")
        )
    }

    fn apply(
        &self,
        ctx: &mut Context,
        sub: &Substitutions,
    ) -> Result<Effect, StaticAnalysisError> {
        Ok(Effect {
            input: ctx.apply_subst(sub, self.input)?,
            output: ctx.apply_subst(sub, self.output)?,
        })
    }
}

/// What `infer` produces: the accumulated substitution, the overall
/// effect of the checked words, and the (possibly extended) environment.
#[derive(Debug)]
pub struct InferOutcome {
    pub substitutions: Substitutions,
    pub effect: Effect,
    pub env: Environment,
}

static NO_MODULES: NoModules = NoModules;

/// Knobs threaded through inference.
pub struct CheckOptions<'a> {
    pub resolver: &'a dyn ModuleResolver,
    pub source_dir: PathBuf,
    /// When false, function bodies are trusted to match their declared
    /// effects (stub mode).
    pub check_bodies: bool,
}

impl Default for CheckOptions<'static> {
    fn default() -> Self {
        CheckOptions {
            resolver: &NO_MODULES,
            source_dir: PathBuf::from("."),
            check_bodies: true,
        }
    }
}

/// Infer the composite stack effect of a sequence of nodes.
///
/// `initial_stack` seeds the effect; `None` means the empty stack at top
/// level and an unconstrained rest-of-stack variable elsewhere.
pub fn infer(
    ctx: &mut Context,
    gamma: &Environment,
    nodes: &[Node],
    is_top_level: bool,
    initial_stack: Option<TypeId>,
    options: &CheckOptions,
) -> Result<InferOutcome, StaticAnalysisError> {
    let mut gamma = gamma.clone();
    let initial = match initial_stack {
        Some(stack) => stack,
        None if is_top_level => ctx.empty_sequence(),
        None => {
            let rest = ctx.fresh_seq_var();
            ctx.mk_sequence(&[rest])?
        }
    };
    let mut state = State {
        substitutions: Substitutions::empty(),
        effect: Effect {
            input: initial,
            output: initial,
        },
    };
    for node in nodes {
        if let Err(mut e) = infer_node(ctx, &mut gamma, &mut state, node, options) {
            e.set_location_if_missing(node.location());
            return Err(e);
        }
    }
    Ok(InferOutcome {
        substitutions: state.substitutions,
        effect: state.effect,
        env: gamma,
    })
}

struct State {
    substitutions: Substitutions,
    effect: Effect,
}

fn no_rigid() -> RigidVariables {
    RigidVariables::default()
}

fn infer_node(
    ctx: &mut Context,
    gamma: &mut Environment,
    state: &mut State,
    node: &Node,
    options: &CheckOptions,
) -> Result<(), StaticAnalysisError> {
    match node {
        Node::Number(_) => {
            let int = ctx.primitives.int;
            state.effect.output = push_onto(ctx, state.effect.output, int)?;
            Ok(())
        }

        Node::Str(_) => {
            let str_ = ctx.primitives.str_;
            state.effect.output = push_onto(ctx, state.effect.output, str_)?;
            Ok(())
        }

        // Executing a name: look it up, instantiate, take its __call__,
        // and match the current stack against the callee's input.
        Node::Name(name) => {
            let gamma_sub = gamma.apply_substitution(ctx, &state.substitutions)?;
            let Some(ty) = gamma_sub.get(&name.value) else {
                return Err(StaticAnalysisError::name(
                    name.value.clone(),
                    Some(name.location),
                ));
            };
            let ty = ctx.instantiate(ty)?;
            let call = ctx.get_attribute(ty, "__call__")?;
            let call = ctx.instantiate(call)?;
            let TypeData::StackEffect { input, output } = ctx.data(call).clone() else {
                return Err(StaticAnalysisError::unhandled_node(format!(
                    "name {} of type {}",
                    name.value,
                    ctx.display(call)
                )));
            };
            apply_callee(ctx, state, input, output)
        }

        // Calling an attribute of the value on top of the stack.
        Node::Attribute(attr) => {
            let (rest, top) = pop_top(ctx, state.effect.output)?;
            let attr_ty = ctx.get_attribute(top, &attr.value)?;
            let attr_ty = ctx.instantiate(attr_ty)?;
            let TypeData::StackEffect { input, output } = ctx.data(attr_ty).clone() else {
                return Err(StaticAnalysisError::unhandled_node(format!(
                    "attribute {} of type {}",
                    attr.value,
                    ctx.display(attr_ty)
                )));
            };
            let constraint =
                constrain_and_bind_variables(ctx, rest, input, &no_rigid(), &[])?;
            state.substitutions = constraint.compose(ctx, &state.substitutions)?;
            state.effect = Effect {
                input: state.effect.input,
                output,
            }
            .apply(ctx, &state.substitutions)?;
            Ok(())
        }

        // $word pushes a value instead of executing it.
        Node::Push(push) => match push.child.as_ref() {
            Node::Attribute(attr) => {
                let (rest, top) = pop_top(ctx, state.effect.output)?;
                let attr_ty = ctx.get_attribute(top, &attr.value)?;
                let attr_ty = ctx.instantiate(attr_ty)?;
                state.effect.output = push_onto(ctx, rest, attr_ty)?;
                Ok(())
            }
            Node::Name(name) => {
                let Some(ty) = gamma.get(&name.value) else {
                    return Err(StaticAnalysisError::name(
                        name.value.clone(),
                        Some(name.location),
                    ));
                };
                let ty = ctx.instantiate(ty)?;
                let ty = ctx.apply_subst(&state.substitutions, ty)?;
                state.effect.output = push_onto(ctx, state.effect.output, ty)?;
                Ok(())
            }
            Node::Quote(quote) => {
                let input_stack = match &quote.input_stack_type {
                    Some(annotation) => {
                        annotation::type_sequence_to_type(ctx, gamma, annotation)?
                    }
                    None => {
                        // Most quotations consume nothing; default to an
                        // unconstrained rest of stack.
                        let rest = ctx.fresh_seq_var();
                        ctx.mk_sequence(&[rest])?
                    }
                };
                let gamma_sub = gamma.apply_substitution(ctx, &state.substitutions)?;
                let inner = infer(
                    ctx,
                    &gamma_sub,
                    &quote.children,
                    false,
                    Some(input_stack),
                    options,
                )?;
                let quotation =
                    ctx.mk_stack_effect(inner.effect.input, inner.effect.output);
                state.substitutions =
                    inner.substitutions.compose(ctx, &state.substitutions)?;
                let effect = state.effect.apply(ctx, &inner.substitutions)?;
                state.effect = Effect {
                    input: effect.input,
                    output: push_onto(ctx, effect.output, quotation)?,
                };
                Ok(())
            }
            other => Err(StaticAnalysisError::unhandled_node(format!(
                "quoted word at {}",
                other.location()
            ))),
        },

        // An executed quotation: its body continues from the current
        // stack.
        Node::Quote(quote) => {
            let input_stack = match &quote.input_stack_type {
                Some(annotation) => {
                    let annotated = annotation::type_sequence_to_type(ctx, gamma, annotation)?;
                    let constraint = constrain_and_bind_variables(
                        ctx,
                        state.effect.output,
                        annotated,
                        &no_rigid(),
                        &[],
                    )?;
                    state.substitutions = constraint.compose(ctx, &state.substitutions)?;
                    annotated
                }
                None => state.effect.output,
            };
            let inner = infer(ctx, gamma, &quote.children, false, Some(input_stack), options)?;
            state.substitutions = inner.substitutions.compose(ctx, &state.substitutions)?;
            let next = Effect {
                input: state.effect.input,
                output: inner.effect.output,
            };
            state.effect = next.apply(ctx, &inner.substitutions)?;
            Ok(())
        }

        Node::List(list) => {
            let element_lists: Vec<&Vec<Node>> = list.elements.iter().collect();
            let (collected, element_types) =
                infer_elements(ctx, gamma, state, &element_lists, options)?;
            // The element type comes from the first element; the others
            // were checked against the evolving stack only.
            let element_type = element_types
                .first()
                .copied()
                .unwrap_or(ctx.primitives.no_return);
            let list_generic = ctx.primitives.list;
            let list_ty = ctx.generic_apply(list_generic, &[element_type])?;
            let output = push_onto(ctx, collected, list_ty)?;
            state.effect = Effect {
                input: state.effect.input,
                output,
            }
            .apply(ctx, &state.substitutions)?;
            Ok(())
        }

        Node::Tuple(tuple) => {
            let element_lists: Vec<&Vec<Node>> = tuple.elements.iter().collect();
            let (collected, element_types) =
                infer_elements(ctx, gamma, state, &element_lists, options)?;
            let tuple_generic = ctx.primitives.tuple;
            let tuple_ty = ctx.generic_apply(tuple_generic, &element_types)?;
            let output = push_onto(ctx, collected, tuple_ty)?;
            state.effect = Effect {
                input: state.effect.input,
                output,
            }
            .apply(ctx, &state.substitutions)?;
            Ok(())
        }

        // Casts replace the top of the stack unconditionally; no
        // subtyping between the old and new types is checked.
        Node::Cast(cast) => {
            let (new_type, _) = annotation::to_type(ctx, gamma, &cast.ty)?;
            let (rest, _discarded) = pop_top(ctx, state.effect.output)?;
            let output = push_onto(ctx, rest, new_type)?;
            state.effect = Effect {
                input: state.effect.input,
                output,
            }
            .apply(ctx, &state.substitutions)?;
            Ok(())
        }

        Node::Funcdef(funcdef) => {
            let gamma_sub = gamma.apply_substitution(ctx, &state.substitutions)?;
            let declared = annotation::stack_effect_to_type(ctx, &gamma_sub, &funcdef.effect)?;
            let declared = ctx.apply_subst(&state.substitutions, declared)?;
            let TypeData::StackEffect {
                input: declared_in,
                output: declared_out,
            } = ctx.data(declared).clone()
            else {
                return Err(StaticAnalysisError::type_error(format!(
                    "declared type of {} must be a stack effect, got {}",
                    funcdef.name,
                    ctx.display(declared)
                )));
            };
            let generalized = generalized_wrt(ctx, declared, &gamma_sub)?;
            if options.check_bodies {
                // The function may recurse: its own (generalized) type is
                // in scope while checking the body.
                let mut recursion_env = gamma.clone();
                recursion_env.insert(funcdef.name.clone(), generalized);
                let recursion_env =
                    recursion_env.apply_substitution(ctx, &state.substitutions)?;
                let inner = infer(
                    ctx,
                    &recursion_env,
                    &funcdef.body,
                    false,
                    Some(declared_in),
                    options,
                )?;
                // The inferred outputs must be subtypes of the declared
                // outputs; the enclosing environment's variables are
                // rigid while we check.
                let rigid: RigidVariables = recursion_env
                    .free_type_variables(ctx)
                    .into_iter()
                    .collect::<FxHashSet<_>>();
                match constrain_and_bind_variables(
                    ctx,
                    inner.effect.output,
                    declared_out,
                    &rigid,
                    &[],
                ) {
                    Ok(constraint) => {
                        state.substitutions =
                            constraint.compose(ctx, &state.substitutions)?;
                    }
                    Err(_) => {
                        let inferred = inner.effect.render(ctx);
                        return Err(StaticAnalysisError::type_error(format!(
                            "declared function type {} is not compatible with inferred type {inferred}",
                            ctx.display(declared)
                        )));
                    }
                }
            }
            let gamma_sub = gamma.apply_substitution(ctx, &state.substitutions)?;
            let final_ty = generalized_wrt(ctx, declared, &gamma_sub)?;
            gamma.insert(funcdef.name.clone(), final_ty);
            Ok(())
        }

        Node::Classdef(classdef) => {
            let mut temp_gamma = gamma.clone();
            let mut type_parameters = Vec::new();
            for param_expr in &classdef.type_parameters {
                let (param, new_env) = annotation::to_type(ctx, &temp_gamma, param_expr)?;
                temp_gamma = new_env;
                type_parameters.push(param);
            }
            let kind = if type_parameters.is_empty() {
                Kind::Individual
            } else {
                Kind::Generic(GenericKind {
                    parameters: type_parameters.iter().map(|p| ctx.kind_of(*p)).collect(),
                    result: Box::new(Kind::Individual),
                })
            };
            // The class's own name refers to this placeholder inside the
            // body; tying the knot happens through Fix below.
            let self_type = ctx.fresh_bound_var(kind);
            temp_gamma.insert(classdef.name.clone(), self_type);
            let empty = ctx.empty_sequence();
            let inner = infer(ctx, &temp_gamma, &classdef.body, false, Some(empty), options)?;
            // The attributes are the names the body introduced.
            let mut attributes: Vec<(String, TypeId)> = inner
                .env
                .iter()
                .filter(|(name, _)| !temp_gamma.contains(name))
                .map(|(name, ty)| (name.to_string(), ty))
                .collect();
            attributes.sort_by(|a, b| a.0.cmp(&b.0));
            let brand = ctx.mk_brand(classdef.name.clone(), Kind::Individual, vec![]);
            let body_obj = ctx.mk_object(attributes);
            let nominal = ctx.mk_nominal(brand, body_obj);
            let ty = if type_parameters.is_empty() {
                nominal
            } else {
                ctx.mk_generic(type_parameters, nominal, classdef.is_variadic())
            };
            let fixed = ctx.mk_fix(self_type, ty);
            ctx.set_name(fixed, classdef.name.clone());
            gamma.insert(classdef.name.clone(), fixed);
            Ok(())
        }

        Node::Import(import) => {
            match &import.imported_name {
                // from module import name [as alias]
                Some(imported) => {
                    let exports =
                        options
                            .resolver
                            .resolve(&import.module, &options.source_dir, ctx)?;
                    let member = ctx.get_attribute(exports, imported).map_err(|_| {
                        StaticAnalysisError::type_error(format!(
                            "cannot find {imported} in module {}",
                            import.module
                        ))
                    })?;
                    let member = ctx.apply_subst(&state.substitutions, member)?;
                    let bound = import.asname.clone().unwrap_or_else(|| imported.clone());
                    gamma.insert(bound, member);
                }
                // import module [as alias]
                None => {
                    let exports =
                        options
                            .resolver
                            .resolve(&import.module, &options.source_dir, ctx)?;
                    match &import.asname {
                        Some(alias) => {
                            let innermost =
                                module::module_value_type(ctx, &import.module, exports);
                            let word = pusher(ctx, innermost);
                            gamma.insert(alias.clone(), word);
                        }
                        None => {
                            let nested =
                                module::nested_module_type(ctx, &import.module, exports);
                            let word = pusher(ctx, nested);
                            let first = import
                                .module
                                .split('.')
                                .next()
                                .expect("module paths are nonempty")
                                .to_string();
                            gamma.insert(first, word);
                        }
                    }
                }
            }
            Ok(())
        }

        // A recovered parse failure: already reported by the parser.
        // Continue with an unconstrained stack so later words still get
        // best-effort checking.
        Node::ParseError(_) => {
            let rest = ctx.fresh_seq_var();
            state.effect.output = ctx.mk_sequence(&[rest])?;
            Ok(())
        }

        Node::TopLevel(_) | Node::TypeExpr(_) => Err(StaticAnalysisError::unhandled_node(
            format!("node at {}", node.location()),
        )),
    }
}

// ── Helpers ────────────────────────────────────────────────────────────

/// Push an individual type onto a stack shape.
fn push_onto(
    ctx: &mut Context,
    stack: TypeId,
    ty: TypeId,
) -> Result<TypeId, StaticAnalysisError> {
    ctx.mk_sequence(&[stack, ty])
}

/// Split a stack shape into its top item and the rest.
fn pop_top(ctx: &mut Context, stack: TypeId) -> Result<(TypeId, TypeId), StaticAnalysisError> {
    let seq = ctx.seq(stack).clone();
    match seq.items.last().copied() {
        Some(top) => {
            let mut items = seq.items;
            items.pop();
            let rest = ctx.alloc(TypeData::Sequence(crate::ty::SeqData {
                rest: seq.rest,
                items,
            }));
            Ok((rest, top))
        }
        None => Err(StaticAnalysisError::type_error(format!(
            "not enough is known about the stack here to take its top item (stack is {})",
            ctx.display(stack)
        ))),
    }
}

/// Match the current output against a callee's input and continue with
/// its output.
fn apply_callee(
    ctx: &mut Context,
    state: &mut State,
    input: TypeId,
    output: TypeId,
) -> Result<(), StaticAnalysisError> {
    let constraint =
        constrain_and_bind_variables(ctx, state.effect.output, input, &no_rigid(), &[])?;
    state.substitutions = constraint.compose(ctx, &state.substitutions)?;
    state.effect = Effect {
        input: state.effect.input,
        output,
    }
    .apply(ctx, &state.substitutions)?;
    Ok(())
}

/// Infer the element word-sequences of a list or tuple literal. Each
/// element is checked against the evolving stack and must leave exactly
/// one new item, which is popped off as the element's type.
fn infer_elements(
    ctx: &mut Context,
    gamma: &Environment,
    state: &mut State,
    elements: &[&Vec<Node>],
    options: &CheckOptions,
) -> Result<(TypeId, Vec<TypeId>), StaticAnalysisError> {
    let mut collected = state.effect.output;
    let mut element_types = Vec::with_capacity(elements.len());
    for element in elements {
        let gamma_sub = gamma.apply_substitution(ctx, &state.substitutions)?;
        let inner = infer(ctx, &gamma_sub, element, false, Some(collected), options)?;
        let (rest, top) = pop_top(ctx, inner.effect.output)?;
        element_types.push(top);
        collected = rest;
        state.substitutions = inner.substitutions.compose(ctx, &state.substitutions)?;
    }
    Ok((collected, element_types))
}

/// Generalize a stack effect over the variables not free in the
/// environment.
pub fn generalized_wrt(
    ctx: &mut Context,
    effect_ty: TypeId,
    env: &Environment,
) -> Result<TypeId, StaticAnalysisError> {
    let env_ftv = env.free_type_variables(ctx);
    let parameters: Vec<TypeId> = ctx
        .free_type_variables(effect_ty)
        .into_iter()
        .filter(|v| !env_ftv.contains(v))
        .collect();
    if parameters.is_empty() {
        Ok(effect_ty)
    } else {
        Ok(ctx.mk_generic(parameters, effect_ty, false))
    }
}
