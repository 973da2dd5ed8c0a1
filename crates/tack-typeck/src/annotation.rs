//! Lowering type annotations to types.
//!
//! The parser produces [`TypeExprNode`] trees for stack-effect
//! declarations, casts and quotation annotations; this module resolves
//! names against the environment and builds real types. Variables written
//! in annotations (`` `a ``, `*s`) are introduced into a scoped copy of
//! the environment so repeated occurrences inside one annotation mean the
//! same variable.

use tack_parser::typeexpr::{
    StackEffectTypeExpr, TypeExprNode, TypeSequenceExpr, TypeSequenceItemExpr,
};

use crate::context::Context;
use crate::env::Environment;
use crate::error::StaticAnalysisError;
use crate::kind::Kind;
use crate::ty::TypeId;

/// Lower a type expression. Returns the type and the environment extended
/// with any variables the expression introduced.
pub fn to_type(
    ctx: &mut Context,
    env: &Environment,
    expr: &TypeExprNode,
) -> Result<(TypeId, Environment), StaticAnalysisError> {
    let result = lower(ctx, env, expr);
    result.map_err(|mut e| {
        e.set_location_if_missing(expr.location());
        e
    })
}

fn lower(
    ctx: &mut Context,
    env: &Environment,
    expr: &TypeExprNode,
) -> Result<(TypeId, Environment), StaticAnalysisError> {
    match expr {
        TypeExprNode::Named(named) => match env.get(&named.name) {
            Some(ty) => Ok((ty, env.clone())),
            None => Err(StaticAnalysisError::name(
                named.name.clone(),
                Some(named.location),
            )),
        },
        TypeExprNode::Generic(generic) => {
            let (head, env) = to_type(ctx, env, &generic.head)?;
            let mut env = env;
            let mut args = Vec::with_capacity(generic.arguments.len());
            for arg in &generic.arguments {
                let (arg_ty, new_env) = to_type(ctx, &env, arg)?;
                env = new_env;
                args.push(arg_ty);
            }
            let applied = ctx.generic_apply(head, &args)?;
            Ok((applied, env))
        }
        TypeExprNode::ItemVar(var) => {
            if let Some(ty) = env.get(&var.name) {
                if !ctx.kind_of(ty).le(&Kind::Item) {
                    return Err(StaticAnalysisError::type_error(format!(
                        "{} is not an item type variable (has kind {})",
                        var.name,
                        ctx.kind_of(ty)
                    )));
                }
                return Ok((ty, env.clone()));
            }
            let fresh = ctx.fresh_bound_var(Kind::Item);
            let mut env = env.clone();
            env.insert(var.name.clone(), fresh);
            Ok((fresh, env))
        }
        TypeExprNode::SeqVar(var) => {
            if let Some(ty) = env.get(&var.name) {
                if ctx.kind_of(ty) != Kind::Sequence {
                    return Err(StaticAnalysisError::type_error(format!(
                        "{} is not a sequence type variable",
                        var.name
                    )));
                }
                return Ok((ty, env.clone()));
            }
            let fresh = ctx.fresh_seq_var();
            let mut env = env.clone();
            env.insert(var.name.clone(), fresh);
            Ok((fresh, env))
        }
        TypeExprNode::Sequence(seq) => {
            let ty = type_sequence_to_type(ctx, env, seq)?;
            Ok((ty, env.clone()))
        }
        TypeExprNode::StackEffect(effect) => {
            let ty = stack_effect_to_type(ctx, env, effect)?;
            Ok((ty, env.clone()))
        }
        TypeExprNode::Object(object) => {
            let mut temp_env = env.clone();
            let mut attributes = Vec::with_capacity(object.attributes.len());
            for (name, attr_expr) in &object.attributes {
                let (attr_ty, new_env) = to_type(ctx, &temp_env, attr_expr)?;
                temp_env = new_env;
                attributes.push((name.clone(), attr_ty));
            }
            Ok((ctx.mk_object(attributes), env.clone()))
        }
        TypeExprNode::Forall(forall) => {
            let mut temp_env = env.clone();
            let mut variables = Vec::with_capacity(forall.variables.len());
            for var_expr in &forall.variables {
                let (var_ty, new_env) = to_type(ctx, &temp_env, var_expr)?;
                temp_env = new_env;
                variables.push(var_ty);
            }
            let (body, _) = to_type(ctx, &temp_env, &forall.body)?;
            Ok((ctx.mk_generic(variables, body, false), env.clone()))
        }
        // A recovered failure inside an annotation has already been
        // reported; stand in a fresh placeholder and keep going.
        TypeExprNode::Error(_) => Ok((ctx.fresh_item_var(Kind::Item), env.clone())),
    }
}

/// Lower a plain type sequence (a quotation annotation, a parenthesized
/// sequence). A missing sequence variable means implicit stack
/// polymorphism: a fresh variable heads the sequence.
pub fn type_sequence_to_type(
    ctx: &mut Context,
    env: &Environment,
    seq: &TypeSequenceExpr,
) -> Result<TypeId, StaticAnalysisError> {
    let mut temp_env = env.clone();
    let mut elements = Vec::with_capacity(seq.items.len() + 1);
    match &seq.sequence_variable {
        None => elements.push(ctx.fresh_seq_var()),
        Some(var) => {
            if let Some(existing) = temp_env.get(&var.name) {
                elements.push(existing);
            } else {
                let fresh = ctx.fresh_seq_var();
                temp_env.insert(var.name.clone(), fresh);
                elements.push(fresh);
            }
        }
    }
    for item in &seq.items {
        let (ty, new_env) = lower_sequence_item(ctx, &temp_env, item, &mut Environment::new())?;
        temp_env = new_env;
        elements.push(ty);
    }
    ctx.mk_sequence(&elements)
}

/// Lower a stack-effect annotation.
///
/// When neither side names a sequence variable, input and output share
/// one fresh variable: `(int -- int)` means `(*s int -- *s int)`.
pub fn stack_effect_to_type(
    ctx: &mut Context,
    env: &Environment,
    effect: &StackEffectTypeExpr,
) -> Result<TypeId, StaticAnalysisError> {
    let mut new_env = env.clone();
    // Names already used for stack items in this annotation.
    let mut known_item_names = Environment::new();

    let a_bar = match &effect.input.sequence_variable {
        Some(in_var) => match new_env.get(&in_var.name) {
            Some(existing) => {
                if ctx.kind_of(existing) != Kind::Sequence {
                    return Err(StaticAnalysisError::type_error(format!(
                        "{} is not a sequence type variable",
                        in_var.name
                    )));
                }
                existing
            }
            None => {
                let fresh = ctx.fresh_seq_var();
                new_env.insert(in_var.name.clone(), fresh);
                fresh
            }
        },
        None => ctx.fresh_seq_var(),
    };
    let b_bar = match &effect.output.sequence_variable {
        Some(out_var) => match new_env.get(&out_var.name) {
            Some(existing) => existing,
            None => {
                let fresh = ctx.fresh_seq_var();
                new_env.insert(out_var.name.clone(), fresh);
                fresh
            }
        },
        // An unannotated output reuses the input's rest: the effect
        // neither consumes nor produces below its named items.
        None => a_bar,
    };

    let mut in_types = Vec::with_capacity(effect.input.items.len() + 1);
    in_types.push(a_bar);
    for item in &effect.input.items {
        let (ty, env2) = lower_sequence_item(ctx, &new_env, item, &mut known_item_names)?;
        new_env = env2;
        in_types.push(ty);
    }
    let mut out_types = Vec::with_capacity(effect.output.items.len() + 1);
    out_types.push(b_bar);
    for item in &effect.output.items {
        let (ty, env2) = lower_sequence_item(ctx, &new_env, item, &mut known_item_names)?;
        new_env = env2;
        out_types.push(ty);
    }

    let input = ctx.mk_sequence(&in_types)?;
    let output = ctx.mk_sequence(&out_types)?;
    Ok(ctx.mk_stack_effect(input, output))
}

/// Lower one `name`, `name:type` or bare-type item of a sequence.
///
/// A bare name either reuses the type of an earlier item with the same
/// name (so `(a a -- a)` relates all three) or gets a fresh item
/// variable.
fn lower_sequence_item(
    ctx: &mut Context,
    env: &Environment,
    item: &TypeSequenceItemExpr,
    known_item_names: &mut Environment,
) -> Result<(TypeId, Environment), StaticAnalysisError> {
    if let Some(name) = &item.name {
        if let Some(known) = known_item_names.get(name) {
            if item.ty.is_some() {
                return Err(StaticAnalysisError::type_error(format!(
                    "{name} is associated with a type more than once in this sequence of types"
                )));
            }
            return Ok((known, env.clone()));
        }
    }
    let (ty, env) = match &item.ty {
        Some(ty_expr) => to_type(ctx, env, ty_expr)?,
        None => (ctx.fresh_item_var(Kind::Item), env.clone()),
    };
    if let Some(name) = &item.name {
        known_item_names.insert(name.clone(), ty);
    }
    Ok((ty, env))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builtins::preamble_environment;
    use crate::ty::TypeData;
    use tack_common::span::Position;
    use tack_parser::typeexpr::{NamedTypeExpr, VarTypeExpr};

    fn pos() -> Position {
        Position::new(1, 0)
    }

    fn named(name: &str) -> TypeExprNode {
        TypeExprNode::Named(NamedTypeExpr {
            name: name.into(),
            location: pos(),
            end_location: pos(),
        })
    }

    fn item(name: Option<&str>, ty: Option<TypeExprNode>) -> TypeSequenceItemExpr {
        TypeSequenceItemExpr {
            name: name.map(Into::into),
            ty,
            location: pos(),
            end_location: pos(),
        }
    }

    fn effect(
        in_var: Option<&str>,
        in_items: Vec<TypeSequenceItemExpr>,
        out_var: Option<&str>,
        out_items: Vec<TypeSequenceItemExpr>,
    ) -> StackEffectTypeExpr {
        let var = |name: Option<&str>| {
            name.map(|n| VarTypeExpr {
                name: n.into(),
                location: pos(),
                end_location: pos(),
            })
        };
        StackEffectTypeExpr {
            input: TypeSequenceExpr {
                sequence_variable: var(in_var),
                items: in_items,
                location: pos(),
                end_location: pos(),
            },
            output: TypeSequenceExpr {
                sequence_variable: var(out_var),
                items: out_items,
                location: pos(),
                end_location: pos(),
            },
            location: pos(),
            end_location: pos(),
        }
    }

    #[test]
    fn named_type_resolves_through_environment() {
        let mut ctx = Context::new();
        let env = preamble_environment(&mut ctx);
        let (ty, _) = to_type(&mut ctx, &env, &named("int")).unwrap();
        assert_eq!(ty, ctx.primitives.int);
    }

    #[test]
    fn unknown_named_type_is_a_name_error() {
        let mut ctx = Context::new();
        let env = Environment::new();
        let err = to_type(&mut ctx, &env, &named("mystery")).unwrap_err();
        assert!(matches!(err.kind, crate::error::ErrorKind::Name { .. }));
        assert!(err.location.is_some());
    }

    #[test]
    fn unannotated_effect_shares_one_sequence_variable() {
        let mut ctx = Context::new();
        let env = preamble_environment(&mut ctx);
        // (int -- int) means (*s int -- *s int) with the same *s.
        let expr = effect(
            None,
            vec![item(Some("x"), Some(named("int")))],
            None,
            vec![item(Some("x"), None)],
        );
        let ty = stack_effect_to_type(&mut ctx, &env, &expr).unwrap();
        let TypeData::StackEffect { input, output } = ctx.data(ty).clone() else {
            panic!("expected a stack effect");
        };
        let in_seq = ctx.seq(input).clone();
        let out_seq = ctx.seq(output).clone();
        assert_eq!(in_seq.rest, out_seq.rest, "input and output share the rest");
        // The named item `x` reuses the same type on both sides.
        assert_eq!(in_seq.items, out_seq.items);
        assert_eq!(in_seq.items, vec![ctx.primitives.int]);
    }

    #[test]
    fn named_sequence_variables_are_distinct_when_different() {
        let mut ctx = Context::new();
        let env = preamble_environment(&mut ctx);
        let expr = effect(Some("s"), vec![], Some("t"), vec![]);
        let ty = stack_effect_to_type(&mut ctx, &env, &expr).unwrap();
        let TypeData::StackEffect { input, output } = ctx.data(ty).clone() else {
            panic!("expected a stack effect");
        };
        assert_ne!(ctx.seq(input).rest, ctx.seq(output).rest);
    }

    #[test]
    fn generic_application_lowers_through_apply() {
        let mut ctx = Context::new();
        let env = preamble_environment(&mut ctx);
        let expr = TypeExprNode::Generic(tack_parser::typeexpr::GenericTypeExpr {
            head: Box::new(named("list")),
            arguments: vec![named("int")],
            location: pos(),
            end_location: pos(),
        });
        let (ty, _) = to_type(&mut ctx, &env, &expr).unwrap();
        assert_eq!(ctx.display(ty), "list[int]");
    }

    #[test]
    fn annotation_error_node_lowers_to_placeholder() {
        let mut ctx = Context::new();
        let env = Environment::new();
        let error = TypeExprNode::Error(Box::new(tack_parser::ast::ParseErrorNode::new(
            tack_parser::combinators::FailureTree::new("a type", 0, vec![]),
            vec![],
            pos(),
        )));
        let (ty, _) = to_type(&mut ctx, &env, &error).unwrap();
        assert!(matches!(ctx.data(ty), TypeData::Variable(_)));
    }
}
