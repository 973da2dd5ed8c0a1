//! The constraint solver: subtyping ⊗ binding of free variables.
//!
//! [`constrain_and_bind_variables`] simultaneously checks that one type is
//! a subtype of another and produces a [`Substitutions`] binding free
//! variables so the check holds. It operates over both individual types
//! and stack-shape sequences, with occurs checks, rigid-variable
//! handling, and assumption-based cycle breaking for recursive types.
//!
//! The implementation is one exhaustive case analysis over the pair of
//! type representations; the order of the cases is load-bearing and
//! mirrors the dispatch discipline of the subtyping rules:
//!
//! 1. identity / bottom / top short-circuits and assumption lookup,
//! 2. recursive-type unrolling (subtype side first),
//! 3. variable binding on either side,
//! 4. Optional's dedicated two-branch rule,
//! 5. generic instantiation and polytype subsumption,
//! 6. stack-sequence matching from the top of the stack down,
//! 7. structural, constructor, nominal and overload rules.

use rustc_hash::FxHashSet;

use crate::context::Context;
use crate::error::{format_subkinding_error, format_subtyping_error, StaticAnalysisError};
use crate::kind::Kind;
use crate::subst::Substitutions;
use crate::ty::{TypeData, TypeId, VarFlavor};

/// The set of variables that must not be specialized while solving.
pub type RigidVariables = FxHashSet<TypeId>;

/// Check `subtype <: supertype`, binding free variables as needed.
///
/// Fails with a [`StaticAnalysisError`] when no substitution makes the
/// relation hold. `subtyping_assumptions` carries the in-progress pairs
/// used to terminate recursive-type checks. Every produced substitution
/// records the query it answered in its provenance trail, innermost
/// first.
pub fn constrain_and_bind_variables(
    ctx: &mut Context,
    subtype: TypeId,
    supertype: TypeId,
    rigid_variables: &RigidVariables,
    subtyping_assumptions: &[(TypeId, TypeId)],
) -> Result<Substitutions, StaticAnalysisError> {
    let mut result = constrain_inner(
        ctx,
        subtype,
        supertype,
        rigid_variables,
        subtyping_assumptions,
    )?;
    result.add_subtyping_provenance((subtype, supertype));
    Ok(result)
}

fn constrain_inner(
    ctx: &mut Context,
    subtype: TypeId,
    supertype: TypeId,
    rigid_variables: &RigidVariables,
    subtyping_assumptions: &[(TypeId, TypeId)],
) -> Result<Substitutions, StaticAnalysisError> {
    // ── 1. Short-circuits ──────────────────────────────────────────────
    if subtype == supertype {
        return Ok(Substitutions::empty());
    }
    if subtyping_assumptions
        .iter()
        .any(|&(a, b)| a == subtype && b == supertype)
    {
        return Ok(Substitutions::empty());
    }
    if matches!(ctx.data(subtype), TypeData::NoReturn) {
        // Bottom is below everything, before any structural dispatch.
        return Ok(Substitutions::empty());
    }
    let sub_kind = ctx.kind_of(subtype);
    if ctx.is_object_type(supertype)
        && sub_kind != Kind::Sequence
        && !matches!(sub_kind, Kind::Generic(_))
    {
        // Everything individual is below object, before any structural
        // dispatch.
        return Ok(Substitutions::empty());
    }

    // ── 2. Recursive types ─────────────────────────────────────────────
    if matches!(ctx.data(subtype), TypeData::Fix { .. }) {
        let unrolled = ctx.unroll_fix(subtype)?;
        let assumptions = with_assumption(subtyping_assumptions, subtype, supertype);
        return constrain_and_bind_variables(ctx, unrolled, supertype, rigid_variables, &assumptions);
    }
    if matches!(ctx.data(supertype), TypeData::Fix { .. })
        && matches!(
            ctx.data(subtype),
            TypeData::OptionalTy { .. } | TypeData::Object { .. } | TypeData::Nominal { .. }
        )
    {
        let unrolled = ctx.unroll_fix(supertype)?;
        let assumptions = with_assumption(subtyping_assumptions, subtype, supertype);
        return constrain_and_bind_variables(ctx, subtype, unrolled, rigid_variables, &assumptions);
    }

    // ── 3. Variables ───────────────────────────────────────────────────
    if let Some(sub_var) = ctx.var_data(subtype).cloned() {
        if sub_var.kind == Kind::Sequence {
            return constrain_sequence_variable_below(
                ctx,
                subtype,
                supertype,
                rigid_variables,
            );
        }
        return constrain_item_variable_below(
            ctx,
            subtype,
            supertype,
            rigid_variables,
            subtyping_assumptions,
        );
    }
    if ctx.var_data(supertype).is_some() {
        return constrain_below_variable(
            ctx,
            subtype,
            supertype,
            rigid_variables,
            subtyping_assumptions,
        );
    }

    // ── 4. Optional ────────────────────────────────────────────────────
    if let TypeData::OptionalTy { argument: sub_arg } = *ctx.data(subtype) {
        if let TypeData::OptionalTy { argument: sup_arg } = *ctx.data(supertype) {
            return constrain_and_bind_variables(
                ctx,
                sub_arg,
                sup_arg,
                rigid_variables,
                subtyping_assumptions,
            );
        }
        // Optional[T] <: S requires none <: S and T <: S.
        let none = ctx.primitives.none;
        let first =
            constrain_and_bind_variables(ctx, none, supertype, rigid_variables, subtyping_assumptions)?;
        let sub_arg = ctx.apply_subst(&first, sub_arg)?;
        let supertype = ctx.apply_subst(&first, supertype)?;
        let second = constrain_and_bind_variables(
            ctx,
            sub_arg,
            supertype,
            rigid_variables,
            subtyping_assumptions,
        )?;
        return second.compose(ctx, &first);
    }
    if let TypeData::OptionalTy { argument } = *ctx.data(supertype) {
        // T <: Optional[U] holds if T <: none or T <: U, none first,
        // independent of ordinary structural matching.
        let none = ctx.primitives.none;
        match constrain_and_bind_variables(ctx, subtype, none, rigid_variables, subtyping_assumptions)
        {
            Ok(sub) => return Ok(sub),
            Err(_) => {
                return constrain_and_bind_variables(
                    ctx,
                    subtype,
                    argument,
                    rigid_variables,
                    subtyping_assumptions,
                )
            }
        }
    }

    // ── 5. Generics ────────────────────────────────────────────────────
    if matches!(ctx.data(subtype), TypeData::Generic { .. }) {
        return constrain_generic_below(
            ctx,
            subtype,
            supertype,
            rigid_variables,
            subtyping_assumptions,
        );
    }
    if matches!(ctx.data(supertype), TypeData::Generic { .. }) {
        return Err(subkinding_error(ctx, subtype, supertype));
    }

    // ── 6. Sequences ───────────────────────────────────────────────────
    let sub_is_seq = matches!(ctx.data(subtype), TypeData::Sequence(_));
    let sup_is_seq = matches!(ctx.data(supertype), TypeData::Sequence(_));
    match (sub_is_seq, sup_is_seq) {
        (true, true) => {
            return constrain_sequences(
                ctx,
                subtype,
                supertype,
                rigid_variables,
                subtyping_assumptions,
            )
        }
        (true, false) | (false, true) => {
            return Err(subkinding_error(ctx, subtype, supertype))
        }
        (false, false) => {}
    }

    // ── 7. Structural, nominal, callable ───────────────────────────────
    // A class used as a callable goes through its constructor.
    if let TypeData::Object {
        is_class: true,
        attributes,
    } = ctx.data(subtype).clone()
    {
        if attributes.iter().any(|(name, _)| name == "__init__")
            && ctx.has_attribute(supertype, "__call__")
        {
            return constrain_class_below_callable(
                ctx,
                subtype,
                supertype,
                rigid_variables,
                subtyping_assumptions,
            );
        }
    }

    match (ctx.data(subtype).clone(), ctx.data(supertype).clone()) {
        (
            TypeData::StackEffect {
                input: sub_in,
                output: sub_out,
            },
            TypeData::StackEffect {
                input: sup_in,
                output: sup_out,
            },
        ) => constrain_function_like(
            ctx,
            (sub_in, sub_out),
            (sup_in, sup_out),
            rigid_variables,
            subtyping_assumptions,
        ),

        (
            TypeData::PyFunction {
                input: sub_in,
                output: sub_out,
            },
            TypeData::PyFunction {
                input: sup_in,
                output: sup_out,
            },
        ) => constrain_function_like(
            ctx,
            (sub_in, sub_out),
            (sup_in, sup_out),
            rigid_variables,
            subtyping_assumptions,
        ),

        // Overload selection: the first overload that binds wins.
        (TypeData::PyOverloaded { overloads }, TypeData::PyFunction { .. }) => {
            select_overload(
                ctx,
                &overloads,
                supertype,
                rigid_variables,
                subtyping_assumptions,
            )
        }

        // A single function below an overload set must satisfy every
        // overload; an overload set below another must cover each of the
        // supertype's overloads.
        (
            TypeData::PyFunction { .. } | TypeData::PyOverloaded { .. },
            TypeData::PyOverloaded { overloads: sup_overloads },
        ) => {
            let mut result = Substitutions::empty();
            for sup_overload in sup_overloads {
                let sub_applied = ctx.apply_subst(&result, subtype)?;
                let sup_applied = ctx.apply_subst(&result, sup_overload)?;
                let step = constrain_and_bind_variables(
                    ctx,
                    sub_applied,
                    sup_applied,
                    rigid_variables,
                    subtyping_assumptions,
                )?;
                result = step.compose(ctx, &result)?;
            }
            Ok(result)
        }

        // A structural object below a callable goes through __call__.
        (
            TypeData::Object { .. },
            TypeData::StackEffect { .. }
            | TypeData::PyFunction { .. }
            | TypeData::PyOverloaded { .. },
        ) => {
            let call = ctx.get_attribute(subtype, "__call__")?;
            constrain_and_bind_variables(
                ctx,
                call,
                supertype,
                rigid_variables,
                subtyping_assumptions,
            )
        }

        // Nominal subtyping: once both sides are nominal, only the brand
        // DAG decides.
        (TypeData::Nominal { brand: sub_brand, .. }, TypeData::Nominal { brand: sup_brand, .. }) => {
            if ctx.is_subbrand_of(sub_brand, sup_brand) {
                Ok(Substitutions::empty())
            } else {
                Err(StaticAnalysisError::type_error(format_subtyping_error(
                    &ctx.display(subtype),
                    &ctx.display(supertype),
                )))
            }
        }

        // A nominal type can be coerced down to its structural shape...
        (TypeData::Nominal { ty: inner, .. }, _) => constrain_and_bind_variables(
            ctx,
            inner,
            supertype,
            rigid_variables,
            subtyping_assumptions,
        ),

        // ...but a structural type is never a subtype of a nominal one.
        (_, TypeData::Nominal { .. }) => Err(StaticAnalysisError::type_error(format!(
            "{}, {} is not a nominal type",
            format_subtyping_error(&ctx.display(subtype), &ctx.display(supertype)),
            ctx.display(subtype)
        ))),

        // Structural width subtyping: the supertype's attributes must all
        // be present, each at a subtype of the supertype's type.
        (_, TypeData::Object { attributes, .. }) => constrain_below_object(
            ctx,
            subtype,
            supertype,
            &attributes,
            rigid_variables,
            subtyping_assumptions,
        ),

        _ => Err(StaticAnalysisError::type_error(format_subtyping_error(
            &ctx.display(subtype),
            &ctx.display(supertype),
        ))),
    }
}

fn with_assumption(
    assumptions: &[(TypeId, TypeId)],
    subtype: TypeId,
    supertype: TypeId,
) -> Vec<(TypeId, TypeId)> {
    let mut extended = assumptions.to_vec();
    extended.push((subtype, supertype));
    extended
}

fn subkinding_error(ctx: &Context, subtype: TypeId, supertype: TypeId) -> StaticAnalysisError {
    StaticAnalysisError::type_error(format_subkinding_error(
        &ctx.display(subtype),
        &ctx.kind_of(subtype).to_string(),
        &ctx.display(supertype),
        &ctx.kind_of(supertype).to_string(),
    ))
}

// ── Variable binding ───────────────────────────────────────────────────

/// Bind `var := ty`, enforcing bindability, rigidity and the occurs
/// check.
fn bind_variable(
    ctx: &mut Context,
    var: TypeId,
    ty: TypeId,
    rigid_variables: &RigidVariables,
) -> Result<Substitutions, StaticAnalysisError> {
    let data = ctx
        .var_data(var)
        .expect("bind_variable target must be a variable")
        .clone();
    if !data.is_bindable() || rigid_variables.contains(&var) {
        return Err(StaticAnalysisError::rigid_variable(
            ctx.display(var),
            ctx.display(ty),
        ));
    }
    if var != ty && ctx.occurs_in(var, ty) {
        return Err(StaticAnalysisError::occurs_check(
            ctx.display(var),
            ctx.display(ty),
        ));
    }
    Substitutions::binding(ctx, var, ty)
}

/// Whether the supertype-side variable may absorb the subtype.
fn supertype_var_can_take(
    ctx: &mut Context,
    sup: TypeId,
    sub: TypeId,
    rigid_variables: &RigidVariables,
) -> bool {
    match ctx.var_data(sup) {
        Some(v) => {
            v.is_bindable()
                && !rigid_variables.contains(&sup)
                && ctx.kind_of(sub).le(&ctx.kind_of(sup))
        }
        None => false,
    }
}

/// A sequence-kinded variable as the subtype.
fn constrain_sequence_variable_below(
    ctx: &mut Context,
    subtype: TypeId,
    supertype: TypeId,
    rigid_variables: &RigidVariables,
) -> Result<Substitutions, StaticAnalysisError> {
    if !ctx.kind_of(supertype).le(&Kind::Sequence) {
        return Err(StaticAnalysisError::type_error(format!(
            "{} must be a sequence type, not {}",
            ctx.display(subtype),
            ctx.display(supertype)
        )));
    }
    if ctx.var_data(supertype).is_some() {
        // Prefer binding the supertype variable to the subtype.
        if supertype_var_can_take(ctx, supertype, subtype, rigid_variables) {
            return bind_variable(ctx, supertype, subtype, rigid_variables);
        }
        return bind_variable(ctx, subtype, supertype, rigid_variables);
    }
    // Supertype is a concrete sequence.
    bind_variable(ctx, subtype, supertype, rigid_variables)
}

/// An item-kinded variable as the subtype.
fn constrain_item_variable_below(
    ctx: &mut Context,
    subtype: TypeId,
    supertype: TypeId,
    rigid_variables: &RigidVariables,
    subtyping_assumptions: &[(TypeId, TypeId)],
) -> Result<Substitutions, StaticAnalysisError> {
    let sub_var = ctx
        .var_data(subtype)
        .expect("item-variable case requires a variable")
        .clone();
    if sub_var.flavor == VarFlavor::Bound {
        // A rigid-by-construction variable can only make progress by
        // having a supertype variable absorb it.
        if supertype_var_can_take(ctx, supertype, subtype, rigid_variables) {
            return bind_variable(ctx, supertype, subtype, rigid_variables);
        }
        return Err(StaticAnalysisError::type_error(format!(
            "cannot constrain bound variable {} to {}",
            ctx.display(subtype),
            ctx.display(supertype)
        )));
    }
    if ctx.var_data(supertype).is_some() {
        // Prefer absorbing into the supertype variable.
        if supertype_var_can_take(ctx, supertype, subtype, rigid_variables) {
            return bind_variable(ctx, supertype, subtype, rigid_variables);
        }
        if ctx.kind_of(subtype).ge(&ctx.kind_of(supertype)) {
            return bind_variable(ctx, subtype, supertype, rigid_variables);
        }
        return Err(subkinding_error(ctx, subtype, supertype));
    }
    if let TypeData::OptionalTy { argument } = *ctx.data(supertype) {
        // Bind toward the argument first so the variable does not
        // degenerate to none when the argument would fit.
        match constrain_and_bind_variables(
            ctx,
            subtype,
            argument,
            rigid_variables,
            subtyping_assumptions,
        ) {
            Ok(sub) => return Ok(sub),
            Err(_) => {
                let none = ctx.primitives.none;
                return constrain_and_bind_variables(
                    ctx,
                    subtype,
                    none,
                    rigid_variables,
                    subtyping_assumptions,
                );
            }
        }
    }
    if ctx.kind_of(subtype).ge(&ctx.kind_of(supertype)) {
        return bind_variable(ctx, subtype, supertype, rigid_variables);
    }
    Err(subkinding_error(ctx, subtype, supertype))
}

/// A non-variable subtype below a variable supertype.
fn constrain_below_variable(
    ctx: &mut Context,
    subtype: TypeId,
    supertype: TypeId,
    rigid_variables: &RigidVariables,
    subtyping_assumptions: &[(TypeId, TypeId)],
) -> Result<Substitutions, StaticAnalysisError> {
    match ctx.data(subtype).clone() {
        TypeData::Generic { .. } => {
            let sup_data = ctx
                .var_data(supertype)
                .expect("supertype must be a variable here")
                .clone();
            if !sup_data.is_bindable() || rigid_variables.contains(&supertype) {
                return Err(StaticAnalysisError::rigid_variable(
                    ctx.display(supertype),
                    ctx.display(subtype),
                ));
            }
            if ctx.occurs_in(supertype, subtype) {
                return Err(StaticAnalysisError::occurs_check(
                    ctx.display(supertype),
                    ctx.display(subtype),
                ));
            }
            if ctx.kind_of(subtype).le(&ctx.kind_of(supertype)) {
                // A still-generic value can sit under a variable of
                // compatible kind without instantiation, deferring it.
                return bind_variable(ctx, supertype, subtype, rigid_variables);
            }
            constrain_generic_below(
                ctx,
                subtype,
                supertype,
                rigid_variables,
                subtyping_assumptions,
            )
        }
        TypeData::Sequence(_) => {
            if ctx.kind_of(supertype) != Kind::Sequence {
                return Err(subkinding_error(ctx, subtype, supertype));
            }
            bind_variable(ctx, supertype, subtype, rigid_variables)
        }
        _ => {
            if supertype_var_can_take(ctx, supertype, subtype, rigid_variables) {
                return bind_variable(ctx, supertype, subtype, rigid_variables);
            }
            Err(StaticAnalysisError::rigid_variable(
                ctx.display(supertype),
                ctx.display(subtype),
            ))
        }
    }
}

// ── Generic subsumption ────────────────────────────────────────────────

fn constrain_generic_below(
    ctx: &mut Context,
    subtype: TypeId,
    supertype: TypeId,
    rigid_variables: &RigidVariables,
    subtyping_assumptions: &[(TypeId, TypeId)],
) -> Result<Substitutions, StaticAnalysisError> {
    let TypeData::Generic {
        parameters: sub_params,
        body: sub_body,
        is_variadic,
    } = ctx.data(subtype).clone()
    else {
        unreachable!("constrain_generic_below requires a generic subtype");
    };
    if let TypeData::Generic {
        parameters: sup_params,
        body: sup_body,
        ..
    } = ctx.data(supertype).clone()
    {
        if sub_params.len() < sup_params.len() {
            return Err(subkinding_error(ctx, subtype, supertype));
        }
        if sub_params.len() > sup_params.len() {
            // Partially instantiate the extra leading parameters; the
            // remainder stays generic.
            let to_instantiate = sub_params.len() - sup_params.len();
            let bindings: Vec<(TypeId, TypeId)> = sub_params[..to_instantiate]
                .iter()
                .map(|&p| (p, ctx.freshen_var(p)))
                .collect();
            let partial = Substitutions::from_bindings(ctx, bindings)?;
            let remaining = sub_params[to_instantiate..].to_vec();
            let new_body = ctx.apply_subst(&partial, sub_body)?;
            let smaller = ctx.mk_generic(remaining, new_body, is_variadic);
            return constrain_and_bind_variables(
                ctx,
                smaller,
                supertype,
                rigid_variables,
                subtyping_assumptions,
            );
        }
        // Same parameter count: the supertype's parameters become rigid,
        // and the freshly instantiated subtype must fit its body.
        for &param in &sup_params {
            if ctx.occurs_in(param, subtype) {
                return Err(StaticAnalysisError::occurs_check(
                    ctx.display(param),
                    ctx.display(subtype),
                ));
            }
        }
        let instantiated = ctx.instantiate(subtype)?;
        let mut rigid = rigid_variables.clone();
        rigid.extend(sup_params.iter().copied());
        return constrain_and_bind_variables(
            ctx,
            instantiated,
            sup_body,
            &rigid,
            subtyping_assumptions,
        );
    }
    // Non-generic supertype: instantiate fully and recurse.
    let instantiated = ctx.instantiate(subtype)?;
    constrain_and_bind_variables(
        ctx,
        instantiated,
        supertype,
        rigid_variables,
        subtyping_assumptions,
    )
}

// ── Functions ──────────────────────────────────────────────────────────

/// Contravariant input, covariant output, with the input pass's bindings
/// applied before the output pass runs.
fn constrain_function_like(
    ctx: &mut Context,
    (sub_in, sub_out): (TypeId, TypeId),
    (sup_in, sup_out): (TypeId, TypeId),
    rigid_variables: &RigidVariables,
    subtyping_assumptions: &[(TypeId, TypeId)],
) -> Result<Substitutions, StaticAnalysisError> {
    let input_sub = constrain_and_bind_variables(
        ctx,
        sup_in,
        sub_in,
        rigid_variables,
        subtyping_assumptions,
    )?;
    let sub_out = ctx.apply_subst(&input_sub, sub_out)?;
    let sup_out = ctx.apply_subst(&input_sub, sup_out)?;
    let output_sub = constrain_and_bind_variables(
        ctx,
        sub_out,
        sup_out,
        rigid_variables,
        subtyping_assumptions,
    )?;
    output_sub.compose(ctx, &input_sub)
}

/// Pick the first overload that can be bound against the supertype.
fn select_overload(
    ctx: &mut Context,
    overloads: &[TypeId],
    supertype: TypeId,
    rigid_variables: &RigidVariables,
    subtyping_assumptions: &[(TypeId, TypeId)],
) -> Result<Substitutions, StaticAnalysisError> {
    for &overload in overloads {
        if let Ok(sub) = constrain_and_bind_variables(
            ctx,
            overload,
            supertype,
            rigid_variables,
            subtyping_assumptions,
        ) {
            return Ok(sub);
        }
    }
    Err(StaticAnalysisError::type_error(format!(
        "no overload of py_overloaded[{}] is a subtype of {}",
        overloads
            .iter()
            .map(|o| ctx.display(*o))
            .collect::<Vec<_>>()
            .join(", "),
        ctx.display(supertype)
    )))
}

// ── Classes ────────────────────────────────────────────────────────────

/// Constructor calling convention: a class below a callable supertype is
/// checked through `__init__` with the implicit `self` parameter
/// stripped.
fn constrain_class_below_callable(
    ctx: &mut Context,
    subtype: TypeId,
    supertype: TypeId,
    rigid_variables: &RigidVariables,
    subtyping_assumptions: &[(TypeId, TypeId)],
) -> Result<Substitutions, StaticAnalysisError> {
    let mut init = ctx.get_attribute(subtype, "__init__")?;
    loop {
        let is_function_shaped = matches!(
            ctx.data(init),
            TypeData::StackEffect { .. }
                | TypeData::PyFunction { .. }
                | TypeData::PyOverloaded { .. }
        );
        if is_function_shaped {
            break;
        }
        init = ctx.get_attribute(init, "__call__")?;
    }
    let bound_init = bind_self_off(ctx, init)?;
    let call = ctx.get_attribute(supertype, "__call__")?;
    let assumptions = with_assumption(subtyping_assumptions, subtype, supertype);
    constrain_and_bind_variables(ctx, bound_init, call, rigid_variables, &assumptions)
}

/// Drop the `self` parameter of a constructor's type: the topmost input
/// for a stack effect, the first argument for a host function.
fn bind_self_off(ctx: &mut Context, init: TypeId) -> Result<TypeId, StaticAnalysisError> {
    match ctx.data(init).clone() {
        TypeData::StackEffect { input, output } => {
            let seq = ctx.seq(input).clone();
            let mut items = seq.items;
            items.pop();
            let new_input = ctx.alloc(TypeData::Sequence(crate::ty::SeqData {
                rest: seq.rest,
                items,
            }));
            Ok(ctx.mk_stack_effect(new_input, output))
        }
        TypeData::PyFunction { input, output } => {
            let seq = ctx.seq(input).clone();
            let items = if seq.items.is_empty() {
                seq.items
            } else {
                seq.items[1..].to_vec()
            };
            let new_input = ctx.alloc(TypeData::Sequence(crate::ty::SeqData {
                rest: seq.rest,
                items,
            }));
            ctx.mk_py_function(new_input, output)
        }
        TypeData::PyOverloaded { overloads } => {
            let mut bound = Vec::with_capacity(overloads.len());
            for overload in overloads {
                bound.push(bind_self_off(ctx, overload)?);
            }
            ctx.mk_py_overloaded(&bound)
        }
        _ => Err(StaticAnalysisError::type_error(format!(
            "{} cannot be used as a constructor",
            ctx.display(init)
        ))),
    }
}

// ── Objects ────────────────────────────────────────────────────────────

/// Width subtyping: every attribute the supertype demands must exist on
/// the subtype at a compatible type, with substitutions threaded
/// left-to-right across the attributes.
fn constrain_below_object(
    ctx: &mut Context,
    subtype: TypeId,
    _supertype: TypeId,
    sup_attributes: &[(String, TypeId)],
    rigid_variables: &RigidVariables,
    subtyping_assumptions: &[(TypeId, TypeId)],
) -> Result<Substitutions, StaticAnalysisError> {
    let mut result = Substitutions::empty();
    for (name, sup_attr) in sup_attributes {
        let sub_attr = ctx.get_attribute(subtype, name)?;
        let sub_attr = ctx.apply_subst(&result, sub_attr)?;
        let sup_attr = ctx.apply_subst(&result, *sup_attr)?;
        let step = constrain_and_bind_variables(
            ctx,
            sub_attr,
            sup_attr,
            rigid_variables,
            subtyping_assumptions,
        )?;
        result = step.compose(ctx, &result)?;
    }
    Ok(result)
}

// ── Sequences ──────────────────────────────────────────────────────────

fn stack_mismatch(ctx: &Context, actual: TypeId, expected: TypeId) -> StaticAnalysisError {
    StaticAnalysisError::stack_mismatch(ctx.display(actual), ctx.display(expected))
}

/// Match two stack shapes from the top (right end) down.
fn constrain_sequences(
    ctx: &mut Context,
    subtype: TypeId,
    supertype: TypeId,
    rigid_variables: &RigidVariables,
    subtyping_assumptions: &[(TypeId, TypeId)],
) -> Result<Substitutions, StaticAnalysisError> {
    let sub_seq = ctx.seq(subtype).clone();
    let sup_seq = ctx.seq(supertype).clone();

    if sub_seq.is_empty() {
        // [] <: []
        if sup_seq.is_empty() {
            return Ok(Substitutions::empty());
        }
        // [] <: *a, *a not rigid --> *a = []
        if sup_seq.items.is_empty() {
            if let Some(sup_rest) = sup_seq.rest {
                if can_bind_seq_var(ctx, sup_rest, rigid_variables) {
                    return bind_variable(ctx, sup_rest, subtype, rigid_variables);
                }
            }
        }
        // [] <: *a? `t0 `t... -- error
        return Err(stack_mismatch(ctx, subtype, supertype));
    }

    if sub_seq.items.is_empty() {
        let sub_rest = sub_seq
            .rest
            .expect("a nonempty sequence without items has a rest variable");
        // *a <: [], *a not rigid --> *a = []
        if sup_seq.is_empty() && can_bind_seq_var(ctx, sub_rest, rigid_variables) {
            return bind_variable(ctx, sub_rest, supertype, rigid_variables);
        }
        // *a <: *a
        if sup_seq.items.is_empty() && sup_seq.rest == Some(sub_rest) {
            return Ok(Substitutions::empty());
        }
        // *a <: RHS, *a not rigid, *a not free in RHS --> *a = RHS
        if can_bind_seq_var(ctx, sub_rest, rigid_variables) && !ctx.occurs_in(sub_rest, supertype)
        {
            return bind_variable(ctx, sub_rest, supertype, rigid_variables);
        }
        // Fall through to the supertype-side cases.
    }

    // *a? `t... `t_n <: [] -- error
    if sup_seq.is_empty() {
        return Err(stack_mismatch(ctx, subtype, supertype));
    }

    // ... <: *b, *b not rigid, *b not free in LHS --> *b = LHS
    if sup_seq.items.is_empty() {
        if let Some(sup_rest) = sup_seq.rest {
            if can_bind_seq_var(ctx, sup_rest, rigid_variables)
                && !ctx.occurs_in(sup_rest, subtype)
            {
                return bind_variable(ctx, sup_rest, subtype, rigid_variables);
            }
        }
        return Err(stack_mismatch(ctx, subtype, supertype));
    }

    // Both sequences end in an individual type: constrain the topmost
    // types, then the rests under the resulting substitution. A stack
    // mismatch in the rest is re-raised over the original full sequences
    // so diagnostics show whole stack shapes, not fragments.
    if !sub_seq.items.is_empty() {
        let sub_top = *sub_seq
            .items
            .last()
            .expect("checked nonempty");
        let sup_top = *sup_seq
            .items
            .last()
            .expect("checked nonempty");
        let top_sub = constrain_and_bind_variables(
            ctx,
            sub_top,
            sup_top,
            rigid_variables,
            subtyping_assumptions,
        )?;
        let sub_rest = drop_top(ctx, &sub_seq);
        let sup_rest = drop_top(ctx, &sup_seq);
        let sub_rest = ctx.apply_subst(&top_sub, sub_rest)?;
        let sup_rest = ctx.apply_subst(&top_sub, sup_rest)?;
        match constrain_and_bind_variables(
            ctx,
            sub_rest,
            sup_rest,
            rigid_variables,
            subtyping_assumptions,
        ) {
            Ok(rest_sub) => rest_sub.compose(ctx, &top_sub),
            Err(e) if matches!(e.kind, crate::error::ErrorKind::StackMismatch { .. }) => {
                Err(stack_mismatch(ctx, subtype, supertype))
            }
            Err(e) => Err(e),
        }
    } else {
        Err(stack_mismatch(ctx, subtype, supertype))
    }
}

fn can_bind_seq_var(ctx: &Context, var: TypeId, rigid_variables: &RigidVariables) -> bool {
    match ctx.var_data(var) {
        Some(v) => v.is_bindable() && !rigid_variables.contains(&var),
        None => false,
    }
}

fn drop_top(ctx: &mut Context, seq: &crate::ty::SeqData) -> TypeId {
    let mut items = seq.items.clone();
    items.pop();
    ctx.alloc(TypeData::Sequence(crate::ty::SeqData {
        rest: seq.rest,
        items,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builtins::preamble_environment;

    fn empty_rigid() -> RigidVariables {
        RigidVariables::default()
    }

    fn constrain(
        ctx: &mut Context,
        sub: TypeId,
        sup: TypeId,
    ) -> Result<Substitutions, StaticAnalysisError> {
        constrain_and_bind_variables(ctx, sub, sup, &empty_rigid(), &[])
    }

    #[test]
    fn reflexivity_by_identity() {
        let mut ctx = Context::new();
        let int = ctx.primitives.int;
        let sub = constrain(&mut ctx, int, int).unwrap();
        assert!(sub.is_empty());
    }

    #[test]
    fn object_is_top() {
        let mut ctx = Context::new();
        let object = ctx.primitives.object;
        for ty in [
            ctx.primitives.int,
            ctx.primitives.str_,
            ctx.primitives.none,
            ctx.primitives.bool_,
        ] {
            let sub = constrain(&mut ctx, ty, object).unwrap();
            assert!(sub.is_empty(), "{} <: object should not bind", ctx.display(ty));
        }
    }

    #[test]
    fn no_return_is_bottom() {
        let mut ctx = Context::new();
        let bottom = ctx.primitives.no_return;
        for ty in [ctx.primitives.int, ctx.primitives.str_, ctx.primitives.bool_] {
            let sub = constrain(&mut ctx, bottom, ty).unwrap();
            assert!(sub.is_empty());
        }
    }

    #[test]
    fn distinct_nominal_types_do_not_unify() {
        let mut ctx = Context::new();
        let int = ctx.primitives.int;
        let s = ctx.primitives.str_;
        assert!(constrain(&mut ctx, s, int).is_err());
    }

    #[test]
    fn brand_dag_subtyping() {
        let mut ctx = Context::new();
        let animal_brand = ctx.mk_brand("animal", Kind::Individual, vec![]);
        let animal_body = ctx.mk_object(vec![]);
        let animal = ctx.mk_nominal(animal_brand, animal_body);
        let cat_brand = ctx.mk_brand("cat", Kind::Individual, vec![animal_brand]);
        let cat_body = ctx.mk_object(vec![]);
        let cat = ctx.mk_nominal(cat_brand, cat_body);
        assert!(constrain(&mut ctx, cat, animal).is_ok());
        assert!(constrain(&mut ctx, animal, cat).is_err());
    }

    #[test]
    fn structural_width_subtyping() {
        let mut ctx = Context::new();
        let int = ctx.primitives.int;
        let s = ctx.primitives.str_;
        let wide = ctx.mk_object(vec![("x".into(), int), ("y".into(), s)]);
        let narrow = ctx.mk_object(vec![("x".into(), int)]);
        let sub = constrain(&mut ctx, wide, narrow).unwrap();
        assert!(sub.is_empty());
        assert!(constrain(&mut ctx, narrow, wide).is_err());
    }

    #[test]
    fn structural_never_below_nominal() {
        let mut ctx = Context::new();
        // A structural type with exactly int's attributes is still not int.
        let add = ctx.get_attribute(ctx.primitives.int, "__add__").unwrap();
        let impostor = ctx.mk_object(vec![("__add__".into(), add)]);
        let int = ctx.primitives.int;
        assert!(constrain(&mut ctx, impostor, int).is_err());
        // But the nominal type coerces down to a compatible structure.
        assert!(constrain(&mut ctx, int, impostor).is_ok());
    }

    #[test]
    fn optional_introduction() {
        let mut ctx = Context::new();
        let int = ctx.primitives.int;
        let optional = ctx.primitives.optional;
        let optional_int = ctx.generic_apply(optional, &[int]).unwrap();
        let none = ctx.primitives.none;
        assert!(constrain(&mut ctx, none, optional_int).unwrap().is_empty());
        assert!(constrain(&mut ctx, int, optional_int).unwrap().is_empty());
        let s = ctx.primitives.str_;
        assert!(constrain(&mut ctx, s, optional_int).is_err());
    }

    #[test]
    fn optional_is_covariant() {
        let mut ctx = Context::new();
        let int = ctx.primitives.int;
        let object = ctx.primitives.object;
        let optional = ctx.primitives.optional;
        let optional_int = ctx.generic_apply(optional, &[int]).unwrap();
        let optional_object = ctx.generic_apply(optional, &[object]).unwrap();
        assert!(constrain(&mut ctx, optional_int, optional_object).is_ok());
    }

    #[test]
    fn variable_binds_to_supertype() {
        let mut ctx = Context::new();
        let var = ctx.fresh_item_var(Kind::Individual);
        let int = ctx.primitives.int;
        let sub = constrain(&mut ctx, var, int).unwrap();
        assert_eq!(sub.get(var), Some(int));
    }

    #[test]
    fn supertype_variable_absorbs_subtype() {
        let mut ctx = Context::new();
        let var = ctx.fresh_item_var(Kind::Individual);
        let s = ctx.primitives.str_;
        let sub = constrain(&mut ctx, s, var).unwrap();
        assert_eq!(sub.get(var), Some(s));
    }

    #[test]
    fn rigid_variable_cannot_be_bound() {
        let mut ctx = Context::new();
        let var = ctx.fresh_item_var(Kind::Individual);
        let int = ctx.primitives.int;
        let mut rigid = empty_rigid();
        rigid.insert(var);
        let err = constrain_and_bind_variables(&mut ctx, var, int, &rigid, &[]).unwrap_err();
        assert!(matches!(
            err.kind,
            crate::error::ErrorKind::RigidVariable { .. }
        ));
    }

    #[test]
    fn sequence_variable_occurs_check() {
        let mut ctx = Context::new();
        let rest = ctx.fresh_seq_var();
        let int = ctx.primitives.int;
        let sub_seq = ctx.mk_sequence(&[rest]).unwrap();
        let sup_seq = ctx.mk_sequence(&[rest, int]).unwrap();
        let err = constrain(&mut ctx, sub_seq, sup_seq).unwrap_err();
        assert!(err.is_occurs_check_fail(), "got {err}");
    }

    #[test]
    fn empty_sequence_binds_lone_rest_variable() {
        let mut ctx = Context::new();
        let empty = ctx.empty_sequence();
        let rest = ctx.fresh_seq_var();
        let lone = ctx.mk_sequence(&[rest]).unwrap();
        let sub = constrain(&mut ctx, empty, lone).unwrap();
        assert_eq!(sub.get(rest), Some(empty));
    }

    #[test]
    fn nonempty_sequence_below_empty_fails() {
        let mut ctx = Context::new();
        let int = ctx.primitives.int;
        let nonempty = ctx.mk_sequence(&[int]).unwrap();
        let empty = ctx.empty_sequence();
        let err = constrain(&mut ctx, nonempty, empty).unwrap_err();
        assert!(matches!(
            err.kind,
            crate::error::ErrorKind::StackMismatch { .. }
        ));
    }

    #[test]
    fn sequences_match_from_the_top_down() {
        let mut ctx = Context::new();
        let int = ctx.primitives.int;
        let rest = ctx.fresh_seq_var();
        let var = ctx.fresh_item_var(Kind::Individual);
        // [int, int] <: [*rest, var] should bind var := int (the top) and
        // rest := [int].
        let actual = ctx.mk_sequence(&[int, int]).unwrap();
        let expected = ctx.mk_sequence(&[rest, var]).unwrap();
        let sub = constrain(&mut ctx, actual, expected).unwrap();
        assert_eq!(sub.get(var), Some(int));
        let bound_rest = sub.get(rest).expect("rest should be bound");
        let bound = ctx.seq(bound_rest).clone();
        assert_eq!(bound.items, vec![int]);
        assert!(bound.rest.is_none());
    }

    #[test]
    fn stack_mismatch_reports_full_sequences() {
        let mut ctx = Context::new();
        let int = ctx.primitives.int;
        let s = ctx.primitives.str_;
        let actual = ctx.mk_sequence(&[int, int]).unwrap();
        let expected = ctx.mk_sequence(&[s, s, int]).unwrap();
        let err = constrain(&mut ctx, actual, expected).unwrap_err();
        match err.kind {
            crate::error::ErrorKind::StackMismatch { actual, expected } => {
                assert!(actual.contains("int"), "actual: {actual}");
                assert!(expected.contains("str"), "expected: {expected}");
            }
            other => panic!("expected a stack mismatch, got {other:?}"),
        }
    }

    #[test]
    fn stack_effects_are_contravariant_in_input() {
        let mut ctx = Context::new();
        let int = ctx.primitives.int;
        let object = ctx.primitives.object;
        // (object -- int) <: (int -- object): accepts more, returns less.
        let gen_in = ctx.mk_sequence(&[object]).unwrap();
        let gen_out = ctx.mk_sequence(&[int]).unwrap();
        let general = ctx.mk_stack_effect(gen_in, gen_out);
        let spec_in = ctx.mk_sequence(&[int]).unwrap();
        let spec_out = ctx.mk_sequence(&[object]).unwrap();
        let specific = ctx.mk_stack_effect(spec_in, spec_out);
        assert!(constrain(&mut ctx, general, specific).is_ok());
        assert!(constrain(&mut ctx, specific, general).is_err());
    }

    #[test]
    fn overload_selection_picks_first_fit() {
        let mut ctx = Context::new();
        let int = ctx.primitives.int;
        let s = ctx.primitives.str_;
        let int_arg = ctx.mk_sequence(&[int]).unwrap();
        let str_arg = ctx.mk_sequence(&[s]).unwrap();
        let int_to_int = ctx.mk_py_function(int_arg, int).unwrap();
        let str_to_str = ctx.mk_py_function(str_arg, s).unwrap();
        let overloaded = ctx.mk_py_overloaded(&[int_to_int, str_to_str]).unwrap();
        // Wanted: a function accepting str. Only the second overload fits.
        let wanted_ret = ctx.fresh_item_var(Kind::Individual);
        let wanted_arg = ctx.mk_sequence(&[s]).unwrap();
        let wanted = ctx.mk_py_function(wanted_arg, wanted_ret).unwrap();
        let sub = constrain(&mut ctx, overloaded, wanted).unwrap();
        assert_eq!(sub.get(wanted_ret), Some(s));
    }

    #[test]
    fn recursive_types_terminate_via_assumptions() {
        let mut ctx = Context::new();
        let int = ctx.primitives.int;
        // Two structurally identical recursive list-like types:
        // Fix(x, {head: int, tail: x})
        let make = |ctx: &mut Context| {
            let var = ctx.fresh_bound_var(Kind::Individual);
            let body = ctx.mk_object(vec![("head".into(), int), ("tail".into(), var)]);
            ctx.mk_fix(var, body)
        };
        let a = make(&mut ctx);
        let b = make(&mut ctx);
        let sub = constrain(&mut ctx, a, b).unwrap();
        assert!(sub.is_empty());
    }

    #[test]
    fn generic_instantiates_below_concrete_type() {
        let mut ctx = Context::new();
        let int = ctx.primitives.int;
        // forall a. (a -- a) <: (int -- int)
        let a = ctx.fresh_bound_var(Kind::Individual);
        let gen_in = ctx.mk_sequence(&[a]).unwrap();
        let gen_out = ctx.mk_sequence(&[a]).unwrap();
        let body = ctx.mk_stack_effect(gen_in, gen_out);
        let generic = ctx.mk_generic(vec![a], body, false);
        let conc_in = ctx.mk_sequence(&[int]).unwrap();
        let conc_out = ctx.mk_sequence(&[int]).unwrap();
        let concrete = ctx.mk_stack_effect(conc_in, conc_out);
        assert!(constrain(&mut ctx, generic, concrete).is_ok());
    }

    #[test]
    fn generic_below_variable_defers_instantiation() {
        let mut ctx = Context::new();
        let int = ctx.primitives.int;
        let a = ctx.fresh_bound_var(Kind::Individual);
        let gen_in = ctx.mk_sequence(&[a]).unwrap();
        let gen_out = ctx.mk_sequence(&[a]).unwrap();
        let body = ctx.mk_stack_effect(gen_in, gen_out);
        let generic = ctx.mk_generic(vec![a], body, false);
        let _ = int;
        let var = ctx.fresh_item_var(Kind::Item);
        let sub = constrain(&mut ctx, generic, var).unwrap();
        assert_eq!(sub.get(var), Some(generic), "no instantiation should happen");
    }

    #[test]
    fn class_constrains_through_constructor() {
        let mut ctx = Context::new();
        let int = ctx.primitives.int;
        // class with __init__ : (*s int self -- *s) used where a callable
        // (*s int -- *s) is expected.
        let s = ctx.fresh_seq_var();
        let self_placeholder = ctx.primitives.object;
        let init_in = ctx.mk_sequence(&[s, int, self_placeholder]).unwrap();
        let init_out = ctx.mk_sequence(&[s]).unwrap();
        let init = ctx.mk_stack_effect(init_in, init_out);
        let class = ctx.mk_class(vec![("__init__".into(), init)]);
        let want_s = ctx.fresh_seq_var();
        let want_in = ctx.mk_sequence(&[want_s, int]).unwrap();
        let want_out = ctx.mk_sequence(&[want_s]).unwrap();
        let wanted = ctx.mk_stack_effect(want_in, want_out);
        assert!(constrain(&mut ctx, class, wanted).is_ok());
    }

    #[test]
    fn preamble_plus_applies_to_ints() {
        let mut ctx = Context::new();
        let env = preamble_environment(&mut ctx);
        let int = ctx.primitives.int;
        let plus = env.get("+").unwrap();
        let effect = ctx.instantiate(plus).unwrap();
        let TypeData::StackEffect { input, .. } = ctx.data(effect).clone() else {
            panic!("+ instantiates to a stack effect");
        };
        let actual = ctx.mk_sequence(&[int, int]).unwrap();
        // The two ints on the stack must satisfy +'s input shape.
        let sub = constrain(&mut ctx, actual, input);
        assert!(sub.is_ok(), "ints should be addable: {:?}", sub.err());
    }
}
