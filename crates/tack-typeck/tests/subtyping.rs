//! Property-style subtyping tests over a family of constructed types.
//!
//! The solver's unit tests pin individual rules; these tests sweep a
//! generator of representative types through the laws every type must
//! satisfy: reflexivity, `object` as top, and `NoReturn` as bottom.

use tack_typeck::constrain::{constrain_and_bind_variables, RigidVariables};
use tack_typeck::context::Context;
use tack_typeck::kind::Kind;
use tack_typeck::ty::TypeId;

/// A zoo of representative types: primitives, effects, objects, optional
/// and generic instantiations, classes, and a recursive type.
fn type_zoo(ctx: &mut Context) -> Vec<TypeId> {
    let int = ctx.primitives.int;
    let str_ = ctx.primitives.str_;
    let bool_ = ctx.primitives.bool_;
    let none = ctx.primitives.none;
    let mut zoo = vec![int, str_, bool_, none];

    // ( -- int)
    let empty_in = ctx.empty_sequence();
    let int_out = ctx.mk_sequence(&[int]).unwrap();
    zoo.push(ctx.mk_stack_effect(empty_in, int_out));

    // (*s int -- *s str)
    let rest = ctx.fresh_seq_var();
    let poly_in = ctx.mk_sequence(&[rest, int]).unwrap();
    let poly_out = ctx.mk_sequence(&[rest, str_]).unwrap();
    zoo.push(ctx.mk_stack_effect(poly_in, poly_out));

    // {x: int, f: ( -- int)}
    let effect = zoo[4];
    zoo.push(ctx.mk_object(vec![("x".into(), int), ("f".into(), effect)]));

    // a class with a constructor
    let ctor_rest = ctx.fresh_seq_var();
    let object = ctx.primitives.object;
    let ctor_in = ctx.mk_sequence(&[ctor_rest, object]).unwrap();
    let ctor_out = ctx.mk_sequence(&[ctor_rest]).unwrap();
    let ctor = ctx.mk_stack_effect(ctor_in, ctor_out);
    zoo.push(ctx.mk_class(vec![("__init__".into(), ctor)]));

    // Optional[int] and list[int]
    let optional = ctx.primitives.optional;
    zoo.push(ctx.generic_apply(optional, &[int]).unwrap());
    let list = ctx.primitives.list;
    zoo.push(ctx.generic_apply(list, &[int]).unwrap());

    // py_function[[int], str]
    let arg = ctx.mk_sequence(&[int]).unwrap();
    let py_fn = ctx.mk_py_function(arg, str_).unwrap();
    zoo.push(py_fn);
    zoo.push(ctx.mk_py_overloaded(&[py_fn]).unwrap());

    // A recursive pair type: Fix(x, {first: int, rest: x})
    let var = ctx.fresh_bound_var(Kind::Individual);
    let pair_body = ctx.mk_object(vec![("first".into(), int), ("rest".into(), var)]);
    zoo.push(ctx.mk_fix(var, pair_body));

    // A generic: forall a. ( a -- a )
    let a = ctx.fresh_bound_var(Kind::Individual);
    let gen_in = ctx.mk_sequence(&[a]).unwrap();
    let gen_out = ctx.mk_sequence(&[a]).unwrap();
    let gen_body = ctx.mk_stack_effect(gen_in, gen_out);
    zoo.push(ctx.mk_generic(vec![a], gen_body, false));

    zoo
}

#[test]
fn every_type_is_a_subtype_of_itself() {
    let mut ctx = Context::new();
    for ty in type_zoo(&mut ctx) {
        let result =
            constrain_and_bind_variables(&mut ctx, ty, ty, &RigidVariables::default(), &[]);
        let sub = result.unwrap_or_else(|e| {
            panic!("{} should be a subtype of itself: {e}", ctx.display(ty))
        });
        assert!(
            sub.is_empty(),
            "reflexivity for {} should bind nothing, got {}",
            ctx.display(ty),
            sub.display(&ctx)
        );
    }
}

#[test]
fn object_is_a_supertype_of_every_individual_type() {
    let mut ctx = Context::new();
    let object = ctx.primitives.object;
    for ty in type_zoo(&mut ctx) {
        if !matches!(ctx.kind_of(ty), Kind::Individual) {
            continue;
        }
        let sub =
            constrain_and_bind_variables(&mut ctx, ty, object, &RigidVariables::default(), &[])
                .unwrap_or_else(|e| {
                    panic!("{} <: object should hold: {e}", ctx.display(ty))
                });
        assert!(sub.is_empty());
    }
}

#[test]
fn no_return_is_a_subtype_of_every_type() {
    let mut ctx = Context::new();
    let bottom = ctx.primitives.no_return;
    for ty in type_zoo(&mut ctx) {
        let sub =
            constrain_and_bind_variables(&mut ctx, bottom, ty, &RigidVariables::default(), &[])
                .unwrap_or_else(|e| {
                    panic!("NoReturn <: {} should hold: {e}", ctx.display(ty))
                });
        assert!(sub.is_empty());
    }
}

#[test]
fn reflexivity_holds_for_stack_shapes() {
    let mut ctx = Context::new();
    let int = ctx.primitives.int;
    let rest = ctx.fresh_seq_var();
    let shapes = vec![
        ctx.empty_sequence(),
        ctx.mk_sequence(&[int]).unwrap(),
        ctx.mk_sequence(&[rest, int, int]).unwrap(),
    ];
    for shape in shapes {
        let sub =
            constrain_and_bind_variables(&mut ctx, shape, shape, &RigidVariables::default(), &[])
                .expect("a stack shape matches itself");
        assert!(sub.is_empty());
    }
}
