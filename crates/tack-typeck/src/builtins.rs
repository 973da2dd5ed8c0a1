//! Primitive types and the preamble environment.
//!
//! The primitives (`object`, `none`, `int`, ...) are built once per
//! [`Context`] -- never process-global -- because the solver compares some
//! of them by handle identity. The preamble environment registers the
//! standard words and type names every program starts with.

use crate::context::{Context, Primitives};
use crate::env::Environment;
use crate::kind::Kind;
use crate::ty::{TypeData, TypeId};

/// Install the primitive types into a freshly created context.
///
/// Called exactly once, from [`Context::new`].
pub(crate) fn install_primitives(ctx: &mut Context) {
    // object: the universal supertype. Its brand is the root of the brand
    // DAG.
    let object_brand = ctx.mk_brand("object", Kind::Individual, vec![]);
    let object_body = ctx.mk_object(vec![]);
    let object = ctx.mk_nominal(object_brand, object_body);
    ctx.set_name(object, "object");

    // none: the unit of Optional.
    let none_brand = ctx.mk_brand("None", Kind::Individual, vec![]);
    let none_body = ctx.mk_object(vec![]);
    let none = ctx.mk_nominal(none_brand, none_body);
    ctx.set_name(none, "None");

    // int: recursive through its own __add__ signature.
    let int_brand = ctx.mk_brand("int", Kind::Individual, vec![]);
    let int_self = ctx.fresh_bound_var(Kind::Individual);
    let add_input = ctx
        .mk_sequence(&[int_self])
        .expect("primitive sequences are well-kinded");
    let add_fn = ctx
        .mk_py_function(add_input, int_self)
        .expect("primitive function types are well-kinded");
    let add_overloads = ctx
        .mk_py_overloaded(&[add_fn])
        .expect("primitive overload sets are well-formed");
    let int_body = ctx.mk_object(vec![("__add__".to_string(), add_overloads)]);
    let int_nominal = ctx.mk_nominal(int_brand, int_body);
    let int = ctx.mk_fix(int_self, int_nominal);
    ctx.set_name(int, "int");

    let str_brand = ctx.mk_brand("str", Kind::Individual, vec![]);
    let str_body = ctx.mk_object(vec![]);
    let str_ = ctx.mk_nominal(str_brand, str_body);
    ctx.set_name(str_, "str");

    let bool_brand = ctx.mk_brand("bool", Kind::Individual, vec![]);
    let bool_body = ctx.mk_object(vec![]);
    let bool_ = ctx.mk_nominal(bool_brand, bool_body);
    ctx.set_name(bool_, "bool");

    let no_return = ctx.alloc(TypeData::NoReturn);
    ctx.set_name(no_return, "NoReturn");

    // Optional[T]
    let opt_param = ctx.fresh_bound_var(Kind::Item);
    let opt_body = ctx
        .mk_optional(opt_param)
        .expect("the Optional parameter is item-kinded");
    let optional = ctx.mk_generic(vec![opt_param], opt_body, false);
    ctx.set_name(optional, "Optional");

    // py_function[inputs, output]
    let pf_inputs = ctx.fresh_bound_var(Kind::Sequence);
    let pf_output = ctx.fresh_bound_var(Kind::Item);
    let pf_body = ctx
        .mk_py_function(pf_inputs, pf_output)
        .expect("the py_function template is well-kinded");
    let py_function = ctx.mk_generic(vec![pf_inputs, pf_output], pf_body, false);
    ctx.set_name(py_function, "py_function");

    // py_overloaded[overloads...] -- variadic.
    let po_pack = ctx.fresh_bound_var(Kind::Sequence);
    let po_body = ctx
        .mk_py_overloaded(&[po_pack])
        .expect("a variable is a valid overload placeholder");
    let py_overloaded = ctx.mk_generic(vec![po_pack], po_body, true);
    ctx.set_name(py_overloaded, "py_overloaded");

    // list[T]
    let list_brand = ctx.mk_brand("list", Kind::Individual, vec![]);
    let list_param = ctx.fresh_bound_var(Kind::Individual);
    let list_body_obj = ctx.mk_object(vec![]);
    let list_body = ctx.mk_nominal(list_brand, list_body_obj);
    let list = ctx.mk_generic(vec![list_param], list_body, false);
    ctx.set_name(list, "list");

    // tuple[...] -- variadic.
    let tuple_brand = ctx.mk_brand("tuple", Kind::Individual, vec![]);
    let tuple_param = ctx.fresh_bound_var(Kind::Sequence);
    let tuple_body_obj = ctx.mk_object(vec![]);
    let tuple_body = ctx.mk_nominal(tuple_brand, tuple_body_obj);
    let tuple = ctx.mk_generic(vec![tuple_param], tuple_body, true);
    ctx.set_name(tuple, "tuple");

    // iterable[T]
    let iterable_brand = ctx.mk_brand("iterable", Kind::Individual, vec![]);
    let iterable_param = ctx.fresh_bound_var(Kind::Individual);
    let iterable_body_obj = ctx.mk_object(vec![]);
    let iterable_body = ctx.mk_nominal(iterable_brand, iterable_body_obj);
    let iterable = ctx.mk_generic(vec![iterable_param], iterable_body, false);
    ctx.set_name(iterable, "iterable");

    let module_brand = ctx.mk_brand("module", Kind::Individual, vec![]);

    ctx.primitives = Primitives {
        object,
        object_brand,
        none,
        int,
        str_,
        bool_,
        no_return,
        optional,
        py_function,
        py_overloaded,
        list,
        tuple,
        iterable,
        module_brand,
    };
}

/// The environment every checked program starts from: type names plus the
/// standard words.
pub fn preamble_environment(ctx: &mut Context) -> Environment {
    let primitives = ctx.primitives.clone();
    let mut env = Environment::new();

    // Type names, for annotations.
    env.insert("object", primitives.object);
    env.insert("int", primitives.int);
    env.insert("str", primitives.str_);
    env.insert("bool", primitives.bool_);
    env.insert("None", primitives.none);
    env.insert("NoReturn", primitives.no_return);
    env.insert("Optional", primitives.optional);
    env.insert("py_function", primitives.py_function);
    env.insert("py_overloaded", primitives.py_overloaded);
    env.insert("list", primitives.list);
    env.insert("tuple", primitives.tuple);
    env.insert("iterable", primitives.iterable);

    // + : forall *s b c. (*s {__add__: py_function[[b], c]} b -- *s c)
    // Addition goes through the left operand's __add__ protocol, so any
    // type carrying a compatible __add__ works.
    let s = ctx.fresh_bound_var(Kind::Sequence);
    let b = ctx.fresh_bound_var(Kind::Individual);
    let c = ctx.fresh_bound_var(Kind::Individual);
    let add_arg = seq(ctx, &[b]);
    let add_fn = ctx
        .mk_py_function(add_arg, c)
        .expect("the addable protocol is well-kinded");
    let addable = ctx.mk_object(vec![("__add__".to_string(), add_fn)]);
    let plus_in = seq(ctx, &[s, addable, b]);
    let plus_out = seq(ctx, &[s, c]);
    let plus_effect = ctx.mk_stack_effect(plus_in, plus_out);
    let plus = ctx.mk_generic(vec![s, b, c], plus_effect, false);
    env.insert("+", plus);

    // if_then : forall *s. (*s bool (*s -- *s) -- *s)
    let s = ctx.fresh_bound_var(Kind::Sequence);
    let branch_in = seq(ctx, &[s]);
    let branch_out = seq(ctx, &[s]);
    let branch = ctx.mk_stack_effect(branch_in, branch_out);
    let if_then_in = seq(ctx, &[s, primitives.bool_, branch]);
    let if_then_out = seq(ctx, &[s]);
    let if_then_effect = ctx.mk_stack_effect(if_then_in, if_then_out);
    let if_then = ctx.mk_generic(vec![s], if_then_effect, false);
    env.insert("if_then", if_then);

    // call : forall *s *t. (*s (*s -- *t) -- *t)
    let s = ctx.fresh_bound_var(Kind::Sequence);
    let t = ctx.fresh_bound_var(Kind::Sequence);
    let quote_in = seq(ctx, &[s]);
    let quote_out = seq(ctx, &[t]);
    let quote = ctx.mk_stack_effect(quote_in, quote_out);
    let call_in = seq(ctx, &[s, quote]);
    let call_out = seq(ctx, &[t]);
    let call_effect = ctx.mk_stack_effect(call_in, call_out);
    let call = ctx.mk_generic(vec![s, t], call_effect, false);
    env.insert("call", call);

    // drop : forall *s a. (*s a -- *s)
    let s = ctx.fresh_bound_var(Kind::Sequence);
    let a = ctx.fresh_bound_var(Kind::Item);
    let drop_in = seq(ctx, &[s, a]);
    let drop_out = seq(ctx, &[s]);
    let drop_effect = ctx.mk_stack_effect(drop_in, drop_out);
    env.insert("drop", ctx.mk_generic(vec![s, a], drop_effect, false));

    // dup : forall *s a. (*s a -- *s a a)
    let s = ctx.fresh_bound_var(Kind::Sequence);
    let a = ctx.fresh_bound_var(Kind::Item);
    let dup_in = seq(ctx, &[s, a]);
    let dup_out = seq(ctx, &[s, a, a]);
    let dup_effect = ctx.mk_stack_effect(dup_in, dup_out);
    env.insert("dup", ctx.mk_generic(vec![s, a], dup_effect, false));

    // swap : forall *s a b. (*s a b -- *s b a)
    let s = ctx.fresh_bound_var(Kind::Sequence);
    let a = ctx.fresh_bound_var(Kind::Item);
    let b = ctx.fresh_bound_var(Kind::Item);
    let swap_in = seq(ctx, &[s, a, b]);
    let swap_out = seq(ctx, &[s, b, a]);
    let swap_effect = ctx.mk_stack_effect(swap_in, swap_out);
    env.insert("swap", ctx.mk_generic(vec![s, a, b], swap_effect, false));

    // Literal pushers.
    env.insert("True", pusher(ctx, primitives.bool_));
    env.insert("False", pusher(ctx, primitives.bool_));

    env
}

/// forall *s. (*s -- *s value) -- the type of a word that pushes a value.
pub fn pusher(ctx: &mut Context, value: TypeId) -> TypeId {
    let s = ctx.fresh_bound_var(Kind::Sequence);
    let input = seq(ctx, &[s]);
    let output = seq(ctx, &[s, value]);
    let effect = ctx.mk_stack_effect(input, output);
    ctx.mk_generic(vec![s], effect, false)
}

fn seq(ctx: &mut Context, elements: &[TypeId]) -> TypeId {
    ctx.mk_sequence(elements)
        .expect("preamble sequences are well-kinded")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn primitives_have_names() {
        let ctx = Context::new();
        assert_eq!(ctx.display(ctx.primitives.int), "int");
        assert_eq!(ctx.display(ctx.primitives.object), "object");
        assert_eq!(ctx.display(ctx.primitives.no_return), "NoReturn");
    }

    #[test]
    fn int_exposes_add_through_fix() {
        let mut ctx = Context::new();
        let int = ctx.primitives.int;
        let add = ctx.get_attribute(int, "__add__").expect("int has __add__");
        assert!(matches!(
            ctx.data(add),
            crate::ty::TypeData::PyOverloaded { .. }
        ));
    }

    #[test]
    fn independent_contexts_have_distinct_primitives() {
        // Identity-based checks must never leak across compilation units,
        // so each context builds its own singletons.
        let a = Context::new();
        let b = Context::new();
        assert_eq!(a.primitives.int, b.primitives.int, "handles are equal numbers");
        assert_eq!(a.display(a.primitives.int), b.display(b.primitives.int));
    }

    #[test]
    fn preamble_has_core_words() {
        let mut ctx = Context::new();
        let env = preamble_environment(&mut ctx);
        for word in ["+", "if_then", "call", "dup", "drop", "swap", "True"] {
            assert!(env.contains(word), "preamble should define `{word}`");
        }
    }

    #[test]
    fn preamble_types_are_closed() {
        let mut ctx = Context::new();
        let env = preamble_environment(&mut ctx);
        assert!(
            env.free_type_variables(&mut ctx).is_empty(),
            "preamble bindings must not leak free variables"
        );
    }
}
