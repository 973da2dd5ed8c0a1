//! Typing environments.
//!
//! An environment maps names to types. Scoping is copy-on-write: entering
//! a function body, a quotation or a class body clones the environment and
//! mutates the clone, so enclosing scopes never observe inner bindings.

use rustc_hash::FxHashMap;

use crate::context::Context;
use crate::error::StaticAnalysisError;
use crate::subst::Substitutions;
use crate::ty::TypeId;

/// A typing environment: `name -> type`.
#[derive(Debug, Clone, Default)]
pub struct Environment {
    bindings: FxHashMap<String, TypeId>,
}

impl Environment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, ty: TypeId) {
        self.bindings.insert(name.into(), ty);
    }

    pub fn get(&self, name: &str) -> Option<TypeId> {
        self.bindings.get(name).copied()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.bindings.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, TypeId)> {
        self.bindings.iter().map(|(name, ty)| (name.as_str(), *ty))
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// A new environment with every binding substituted.
    pub fn apply_substitution(
        &self,
        ctx: &mut Context,
        sub: &Substitutions,
    ) -> Result<Environment, StaticAnalysisError> {
        let mut bindings = FxHashMap::default();
        for (name, ty) in self.bindings.iter() {
            bindings.insert(name.clone(), ctx.apply_subst(sub, *ty)?);
        }
        Ok(Environment { bindings })
    }

    /// The union of the free type variables of every binding.
    pub fn free_type_variables(&self, ctx: &mut Context) -> Vec<TypeId> {
        let mut out = Vec::new();
        for (_, ty) in self.bindings.iter() {
            for var in ctx.free_type_variables(*ty) {
                if !out.contains(&var) {
                    out.push(var);
                }
            }
        }
        out
    }

    /// Merge `other`'s bindings over this environment's.
    pub fn extended_with(&self, other: &Environment) -> Environment {
        let mut merged = self.clone();
        for (name, ty) in other.iter() {
            merged.insert(name, ty);
        }
        merged
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Context;

    #[test]
    fn insert_and_lookup() {
        let ctx = Context::new();
        let mut env = Environment::new();
        env.insert("x", ctx.primitives.int);
        assert_eq!(env.get("x"), Some(ctx.primitives.int));
        assert_eq!(env.get("y"), None);
    }

    #[test]
    fn clone_is_copy_on_write() {
        let ctx = Context::new();
        let mut outer = Environment::new();
        outer.insert("x", ctx.primitives.int);
        let mut inner = outer.clone();
        inner.insert("x", ctx.primitives.str_);
        inner.insert("y", ctx.primitives.bool_);
        // The outer scope is unaffected by inner bindings.
        assert_eq!(outer.get("x"), Some(ctx.primitives.int));
        assert!(!outer.contains("y"));
        assert_eq!(inner.get("x"), Some(ctx.primitives.str_));
    }

    #[test]
    fn free_variables_of_bindings() {
        let mut ctx = Context::new();
        let var = ctx.fresh_item_var(crate::kind::Kind::Individual);
        let mut env = Environment::new();
        env.insert("x", var);
        env.insert("y", ctx.primitives.int);
        assert_eq!(env.free_type_variables(&mut ctx), vec![var]);
    }
}
