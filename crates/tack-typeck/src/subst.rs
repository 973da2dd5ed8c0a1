//! Substitutions of type variables with types.
//!
//! A substitution is an immutable finite mapping from variable handles to
//! type handles. Every "update" builds a new value; the solver composes
//! substitutions eagerly into its running result, so composition never
//! needs to re-walk transitively.

use rustc_hash::FxHashMap;

use crate::context::Context;
use crate::error::{format_substitution_kind_error, StaticAnalysisError};
use crate::ty::TypeId;

/// An immutable mapping `variable -> type`.
///
/// Insertion checks kinds: a variable may be specialized to a type of an
/// equal-or-more-specific kind, never a less specific one.
#[derive(Debug, Clone, Default)]
pub struct Substitutions {
    map: FxHashMap<TypeId, TypeId>,
    /// Insertion order, for deterministic iteration and display.
    order: Vec<TypeId>,
    /// The `(subtype, supertype)` queries this substitution was built
    /// under, innermost first. Diagnostics only.
    pub subtyping_provenance: Vec<(TypeId, TypeId)>,
}

impl Substitutions {
    /// The empty substitution.
    pub fn empty() -> Self {
        Self::default()
    }

    /// A single-binding substitution. Fails when the binding would change
    /// the variable's kind for the worse.
    pub fn binding(
        ctx: &mut Context,
        var: TypeId,
        ty: TypeId,
    ) -> Result<Self, StaticAnalysisError> {
        let mut sub = Self::empty();
        sub.insert(ctx, var, ty)?;
        Ok(sub)
    }

    /// Build from bindings, kind-checking each.
    pub fn from_bindings(
        ctx: &mut Context,
        bindings: impl IntoIterator<Item = (TypeId, TypeId)>,
    ) -> Result<Self, StaticAnalysisError> {
        let mut sub = Self::empty();
        for (var, ty) in bindings {
            sub.insert(ctx, var, ty)?;
        }
        Ok(sub)
    }

    fn insert(
        &mut self,
        ctx: &mut Context,
        var: TypeId,
        ty: TypeId,
    ) -> Result<(), StaticAnalysisError> {
        let var_kind = ctx.kind_of(var);
        let ty_kind = ctx.kind_of(ty);
        if !var_kind.ge(&ty_kind) {
            return Err(StaticAnalysisError::type_error(
                format_substitution_kind_error(&ctx.display(var), &ctx.display(ty)),
            ));
        }
        if self.map.insert(var, ty).is_none() {
            self.order.push(var);
        }
        Ok(())
    }

    pub fn get(&self, var: TypeId) -> Option<TypeId> {
        self.map.get(&var).copied()
    }

    pub fn contains(&self, var: TypeId) -> bool {
        self.map.contains_key(&var)
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// Bindings in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (TypeId, TypeId)> + '_ {
        self.order.iter().map(move |v| (*v, self.map[v]))
    }

    /// This substitution restricted to variables *not* in `vars`. Used
    /// when substituting under a binder (a generic's parameters, a Fix
    /// variable).
    pub fn without(&self, vars: &[TypeId]) -> Self {
        let mut result = Self::empty();
        for (var, ty) in self.iter() {
            if !vars.contains(&var) {
                // Kind already checked at the original insertion.
                result.map.insert(var, ty);
                result.order.push(var);
            }
        }
        result.subtyping_provenance = self.subtyping_provenance.clone();
        result
    }

    /// Record a subtyping query this substitution was produced under.
    pub fn add_subtyping_provenance(&mut self, query: (TypeId, TypeId)) {
        self.subtyping_provenance.push(query);
    }

    /// Compose: apply `earlier` first, then `self`.
    ///
    /// The result maps each variable bound by `earlier` to `self` applied
    /// to its binding, plus `self`'s own bindings for variables `earlier`
    /// leaves free. Left-biased union, no transitive re-walk: callers
    /// substitute eagerly into ongoing results, so the ranges of `self`
    /// never need further rewriting here.
    pub fn compose(
        &self,
        ctx: &mut Context,
        earlier: &Substitutions,
    ) -> Result<Substitutions, StaticAnalysisError> {
        let mut result = self.clone();
        for (var, ty) in earlier.iter() {
            if !result.map.contains_key(&var) {
                let rewritten = ctx.apply_subst(self, ty)?;
                result.map.insert(var, rewritten);
                result.order.push(var);
            }
        }
        result.subtyping_provenance = earlier
            .subtyping_provenance
            .iter()
            .chain(self.subtyping_provenance.iter())
            .copied()
            .collect();
        Ok(result)
    }

    /// Render against a context, for debugging and tests.
    pub fn display(&self, ctx: &Context) -> String {
        let body = self
            .iter()
            .map(|(var, ty)| format!("{}: {}", ctx.display(var), ctx.display(ty)))
            .collect::<Vec<_>>()
            .join(", ");
        format!("{{{body}}}")
    }
}
