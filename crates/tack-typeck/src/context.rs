//! The per-compilation type checker context.
//!
//! The context owns the type arena, the brand arena, the memoization
//! tables, and the primitive types. One context is constructed per
//! compilation unit and threaded explicitly through every operation that
//! needs it; nothing is process-global, so independent compilations can
//! coexist.
//!
//! The memo tables (generic instantiation, Fix unrolling, free-variable
//! sets) are the only mutated state, and they are pure caches keyed by
//! stable handles into the immutable arena.

use rustc_hash::{FxHashMap, FxHashSet};

use crate::error::{
    format_item_type_expected_in_type_sequence_error, format_not_generic_type_error,
    format_wrong_number_of_type_arguments_error, StaticAnalysisError,
};
use crate::kind::{GenericKind, Kind};
use crate::subst::Substitutions;
use crate::ty::{Brand, BrandId, SeqData, TypeData, TypeId, VarData, VarFlavor};

/// Handles of the primitive types every compilation starts with.
///
/// Identity comparisons against these handles (`object` as top, `none`
/// inside Optional, `NoReturn` as bottom) are part of the solver's
/// contract, which is why they live on the context rather than being
/// re-allocated on demand.
#[derive(Debug, Clone)]
pub struct Primitives {
    pub object: TypeId,
    pub object_brand: BrandId,
    pub none: TypeId,
    pub int: TypeId,
    pub str_: TypeId,
    pub bool_: TypeId,
    pub no_return: TypeId,
    /// `Optional` as a generic, applied to one item type.
    pub optional: TypeId,
    /// `py_function` as a generic over (inputs, output).
    pub py_function: TypeId,
    /// `py_overloaded` as a variadic generic over overloads.
    pub py_overloaded: TypeId,
    pub list: TypeId,
    pub tuple: TypeId,
    pub iterable: TypeId,
    pub module_brand: BrandId,
}

/// The type checker context: arenas, caches and primitives.
pub struct Context {
    types: Vec<TypeData>,
    brands: Vec<Brand>,
    /// User-facing names for display (`int`, `list[int]`, class names).
    names: FxHashMap<TypeId, String>,
    /// Generic instantiation results keyed by the identity tuple of the
    /// actual arguments. Identity-keyed on purpose: instantiation also
    /// freshens truly-generic variables, and identity caching is what
    /// keeps repeated requests from re-freshening without bound.
    instantiation_cache: FxHashMap<(TypeId, Vec<TypeId>), TypeId>,
    /// Fix unrolling, memoized per Fix handle.
    unroll_cache: FxHashMap<TypeId, TypeId>,
    ftv_cache: FxHashMap<TypeId, Vec<TypeId>>,
    /// Guard for self-recursive free-variable computations: while a
    /// type's set is being computed, a re-entrant query sees no new
    /// variables.
    ftv_in_progress: FxHashSet<TypeId>,
    pub primitives: Primitives,
}

impl Context {
    /// Create a context with the primitive types installed.
    pub fn new() -> Self {
        let mut ctx = Context {
            types: Vec::new(),
            brands: Vec::new(),
            names: FxHashMap::default(),
            instantiation_cache: FxHashMap::default(),
            unroll_cache: FxHashMap::default(),
            ftv_cache: FxHashMap::default(),
            ftv_in_progress: FxHashSet::default(),
            // Placeholder handles, replaced by `install_primitives` before
            // the context is handed out.
            primitives: Primitives {
                object: TypeId(u32::MAX),
                object_brand: BrandId(u32::MAX),
                none: TypeId(u32::MAX),
                int: TypeId(u32::MAX),
                str_: TypeId(u32::MAX),
                bool_: TypeId(u32::MAX),
                no_return: TypeId(u32::MAX),
                optional: TypeId(u32::MAX),
                py_function: TypeId(u32::MAX),
                py_overloaded: TypeId(u32::MAX),
                list: TypeId(u32::MAX),
                tuple: TypeId(u32::MAX),
                iterable: TypeId(u32::MAX),
                module_brand: BrandId(u32::MAX),
            },
        };
        crate::builtins::install_primitives(&mut ctx);
        ctx
    }

    // ── Arena access ───────────────────────────────────────────────────

    pub fn alloc(&mut self, data: TypeData) -> TypeId {
        let id = TypeId(self.types.len() as u32);
        self.types.push(data);
        id
    }

    pub fn data(&self, id: TypeId) -> &TypeData {
        &self.types[id.0 as usize]
    }

    pub fn mk_brand(&mut self, name: impl Into<String>, kind: Kind, superbrands: Vec<BrandId>) -> BrandId {
        let id = BrandId(self.brands.len() as u32);
        self.brands.push(Brand {
            name: name.into(),
            kind,
            superbrands,
        });
        id
    }

    pub fn brand(&self, id: BrandId) -> &Brand {
        &self.brands[id.0 as usize]
    }

    /// Brand reachability in the superbrand DAG. The object brand is a
    /// universal superbrand.
    pub fn is_subbrand_of(&self, sub: BrandId, sup: BrandId) -> bool {
        if sub == sup || sup == self.primitives.object_brand {
            return true;
        }
        self.brand(sub)
            .superbrands
            .iter()
            .any(|&parent| parent == sup || self.is_subbrand_of(parent, sup))
    }

    /// Record a user-facing name for a type.
    pub fn set_name(&mut self, id: TypeId, name: impl Into<String>) {
        self.names.insert(id, name.into());
    }

    // ── Variables ──────────────────────────────────────────────────────

    /// A fresh unification variable of the given (item-or-below) kind.
    pub fn fresh_item_var(&mut self, kind: Kind) -> TypeId {
        debug_assert!(kind.le(&Kind::Item), "item variables have item kind or below");
        self.alloc(TypeData::Variable(VarData {
            flavor: VarFlavor::Item,
            kind,
        }))
    }

    /// A fresh "rest of the stack" variable.
    pub fn fresh_seq_var(&mut self) -> TypeId {
        self.alloc(TypeData::Variable(VarData {
            flavor: VarFlavor::Sequence,
            kind: Kind::Sequence,
        }))
    }

    /// A fresh rigid (annotation-scoped) variable.
    pub fn fresh_bound_var(&mut self, kind: Kind) -> TypeId {
        self.alloc(TypeData::Variable(VarData {
            flavor: VarFlavor::Bound,
            kind,
        }))
    }

    /// A fresh unification variable standing in for `var`.
    pub fn freshen_var(&mut self, var: TypeId) -> TypeId {
        let kind = self.kind_of(var);
        if kind == Kind::Sequence {
            self.fresh_seq_var()
        } else {
            self.fresh_item_var(kind)
        }
    }

    pub fn var_data(&self, id: TypeId) -> Option<&VarData> {
        match self.data(id) {
            TypeData::Variable(v) => Some(v),
            _ => None,
        }
    }

    // ── Constructors ───────────────────────────────────────────────────

    /// Build a normalized type sequence from elements.
    ///
    /// Only the first element may be sequence-kinded, and then only if it
    /// is a variable or another sequence (which is spliced in). Every
    /// other element must be item-kinded.
    pub fn mk_sequence(&mut self, elements: &[TypeId]) -> Result<TypeId, StaticAnalysisError> {
        let mut rest: Option<TypeId> = None;
        let mut items: Vec<TypeId> = Vec::new();
        for (i, &element) in elements.iter().enumerate() {
            let kind = self.kind_of(element);
            if kind == Kind::Sequence {
                if i != 0 {
                    return Err(StaticAnalysisError::type_error(
                        format_item_type_expected_in_type_sequence_error(&self.display(element)),
                    ));
                }
                match self.data(element) {
                    TypeData::Variable(_) => rest = Some(element),
                    TypeData::Sequence(seq) => {
                        rest = seq.rest;
                        items.extend(seq.items.iter().copied());
                    }
                    _ => {
                        return Err(StaticAnalysisError::type_error(
                            format_item_type_expected_in_type_sequence_error(
                                &self.display(element),
                            ),
                        ))
                    }
                }
            } else if kind.le(&Kind::Item) {
                items.push(element);
            } else {
                return Err(StaticAnalysisError::type_error(
                    format_item_type_expected_in_type_sequence_error(&self.display(element)),
                ));
            }
        }
        Ok(self.alloc(TypeData::Sequence(SeqData { rest, items })))
    }

    /// The empty stack shape.
    pub fn empty_sequence(&mut self) -> TypeId {
        self.alloc(TypeData::Sequence(SeqData {
            rest: None,
            items: Vec::new(),
        }))
    }

    /// The sequence data of a sequence type.
    pub fn seq(&self, id: TypeId) -> &SeqData {
        match self.data(id) {
            TypeData::Sequence(seq) => seq,
            other => panic!("expected a sequence type, got {other:?}"),
        }
    }

    pub fn mk_stack_effect(&mut self, input: TypeId, output: TypeId) -> TypeId {
        self.alloc(TypeData::StackEffect { input, output })
    }

    pub fn mk_object(&mut self, attributes: Vec<(String, TypeId)>) -> TypeId {
        self.alloc(TypeData::Object {
            attributes,
            is_class: false,
        })
    }

    pub fn mk_class(&mut self, attributes: Vec<(String, TypeId)>) -> TypeId {
        self.alloc(TypeData::Object {
            attributes,
            is_class: true,
        })
    }

    pub fn mk_nominal(&mut self, brand: BrandId, ty: TypeId) -> TypeId {
        self.alloc(TypeData::Nominal { brand, ty })
    }

    pub fn mk_generic(
        &mut self,
        parameters: Vec<TypeId>,
        body: TypeId,
        is_variadic: bool,
    ) -> TypeId {
        debug_assert!(!parameters.is_empty(), "generic types have parameters");
        self.alloc(TypeData::Generic {
            parameters,
            body,
            is_variadic,
        })
    }

    pub fn mk_fix(&mut self, var: TypeId, body: TypeId) -> TypeId {
        debug_assert!(
            self.kind_of(var).ge(&self.kind_of(body)),
            "a Fix variable's kind covers its body's kind"
        );
        self.alloc(TypeData::Fix { var, body })
    }

    pub fn mk_py_function(
        &mut self,
        input: TypeId,
        output: TypeId,
    ) -> Result<TypeId, StaticAnalysisError> {
        if self.kind_of(input) != Kind::Sequence {
            return Err(StaticAnalysisError::type_error(format!(
                "{} must be a sequence type, but has kind {}",
                self.display(input),
                self.kind_of(input)
            )));
        }
        if !self.kind_of(output).le(&Kind::Item) {
            return Err(StaticAnalysisError::type_error(format!(
                "{} must be an item type, but has kind {}",
                self.display(output),
                self.kind_of(output)
            )));
        }
        Ok(self.alloc(TypeData::PyFunction { input, output }))
    }

    /// Build an overload set, flattening nested overload sets and
    /// sequence packs.
    pub fn mk_py_overloaded(
        &mut self,
        overloads: &[TypeId],
    ) -> Result<TypeId, StaticAnalysisError> {
        let mut fixed: Vec<TypeId> = Vec::new();
        for &overload in overloads {
            match self.data(overload) {
                TypeData::PyOverloaded { overloads: inner } => {
                    fixed.extend(inner.iter().copied());
                }
                TypeData::Sequence(seq) => {
                    if let Some(rest) = seq.rest {
                        fixed.push(rest);
                    }
                    fixed.extend(seq.items.iter().copied());
                }
                TypeData::PyFunction { .. } | TypeData::Variable(_) => fixed.push(overload),
                _ => {
                    return Err(StaticAnalysisError::type_error(format!(
                        "{} cannot be the type of an overload of a Python function",
                        self.display(overload)
                    )))
                }
            }
        }
        Ok(self.alloc(TypeData::PyOverloaded { overloads: fixed }))
    }

    pub fn mk_optional(&mut self, argument: TypeId) -> Result<TypeId, StaticAnalysisError> {
        let kind = self.kind_of(argument);
        if !kind.le(&Kind::Item) || kind == Kind::Sequence {
            return Err(StaticAnalysisError::type_error(format!(
                "{} must be an item type, but has kind {kind}",
                self.display(argument)
            )));
        }
        Ok(self.alloc(TypeData::OptionalTy { argument }))
    }

    // ── Queries ────────────────────────────────────────────────────────

    pub fn kind_of(&self, id: TypeId) -> Kind {
        match self.data(id) {
            TypeData::Variable(v) => v.kind.clone(),
            TypeData::Sequence(_) => Kind::Sequence,
            TypeData::StackEffect { .. }
            | TypeData::Object { .. }
            | TypeData::PyFunction { .. }
            | TypeData::PyOverloaded { .. }
            | TypeData::OptionalTy { .. }
            | TypeData::NoReturn => Kind::Individual,
            TypeData::Nominal { ty, .. } => self.kind_of(*ty),
            TypeData::Generic {
                parameters, body, ..
            } => Kind::Generic(GenericKind {
                parameters: parameters.iter().map(|p| self.kind_of(*p)).collect(),
                result: Box::new(self.kind_of(*body)),
            }),
            TypeData::Fix { var, .. } => self.kind_of(*var),
        }
    }

    /// The brand of a nominal type (looking through Fix), if any.
    pub fn brand_of(&self, id: TypeId) -> Option<BrandId> {
        match self.data(id) {
            TypeData::Nominal { brand, .. } => Some(*brand),
            TypeData::Fix { body, .. } => self.brand_of(*body),
            _ => None,
        }
    }

    /// Whether this type *is* the designated universal `object` type.
    pub fn is_object_type(&self, id: TypeId) -> bool {
        id == self.primitives.object || self.brand_of(id) == Some(self.primitives.object_brand)
    }

    /// Free type variables, in first-occurrence order.
    pub fn free_type_variables(&mut self, id: TypeId) -> Vec<TypeId> {
        if let Some(cached) = self.ftv_cache.get(&id) {
            return cached.clone();
        }
        if !self.ftv_in_progress.insert(id) {
            // Self-recursion contributes no new variables.
            return Vec::new();
        }
        let result = self.compute_ftv(id);
        self.ftv_in_progress.remove(&id);
        self.ftv_cache.insert(id, result.clone());
        result
    }

    fn compute_ftv(&mut self, id: TypeId) -> Vec<TypeId> {
        fn extend(out: &mut Vec<TypeId>, more: Vec<TypeId>) {
            for v in more {
                if !out.contains(&v) {
                    out.push(v);
                }
            }
        }
        let mut out = Vec::new();
        match self.data(id).clone() {
            TypeData::Variable(_) => out.push(id),
            TypeData::Sequence(seq) => {
                if let Some(rest) = seq.rest {
                    extend(&mut out, self.free_type_variables(rest));
                }
                for item in seq.items {
                    extend(&mut out, self.free_type_variables(item));
                }
            }
            TypeData::StackEffect { input, output } => {
                extend(&mut out, self.free_type_variables(input));
                extend(&mut out, self.free_type_variables(output));
            }
            TypeData::Object { attributes, .. } => {
                for (_, ty) in attributes {
                    extend(&mut out, self.free_type_variables(ty));
                }
            }
            TypeData::Nominal { ty, .. } => extend(&mut out, self.free_type_variables(ty)),
            TypeData::Generic {
                parameters, body, ..
            } => {
                let body_ftv = self.free_type_variables(body);
                extend(
                    &mut out,
                    body_ftv
                        .into_iter()
                        .filter(|v| !parameters.contains(v))
                        .collect(),
                );
            }
            TypeData::Fix { var, body } => {
                let body_ftv = self.free_type_variables(body);
                extend(
                    &mut out,
                    body_ftv.into_iter().filter(|v| *v != var).collect(),
                );
            }
            TypeData::PyFunction { input, output } => {
                extend(&mut out, self.free_type_variables(input));
                extend(&mut out, self.free_type_variables(output));
            }
            TypeData::PyOverloaded { overloads } => {
                for overload in overloads {
                    extend(&mut out, self.free_type_variables(overload));
                }
            }
            TypeData::OptionalTy { argument } => {
                extend(&mut out, self.free_type_variables(argument));
            }
            TypeData::NoReturn => {}
        }
        out
    }

    /// Occurs check: does `var` appear free in `ty`?
    pub fn occurs_in(&mut self, var: TypeId, ty: TypeId) -> bool {
        self.free_type_variables(ty).contains(&var)
    }

    // ── Substitution application ───────────────────────────────────────

    /// Apply a substitution, returning a fresh type (or the same handle
    /// when no free variable of the type is in the substitution's
    /// domain).
    pub fn apply_subst(
        &mut self,
        sub: &Substitutions,
        id: TypeId,
    ) -> Result<TypeId, StaticAnalysisError> {
        if sub.is_empty() {
            return Ok(id);
        }
        let ftv = self.free_type_variables(id);
        if !ftv.iter().any(|v| sub.contains(*v)) {
            return Ok(id);
        }
        match self.data(id).clone() {
            TypeData::Variable(_) => Ok(sub.get(id).unwrap_or(id)),
            TypeData::Sequence(seq) => {
                let mut elements = Vec::new();
                if let Some(rest) = seq.rest {
                    let new_rest = self.apply_subst(sub, rest)?;
                    match self.data(new_rest).clone() {
                        // A rest variable bound to a whole sequence is
                        // spliced into this one.
                        TypeData::Sequence(inner) => {
                            if let Some(inner_rest) = inner.rest {
                                elements.push(inner_rest);
                            }
                            elements.extend(inner.items);
                        }
                        _ => elements.push(new_rest),
                    }
                }
                for item in seq.items {
                    elements.push(self.apply_subst(sub, item)?);
                }
                self.mk_sequence(&elements)
            }
            TypeData::StackEffect { input, output } => {
                let input = self.apply_subst(sub, input)?;
                let output = self.apply_subst(sub, output)?;
                Ok(self.mk_stack_effect(input, output))
            }
            TypeData::Object {
                attributes,
                is_class,
            } => {
                let mut new_attrs = Vec::with_capacity(attributes.len());
                for (name, ty) in attributes {
                    new_attrs.push((name, self.apply_subst(sub, ty)?));
                }
                Ok(self.alloc(TypeData::Object {
                    attributes: new_attrs,
                    is_class,
                }))
            }
            TypeData::Nominal { brand, ty } => {
                let inner = self.apply_subst(sub, ty)?;
                let result = self.mk_nominal(brand, inner);
                if let Some(name) = self.names.get(&id).cloned() {
                    self.set_name(result, name);
                }
                Ok(result)
            }
            TypeData::Generic {
                parameters,
                body,
                is_variadic,
            } => {
                // Do not substitute under the binder.
                let filtered = sub.without(&parameters);
                let new_body = self.apply_subst(&filtered, body)?;
                Ok(self.mk_generic(parameters, new_body, is_variadic))
            }
            TypeData::Fix { var, body } => {
                let filtered = sub.without(&[var]);
                let new_body = self.apply_subst(&filtered, body)?;
                Ok(self.mk_fix(var, new_body))
            }
            TypeData::PyFunction { input, output } => {
                let input = self.apply_subst(sub, input)?;
                let output = self.apply_subst(sub, output)?;
                self.mk_py_function(input, output)
            }
            TypeData::PyOverloaded { overloads } => {
                let mut new_overloads = Vec::with_capacity(overloads.len());
                for overload in overloads {
                    new_overloads.push(self.apply_subst(sub, overload)?);
                }
                self.mk_py_overloaded(&new_overloads)
            }
            TypeData::OptionalTy { argument } => {
                let argument = self.apply_subst(sub, argument)?;
                self.mk_optional(argument)
            }
            TypeData::NoReturn => Ok(id),
        }
    }

    // ── Generics and recursion ─────────────────────────────────────────

    /// Apply a generic type to arguments.
    ///
    /// Instantiations are cached by the identity tuple of the arguments:
    /// re-applying with equal-but-distinct argument types is a cache
    /// miss, on purpose.
    pub fn generic_apply(
        &mut self,
        generic: TypeId,
        type_arguments: &[TypeId],
    ) -> Result<TypeId, StaticAnalysisError> {
        let TypeData::Generic {
            parameters,
            body,
            is_variadic,
        } = self.data(generic).clone()
        else {
            return Err(StaticAnalysisError::type_error(
                format_not_generic_type_error(&self.display(generic)),
            ));
        };
        let args: Vec<TypeId> = if is_variadic {
            vec![self.mk_sequence(type_arguments)?]
        } else {
            type_arguments.to_vec()
        };
        let key = (generic, args.clone());
        if let Some(&hit) = self.instantiation_cache.get(&key) {
            return Ok(hit);
        }
        if parameters.len() != args.len() {
            return Err(StaticAnalysisError::type_error(
                format_wrong_number_of_type_arguments_error(parameters.len(), args.len()),
            ));
        }
        for (&param, &arg) in parameters.iter().zip(args.iter()) {
            let param_kind = self.kind_of(param);
            let arg_kind = self.kind_of(arg);
            if !param_kind.ge(&arg_kind) {
                return Err(StaticAnalysisError::type_error(format!(
                    "argument {} of {} has kind {arg_kind}, but kind {param_kind} was expected",
                    self.display(arg),
                    self.display(generic),
                )));
            }
        }
        let sub = Substitutions::from_bindings(
            self,
            parameters.iter().copied().zip(args.iter().copied()),
        )?;
        let mut instance = self.apply_subst(&sub, body)?;
        if let Some(name) = self.names.get(&generic).cloned() {
            if instance == body {
                // The body does not mention the parameters; copy it so the
                // instance name does not leak onto the shared body.
                instance = self.alloc(self.data(body).clone());
            }
            // Render the arguments as written, before variadic packing.
            let rendered: Vec<String> = type_arguments
                .iter()
                .map(|a| self.display(*a))
                .collect();
            self.set_name(instance, format!("{name}[{}]", rendered.join(", ")));
        }
        self.instantiation_cache.insert(key, instance);
        Ok(instance)
    }

    /// Instantiate a generic by freshening all of its parameters; any
    /// other type instantiates to itself.
    pub fn instantiate(&mut self, id: TypeId) -> Result<TypeId, StaticAnalysisError> {
        match self.data(id).clone() {
            TypeData::Generic { parameters, .. } => {
                let fresh: Vec<TypeId> = parameters
                    .iter()
                    .map(|&p| self.freshen_var(p))
                    .collect();
                self.generic_apply(id, &fresh)
            }
            _ => Ok(id),
        }
    }

    /// Unroll a recursive type one level: substitute the bound variable
    /// with the whole Fix node. Memoized per Fix handle; the unrolled
    /// type keeps its own handle so subtyping assumptions stay useful.
    pub fn unroll_fix(&mut self, fix: TypeId) -> Result<TypeId, StaticAnalysisError> {
        if let Some(&hit) = self.unroll_cache.get(&fix) {
            return Ok(hit);
        }
        let TypeData::Fix { var, body } = self.data(fix).clone() else {
            panic!("unroll_fix called on a non-Fix type");
        };
        let sub = Substitutions::binding(self, var, fix)?;
        let unrolled = self.apply_subst(&sub, body)?;
        if let Some(name) = self.names.get(&fix).cloned() {
            self.set_name(unrolled, name);
        }
        self.unroll_cache.insert(fix, unrolled);
        Ok(unrolled)
    }

    // ── Attributes ─────────────────────────────────────────────────────

    /// The structural attributes of a type.
    pub fn attributes(
        &mut self,
        id: TypeId,
    ) -> Result<Vec<(String, TypeId)>, StaticAnalysisError> {
        match self.data(id).clone() {
            TypeData::Object { attributes, .. } => Ok(attributes),
            TypeData::StackEffect { .. }
            | TypeData::PyFunction { .. }
            | TypeData::PyOverloaded { .. } => Ok(vec![("__call__".to_string(), id)]),
            TypeData::Nominal { ty, .. } => self.attributes(ty),
            TypeData::Fix { .. } => {
                let unrolled = self.unroll_fix(id)?;
                self.attributes(unrolled)
            }
            TypeData::NoReturn => Ok(Vec::new()),
            _ => Err(StaticAnalysisError::type_error(format!(
                "the attributes of {} are unknown here",
                self.display(id)
            ))),
        }
    }

    /// Look up one attribute. `NoReturn` has every attribute (it is
    /// uninhabited); everything else consults the structural record.
    pub fn get_attribute(
        &mut self,
        id: TypeId,
        name: &str,
    ) -> Result<TypeId, StaticAnalysisError> {
        if matches!(self.data(id), TypeData::NoReturn) {
            return Ok(self.primitives.no_return);
        }
        let attributes = self.attributes(id)?;
        attributes
            .into_iter()
            .find(|(attr, _)| attr == name)
            .map(|(_, ty)| ty)
            .ok_or_else(|| StaticAnalysisError::attribute(self.display(id), name))
    }

    pub fn has_attribute(&mut self, id: TypeId, name: &str) -> bool {
        self.get_attribute(id, name).is_ok()
    }

    // ── Display ────────────────────────────────────────────────────────

    /// Render a type for messages and tests.
    pub fn display(&self, id: TypeId) -> String {
        if let Some(name) = self.names.get(&id) {
            return name.clone();
        }
        match self.data(id) {
            TypeData::Variable(v) => match v.flavor {
                VarFlavor::Sequence => format!("*s{}", id.0),
                _ => format!("`t{}", id.0),
            },
            TypeData::Sequence(_) => format!("[{}]", self.display_members(id, ", ")),
            TypeData::StackEffect { input, output } => format!(
                "({} -- {})",
                self.display_members(*input, " "),
                self.display_members(*output, " ")
            ),
            TypeData::Object { attributes, .. } => {
                let body = attributes
                    .iter()
                    .map(|(name, ty)| format!("{name}: {}", self.display(*ty)))
                    .collect::<Vec<_>>()
                    .join(", ");
                format!("{{{body}}}")
            }
            TypeData::Nominal { brand, .. } => self.brand(*brand).name.clone(),
            TypeData::Generic {
                parameters, body, ..
            } => {
                let params = parameters
                    .iter()
                    .map(|p| self.display(*p))
                    .collect::<Vec<_>>()
                    .join(" ");
                format!("forall {params}. {}", self.display(*body))
            }
            TypeData::Fix { var, body } => match self.data(*body) {
                TypeData::Nominal { brand, .. } => self.brand(*brand).name.clone(),
                _ => format!("Fix({}, {})", self.display(*var), self.display(*body)),
            },
            TypeData::PyFunction { input, output } => {
                format!(
                    "py_function[{}, {}]",
                    self.display(*input),
                    self.display(*output)
                )
            }
            TypeData::PyOverloaded { overloads } => {
                let body = overloads
                    .iter()
                    .map(|o| self.display(*o))
                    .collect::<Vec<_>>()
                    .join(", ");
                format!("py_overloaded[{body}]")
            }
            TypeData::OptionalTy { argument } => {
                format!("Optional[{}]", self.display(*argument))
            }
            TypeData::NoReturn => "NoReturn".to_string(),
        }
    }

    /// The members of a sequence, joined by `sep`. Non-sequence handles
    /// (bare sequence variables) render as themselves.
    pub fn display_members(&self, id: TypeId, sep: &str) -> String {
        match self.data(id) {
            TypeData::Sequence(seq) => {
                let mut parts = Vec::new();
                if let Some(rest) = seq.rest {
                    parts.push(self.display(rest));
                }
                for item in &seq.items {
                    parts.push(self.display(*item));
                }
                parts.join(sep)
            }
            _ => self.display(id),
        }
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}
