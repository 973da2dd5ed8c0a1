//! The module-resolver boundary.
//!
//! Resolving a dotted module name to the structural type of its exports
//! is an external concern (filesystem search, stub files, host
//! introspection); the checker only fixes the interface. The in-tree
//! implementations are a failing default and a map-backed resolver for
//! tests and embedders.

use std::path::Path;

use rustc_hash::FxHashMap;

use crate::context::Context;
use crate::error::StaticAnalysisError;
use crate::kind::Kind;
use crate::ty::TypeId;

/// Resolves a dotted module name to a structural type describing the
/// module's exported names.
pub trait ModuleResolver {
    fn resolve(
        &self,
        module: &str,
        source_dir: &Path,
        ctx: &mut Context,
    ) -> Result<TypeId, StaticAnalysisError>;
}

/// The default resolver: every import fails with "module not found".
#[derive(Debug, Default)]
pub struct NoModules;

impl ModuleResolver for NoModules {
    fn resolve(
        &self,
        module: &str,
        source_dir: &Path,
        _ctx: &mut Context,
    ) -> Result<TypeId, StaticAnalysisError> {
        Err(StaticAnalysisError::module_not_found(
            module,
            source_dir.display().to_string(),
        ))
    }
}

/// A resolver backed by a fixed name-to-type map.
#[derive(Debug, Default)]
pub struct MapResolver {
    modules: FxHashMap<String, TypeId>,
}

impl MapResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a module's structural export type.
    pub fn insert(&mut self, module: impl Into<String>, exports: TypeId) {
        self.modules.insert(module.into(), exports);
    }
}

impl ModuleResolver for MapResolver {
    fn resolve(
        &self,
        module: &str,
        source_dir: &Path,
        _ctx: &mut Context,
    ) -> Result<TypeId, StaticAnalysisError> {
        self.modules.get(module).copied().ok_or_else(|| {
            StaticAnalysisError::module_not_found(module, source_dir.display().to_string())
        })
    }
}

/// Wrap a module's structural export type in a nominal module brand.
pub fn module_value_type(ctx: &mut Context, module: &str, exports: TypeId) -> TypeId {
    let module_brand = ctx.primitives.module_brand;
    let brand = ctx.mk_brand(
        format!("type({module})"),
        Kind::Individual,
        vec![module_brand],
    );
    let ty = ctx.mk_nominal(brand, exports);
    ctx.set_name(ty, format!("type({module})"));
    ty
}

/// The value bound by `import a.b.c`: the outermost module, with each
/// component reachable as an attribute of its parent.
pub fn nested_module_type(ctx: &mut Context, module: &str, exports: TypeId) -> TypeId {
    let components: Vec<&str> = module.split('.').collect();
    let innermost = module_value_type(ctx, module, exports);
    let mut current = innermost;
    // Wrap outward: a.b.c becomes type(a) { b: type(a.b) { c: ... } }.
    for depth in (1..components.len()).rev() {
        let prefix = components[..depth].join(".");
        let attr_name = components[depth].to_string();
        let body = ctx.mk_object(vec![(attr_name, current)]);
        current = module_value_type(ctx, &prefix, body);
    }
    current
}
