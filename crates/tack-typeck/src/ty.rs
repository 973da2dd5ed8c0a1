//! Type representation for the Tack type system.
//!
//! Types live in an arena owned by the per-compilation
//! [`crate::context::Context`]; a type's identity is its integer handle
//! [`TypeId`]. Handle equality is the *only* fast-path equality -- there is
//! no content equality on types, and equal-looking types allocated
//! separately are deliberately distinct (fresh variables are minted by
//! allocation, and the instantiation caches key on handle tuples).

use crate::kind::Kind;

/// Handle of a type in the arena. Identity, not content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TypeId(pub u32);

/// Handle of a brand in the brand arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BrandId(pub u32);

/// What sort of variable a [`TypeData::Variable`] is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VarFlavor {
    /// Rigid inside a generic body; introduced by annotations and class
    /// parameters. Never unified away -- constraining can bind *other*
    /// variables to it, never it to something else.
    Bound,
    /// An ordinary unification variable of item or individual kind.
    Item,
    /// Stands for the unspecified rest of a stack.
    Sequence,
}

/// A type variable.
#[derive(Debug, Clone, PartialEq)]
pub struct VarData {
    pub flavor: VarFlavor,
    pub kind: Kind,
}

impl VarData {
    /// Whether the solver may ever bind this variable (rigidity from the
    /// `rigid_variables` set is checked separately).
    pub fn is_bindable(&self) -> bool {
        self.flavor != VarFlavor::Bound
    }
}

/// An ordered stack shape: an optional leading sequence variable (the
/// unspecified rest of the stack) followed by individual types, top of
/// stack last.
///
/// Invariant (enforced at construction): only the head may be
/// sequence-kinded, and it must be a variable; every other element is
/// individually kinded.
#[derive(Debug, Clone, PartialEq)]
pub struct SeqData {
    pub rest: Option<TypeId>,
    pub items: Vec<TypeId>,
}

impl SeqData {
    pub fn is_empty(&self) -> bool {
        self.rest.is_none() && self.items.is_empty()
    }
}

/// The data of one type in the arena.
#[derive(Debug, Clone, PartialEq)]
pub enum TypeData {
    Variable(VarData),
    Sequence(SeqData),
    /// The type of words: an input stack shape and an output stack shape.
    /// Individually kinded -- a stack effect is a value (a quotation).
    StackEffect { input: TypeId, output: TypeId },
    /// A structural record of attributes. `is_class` marks constructor
    /// semantics: subtyping against a callable supertype is redirected
    /// through `__init__` with `self` bound off.
    Object {
        attributes: Vec<(String, TypeId)>,
        is_class: bool,
    },
    /// A nominal wrapper: subtyping against another nominal type goes
    /// through the brand DAG, never through structure.
    Nominal { brand: BrandId, ty: TypeId },
    /// A generic type template. Parameters are bound variables. Variadic
    /// generics collect all their arguments into one sequence argument.
    Generic {
        parameters: Vec<TypeId>,
        body: TypeId,
        is_variadic: bool,
    },
    /// A recursive type: `Fix(x, body)` where `x` may occur in `body`.
    Fix { var: TypeId, body: TypeId },
    /// The type of a host-language function: an argument tuple (as a
    /// sequence) and a return type.
    PyFunction { input: TypeId, output: TypeId },
    /// An overload set of host-language functions.
    PyOverloaded { overloads: Vec<TypeId> },
    /// `Optional[T]`: `none` or `T`, with a dedicated two-branch
    /// subtyping rule rather than ordinary sum-type matching.
    OptionalTy { argument: TypeId },
    /// The bottom type: a subtype of everything.
    NoReturn,
}

/// A nominal identity tag with an explicit supertype DAG.
#[derive(Debug, Clone)]
pub struct Brand {
    pub name: String,
    pub kind: Kind,
    pub superbrands: Vec<BrandId>,
}
