//! AST nodes for the type-annotation sub-language.
//!
//! Type annotations appear in stack-effect declarations on `def`, in cast
//! words, and in quotation input-stack annotations. The parser builds these
//! nodes; lowering them to actual types happens in the type checker, which
//! is also where name resolution and kind checking live.

use tack_common::span::Position;

use crate::ast::ParseErrorNode;

/// A type expression as written in source.
#[derive(Debug, Clone, PartialEq)]
pub enum TypeExprNode {
    /// A type referred to by name, e.g. `int`.
    Named(NamedTypeExpr),
    /// A generic type applied to arguments, e.g. `list[int]`.
    Generic(GenericTypeExpr),
    /// An item type variable, e.g. `` `a ``.
    ItemVar(VarTypeExpr),
    /// A sequence ("rest of the stack") type variable, e.g. `*s`.
    SeqVar(VarTypeExpr),
    /// A parenthesized sequence of types.
    Sequence(TypeSequenceExpr),
    /// A stack effect, e.g. `(x:int y:int -- int)`.
    StackEffect(StackEffectTypeExpr),
    /// An anonymous structural object type, e.g. `{__call__: ...}`.
    Object(ObjectTypeExpr),
    /// A universally quantified type, e.g. ``forall `a. ...``.
    Forall(ForallTypeExpr),
    /// A recovered parse failure inside a type annotation.
    Error(Box<ParseErrorNode>),
}

impl TypeExprNode {
    pub fn location(&self) -> Position {
        match self {
            TypeExprNode::Named(n) => n.location,
            TypeExprNode::Generic(n) => n.location,
            TypeExprNode::ItemVar(n) | TypeExprNode::SeqVar(n) => n.location,
            TypeExprNode::Sequence(n) => n.location,
            TypeExprNode::StackEffect(n) => n.location,
            TypeExprNode::Object(n) => n.location,
            TypeExprNode::Forall(n) => n.location,
            TypeExprNode::Error(n) => n.location,
        }
    }

    pub fn end_location(&self) -> Position {
        match self {
            TypeExprNode::Named(n) => n.end_location,
            TypeExprNode::Generic(n) => n.end_location,
            TypeExprNode::ItemVar(n) | TypeExprNode::SeqVar(n) => n.end_location,
            TypeExprNode::Sequence(n) => n.end_location,
            TypeExprNode::StackEffect(n) => n.end_location,
            TypeExprNode::Object(n) => n.end_location,
            TypeExprNode::Forall(n) => n.end_location,
            TypeExprNode::Error(n) => n.end_location,
        }
    }

    /// Child type expressions, for failure propagation and traversal only.
    pub fn children(&self) -> Vec<&TypeExprNode> {
        match self {
            TypeExprNode::Named(_)
            | TypeExprNode::ItemVar(_)
            | TypeExprNode::SeqVar(_)
            | TypeExprNode::Error(_) => vec![],
            TypeExprNode::Generic(n) => {
                let mut children = vec![n.head.as_ref()];
                children.extend(n.arguments.iter());
                children
            }
            TypeExprNode::Sequence(n) => n.child_types(),
            TypeExprNode::StackEffect(n) => {
                let mut children = n.input.child_types();
                children.extend(n.output.child_types());
                children
            }
            TypeExprNode::Object(n) => n.attributes.iter().map(|(_, ty)| ty).collect(),
            TypeExprNode::Forall(n) => {
                let mut children: Vec<&TypeExprNode> = n.variables.iter().collect();
                children.push(n.body.as_ref());
                children
            }
        }
    }
}

/// A type referred to by name.
#[derive(Debug, Clone, PartialEq)]
pub struct NamedTypeExpr {
    pub name: String,
    pub location: Position,
    pub end_location: Position,
}

/// A generic type applied to arguments.
#[derive(Debug, Clone, PartialEq)]
pub struct GenericTypeExpr {
    pub head: Box<TypeExprNode>,
    pub arguments: Vec<TypeExprNode>,
    pub location: Position,
    pub end_location: Position,
}

/// An item or sequence type variable occurrence.
#[derive(Debug, Clone, PartialEq)]
pub struct VarTypeExpr {
    pub name: String,
    pub location: Position,
    pub end_location: Position,
}

/// One item of a type sequence: a name, a type, or a `name:type` pair.
///
/// Stack-effect sequences name their items (`x:int`, or a bare `x` that
/// stands for "some item type"); plain type sequences carry bare types.
/// At least one of `name` and `ty` is present.
#[derive(Debug, Clone, PartialEq)]
pub struct TypeSequenceItemExpr {
    pub name: Option<String>,
    pub ty: Option<TypeExprNode>,
    pub location: Position,
    pub end_location: Position,
}

/// An ordered sequence of types, optionally headed by a sequence variable.
#[derive(Debug, Clone, PartialEq)]
pub struct TypeSequenceExpr {
    pub sequence_variable: Option<VarTypeExpr>,
    pub items: Vec<TypeSequenceItemExpr>,
    pub location: Position,
    pub end_location: Position,
}

impl TypeSequenceExpr {
    fn child_types(&self) -> Vec<&TypeExprNode> {
        self.items
            .iter()
            .filter_map(|item| item.ty.as_ref())
            .collect()
    }
}

/// A stack-effect type: `(input -- output)`.
#[derive(Debug, Clone, PartialEq)]
pub struct StackEffectTypeExpr {
    pub input: TypeSequenceExpr,
    pub output: TypeSequenceExpr,
    pub location: Position,
    pub end_location: Position,
}

/// An anonymous structural object type.
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectTypeExpr {
    pub attributes: Vec<(String, TypeExprNode)>,
    pub location: Position,
    pub end_location: Position,
}

/// A universally quantified type.
#[derive(Debug, Clone, PartialEq)]
pub struct ForallTypeExpr {
    /// The quantified variables; each is `ItemVar` or `SeqVar`.
    pub variables: Vec<TypeExprNode>,
    pub body: Box<TypeExprNode>,
    pub location: Position,
    pub end_location: Position,
}
