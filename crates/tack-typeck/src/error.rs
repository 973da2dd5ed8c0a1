//! Static-analysis errors.
//!
//! All type-checking failures share one error value carrying a kind and an
//! optional source location. The location is filled in exactly once, at
//! the shallowest point that has access to the causing AST node, via
//! [`StaticAnalysisError::set_location_if_missing`]; a deeper, more
//! specific location is never overwritten.
//!
//! [`ErrorKind::UnhandledNode`] is conceptually "not implemented" rather
//! than "the user's program is wrong": it marks implementation gaps and
//! should be surfaced as an internal error, not an ordinary diagnostic.

use std::fmt;

use serde::Serialize;
use tack_common::diag::Diagnostic;
use tack_common::span::Position;

/// Any error raised by the type checker.
#[derive(Debug, Clone, PartialEq)]
pub struct StaticAnalysisError {
    pub kind: ErrorKind,
    /// The narrowest source location the error could be attributed to.
    pub location: Option<Position>,
}

/// The specific kind of static-analysis error.
///
/// Type names are rendered into the error at raise time (the renderer has
/// the type arena in hand there; the error value outlives it).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum ErrorKind {
    /// A general subtyping or kind failure between two types.
    Type { message: String },
    /// Two stack shapes could not be matched.
    StackMismatch { actual: String, expected: String },
    /// An attribute was looked up on a type that lacks it.
    Attribute { ty: String, attribute: String },
    /// A name was used before being defined.
    Name { name: String },
    /// An attempt to bind a rigid (universally quantified) variable.
    RigidVariable { variable: String, ty: String },
    /// Binding would create an infinite type.
    OccursCheck { variable: String, ty: String },
    /// The module resolver could not find a module.
    ModuleNotFound { module: String, source_dir: String },
    /// An AST node the checker does not handle: an implementation bug,
    /// not a user error.
    UnhandledNode { description: String },
}

impl StaticAnalysisError {
    pub fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            location: None,
        }
    }

    /// A general type error with a pre-rendered message.
    pub fn type_error(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Type {
            message: message.into(),
        })
    }

    pub fn stack_mismatch(actual: impl Into<String>, expected: impl Into<String>) -> Self {
        Self::new(ErrorKind::StackMismatch {
            actual: actual.into(),
            expected: expected.into(),
        })
    }

    pub fn attribute(ty: impl Into<String>, attribute: impl Into<String>) -> Self {
        Self::new(ErrorKind::Attribute {
            ty: ty.into(),
            attribute: attribute.into(),
        })
    }

    pub fn name(name: impl Into<String>, location: Option<Position>) -> Self {
        Self {
            kind: ErrorKind::Name { name: name.into() },
            location,
        }
    }

    pub fn rigid_variable(variable: impl Into<String>, ty: impl Into<String>) -> Self {
        Self::new(ErrorKind::RigidVariable {
            variable: variable.into(),
            ty: ty.into(),
        })
    }

    pub fn occurs_check(variable: impl Into<String>, ty: impl Into<String>) -> Self {
        Self::new(ErrorKind::OccursCheck {
            variable: variable.into(),
            ty: ty.into(),
        })
    }

    pub fn module_not_found(module: impl Into<String>, source_dir: impl Into<String>) -> Self {
        Self::new(ErrorKind::ModuleNotFound {
            module: module.into(),
            source_dir: source_dir.into(),
        })
    }

    pub fn unhandled_node(description: impl Into<String>) -> Self {
        Self::new(ErrorKind::UnhandledNode {
            description: description.into(),
        })
    }

    /// Attach a location unless a deeper raise site already set one.
    pub fn set_location_if_missing(&mut self, location: Position) {
        if self.location.is_none() {
            self.location = Some(location);
        }
    }

    /// Whether this error represents an occurs-check failure.
    pub fn is_occurs_check_fail(&self) -> bool {
        matches!(self.kind, ErrorKind::OccursCheck { .. })
    }

    /// Whether this error marks an implementation gap rather than a
    /// problem in the user's program.
    pub fn is_internal(&self) -> bool {
        matches!(self.kind, ErrorKind::UnhandledNode { .. })
    }

    /// Reduce to the diagnostic-sink shape.
    pub fn to_diagnostic(&self) -> Diagnostic {
        Diagnostic {
            message: self.kind.to_string(),
            location: self.location,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::Type { message } => write!(f, "{message}"),
            ErrorKind::StackMismatch { actual, expected } => write!(
                f,
                "the stack here is {actual}, but sequence type {expected} was expected"
            ),
            ErrorKind::Attribute { ty, attribute } => write!(
                f,
                "object of type {ty} does not have attribute {attribute}"
            ),
            ErrorKind::Name { name } => write!(f, "name `{name}` not previously defined"),
            ErrorKind::RigidVariable { variable, ty } => {
                write!(f, "{variable} is rigid and cannot be unified with {ty}")
            }
            ErrorKind::OccursCheck { variable, ty } => write!(
                f,
                "{variable} cannot be a subtype of {ty} because it would form a recursive type"
            ),
            ErrorKind::ModuleNotFound { module, source_dir } => write!(
                f,
                "cannot find module {module} from source directory {source_dir}"
            ),
            ErrorKind::UnhandledNode { description } => {
                write!(f, "internal error: unhandled node {description}")
            }
        }
    }
}

impl fmt::Display for StaticAnalysisError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.location {
            Some(loc) => write!(f, "{} at {}", self.kind, loc),
            None => write!(f, "{}", self.kind),
        }
    }
}

impl std::error::Error for StaticAnalysisError {}

// ── Shared message formatting ──────────────────────────────────────────

pub fn format_subtyping_error(subtype: &str, supertype: &str) -> String {
    format!("{subtype} cannot be a subtype of {supertype}")
}

pub fn format_subkinding_error(sub: &str, sub_kind: &str, sup: &str, sup_kind: &str) -> String {
    format!("the kind of {sub} ({sub_kind}) is incompatible with the kind of {sup} ({sup_kind})")
}

pub fn format_wrong_number_of_type_arguments_error(expected: usize, actual: usize) -> String {
    format!("a generic type expected to receive {expected} arguments, got {actual}")
}

pub fn format_item_type_expected_in_type_sequence_error(ty: &str) -> String {
    format!("an item type was expected in this part of a type sequence, got {ty}")
}

pub fn format_not_generic_type_error(ty: &str) -> String {
    format!("{ty} is not a generic type")
}

pub fn format_substitution_kind_error(variable: &str, ty: &str) -> String {
    format!("{variable} is being substituted by {ty}, which has the wrong kind")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn location_is_set_exactly_once() {
        let mut err = StaticAnalysisError::type_error("int cannot be a subtype of str");
        err.set_location_if_missing(Position::new(3, 7));
        // A shallower catch must not overwrite the deeper location.
        err.set_location_if_missing(Position::new(1, 0));
        assert_eq!(err.location, Some(Position::new(3, 7)));
    }

    #[test]
    fn display_includes_location() {
        let mut err = StaticAnalysisError::name("swap", None);
        err.set_location_if_missing(Position::new(2, 4));
        assert_eq!(
            err.to_string(),
            "name `swap` not previously defined at 2:4"
        );
    }

    #[test]
    fn internal_errors_are_distinguished() {
        assert!(StaticAnalysisError::unhandled_node("pragma").is_internal());
        assert!(!StaticAnalysisError::type_error("boom").is_internal());
    }

    #[test]
    fn occurs_check_flag() {
        assert!(StaticAnalysisError::occurs_check("*s", "[*s, int]").is_occurs_check_fail());
        assert!(!StaticAnalysisError::type_error("boom").is_occurs_check_fail());
    }

    #[test]
    fn diagnostic_shape() {
        let err = StaticAnalysisError::attribute("int", "__call__");
        let diag = err.to_diagnostic();
        assert_eq!(
            diag.message,
            "object of type int does not have attribute __call__"
        );
        assert_eq!(diag.location, None);
    }
}
