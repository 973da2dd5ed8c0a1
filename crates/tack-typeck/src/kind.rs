//! Kinds: the "types of types".
//!
//! Kinds classify type expressions before any structural work happens:
//! applying a generic to arguments of the wrong kind, or putting a
//! sequence where an individual type belongs, is rejected here. The order
//! is a DAG with `Item` as the top element.

use std::fmt;

/// The kind of a type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Kind {
    /// The top kind: any individual, sequence or generic type.
    Item,
    /// The kind of ordinary value types (`int`, stack effects, objects).
    Individual,
    /// The kind of stack-shape sequences and sequence variables.
    Sequence,
    /// The kind of generic type templates.
    Generic(GenericKind),
}

/// The kind of a generic type: parameter kinds plus a result kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenericKind {
    pub parameters: Vec<Kind>,
    pub result: Box<Kind>,
}

impl Kind {
    /// `self <= other` in the kind order.
    ///
    /// `Item` is the top element: `Individual <= Item`, `Sequence <= Item`
    /// and every generic kind is `<= Item`. Generic kinds compare
    /// contravariantly on parameter kinds and covariantly on the result
    /// kind.
    pub fn le(&self, other: &Kind) -> bool {
        match (self, other) {
            (a, b) if a == b => true,
            (_, Kind::Item) => true,
            (Kind::Generic(a), Kind::Generic(b)) => {
                a.parameters.len() == b.parameters.len()
                    && b.parameters
                        .iter()
                        .zip(a.parameters.iter())
                        .all(|(b_param, a_param)| b_param.le(a_param))
                    && a.result.le(&b.result)
            }
            _ => false,
        }
    }

    /// `self >= other` in the kind order.
    pub fn ge(&self, other: &Kind) -> bool {
        other.le(self)
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Kind::Item => write!(f, "Item"),
            Kind::Individual => write!(f, "Individual"),
            Kind::Sequence => write!(f, "Sequence"),
            Kind::Generic(g) => {
                write!(f, "Generic[")?;
                for (i, p) in g.parameters.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{p}")?;
                }
                write!(f, ", {}]", g.result)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn generic(parameters: Vec<Kind>, result: Kind) -> Kind {
        Kind::Generic(GenericKind {
            parameters,
            result: Box::new(result),
        })
    }

    #[test]
    fn item_is_top() {
        assert!(Kind::Individual.le(&Kind::Item));
        assert!(Kind::Sequence.le(&Kind::Item));
        assert!(generic(vec![Kind::Individual], Kind::Individual).le(&Kind::Item));
        assert!(!Kind::Item.le(&Kind::Individual));
        assert!(!Kind::Item.le(&Kind::Sequence));
    }

    #[test]
    fn individual_and_sequence_are_incomparable() {
        assert!(!Kind::Individual.le(&Kind::Sequence));
        assert!(!Kind::Sequence.le(&Kind::Individual));
    }

    #[test]
    fn reflexive() {
        for k in [
            Kind::Item,
            Kind::Individual,
            Kind::Sequence,
            generic(vec![Kind::Sequence], Kind::Individual),
        ] {
            assert!(k.le(&k), "{k} should be <= itself");
        }
    }

    #[test]
    fn generic_kinds_are_contravariant_in_parameters() {
        // A generic accepting an Item parameter accepts more than one
        // demanding an Individual parameter, so it is the subkind.
        let accepts_item = generic(vec![Kind::Item], Kind::Individual);
        let accepts_individual = generic(vec![Kind::Individual], Kind::Individual);
        assert!(accepts_item.le(&accepts_individual));
        assert!(!accepts_individual.le(&accepts_item));
    }

    #[test]
    fn generic_kinds_are_covariant_in_result() {
        let produces_individual = generic(vec![Kind::Individual], Kind::Individual);
        let produces_item = generic(vec![Kind::Individual], Kind::Item);
        assert!(produces_individual.le(&produces_item));
        assert!(!produces_item.le(&produces_individual));
    }

    #[test]
    fn generic_kinds_with_different_arity_are_incomparable() {
        let one = generic(vec![Kind::Individual], Kind::Individual);
        let two = generic(vec![Kind::Individual, Kind::Individual], Kind::Individual);
        assert!(!one.le(&two));
        assert!(!two.le(&one));
    }
}
