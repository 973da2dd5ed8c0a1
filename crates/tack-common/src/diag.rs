use serde::Serialize;
use std::fmt;

use crate::span::Position;

/// A rendered-to-be diagnostic: a message and the narrowest source location
/// the producer could attribute it to.
///
/// Both the recoverable-parse results and the type checker's errors reduce
/// to this shape at the boundary; callers render it against the original
/// source text however they see fit.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Diagnostic {
    pub message: String,
    pub location: Option<Position>,
}

impl Diagnostic {
    /// Create a diagnostic with a known location.
    pub fn at(message: impl Into<String>, location: Position) -> Self {
        Self {
            message: message.into(),
            location: Some(location),
        }
    }

    /// Create a diagnostic without a location.
    pub fn bare(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            location: None,
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.location {
            Some(loc) => write!(f, "{} at {}", self.message, loc),
            None => write!(f, "{}", self.message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_with_location() {
        let d = Diagnostic::at("name `foo` not previously defined", Position::new(2, 4));
        assert_eq!(d.to_string(), "name `foo` not previously defined at 2:4");
    }

    #[test]
    fn display_without_location() {
        let d = Diagnostic::bare("internal error");
        assert_eq!(d.to_string(), "internal error");
    }
}
