use serde::Serialize;
use std::fmt;

/// A point in source text: 1-based line, 0-based column.
///
/// Every token carries the positions of its first and one-past-last
/// character. Positions are ordered lexicographically, which is what makes
/// `Span::merge` and the `location <= end_location` AST invariant cheap to
/// state and check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct Position {
    pub line: u32,
    pub column: u32,
}

impl Position {
    /// Create a new position.
    ///
    /// Lines are 1-based (there is no line zero) and columns are 0-based,
    /// matching the external lexer's convention.
    pub fn new(line: u32, column: u32) -> Self {
        debug_assert!(line >= 1, "line numbers are 1-based, got {line}");
        Self { line, column }
    }

    /// The start of a file.
    pub fn start_of_file() -> Self {
        Self { line: 1, column: 0 }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// A source region delimited by two positions. Start is inclusive, end is
/// exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Span {
    pub start: Position,
    pub end: Position,
}

impl Span {
    /// Create a new span from two positions.
    pub fn new(start: Position, end: Position) -> Self {
        debug_assert!(start <= end, "span start ({start}) must be <= end ({end})");
        Self { start, end }
    }

    /// A zero-length span at a single position.
    pub fn point(at: Position) -> Self {
        Self { start: at, end: at }
    }

    /// Merge two spans into one that covers both.
    pub fn merge(self, other: Span) -> Span {
        Span {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }
}

/// Pre-computed index of line start offsets for position-to-offset lookup.
///
/// Tokens locate themselves by (line, column) pairs; diagnostic renderers
/// (ariadne in particular) want byte offsets into the original source.
/// Built once per source file by scanning for newlines.
#[derive(Debug)]
pub struct LineIndex {
    /// Byte offset of the start of each line. The first entry is always 0.
    line_starts: Vec<usize>,
    len: usize,
}

impl LineIndex {
    /// Build a line index by scanning the source text for newlines.
    pub fn new(source: &str) -> Self {
        let mut line_starts = vec![0usize];
        for (i, byte) in source.bytes().enumerate() {
            if byte == b'\n' {
                line_starts.push(i + 1);
            }
        }
        Self {
            line_starts,
            len: source.len(),
        }
    }

    /// Convert a position to a byte offset into the source.
    ///
    /// Positions past the end of a line or of the file clamp to the nearest
    /// valid offset, so renderers never index out of bounds.
    pub fn offset(&self, pos: Position) -> usize {
        let line_idx = (pos.line.saturating_sub(1)) as usize;
        match self.line_starts.get(line_idx) {
            Some(&start) => {
                let line_end = self
                    .line_starts
                    .get(line_idx + 1)
                    .map(|&next| next.saturating_sub(1))
                    .unwrap_or(self.len);
                (start + pos.column as usize).min(line_end)
            }
            None => self.len,
        }
    }

    /// The text of the line containing the given position, without its
    /// trailing newline.
    pub fn line_text<'src>(&self, source: &'src str, pos: Position) -> &'src str {
        let line_idx = (pos.line.saturating_sub(1)) as usize;
        let start = match self.line_starts.get(line_idx) {
            Some(&start) => start,
            None => return "",
        };
        let end = self
            .line_starts
            .get(line_idx + 1)
            .map(|&next| next.saturating_sub(1))
            .unwrap_or(self.len);
        &source[start..end]
    }

    /// Number of lines in the source.
    pub fn line_count(&self) -> usize {
        self.line_starts.len()
    }
}
