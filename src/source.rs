//! Source buffer and byte-offset to line/column mapping.
//!
//! A single `SourceBuffer` owns the UTF-8 text of one compilation unit for
//! its entire lifetime; the lexer, parser, and every diagnostic that follows
//! borrow from it rather than copying lines around.

use std::fmt;
use std::path::{Path, PathBuf};

/// 1-based source position, attached to every AST node and diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SourceLocation {
    pub line: u32,
    pub column: u32,
}

impl SourceLocation {
    pub fn new(line: u32, column: u32) -> Self {
        SourceLocation { line, column }
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// Owns the raw source text for one compilation unit and answers
/// `(line, column)` for any byte offset into it.
///
/// Line start offsets are computed once, up front, so offset-to-position
/// lookups are a binary search rather than a linear rescan.
pub struct SourceBuffer {
    path: PathBuf,
    text: String,
    /// Byte offset of the first character of each line (1-indexed lines,
    /// so `line_starts[0]` is always 0 and corresponds to line 1).
    line_starts: Vec<usize>,
}

impl SourceBuffer {
    pub fn new(path: impl Into<PathBuf>, text: String) -> Self {
        let line_starts = compute_line_starts(&text);
        SourceBuffer {
            path: path.into(),
            text,
            line_starts,
        }
    }

    pub fn read(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        Ok(Self::new(path, text))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Map a byte offset to a 1-based `(line, column)` pair.
    ///
    /// Column is a byte offset within the line plus one, not a grapheme
    /// count; this matches the byte-oriented lexer that produces offsets.
    pub fn location_for_offset(&self, offset: usize) -> SourceLocation {
        let line_idx = match self.line_starts.binary_search(&offset) {
            Ok(idx) => idx,
            Err(idx) => idx.saturating_sub(1),
        };
        let line_start = self.line_starts[line_idx];
        let column = offset.saturating_sub(line_start) + 1;
        SourceLocation::new((line_idx + 1) as u32, column as u32)
    }

    /// Slice of the source text that a token or span covers, used by the
    /// lex/parse round-trip property test.
    pub fn slice(&self, start: usize, end: usize) -> &str {
        &self.text[start..end]
    }
}

fn compute_line_starts(text: &str) -> Vec<usize> {
    let mut starts = vec![0];
    for (idx, byte) in text.bytes().enumerate() {
        if byte == b'\n' {
            starts.push(idx + 1);
        }
    }
    starts
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_line_first_column() {
        let buf = SourceBuffer::new("test.home", "fn main() {}".to_string());
        assert_eq!(buf.location_for_offset(0), SourceLocation::new(1, 1));
    }

    #[test]
    fn offset_on_second_line() {
        let buf = SourceBuffer::new("test.home", "let a = 1\nlet b = 2".to_string());
        let offset = "let a = 1\nlet ".len();
        let loc = buf.location_for_offset(offset);
        assert_eq!(loc.line, 2);
        assert_eq!(loc.column, 5);
    }

    #[test]
    fn slice_round_trips_lexeme() {
        let buf = SourceBuffer::new("test.home", "let mut count = 0".to_string());
        assert_eq!(buf.slice(4, 7), "mut");
    }
}
