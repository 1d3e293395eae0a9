//! Span and source-position types used by HTML5 tokens.

use serde::Serialize;

/// Byte span into the decoded input buffer.
///
/// Invariant: spans are valid UTF-8 boundaries in the decoded `InputStream`
/// and are only valid for the token batch that produced them.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        debug_assert!(start <= end, "span start must be <= end");
        Self { start, end }
    }

    pub fn is_empty(self) -> bool {
        self.start == self.end
    }
}

/// Alias for text spans (used by tokenizer output).
pub type TextSpan = Span;

/// 1-based line/column of a token's first character.
///
/// Columns count Unicode scalar values, not bytes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct SourcePos {
    pub line: u32,
    pub column: u32,
}

impl SourcePos {
    pub const START: SourcePos = SourcePos { line: 1, column: 1 };

    /// Advance over `text`, which must not cross a token boundary the caller
    /// still needs a position for.
    pub fn advance(&mut self, text: &str) {
        let bytes = text.as_bytes();
        match memchr::memrchr(b'\n', bytes) {
            Some(last) => {
                let newlines = memchr::memchr_iter(b'\n', bytes).count();
                self.line = self.line.saturating_add(newlines as u32);
                self.column = 1 + text[last + 1..].chars().count() as u32;
            }
            None => {
                self.column = self.column.saturating_add(text.chars().count() as u32);
            }
        }
    }
}

impl Default for SourcePos {
    fn default() -> Self {
        Self::START
    }
}

impl std::fmt::Display for SourcePos {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}
