//! Tokenizer input helpers.
//!
//! All cursor movement goes through `advance`, which keeps the source
//! position in step with the byte cursor.

use crate::html5::shared::InputStream;
use crate::html5::tokenizer::Html5Tokenizer;

/// Result of comparing a fixed ASCII sequence against the unconsumed input.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum MatchResult {
    Matched,
    /// Available input is a strict prefix of the sequence; the decision
    /// waits for more input. Never returned after end of stream.
    NeedMoreInput,
    NoMatch,
}

impl Html5Tokenizer {
    pub(super) fn has_unconsumed_input(&self, input: &InputStream) -> bool {
        self.cursor < input.len()
    }

    pub(super) fn rest<'i>(&self, input: &'i InputStream) -> &'i str {
        &input.as_str()[self.cursor..]
    }

    pub(super) fn peek(&self, input: &InputStream) -> Option<char> {
        self.rest(input).chars().next()
    }

    /// Move the cursor forward by `len` bytes.
    pub(super) fn advance(&mut self, input: &InputStream, len: usize) {
        let end = self.cursor + len;
        debug_assert!(end <= input.len(), "advance moved cursor out of bounds");
        self.pos.advance(&input.as_str()[self.cursor..end]);
        self.cursor = end;
    }

    /// Consume characters while `pred` holds. Returns the consumed byte range.
    pub(super) fn consume_while(
        &mut self,
        input: &InputStream,
        mut pred: impl FnMut(char) -> bool,
    ) -> (usize, usize) {
        let start = self.cursor;
        let rest = self.rest(input);
        let len = rest
            .char_indices()
            .find(|&(_, ch)| !pred(ch))
            .map_or(rest.len(), |(idx, _)| idx);
        self.advance(input, len);
        (start, self.cursor)
    }

    pub(super) fn skip_whitespace(&mut self, input: &InputStream) {
        let _ = self.consume_while(input, is_html_whitespace);
    }

    pub(super) fn match_ascii_prefix(&self, input: &InputStream, seq: &[u8]) -> MatchResult {
        self.match_prefix_with(input, seq, |a, b| a == b)
    }

    pub(super) fn match_ascii_prefix_ci(&self, input: &InputStream, seq: &[u8]) -> MatchResult {
        self.match_prefix_with(input, seq, |a, b| a.eq_ignore_ascii_case(&b))
    }

    fn match_prefix_with(
        &self,
        input: &InputStream,
        seq: &[u8],
        eq: impl Fn(u8, u8) -> bool,
    ) -> MatchResult {
        let rest = self.rest(input).as_bytes();
        let available = rest.len().min(seq.len());
        if !rest[..available]
            .iter()
            .zip(&seq[..available])
            .all(|(&a, &b)| eq(a, b))
        {
            return MatchResult::NoMatch;
        }
        if available == seq.len() {
            MatchResult::Matched
        } else if self.end_of_stream {
            MatchResult::NoMatch
        } else {
            MatchResult::NeedMoreInput
        }
    }

    pub(super) fn assert_cursor_on_char_boundary(&self, input: &InputStream) {
        debug_assert!(
            input.as_str().is_char_boundary(self.cursor),
            "tokenizer cursor must stay on a UTF-8 boundary (cursor={})",
            self.cursor
        );
    }
}

pub(super) fn is_html_whitespace(ch: char) -> bool {
    matches!(ch, '\t' | '\n' | '\u{000C}' | '\r' | ' ')
}

pub(super) fn is_tag_name_stop(ch: char) -> bool {
    ch == '>' || ch == '/' || is_html_whitespace(ch)
}
