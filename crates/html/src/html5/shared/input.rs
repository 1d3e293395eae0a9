//! Decoded input stream for the HTML5 tokenizer.

use tools::Utf8StreamDecoder;

use super::span::Span;

/// Growable text buffer holding decoded characters not yet fully consumed.
///
/// Network data arrives through [`InputStream::append`] or
/// [`InputStream::append_bytes`]. Script-inserted text goes through
/// [`InputStream::insert`], which places it at the current insertion point
/// (ahead of any not-yet-consumed network text).
///
/// Invariant: the buffer only shrinks through [`InputStream::compact`], and
/// callers compact only when no span into the consumed prefix is live.
#[derive(Debug)]
pub struct InputStream {
    id: u64,
    buffer: String,
    decoder: Utf8StreamDecoder,
    insertion_point: Option<usize>,
    end_of_stream: bool,
}

impl InputStream {
    pub fn new() -> Self {
        static NEXT_ID: std::sync::atomic::AtomicU64 = std::sync::atomic::AtomicU64::new(1);
        let id = NEXT_ID.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        Self {
            id,
            buffer: String::new(),
            decoder: Utf8StreamDecoder::new(),
            insertion_point: None,
            end_of_stream: false,
        }
    }

    /// Input holding `text`, with more possibly to follow.
    pub fn from_text(text: &str) -> Self {
        let mut input = Self::new();
        input.append(text);
        input
    }

    /// Append decoded network text.
    pub fn append(&mut self, text: &str) {
        debug_assert!(!self.end_of_stream, "append called after end of stream");
        if self.end_of_stream {
            log::warn!(target: "html5.input", "append after end of stream ignored");
            return;
        }
        self.buffer.push_str(text);
    }

    /// Append raw network bytes. Incomplete UTF-8 sequences at the end of
    /// `bytes` are carried over to the next call.
    pub fn append_bytes(&mut self, bytes: &[u8]) {
        debug_assert!(!self.end_of_stream, "append_bytes called after end of stream");
        if self.end_of_stream {
            log::warn!(target: "html5.input", "append_bytes after end of stream ignored");
            return;
        }
        self.decoder.decode(bytes, &mut self.buffer);
    }

    /// Idempotent. Flushes any dangling partial UTF-8 sequence.
    pub fn mark_end_of_stream(&mut self) {
        if self.end_of_stream {
            return;
        }
        self.decoder.finish(&mut self.buffer);
        self.end_of_stream = true;
    }

    pub fn is_end_of_stream(&self) -> bool {
        self.end_of_stream
    }

    /// Point at which [`InputStream::insert`] places text. `None` outside of
    /// script execution.
    pub fn insertion_point(&self) -> Option<usize> {
        self.insertion_point
    }

    pub fn set_insertion_point(&mut self, offset: Option<usize>) {
        if let Some(offset) = offset {
            debug_assert!(self.buffer.is_char_boundary(offset));
        }
        self.insertion_point = offset;
    }

    /// Insert `text` at the insertion point and move the point past it, so a
    /// sequence of inserts lands in call order. Returns `false` (and drops the
    /// text) when no insertion point is set.
    pub fn insert(&mut self, text: &str) -> bool {
        let Some(at) = self.insertion_point else {
            return false;
        };
        self.buffer.insert_str(at, text);
        self.insertion_point = Some(at + text.len());
        true
    }

    /// Drop the first `consumed` bytes. Returns the number of bytes removed.
    pub fn compact(&mut self, consumed: usize) -> usize {
        let consumed = consumed.min(self.buffer.len());
        if consumed == 0 {
            return 0;
        }
        debug_assert!(self.buffer.is_char_boundary(consumed));
        self.buffer.drain(..consumed);
        if let Some(point) = self.insertion_point.as_mut() {
            *point = point.saturating_sub(consumed);
        }
        consumed
    }

    /// Return the entire buffer as a `&str`.
    pub fn as_str(&self) -> &str {
        &self.buffer
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Opaque identity for this input buffer instance.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Create a span for the given range.
    pub fn span(&self, start: usize, end: usize) -> Span {
        debug_assert!(
            self.buffer.is_char_boundary(start) && self.buffer.is_char_boundary(end),
            "span must be on UTF-8 boundaries"
        );
        Span::new(start, end)
    }
}

impl Default for InputStream {
    fn default() -> Self {
        Self::new()
    }
}
