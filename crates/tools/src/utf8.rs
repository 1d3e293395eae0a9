//! Incremental UTF-8 decoding for network byte streams.
//!
//! Multi-byte sequences split across network reads are carried over to the
//! next call; invalid sequences become U+FFFD and decoding keeps going.

/// Longest incomplete UTF-8 suffix we ever need to hold.
const MAX_CARRY: usize = 3;

/// Streaming decoder that turns arbitrary byte chunks into UTF-8 text.
///
/// Invariant: `carry[..carry_len]` is always a strict prefix of a valid
/// multi-byte sequence.
#[derive(Clone, Debug, Default)]
pub struct Utf8StreamDecoder {
    carry: [u8; MAX_CARRY],
    carry_len: usize,
}

impl Utf8StreamDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bytes currently held back waiting for the rest of a sequence.
    pub fn pending(&self) -> &[u8] {
        &self.carry[..self.carry_len]
    }

    /// Decode `bytes` and append the text to `out`.
    pub fn decode(&mut self, bytes: &[u8], out: &mut String) {
        let mut rest = bytes;
        while self.carry_len > 0 && !rest.is_empty() {
            let expected = sequence_len(self.carry[0]);
            if expected == 0 {
                out.push('\u{FFFD}');
                self.carry_len = 0;
                break;
            }
            let needed = expected - self.carry_len;
            let take = needed.min(rest.len());
            let mut scratch = [0u8; 4];
            scratch[..self.carry_len].copy_from_slice(&self.carry[..self.carry_len]);
            scratch[self.carry_len..self.carry_len + take].copy_from_slice(&rest[..take]);
            let filled = self.carry_len + take;
            rest = &rest[take..];
            self.carry_len = 0;
            if filled < expected {
                // Still short; keep waiting unless the prefix is already invalid.
                if std::str::from_utf8(&scratch[..filled])
                    .err()
                    .is_some_and(|e| e.error_len().is_some())
                {
                    self.decode_slice(&scratch[..filled], out);
                } else {
                    self.carry[..filled].copy_from_slice(&scratch[..filled]);
                    self.carry_len = filled;
                }
                return;
            }
            self.decode_slice(&scratch[..filled], out);
        }
        if !rest.is_empty() {
            self.decode_slice(rest, out);
        }
    }

    /// Flush a dangling incomplete sequence as U+FFFD. The stream is never
    /// silently truncated.
    pub fn finish(&mut self, out: &mut String) {
        if self.carry_len > 0 {
            out.push('\u{FFFD}');
            self.carry_len = 0;
        }
    }

    fn decode_slice(&mut self, mut bytes: &[u8], out: &mut String) {
        while !bytes.is_empty() {
            match std::str::from_utf8(bytes) {
                Ok(text) => {
                    out.push_str(text);
                    return;
                }
                Err(err) => {
                    let (valid, tail) = bytes.split_at(err.valid_up_to());
                    out.push_str(std::str::from_utf8(valid).unwrap_or_default());
                    match err.error_len() {
                        Some(len) => {
                            out.push('\u{FFFD}');
                            bytes = &tail[len..];
                        }
                        None => {
                            debug_assert!(tail.len() <= MAX_CARRY);
                            let keep = tail.len().min(MAX_CARRY);
                            self.carry[..keep].copy_from_slice(&tail[..keep]);
                            self.carry_len = keep;
                            return;
                        }
                    }
                }
            }
        }
    }
}

fn sequence_len(first: u8) -> usize {
    match first {
        0x00..=0x7F => 1,
        0xC2..=0xDF => 2,
        0xE0..=0xEF => 3,
        0xF0..=0xF4 => 4,
        _ => 0,
    }
}
