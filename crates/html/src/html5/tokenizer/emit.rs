//! Token emission helpers.

use crate::entities::decode_entities;
use crate::html5::shared::{
    Attribute, AttributeValue, DocumentParseContext, InputStream, ParseError, ParseErrorCode,
    SourcePos, TextSpan, TextValue, Token,
};
use crate::html5::tokenizer::Html5Tokenizer;
use crate::html5::tokenizer::snapshot::{PendingKind, PendingToken};
use crate::html5::tokenizer::states::{RawTextKind, TokenizerState};

impl Html5Tokenizer {
    pub(super) fn emit_token(&mut self, token: Token, pos: SourcePos) {
        #[cfg(any(test, feature = "debug-stats"))]
        log::trace!(target: "html5.tokenizer", "emit token @{pos}: {token:?}");
        self.tokens.push(token);
        self.positions.push(pos);
        self.stats.tokens_emitted = self.stats.tokens_emitted.saturating_add(1);
    }

    pub(super) fn report(&mut self, ctx: &mut DocumentParseContext, code: ParseErrorCode, pos: SourcePos) {
        ctx.errors.push(ParseError { code, pos });
        ctx.counters.parse_errors = ctx.counters.parse_errors.saturating_add(1);
    }

    pub(super) fn emit_text_owned(&mut self, text: &str, pos: SourcePos) {
        if text.is_empty() {
            return;
        }
        self.emit_token(
            Token::Text {
                text: TextValue::Owned(text.to_string()),
            },
            pos,
        );
    }

    /// Start (or continue) a character run at the cursor.
    pub(super) fn begin_text(&mut self) {
        if self.pending_text.is_none() {
            self.pending_text = Some(PendingText {
                start: self.cursor,
                pos: self.pos,
                decode: self.state.decodes_references(),
            });
        }
    }

    /// Emit the character run ending at the cursor.
    ///
    /// Runs stay zero-copy spans unless they need character reference decoding
    /// or U+0000 replacement.
    pub(super) fn flush_pending_text(&mut self, input: &InputStream, ctx: &mut DocumentParseContext) {
        let Some(run) = self.pending_text.take() else {
            return;
        };
        if run.start >= self.cursor {
            return;
        }
        let raw = &input.as_str()[run.start..self.cursor];
        let has_null = memchr::memchr(0, raw.as_bytes()).is_some();
        let has_reference = run.decode && memchr::memchr(b'&', raw.as_bytes()).is_some();
        let text = if has_null || has_reference {
            let mut owned = if has_reference {
                decode_entities(raw)
            } else {
                raw.to_string()
            };
            if has_null {
                self.report(ctx, ParseErrorCode::UnexpectedNullCharacter, run.pos);
                owned = owned.replace('\0', "\u{FFFD}");
            }
            TextValue::Owned(owned)
        } else {
            TextValue::Span(TextSpan::new(run.start, self.cursor))
        };
        self.emit_token(Token::Text { text }, run.pos);
    }

    /// Emit the pending start or end tag and pick the state that follows it.
    pub(super) fn emit_tag(&mut self, ctx: &mut DocumentParseContext) {
        let mut pending = std::mem::take(&mut self.pending);
        pending.finish_attr();
        let pos = pending.pos;
        let Ok(name) = ctx.atoms.intern_ascii_folded(&pending.name) else {
            log::warn!(target: "html5.tokenizer", "atom table exhausted; dropping tag at {pos}");
            self.transition_to(TokenizerState::Data);
            return;
        };
        match pending.kind {
            PendingKind::StartTag => {
                let attrs = self.build_attributes(&pending, ctx);
                let folded = pending.name.to_ascii_lowercase();
                self.emit_token(
                    Token::StartTag {
                        name,
                        attrs,
                        self_closing: pending.self_closing,
                    },
                    pos,
                );
                if let Some(kind) = RawTextKind::for_start_tag(&folded) {
                    self.raw_kind = Some(kind);
                    self.transition_to(kind.state());
                } else if folded == "plaintext" {
                    self.transition_to(TokenizerState::Plaintext);
                } else {
                    self.transition_to(TokenizerState::Data);
                }
            }
            PendingKind::EndTag => {
                self.emit_token(Token::EndTag { name }, pos);
                if pending.closes_script {
                    self.pause_requested = true;
                }
                self.transition_to(TokenizerState::Data);
            }
            PendingKind::Comment | PendingKind::Doctype | PendingKind::None => {
                debug_assert!(false, "emit_tag without a pending tag: {:?}", pending.kind);
                self.transition_to(TokenizerState::Data);
            }
        }
    }

    fn build_attributes(
        &mut self,
        pending: &PendingToken,
        ctx: &mut DocumentParseContext,
    ) -> Vec<Attribute> {
        let mut attrs: Vec<Attribute> = Vec::with_capacity(pending.attrs.len());
        for attr in &pending.attrs {
            if attr.name.is_empty() {
                continue;
            }
            let Ok(name) = ctx.atoms.intern_ascii_folded(&attr.name) else {
                continue;
            };
            // First occurrence wins.
            if attrs.iter().any(|existing| existing.name == name) {
                continue;
            }
            let value = attr.value.as_deref().map(|raw| {
                let mut decoded = decode_entities(raw);
                if decoded.contains('\0') {
                    decoded = decoded.replace('\0', "\u{FFFD}");
                }
                AttributeValue::Owned(decoded)
            });
            attrs.push(Attribute { name, value });
        }
        attrs
    }

    pub(super) fn emit_comment(&mut self) {
        let pending = std::mem::take(&mut self.pending);
        let mut data = pending.data;
        if data.contains('\0') {
            data = data.replace('\0', "\u{FFFD}");
        }
        self.emit_token(
            Token::Comment {
                text: TextValue::Owned(data),
            },
            pending.pos,
        );
        self.transition_to(TokenizerState::Data);
    }

    pub(super) fn emit_doctype(&mut self, ctx: &mut DocumentParseContext, eof: bool) {
        let pending = std::mem::take(&mut self.pending);
        let parsed = parse_doctype(&pending.data);
        if parsed.name.is_none() {
            self.report(ctx, ParseErrorCode::MissingDoctypeName, pending.pos);
        }
        let name = parsed
            .name
            .and_then(|name| ctx.atoms.intern_ascii_folded(name).ok());
        self.emit_token(
            Token::Doctype {
                force_quirks: eof || name.is_none(),
                name,
                public_id: parsed.public_id,
                system_id: parsed.system_id,
            },
            pending.pos,
        );
        self.transition_to(TokenizerState::Data);
    }
}

/// Character run accumulating at the cursor.
#[derive(Clone, Copy, Debug)]
pub(super) struct PendingText {
    pub(super) start: usize,
    pub(super) pos: SourcePos,
    pub(super) decode: bool,
}

struct ParsedDoctype<'a> {
    name: Option<&'a str>,
    public_id: Option<String>,
    system_id: Option<String>,
}

fn parse_doctype(data: &str) -> ParsedDoctype<'_> {
    let data = data.trim_start_matches(super::input::is_html_whitespace);
    let name_end = data
        .find(super::input::is_html_whitespace)
        .unwrap_or(data.len());
    let name = (name_end > 0).then(|| &data[..name_end]);
    let mut rest = data[name_end..].trim_start_matches(super::input::is_html_whitespace);
    let mut public_id = None;
    let mut system_id = None;
    if starts_with_ci(rest, "PUBLIC") {
        rest = &rest["PUBLIC".len()..];
        let (id, tail) = quoted(rest);
        public_id = id;
        let (id, _) = quoted(tail);
        system_id = id;
    } else if starts_with_ci(rest, "SYSTEM") {
        rest = &rest["SYSTEM".len()..];
        system_id = quoted(rest).0;
    }
    ParsedDoctype {
        name,
        public_id,
        system_id,
    }
}

fn starts_with_ci(text: &str, prefix: &str) -> bool {
    text.len() >= prefix.len() && text.as_bytes()[..prefix.len()].eq_ignore_ascii_case(prefix.as_bytes())
}

/// Read a `"..."` or `'...'` literal after optional whitespace.
fn quoted(text: &str) -> (Option<String>, &str) {
    let text = text.trim_start_matches(super::input::is_html_whitespace);
    let Some(quote) = text.chars().next().filter(|c| *c == '"' || *c == '\'') else {
        return (None, text);
    };
    let body = &text[1..];
    match body.find(quote) {
        Some(end) => (Some(body[..end].to_string()), &body[end + 1..]),
        None => (Some(body.to_string()), ""),
    }
}
