//! Thread-transferable token form.
//!
//! Tokenizer tokens refer to the atom table and input buffer of the thread
//! that produced them. `CompactToken` resolves both, so a chunk of compact
//! tokens is a self-contained value that can be moved across threads.

use crate::html5::shared::{AtomId, AtomTable, AttributeValue, SourcePos, TextValue, Token};
use crate::html5::tokenizer::{TextResolveError, TextResolver, TokenBatch};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CompactAttr {
    pub name: String,
    pub value: Option<String>,
}

impl CompactAttr {
    pub fn new(name: impl Into<String>, value: Option<&str>) -> Self {
        Self {
            name: name.into(),
            value: value.map(str::to_string),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CompactKind {
    Doctype {
        name: Option<String>,
        public_id: Option<String>,
        system_id: Option<String>,
        force_quirks: bool,
    },
    StartTag {
        name: String,
        attrs: Vec<CompactAttr>,
        self_closing: bool,
    },
    EndTag {
        name: String,
    },
    Character(String),
    Comment(String),
    EndOfFile,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CompactToken {
    pub kind: CompactKind,
    pub pos: SourcePos,
}

impl CompactToken {
    pub fn new(kind: CompactKind, pos: SourcePos) -> Self {
        Self { kind, pos }
    }

    pub fn start_tag(name: &str, attrs: Vec<CompactAttr>, pos: SourcePos) -> Self {
        Self::new(
            CompactKind::StartTag {
                name: name.to_string(),
                attrs,
                self_closing: false,
            },
            pos,
        )
    }

    pub fn end_tag(name: &str, pos: SourcePos) -> Self {
        Self::new(
            CompactKind::EndTag {
                name: name.to_string(),
            },
            pos,
        )
    }

    pub fn text(text: &str, pos: SourcePos) -> Self {
        Self::new(CompactKind::Character(text.to_string()), pos)
    }

    pub fn eof(pos: SourcePos) -> Self {
        Self::new(CompactKind::EndOfFile, pos)
    }

    pub fn start_tag_name(&self) -> Option<&str> {
        match &self.kind {
            CompactKind::StartTag { name, .. } => Some(name),
            _ => None,
        }
    }

    pub fn end_tag_name(&self) -> Option<&str> {
        match &self.kind {
            CompactKind::EndTag { name } => Some(name),
            _ => None,
        }
    }

    /// Tag name of a start or end tag.
    pub fn tag_name(&self) -> Option<&str> {
        self.start_tag_name().or_else(|| self.end_tag_name())
    }

    pub fn attrs(&self) -> &[CompactAttr] {
        match &self.kind {
            CompactKind::StartTag { attrs, .. } => attrs,
            _ => &[],
        }
    }

    pub fn is_eof(&self) -> bool {
        matches!(self.kind, CompactKind::EndOfFile)
    }
}

/// Attribute lookup. A valueless attribute reads as `Some("")`.
pub fn attr<'a>(attrs: &'a [CompactAttr], name: &str) -> Option<&'a str> {
    attrs
        .iter()
        .find(|a| a.name == name)
        .map(|a| a.value.as_deref().unwrap_or(""))
}

pub fn has_attr(attrs: &[CompactAttr], name: &str) -> bool {
    attrs.iter().any(|a| a.name == name)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
pub enum CompactError {
    #[error("unknown atom id: {0:?}")]
    UnknownAtom(AtomId),
    #[error(transparent)]
    Text(#[from] TextResolveError),
}

/// Resolve one tokenizer token.
pub fn compact_token(
    token: &Token,
    pos: SourcePos,
    atoms: &AtomTable,
    resolver: &dyn TextResolver,
) -> Result<CompactToken, CompactError> {
    let atom = |id: AtomId| {
        atoms
            .resolve(id)
            .map(str::to_string)
            .ok_or(CompactError::UnknownAtom(id))
    };
    let text = |value: &TextValue| -> Result<String, CompactError> {
        Ok(match value {
            TextValue::Span(span) => resolver.resolve_span(*span)?.to_string(),
            TextValue::Owned(s) => s.clone(),
        })
    };
    let kind = match token {
        Token::Doctype {
            name,
            public_id,
            system_id,
            force_quirks,
        } => CompactKind::Doctype {
            name: name.map(atom).transpose()?,
            public_id: public_id.clone(),
            system_id: system_id.clone(),
            force_quirks: *force_quirks,
        },
        Token::StartTag {
            name,
            attrs,
            self_closing,
        } => {
            let mut out = Vec::with_capacity(attrs.len());
            for a in attrs {
                let value = match &a.value {
                    None => None,
                    Some(AttributeValue::Span(span)) => {
                        Some(resolver.resolve_span(*span)?.to_string())
                    }
                    Some(AttributeValue::Owned(s)) => Some(s.clone()),
                };
                out.push(CompactAttr {
                    name: atom(a.name)?,
                    value,
                });
            }
            CompactKind::StartTag {
                name: atom(*name)?,
                attrs: out,
                self_closing: *self_closing,
            }
        }
        Token::EndTag { name } => CompactKind::EndTag { name: atom(*name)? },
        Token::Comment { text: t } => CompactKind::Comment(text(t)?),
        Token::Text { text: t } => CompactKind::Character(text(t)?),
        Token::Eof => CompactKind::EndOfFile,
    };
    Ok(CompactToken { kind, pos })
}

/// Resolve a whole batch. Tokens that fail to resolve are an internal
/// inconsistency; they are logged and skipped.
pub fn compact_batch(batch: &TokenBatch<'_>, atoms: &AtomTable) -> Vec<CompactToken> {
    let resolver = batch.resolver();
    let mut out = Vec::with_capacity(batch.len());
    for (token, pos) in batch.iter_with_pos() {
        match compact_token(token, pos, atoms, &resolver) {
            Ok(t) => out.push(t),
            Err(err) => {
                debug_assert!(false, "token failed to compact: {err}");
                log::error!(target: "html5.compact", "dropping token at {pos}: {err}");
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::html5::shared::{DocumentParseContext, InputStream};
    use crate::html5::tokenizer::{Html5Tokenizer, TokenizerConfig};

    #[test]
    fn batch_resolves_names_spans_and_positions() {
        let mut ctx = DocumentParseContext::new();
        let mut input = InputStream::from_text("<A href=x.css Rel='a'>t&amp;u</a>");
        let mut tok = Html5Tokenizer::new(TokenizerConfig::default());
        tok.finish(&mut input, &mut ctx);
        let batch = tok.next_batch(&mut input);
        let tokens = compact_batch(&batch, &ctx.atoms);

        assert_eq!(
            tokens[0].kind,
            CompactKind::StartTag {
                name: "a".into(),
                attrs: vec![
                    CompactAttr::new("href", Some("x.css")),
                    CompactAttr::new("rel", Some("a")),
                ],
                self_closing: false,
            }
        );
        assert_eq!(tokens[1].kind, CompactKind::Character("t&u".into()));
        assert_eq!(tokens[1].pos.column, 23);
        assert_eq!(tokens[2].end_tag_name(), Some("a"));
        assert!(tokens[3].is_eof());
    }

    #[test]
    fn attr_lookup_treats_valueless_as_empty() {
        let attrs = vec![CompactAttr::new("async", None), CompactAttr::new("src", Some("a.js"))];
        assert_eq!(attr(&attrs, "async"), Some(""));
        assert_eq!(attr(&attrs, "src"), Some("a.js"));
        assert_eq!(attr(&attrs, "defer"), None);
        assert!(has_attr(&attrs, "async"));
    }
}
