//! HTML5 token model.

use super::{AtomId, TextSpan};

/// HTML attribute with interned name and optional value.
///
/// Determinism contract:
/// - Attributes on a `StartTag` are stored in encounter order.
/// - Duplicate attributes in a single start tag are dropped after the first
///   occurrence (HTML tokenizer "first-wins" behavior).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Attribute {
    pub name: AtomId,
    pub value: Option<AttributeValue>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AttributeValue {
    /// Borrowed span into the decoded input buffer.
    Span(TextSpan),
    /// Owned value (after character reference decoding).
    Owned(String),
}

/// Text payload for character/text token emission.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TextValue {
    /// Borrowed span into the decoded input buffer.
    Span(TextSpan),
    /// Owned value (after decoding or U+0000 replacement).
    Owned(String),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Token {
    Doctype {
        /// Name atomized with HTML ASCII-folding rules.
        name: Option<AtomId>,
        public_id: Option<String>,
        system_id: Option<String>,
        force_quirks: bool,
    },
    StartTag {
        name: AtomId,
        attrs: Vec<Attribute>,
        self_closing: bool,
    },
    EndTag {
        name: AtomId,
    },
    Comment {
        text: TextValue,
    },
    /// Text token in the HTML5 stream.
    ///
    /// Determinism contract: text runs may be split at different points
    /// depending on how input arrived, but the concatenation of adjacent runs
    /// is identical across equivalent runs.
    Text {
        text: TextValue,
    },
    Eof,
}
