//! Tokenizer state machine definitions.

/// Enumerated tokenizer state.
///
/// This is what speculation validation compares: a worker prediction and the
/// main-thread tokenizer agree only if they sit in the same state (and
/// neither holds a partially-built token).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TokenizerState {
    Data,
    RcData,
    RawText,
    ScriptData,
    Plaintext,
    TagOpen,
    EndTagOpen,
    TagName,
    BeforeAttributeName,
    AttributeName,
    AfterAttributeName,
    BeforeAttributeValue,
    AttributeValueDoubleQuoted,
    AttributeValueSingleQuoted,
    AttributeValueUnquoted,
    AfterAttributeValueQuoted,
    SelfClosingStartTag,
    MarkupDeclarationOpen,
    Comment,
    BogusComment,
    Doctype,
}

impl TokenizerState {
    /// States in which character data accumulates, i.e. the tokenizer is
    /// between tokens.
    pub fn is_text_state(self) -> bool {
        matches!(
            self,
            TokenizerState::Data
                | TokenizerState::RcData
                | TokenizerState::RawText
                | TokenizerState::ScriptData
                | TokenizerState::Plaintext
        )
    }

    /// Whether text runs in this state decode character references.
    pub(crate) fn decodes_references(self) -> bool {
        matches!(self, TokenizerState::Data | TokenizerState::RcData)
    }
}

/// Element whose content the tokenizer reads as raw text until the matching
/// end tag.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RawTextKind {
    Script,
    Style,
    Xmp,
    Iframe,
    Noembed,
    Noframes,
    Title,
    Textarea,
}

impl RawTextKind {
    pub fn for_start_tag(name: &str) -> Option<Self> {
        Some(match name {
            "script" => RawTextKind::Script,
            "style" => RawTextKind::Style,
            "xmp" => RawTextKind::Xmp,
            "iframe" => RawTextKind::Iframe,
            "noembed" => RawTextKind::Noembed,
            "noframes" => RawTextKind::Noframes,
            "title" => RawTextKind::Title,
            "textarea" => RawTextKind::Textarea,
            _ => return None,
        })
    }

    pub fn tag_name(self) -> &'static str {
        match self {
            RawTextKind::Script => "script",
            RawTextKind::Style => "style",
            RawTextKind::Xmp => "xmp",
            RawTextKind::Iframe => "iframe",
            RawTextKind::Noembed => "noembed",
            RawTextKind::Noframes => "noframes",
            RawTextKind::Title => "title",
            RawTextKind::Textarea => "textarea",
        }
    }

    /// `</name` as matched (ASCII case-insensitively) by the raw text states.
    pub(crate) fn end_tag_prefix(self) -> &'static [u8] {
        match self {
            RawTextKind::Script => b"</script",
            RawTextKind::Style => b"</style",
            RawTextKind::Xmp => b"</xmp",
            RawTextKind::Iframe => b"</iframe",
            RawTextKind::Noembed => b"</noembed",
            RawTextKind::Noframes => b"</noframes",
            RawTextKind::Title => b"</title",
            RawTextKind::Textarea => b"</textarea",
        }
    }

    pub fn state(self) -> TokenizerState {
        match self {
            RawTextKind::Script => TokenizerState::ScriptData,
            RawTextKind::Title | RawTextKind::Textarea => TokenizerState::RcData,
            _ => TokenizerState::RawText,
        }
    }
}
