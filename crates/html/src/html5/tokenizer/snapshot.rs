//! Owned tokenizer state that can be carried across threads.

use crate::html5::shared::SourcePos;
use crate::html5::tokenizer::states::{RawTextKind, TokenizerState};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(crate) enum PendingKind {
    #[default]
    None,
    StartTag,
    EndTag,
    Comment,
    Doctype,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub(crate) struct PendingAttr {
    pub(crate) name: String,
    pub(crate) value: Option<String>,
}

/// Partially-built token. Buffers are owned; nothing here points into the
/// input, so the whole thing can be cloned into a snapshot.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub(crate) struct PendingToken {
    pub(crate) kind: PendingKind,
    /// Position of the `<` that opened the token.
    pub(crate) pos: SourcePos,
    pub(crate) name: String,
    pub(crate) attrs: Vec<PendingAttr>,
    pub(crate) current_attr: Option<PendingAttr>,
    pub(crate) self_closing: bool,
    /// Comment or doctype payload.
    pub(crate) data: String,
    /// Nothing has been read since `<!--`.
    pub(crate) comment_start: bool,
    /// End tag that leaves script data.
    pub(crate) closes_script: bool,
}

impl PendingToken {
    pub(crate) fn is_empty(&self) -> bool {
        self.kind == PendingKind::None
    }

    /// Start a token of `kind`, keeping the opening position.
    pub(crate) fn begin(&mut self, kind: PendingKind) {
        let pos = self.pos;
        *self = PendingToken {
            kind,
            pos,
            comment_start: kind == PendingKind::Comment,
            ..PendingToken::default()
        };
    }

    pub(crate) fn start_attr(&mut self) {
        self.finish_attr();
        self.current_attr = Some(PendingAttr::default());
    }

    pub(crate) fn finish_attr(&mut self) {
        if let Some(attr) = self.current_attr.take() {
            self.attrs.push(attr);
        }
    }

    pub(crate) fn attr_name_mut(&mut self) -> &mut String {
        &mut self.current_attr.get_or_insert_with(PendingAttr::default).name
    }

    pub(crate) fn attr_value_mut(&mut self) -> &mut String {
        self.current_attr
            .get_or_insert_with(PendingAttr::default)
            .value
            .get_or_insert_with(String::new)
    }
}

/// Everything needed to resume tokenization at a token boundary or inside a
/// partially-read token.
///
/// A snapshot holds no cursor: a tokenizer restored from it starts reading at
/// offset 0 of whatever input it is handed next. Pending character data is
/// always flushed before a snapshot is taken, so text never straddles one.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TokenizerSnapshot {
    pub(crate) state: TokenizerState,
    pub(crate) raw_kind: Option<RawTextKind>,
    pub(crate) pending: PendingToken,
    pub(crate) pos: SourcePos,
}

impl TokenizerSnapshot {
    /// State of a tokenizer that has not read anything yet.
    pub fn initial() -> Self {
        Self {
            state: TokenizerState::Data,
            raw_kind: None,
            pending: PendingToken::default(),
            pos: SourcePos::START,
        }
    }

    pub fn state(&self) -> TokenizerState {
        self.state
    }

    pub fn raw_kind(&self) -> Option<RawTextKind> {
        self.raw_kind
    }

    pub fn position(&self) -> SourcePos {
        self.pos
    }

    /// Whether the tokenizer is in the middle of a token.
    pub fn has_pending_token(&self) -> bool {
        !self.pending.is_empty() || !self.state.is_text_state()
    }

    /// Two snapshots describe the same continuation point: same state, same
    /// raw-text element, and neither is inside a token. Positions are not
    /// compared; inserted text legitimately shifts them.
    pub fn continues_like(&self, other: &TokenizerSnapshot) -> bool {
        self.state == other.state
            && self.raw_kind == other.raw_kind
            && !self.has_pending_token()
            && !other.has_pending_token()
    }
}

impl Default for TokenizerSnapshot {
    fn default() -> Self {
        Self::initial()
    }
}
