//! HTML5 insertion modes used by the tree builder state machine.
//!
//! Only the document-level and body modes are modelled. Table, select,
//! template and foreign-content modes are absent; their start tags are
//! inserted with the generic "in body" rules.

use serde::Serialize;

/// HTML5 tree-construction insertion mode.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize)]
pub enum InsertionMode {
    #[default]
    Initial,
    BeforeHtml,
    BeforeHead,
    InHead,
    /// Raw text content of `script`, `style`, `title` and friends. The mode
    /// to return to is kept in `original_mode`.
    Text,
    AfterHead,
    InBody,
    AfterBody,
    AfterAfterBody,
}

impl InsertionMode {
    /// Modes in which leading whitespace in a text token is ignored (or, for
    /// `InHead`/`AfterHead`, inserted) before the rest reprocesses.
    pub(crate) fn splits_leading_whitespace(self) -> bool {
        matches!(
            self,
            InsertionMode::Initial
                | InsertionMode::BeforeHtml
                | InsertionMode::BeforeHead
                | InsertionMode::InHead
                | InsertionMode::AfterHead
                | InsertionMode::AfterBody
                | InsertionMode::AfterAfterBody
        )
    }
}
