//! Per-tokenizer parse context (shared resources).

use super::{AtomTable, Counters, ParseError};

/// Resources owned alongside one tokenizer instance: the atom table its
/// tokens refer to, counters, and recoverable parse errors.
///
/// Each thread running a tokenizer owns its own context; nothing in here is
/// shared across the worker boundary.
#[derive(Debug, Default)]
pub struct DocumentParseContext {
    pub atoms: AtomTable,
    pub counters: Counters,
    pub errors: Vec<ParseError>,
}

impl DocumentParseContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the errors recorded since the last call.
    pub fn take_errors(&mut self) -> Vec<ParseError> {
        std::mem::take(&mut self.errors)
    }
}
