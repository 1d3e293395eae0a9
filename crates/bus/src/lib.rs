//! Messages exchanged between the parse coordinator and its background
//! worker.
//!
//! Every payload is an owned value: tokens are compact tokens, tokenizer and
//! simulator state are snapshots. Nothing sent across the channel refers to
//! state the sender keeps using.

use core_types::{ChunkSeq, Generation, ParserId};
use html::html5::{
    CompactToken, FilterReport, ParseError, PreloadRequest, SimulatorState, TokenizerSnapshot,
};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// How far into the input a worker has read.
///
/// The worker reads `carried` text first (handed over by the last
/// checkpoint) and then network text. `network_offset` is a byte offset
/// into the full network text; `carried` is the number of bytes of the last
/// checkpoint's `unconsumed` text not read yet, counted from its end.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct InputCheckpoint {
    pub network_offset: usize,
    pub carried: usize,
}

/// State before the first token of a chunk.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChunkStart {
    pub tokenizer: TokenizerSnapshot,
    pub input: InputCheckpoint,
}

/// State after the last token of a chunk.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChunkEnd {
    pub tokenizer: TokenizerSnapshot,
    pub simulator: SimulatorState,
    pub input: InputCheckpoint,
}

/// A token the worker's content filter blocked.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FilteredToken {
    /// Index into `Chunk::tokens`.
    pub index: usize,
    pub report: FilterReport,
}

#[derive(Clone, Debug)]
pub struct Chunk {
    pub parser: ParserId,
    pub generation: Generation,
    pub seq: ChunkSeq,
    pub start: ChunkStart,
    pub tokens: Vec<CompactToken>,
    pub end: ChunkEnd,
    pub preloads: Vec<PreloadRequest>,
    /// Sorted by index.
    pub filtered: Vec<FilteredToken>,
    pub diagnostics: Vec<ParseError>,
    /// The worker's simulator expects the last token to suspend the parser.
    pub ends_in_script: bool,
    /// Ends with the EndOfFile token.
    pub is_final: bool,
}

impl Chunk {
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Reason the filter gave for blocking `tokens[index]`.
    pub fn blocked_reason(&self, index: usize) -> Option<&str> {
        self.filtered
            .binary_search_by_key(&index, |f| f.index)
            .ok()
            .map(|i| self.filtered[i].report.reason.as_str())
    }

    pub fn report_for(&self, index: usize) -> Option<&FilterReport> {
        self.filtered
            .binary_search_by_key(&index, |f| f.index)
            .ok()
            .map(|i| &self.filtered[i].report)
    }
}

/// Authoritative state handed to the worker after a rewind.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Checkpoint {
    /// Generation the worker's chunks must carry from now on.
    pub generation: Generation,
    pub tokenizer: TokenizerSnapshot,
    pub simulator: SimulatorState,
    /// Network position to continue from once `unconsumed` is read.
    pub input: InputCheckpoint,
    /// Text the coordinator holds that the worker has not read: script
    /// output plus any carried tail. Read before network text.
    pub unconsumed: String,
}

#[derive(Debug)]
pub enum WorkerCommand {
    AppendInput(String),
    MarkEndOfStream,
    ResumeFrom(Checkpoint),
    Stop,
}

#[derive(Debug)]
pub enum WorkerEvent {
    Chunk(Chunk),
    /// The worker dropped its in-flight state and now produces `generation`.
    Resumed { generation: Generation },
    /// Input ran out. `network_len` is the network text length the worker
    /// had seen at that point.
    Idle {
        generation: Generation,
        network_len: usize,
    },
    Stopped,
}

/// Shared cancel flag. Once revoked, a worker posts nothing more.
#[derive(Clone, Debug, Default)]
pub struct Revocation(Arc<AtomicBool>);

impl Revocation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn revoke(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_revoked(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use html::html5::{CompactAttr, SourcePos};

    fn assert_send_static<T: Send + 'static>() {}

    fn sample_chunk() -> Chunk {
        let tokens = vec![
            CompactToken::start_tag(
                "img",
                vec![CompactAttr::new("src", Some("a.png"))],
                SourcePos::START,
            ),
            CompactToken::text("x", SourcePos::START),
        ];
        Chunk {
            parser: 1,
            generation: Generation(0),
            seq: 0,
            start: ChunkStart {
                tokenizer: TokenizerSnapshot::initial(),
                input: InputCheckpoint::default(),
            },
            filtered: vec![FilteredToken {
                index: 1,
                report: FilterReport::new(&tokens[1], "no text"),
            }],
            tokens,
            end: ChunkEnd {
                tokenizer: TokenizerSnapshot::initial(),
                simulator: SimulatorState::default(),
                input: InputCheckpoint {
                    network_offset: 16,
                    carried: 0,
                },
            },
            preloads: Vec::new(),
            diagnostics: Vec::new(),
            ends_in_script: false,
            is_final: false,
        }
    }

    #[test]
    fn payloads_are_send() {
        assert_send_static::<Chunk>();
        assert_send_static::<Checkpoint>();
        assert_send_static::<WorkerCommand>();
        assert_send_static::<WorkerEvent>();
        assert_send_static::<Revocation>();
    }

    #[test]
    fn cloned_chunk_shares_no_storage() {
        let original = sample_chunk();
        let mut copy = original.clone();
        if let html::html5::CompactKind::StartTag { attrs, .. } = &mut copy.tokens[0].kind {
            attrs[0].value = Some("b.png".to_string());
        }
        copy.end.simulator.open_elements.push("html".to_string());
        assert_eq!(original.tokens[0].attrs()[0].value.as_deref(), Some("a.png"));
        assert!(original.end.simulator.open_elements.is_empty());
        assert_ne!(
            original.tokens[0].attrs()[0].name.as_ptr(),
            copy.tokens[0].attrs()[0].name.as_ptr()
        );
    }

    #[test]
    fn blocked_reason_looks_up_by_index() {
        let chunk = sample_chunk();
        assert_eq!(chunk.blocked_reason(0), None);
        assert_eq!(chunk.blocked_reason(1), Some("no text"));
        assert_eq!(chunk.report_for(1).map(|r| r.tag.as_str()), Some("#text"));
    }

    #[test]
    fn revocation_is_shared_between_clones() {
        let flag = Revocation::new();
        let seen_by_worker = flag.clone();
        assert!(!seen_by_worker.is_revoked());
        flag.revoke();
        assert!(seen_by_worker.is_revoked());
    }
}
